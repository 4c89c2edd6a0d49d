//! Listener configuration and the single validation boundary in front of the
//! DSP pipeline.

use crate::framing::FrameLayout;
use crate::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_BUFFER_SECONDS: f64 = 0.1;

/// Lowest rate whose 10 ms hop is at least one sample.
pub const MIN_SAMPLE_RATE: u32 = 100;

/// Configuration for one capture-and-classify cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Sampling frequency in Hz
    pub sample_rate: u32,
    /// Number of samples fetched per device read
    pub chunk_size: usize,
    /// Requested buffer length in seconds
    pub buffer_seconds: f64,
    /// Round-trip every captured buffer through a WAV file at this path
    pub persist_buffer: Option<PathBuf>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_seconds: DEFAULT_BUFFER_SECONDS,
            persist_buffer: None,
        }
    }
}

impl ListenerConfig {
    /// Loads a JSON configuration file and validates it.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample rate must be positive"));
        }
        if self.sample_rate < MIN_SAMPLE_RATE {
            return Err(invalid(format!(
                "sample rate {} Hz is below the {} Hz minimum",
                self.sample_rate, MIN_SAMPLE_RATE
            )));
        }
        if self.chunk_size == 0 {
            return Err(invalid("chunk size must be positive"));
        }
        if !self.buffer_seconds.is_finite() || self.buffer_seconds <= 0.0 {
            return Err(invalid(format!(
                "buffer duration must be positive, got {}",
                self.buffer_seconds
            )));
        }
        if self.reads_per_cycle() == 0 {
            return Err(invalid(format!(
                "a {} s buffer holds less than one {}-sample chunk at {} Hz",
                self.buffer_seconds, self.chunk_size, self.sample_rate
            )));
        }
        Ok(())
    }

    /// Device reads needed to fill one buffer: `floor(rate / chunk * seconds)`.
    pub fn reads_per_cycle(&self) -> usize {
        if self.chunk_size == 0 {
            return 0;
        }
        (self.sample_rate as f64 / self.chunk_size as f64 * self.buffer_seconds) as usize
    }

    /// Samples in one captured buffer.
    pub fn samples_per_cycle(&self) -> usize {
        self.reads_per_cycle() * self.chunk_size
    }

    pub fn frame_layout(&self) -> FrameLayout {
        FrameLayout::for_rate(self.sample_rate)
    }
}

fn invalid(message: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidConfiguration(message.into())
}
