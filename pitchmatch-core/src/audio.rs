//! # Audio Capture Module
//!
//! This module assembles fixed-duration signal buffers from an audio source.
//! The microphone source uses CPAL (Cross-Platform Audio Library); any other
//! source (a decoded file, a synthetic signal) plugs in through the same
//! blocking [`AudioSource`] trait.
//!
//! ## Features
//! - Automatic input device selection
//! - Mono 16-bit samples regardless of the device's native format
//! - Blocking chunk reads on top of the real-time callback
//! - Replay of in-memory buffers chunk by chunk

use crate::CaptureError;
use crate::config::ListenerConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Chunks buffered between the device callback and the reader.
const CHANNEL_CAPACITY: usize = 256;

/// How long a read waits for the device before giving up on the cycle.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Mono PCM samples captured at a known rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl SignalBuffer {
    /// Wraps captured samples with the rate they were recorded at.
    ///
    /// # Arguments
    /// * `samples` - Mono 16-bit PCM samples in capture order
    /// * `sample_rate` - Sampling frequency in Hz
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// A blocking source of mono 16-bit samples.
pub trait AudioSource {
    /// Rate of the samples this source delivers.
    fn sample_rate(&self) -> u32;

    /// Blocks until `n_samples` samples are available and returns them.
    fn read(&mut self, n_samples: usize) -> Result<Vec<i16>, CaptureError>;
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read(&mut self, n_samples: usize) -> Result<Vec<i16>, CaptureError> {
        (**self).read(n_samples)
    }
}

/// Fills one buffer by concatenating successive chunk reads.
///
/// Reads `config.reads_per_cycle()` chunks of `config.chunk_size` samples.
/// The buffer is tagged with the source's own rate.
pub fn capture_buffer<S: AudioSource + ?Sized>(
    source: &mut S,
    config: &ListenerConfig,
) -> Result<SignalBuffer, CaptureError> {
    let reads = config.reads_per_cycle();
    let mut samples = Vec::with_capacity(config.samples_per_cycle());
    for _ in 0..reads {
        let chunk = source.read(config.chunk_size)?;
        samples.extend_from_slice(&chunk);
    }
    debug!("[CAPTURE] Assembled {} samples from {} reads", samples.len(), reads);
    Ok(SignalBuffer::new(samples, source.sample_rate()))
}

/// Replays an in-memory buffer chunk by chunk.
///
/// Once fewer than the requested samples remain the stream counts as closed.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    remaining: VecDeque<i16>,
    sample_rate: u32,
}

impl ReplaySource {
    /// Queues a buffer for chunked playback at its own rate.
    pub fn new(buffer: SignalBuffer) -> Self {
        let sample_rate = buffer.sample_rate();
        Self {
            remaining: buffer.into_samples().into(),
            sample_rate,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl AudioSource for ReplaySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, n_samples: usize) -> Result<Vec<i16>, CaptureError> {
        if self.remaining.len() < n_samples {
            return Err(CaptureError::StreamClosed);
        }
        Ok(self.remaining.drain(..n_samples).collect())
    }
}

/// Live input from the default capture device.
///
/// The device callback forwards mono chunks through a bounded channel and
/// [`AudioSource::read`] drains it on the calling thread. The stream stops
/// when the source is dropped.
pub struct MicrophoneSource {
    _stream: cpal::Stream,
    receiver: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    sample_rate: u32,
}

impl MicrophoneSource {
    /// Starts audio capture from the default input device.
    ///
    /// This function:
    /// 1. Selects the default audio input device
    /// 2. Picks the supported configuration closest to `target_rate`
    /// 3. Sets up a callback that down-mixes to mono 16-bit samples
    ///
    /// The device may not support `target_rate` exactly; the rate actually
    /// used is reported by [`AudioSource::sample_rate`].
    pub fn open(target_rate: u32) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice)?;

        info!(
            "[CAPTURE] Using audio input device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        let configs = device
            .supported_input_configs()
            .map_err(device_error)?
            .collect::<Vec<_>>();
        let supported = find_supported_config(configs, target_rate)
            .ok_or(CaptureError::NoSuitableFormat)?;

        let rate = target_rate.clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
        let supported = supported.with_sample_rate(cpal::SampleRate(rate));
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels as usize;

        info!(
            "[CAPTURE] Selected {} Hz, {} channel(s), {:?}",
            rate, channels, sample_format
        );
        if rate != target_rate {
            warn!("[CAPTURE] Device does not support {} Hz, using {} Hz", target_rate, rate);
        }

        let (sender, receiver) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, sender, |s| s)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, sender, f32_to_i16)?,
            _ => return Err(CaptureError::NoSuitableFormat),
        };
        stream.play().map_err(device_error)?;

        Ok(Self {
            _stream: stream,
            receiver,
            pending: VecDeque::new(),
            sample_rate: rate,
        })
    }
}

impl AudioSource for MicrophoneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, n_samples: usize) -> Result<Vec<i16>, CaptureError> {
        while self.pending.len() < n_samples {
            match self.receiver.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Err(CaptureError::Stalled(READ_TIMEOUT)),
                Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::StreamClosed),
            }
        }
        Ok(self.pending.drain(..n_samples).collect())
    }
}

fn build_stream<T: SizedSample + Send + 'static>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    sender: Sender<Vec<i16>>,
    convert: fn(T) -> i16,
) -> Result<cpal::Stream, CaptureError> {
    let err_fn = |err| error!("[CAPTURE] An error occurred on the audio stream: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Keep the first channel of every interleaved frame.
                let mono: Vec<i16> = data.iter().step_by(channels.max(1)).map(|&s| convert(s)).collect();
                if sender.try_send(mono).is_err() {
                    debug!("[CAPTURE] Reader is behind, dropping a chunk");
                }
            },
            err_fn,
            None,
        )
        .map_err(device_error)
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn device_error(err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Device(err.to_string())
}

/// Finds the best supported input configuration for the target sample rate.
///
/// Prefers 16-bit integer or 32-bit float formats, the fewest channels, and
/// the range closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32))
        .min_by_key(|c| {
            let rate_diff = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (rate_diff, c.channels(), c.sample_format() != SampleFormat::I16)
        })
}
