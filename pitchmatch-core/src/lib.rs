// pitchmatch-core/src/lib.rs

//! The core logic for the pitch-matching game.
//! This crate is responsible for audio capture, framing, spectral analysis,
//! and note classification. It is completely headless
//! and contains no rendering code.

use thiserror::Error;

pub mod audio;
pub mod config;
pub mod fft;
pub mod framing;
pub mod listener;
pub mod pitch;
pub mod tuning;
pub mod wav;

pub use audio::{AudioSource, MicrophoneSource, ReplaySource, SignalBuffer};
pub use config::ListenerConfig;
pub use listener::{Analyzer, CycleOutcome, Listener};
pub use pitch::FrequencySet;
pub use tuning::{Detection, NoteEntry, NoteTable};

/// Errors raised by an audio source while assembling a buffer.
///
/// Every variant is a per-cycle miss: callers skip or retry the cycle.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("No suitable input format found")]
    NoSuitableFormat,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Audio stream stalled for {0:?}")]
    Stalled(std::time::Duration),

    #[error("Audio stream closed")]
    StreamClosed,
}

/// Errors that can occur at the boundaries of the analysis pipeline.
///
/// The DSP stages themselves never fail; everything here is rejected
/// before a buffer enters the pipeline.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid note table: {0}")]
    InvalidNoteTable(String),

    #[error("Unsupported WAV layout: {0}")]
    UnsupportedWav(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
