//! # Pitch Detection Module
//!
//! Aggregates per-frame dominant frequencies into a frequency set: every
//! estimate rounded to three decimals, duplicates removed.

use crate::fft::SpectralAnalyzer;
use serde::Serialize;

/// Decimal places kept for each dominant frequency.
pub const FREQUENCY_DECIMALS: i32 = 3;

/// Rounds `value` to `decimals` places, ties to even.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Unique, rounded dominant frequencies of one buffer.
///
/// Values are kept in ascending order so iteration is deterministic; the
/// order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrequencySet {
    values: Vec<f64>,
}

impl FrequencySet {
    /// Rounds and deduplicates raw per-frame estimates.
    pub fn from_estimates<I>(estimates: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values: Vec<f64> = estimates
            .into_iter()
            .map(|f| round_to(f, FREQUENCY_DECIMALS))
            .collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        Self { values }
    }

    pub fn contains(&self, frequency: f64) -> bool {
        self.values.iter().any(|&v| v == frequency)
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds the frequency set of a buffer from its windowed frames.
///
/// One estimate per frame; an empty frame sequence gives an empty set.
pub fn build(
    windowed_frames: &[Vec<f64>],
    sample_rate: u32,
    analyzer: &mut SpectralAnalyzer,
) -> FrequencySet {
    FrequencySet::from_estimates(
        windowed_frames
            .iter()
            .map(|frame| analyzer.dominant_frequency(frame, sample_rate)),
    )
}
