//! # Fast Fourier Transform (FFT) Module
//!
//! This module turns one analysis frame into a single dominant-frequency
//! estimate. It handles the Hamming window, the fixed-size forward transform,
//! the power spectrum, and the bin remapping used by the note classifier.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once and reused
//! - Hamming windowing for reduced spectral leakage
//! - Power spectrum with `1/N` magnitude scaling
//! - Halving remap of the frequency axis (`floor(f / 2) + 1`)

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Number of transform points, independent of the frame length.
///
/// Shorter frames are zero-padded, longer frames truncated.
pub const TRANSFORM_SIZE: usize = 1 << 14;

/// Computes Hamming window coefficients of length `len`.
///
/// `w(n) = 0.54 - 0.46 * cos(2 * pi * n / (M - 1))` for `0 <= n <= M - 1`.
/// A single-point window is `[1.0]`.
pub fn hamming_window(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    let m_minus_1 = len.saturating_sub(1) as f64;
    (0..len)
        .map(|n| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * n as f64 / m_minus_1).cos())
        .collect()
}

/// A Hamming window computed once for one frame length and reused.
#[derive(Debug, Clone)]
pub struct Windower {
    coefficients: Vec<f64>,
}

impl Windower {
    /// Precomputes the Hamming coefficients for one frame length.
    ///
    /// # Arguments
    /// * `frame_length` - Number of samples in every frame this window scales
    ///
    /// # Returns
    /// * `Windower` - Reusable window of exactly `frame_length` coefficients
    pub fn new(frame_length: usize) -> Self {
        Self {
            coefficients: hamming_window(frame_length),
        }
    }

    pub fn frame_length(&self) -> usize {
        self.coefficients.len()
    }

    /// Scales each sample by its window coefficient.
    ///
    /// The output has the frame's length; frames are expected to match the
    /// window length, any surplus samples are dropped.
    pub fn apply(&self, frame: &[i16]) -> Vec<f64> {
        debug_assert_eq!(frame.len(), self.coefficients.len());
        frame
            .iter()
            .zip(&self.coefficients)
            .map(|(&sample, &w)| sample as f64 * w)
            .collect()
    }
}

/// Power spectrum of the non-redundant half of a forward transform.
///
/// `magnitude = |X| / N` and `power = magnitude^2 / N^2`.
pub fn spectrum_to_power(spectrum: &[Complex<f64>]) -> Vec<f64> {
    let n = spectrum.len() as f64;
    spectrum
        .iter()
        .take(spectrum.len() / 2 + 1)
        .map(|c| {
            let magnitude = c.norm() / n;
            magnitude * magnitude / (n * n)
        })
        .collect()
}

/// Non-negative entries of a symmetric frequency axis laid over `len` points.
///
/// This is the number of bins that survive the remap; for the power array of
/// a `2^14` transform (8193 points) it keeps 4097 and discards the rest.
pub fn non_negative_bins(len: usize) -> usize {
    if len == 0 { 0 } else { (len - 1) / 2 + 1 }
}

/// Halves a frequency, floors it and adds one.
pub fn remap_frequency(frequency: f64) -> f64 {
    (frequency / 2.0).floor() + 1.0
}

/// Extracts the dominant frequency of windowed frames.
///
/// Holds the planned transform and its working buffers so repeated calls
/// do not re-plan or reallocate.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("transform_size", &TRANSFORM_SIZE)
            .finish()
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralAnalyzer {
    /// Plans the forward transform of `TRANSFORM_SIZE` points.
    ///
    /// Planning is the expensive step, so one analyzer should be kept and
    /// reused across frames and cycles.
    ///
    /// # Returns
    /// * `SpectralAnalyzer` - Analyzer with its working and scratch buffers
    ///   allocated
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(TRANSFORM_SIZE);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex::default(); TRANSFORM_SIZE],
            scratch,
        }
    }

    /// Performs the forward transform of a windowed frame at `TRANSFORM_SIZE`.
    fn transform(&mut self, windowed: &[f64]) -> &[Complex<f64>] {
        let padded = windowed.iter().copied().chain(std::iter::repeat(0.0));
        for (slot, sample) in self.buffer.iter_mut().zip(padded) {
            *slot = Complex { re: sample, im: 0.0 };
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        &self.buffer
    }

    /// Finds the dominant frequency of a single windowed frame.
    ///
    /// The frequency axis has spacing `sample_rate / N` and is laid over the
    /// power array; only its non-negative half is kept and each value is
    /// remapped to `floor(f / 2) + 1`. The power array is truncated to match
    /// and the first bin of maximum power wins.
    ///
    /// A silent frame has no power anywhere and yields `1.0`.
    pub fn dominant_frequency(&mut self, windowed: &[f64], sample_rate: u32) -> f64 {
        let power = spectrum_to_power(self.transform(windowed));
        let kept = non_negative_bins(power.len());
        let spacing = sample_rate as f64 / TRANSFORM_SIZE as f64;

        let mut peak_bin = 0;
        let mut peak_power = f64::NEG_INFINITY;
        for (bin, &p) in power[..kept].iter().enumerate() {
            if p > peak_power {
                peak_bin = bin;
                peak_power = p;
            }
        }

        remap_frequency(peak_bin as f64 * spacing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f64, sample_rate: u32, len: usize, amplitude: f64) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin()) as i16
            })
            .collect()
    }

    #[test]
    fn hamming_matches_closed_form() {
        let w = hamming_window(5);
        let expected = [0.08, 0.54, 1.0, 0.54, 0.08];
        for (a, b) in w.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12, "{a} != {b}");
        }
        assert_eq!(hamming_window(1), vec![1.0]);
        assert!(hamming_window(0).is_empty());
    }

    #[test]
    fn window_preserves_length_and_is_not_idempotent() {
        let windower = Windower::new(1102);
        let frame = vec![1000_i16; 1102];
        let once = windower.apply(&frame);
        assert_eq!(once.len(), frame.len());

        let as_ints: Vec<i16> = once.iter().map(|&v| v as i16).collect();
        let twice = windower.apply(&as_ints);
        // Edges are attenuated again on a second pass
        assert!(twice[0] < once[0]);
        assert!((once[0] - 80.0).abs() < 1e-9);
        assert!((once[551] - 1000.0).abs() < 1.0);
    }

    #[test]
    fn only_the_lower_half_of_the_power_array_survives() {
        assert_eq!(non_negative_bins(TRANSFORM_SIZE / 2 + 1), 4097);
        assert_eq!(non_negative_bins(8), 4);
        assert_eq!(non_negative_bins(1), 1);
        assert_eq!(non_negative_bins(0), 0);
    }

    #[test]
    fn remap_halves_floors_and_offsets() {
        assert_eq!(remap_frequency(0.0), 1.0);
        assert_eq!(remap_frequency(440.0), 221.0);
        assert_eq!(remap_frequency(438.74), 220.0);
        assert_eq!(remap_frequency(1.9), 1.0);
    }

    #[test]
    fn silent_frame_maps_to_one() {
        let mut analyzer = SpectralAnalyzer::new();
        let windowed = vec![0.0; 1102];
        assert_eq!(analyzer.dominant_frequency(&windowed, 44_100), 1.0);
        assert_eq!(analyzer.dominant_frequency(&[], 44_100), 1.0);
    }

    #[test]
    fn pure_tone_lands_on_the_remapped_nearest_bin() {
        let mut analyzer = SpectralAnalyzer::new();
        for &(rate, f0) in &[(44_100_u32, 440.0), (44_100, 261.63), (48_000, 880.0), (16_000, 330.0)] {
            let layout = crate::framing::FrameLayout::for_rate(rate);
            let windower = Windower::new(layout.frame_length);
            let windowed = windower.apply(&sine(f0, rate, layout.frame_length, 12_000.0));

            let resolution = rate as f64 / TRANSFORM_SIZE as f64;
            let nearest_bin = (f0 / resolution).round() * resolution;
            let expected = remap_frequency(nearest_bin);

            let got = analyzer.dominant_frequency(&windowed, rate);
            assert!(
                (got - expected).abs() <= resolution.max(1.0),
                "{f0} Hz at {rate}: expected ~{expected}, got {got}"
            );
        }
    }

    #[test]
    fn long_frames_are_truncated_to_the_transform_size() {
        let mut analyzer = SpectralAnalyzer::new();
        let windowed: Vec<f64> = sine(1000.0, 44_100, TRANSFORM_SIZE * 2, 8_000.0)
            .into_iter()
            .map(f64::from)
            .collect();
        let got = analyzer.dominant_frequency(&windowed, 44_100);
        assert!((got - remap_frequency(1000.0)).abs() <= 2.0, "got {got}");
    }
}
