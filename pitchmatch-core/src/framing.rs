//! # Framing Module
//!
//! Slices a mono signal into fixed-length, overlapping analysis frames.
//! Frame geometry is derived from the sample rate alone: a 25 ms window
//! advanced by a 10 ms hop. The signal is zero-padded at the tail so the
//! final frame is always fully populated.

/// Window length in seconds.
pub const FRAME_SECONDS: f64 = 0.025;

/// Hop between consecutive frames in seconds.
pub const STEP_SECONDS: f64 = 0.01;

/// Frame geometry for a given sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Samples per frame, `floor(0.025 * rate)`.
    pub frame_length: usize,
    /// Samples between frame starts, `floor(0.01 * rate)`.
    pub frame_step: usize,
}

impl FrameLayout {
    /// Derives the frame geometry for a sample rate.
    ///
    /// # Arguments
    /// * `sample_rate` - Sampling frequency in Hz
    ///
    /// # Returns
    /// * `FrameLayout` - Frame length and hop in samples; both are positive
    ///   for every rate that passes configuration validation
    pub fn for_rate(sample_rate: u32) -> Self {
        let rate = sample_rate as f64;
        Self {
            frame_length: (FRAME_SECONDS * rate).floor() as usize,
            frame_step: (STEP_SECONDS * rate).floor() as usize,
        }
    }

    /// Number of frames needed to cover a signal of `signal_length` samples.
    ///
    /// Always at least one, so empty and very short signals still produce
    /// an (all-zero or partially zero) frame.
    pub fn frame_count(&self, signal_length: usize) -> usize {
        // A zero hop only arises below the validated minimum rate.
        let step = self.frame_step.max(1);
        signal_length
            .abs_diff(self.frame_length)
            .div_ceil(step)
            .max(1)
    }

    /// Length of the signal once zeros have been appended.
    pub fn padded_length(&self, signal_length: usize) -> usize {
        self.frame_count(signal_length) * self.frame_step + self.frame_length
    }
}

/// Transforms a signal into a series of overlapping frames.
///
/// Frame `i` covers `[i * frame_step, i * frame_step + frame_length)` of the
/// zero-padded signal. Padding is only ever appended.
///
/// # Returns
/// * `(frames, frame_length)` - every frame has exactly `frame_length` samples
pub fn frame(samples: &[i16], sample_rate: u32) -> (Vec<Vec<i16>>, usize) {
    let layout = FrameLayout::for_rate(sample_rate);
    let count = layout.frame_count(samples.len());

    let mut padded = samples.to_vec();
    padded.resize(layout.padded_length(samples.len()).max(samples.len()), 0);

    let frames = (0..count)
        .map(|i| {
            let start = i * layout.frame_step;
            padded[start..start + layout.frame_length].to_vec()
        })
        .collect();

    (frames, layout.frame_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_window_and_hop_durations() {
        for &rate in &[100_u32, 8_000, 16_000, 22_050, 44_100, 48_000, 96_000] {
            let layout = FrameLayout::for_rate(rate);
            assert_eq!(layout.frame_length, (0.025 * rate as f64).floor() as usize);
            assert_eq!(layout.frame_step, (0.01 * rate as f64).floor() as usize);
            assert!(layout.frame_length > 0 && layout.frame_step > 0, "rate {rate}");
        }

        let layout = FrameLayout::for_rate(44_100);
        assert_eq!(layout.frame_length, 1102);
        assert_eq!(layout.frame_step, 441);
    }

    #[test]
    fn one_capture_cycle_yields_seven_frames() {
        // 4 chunks of 1024 samples at 44.1 kHz
        let samples = vec![1_i16; 4096];
        let (frames, frame_length) = frame(&samples, 44_100);

        assert_eq!(frame_length, 1102);
        assert_eq!(frames.len(), 7);
        assert!(frames.iter().all(|f| f.len() == frame_length));
    }

    #[test]
    fn frames_overlap_by_the_hop() {
        let samples: Vec<i16> = (0..2000).map(|i| i as i16).collect();
        let (frames, _) = frame(&samples, 8_000);
        // 200-sample frames every 80 samples
        assert_eq!(frames[0][0], 0);
        assert_eq!(frames[1][0], 80);
        assert_eq!(frames[2][..3], [160, 161, 162]);
    }

    #[test]
    fn tail_is_padded_with_zeros() {
        let samples = vec![7_i16; 250];
        let (frames, frame_length) = frame(&samples, 8_000);
        // |250 - 200| / 80 rounds up to one frame
        assert_eq!(frames.len(), 1);
        assert_eq!(frame_length, 200);
        assert!(frames[0].iter().all(|&s| s == 7));

        let samples = vec![7_i16; 150];
        let (frames, _) = frame(&samples, 8_000);
        assert_eq!(frames.len(), 1);
        assert!(frames[0][..150].iter().all(|&s| s == 7));
        assert!(frames[0][150..].iter().all(|&s| s == 0));
    }

    #[test]
    fn empty_signal_still_produces_silent_frames() {
        let (frames, frame_length) = frame(&[], 44_100);
        assert!(!frames.is_empty());
        for f in &frames {
            assert_eq!(f.len(), frame_length);
            assert!(f.iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn signal_matching_the_frame_length_keeps_one_frame() {
        let samples = vec![3_i16; 1102];
        let (frames, _) = frame(&samples, 44_100);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], samples);
    }

    #[test]
    fn every_frame_has_the_frame_length() {
        for len in [1_usize, 17, 399, 400, 401, 4096, 10_000] {
            let samples = vec![1_i16; len];
            let (frames, frame_length) = frame(&samples, 16_000);
            assert!(!frames.is_empty(), "len {len}");
            assert!(frames.iter().all(|f| f.len() == frame_length), "len {len}");
        }
    }
}
