//! # Listener Module
//!
//! Wires the pipeline together: capture, framing, windowing, spectral
//! analysis, frequency-set building and classification. Every cycle runs to
//! completion on the calling thread and shares no state with the next one
//! apart from the cached window and the planned transform.

use crate::audio::{self, AudioSource, SignalBuffer};
use crate::config::ListenerConfig;
use crate::fft::{SpectralAnalyzer, Windower};
use crate::pitch::{self, FrequencySet};
use crate::tuning::{self, Detection, NoteTable};
use crate::{Result, framing, wav};
use tracing::{debug, warn};

/// Offline analysis of signal buffers.
#[derive(Debug, Default)]
pub struct Analyzer {
    windower: Option<Windower>,
    spectral: SpectralAnalyzer,
}

impl Analyzer {
    /// Plans the transform; the window is built on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the window for `frame_length`, recomputing it only when the
    /// length changes.
    fn windower_for(&mut self, frame_length: usize) -> &Windower {
        if self
            .windower
            .as_ref()
            .is_some_and(|w| w.frame_length() != frame_length)
        {
            self.windower = None;
        }
        self.windower.get_or_insert_with(|| {
            debug!("[LISTENER] Computing Hamming window of length {}", frame_length);
            Windower::new(frame_length)
        })
    }

    /// Analyses a buffer down to its deduplicated dominant frequencies.
    pub fn frequencies(&mut self, buffer: &SignalBuffer) -> FrequencySet {
        let sample_rate = buffer.sample_rate();
        let (frames, frame_length) = framing::frame(buffer.samples(), sample_rate);

        let windower = self.windower_for(frame_length);
        let windowed: Vec<Vec<f64>> = frames.iter().map(|f| windower.apply(f)).collect();

        pitch::build(&windowed, sample_rate, &mut self.spectral)
    }

    /// Analyses a buffer and classifies it against `table`.
    pub fn detect(&mut self, table: &NoteTable, buffer: &SignalBuffer) -> CycleOutcome {
        let frequencies = self.frequencies(buffer);
        let detection = tuning::classify(table, &frequencies);
        CycleOutcome {
            frequencies,
            detection,
        }
    }
}

/// Everything one cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub frequencies: FrequencySet,
    pub detection: Detection,
}

/// Runs capture-and-classify cycles against an audio source.
pub struct Listener<S: AudioSource> {
    source: S,
    config: ListenerConfig,
    analyzer: Analyzer,
}

impl<S: AudioSource> Listener<S> {
    /// Creates a listener over `source`.
    ///
    /// Buffers are captured and analysed at the source's rate. When it
    /// differs from `config.sample_rate` the configuration is rebuilt
    /// around the source rate, so the read count still spans the requested
    /// duration and the rate the pipeline actually sees is the one validated.
    ///
    /// # Arguments
    /// * `source` - Audio source to capture from
    /// * `config` - Requested chunk size, buffer duration and persistence
    ///
    /// # Returns
    /// * `Result<Self>` - `InvalidConfiguration` if the effective settings
    ///   cannot be analysed
    pub fn new(source: S, mut config: ListenerConfig) -> Result<Self> {
        let source_rate = source.sample_rate();
        if source_rate != config.sample_rate {
            warn!(
                "[LISTENER] Source runs at {} Hz, configured for {} Hz; analysing at the source rate",
                source_rate, config.sample_rate
            );
            config.sample_rate = source_rate;
        }
        config.validate()?;
        Ok(Self {
            source,
            config,
            analyzer: Analyzer::new(),
        })
    }

    /// Effective configuration, with the sample rate of the source.
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Captures one buffer, round-tripping it through a WAV file when
    /// `persist_buffer` is set.
    pub fn capture(&mut self) -> Result<SignalBuffer> {
        let buffer = audio::capture_buffer(&mut self.source, &self.config)?;
        match &self.config.persist_buffer {
            Some(path) => wav::round_trip(path, &buffer),
            None => Ok(buffer),
        }
    }

    /// One full cycle: capture, analyse, classify.
    pub fn listen_cycle(&mut self, table: &NoteTable) -> Result<CycleOutcome> {
        let buffer = self.capture()?;
        let outcome = self.analyzer.detect(table, &buffer);
        debug!(
            "[LISTENER] {} frequencies -> {}",
            outcome.frequencies.len(),
            outcome.detection
        );
        Ok(outcome)
    }

    /// Captures a buffer and returns its dominant-frequency set.
    pub fn listen_frequencies(&mut self) -> Result<FrequencySet> {
        let buffer = self.capture()?;
        Ok(self.analyzer.frequencies(&buffer))
    }

    /// Captures a buffer and returns the detected note.
    pub fn listen(&mut self, table: &NoteTable) -> Result<Detection> {
        self.listen_cycle(table).map(|outcome| outcome.detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnalysisError, CaptureError, ReplaySource};

    fn tone(frequency: f64, sample_rate: u32, len: usize) -> SignalBuffer {
        let samples = (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (10_000.0 * (2.0 * std::f64::consts::PI * frequency * t).sin()) as i16
            })
            .collect();
        SignalBuffer::new(samples, sample_rate)
    }

    fn a_and_c() -> NoteTable {
        NoteTable::from_pairs([("A4", vec![440.0]), ("C4", vec![261.63])]).unwrap()
    }

    #[test]
    fn window_is_cached_per_frame_length() {
        let mut analyzer = Analyzer::new();
        analyzer.frequencies(&tone(440.0, 44_100, 4096));
        assert_eq!(analyzer.windower.as_ref().map(Windower::frame_length), Some(1102));

        analyzer.frequencies(&tone(440.0, 8_000, 800));
        assert_eq!(analyzer.windower.as_ref().map(Windower::frame_length), Some(200));

        let cached = analyzer.windower_for(200) as *const Windower;
        assert_eq!(analyzer.windower_for(200) as *const Windower, cached);
    }

    #[test]
    fn silent_buffer_is_a_rest() {
        let mut analyzer = Analyzer::new();
        let outcome = analyzer.detect(&a_and_c(), &SignalBuffer::new(vec![0; 4096], 44_100));
        assert_eq!(outcome.frequencies.as_slice(), &[1.0]);
        assert_eq!(outcome.detection, Detection::Rest);
    }

    #[test]
    fn empty_buffer_flows_through() {
        let mut analyzer = Analyzer::new();
        let outcome = analyzer.detect(&a_and_c(), &SignalBuffer::new(vec![], 44_100));
        assert!(outcome.detection.is_rest());
    }

    #[test]
    fn replayed_tone_is_detected_until_the_source_runs_dry() {
        let config = ListenerConfig::default();
        let source = ReplaySource::new(tone(440.0, 44_100, 4096 * 2));
        let mut listener = Listener::new(source, config).unwrap();
        let table = a_and_c();

        assert_eq!(listener.listen(&table).unwrap().label(), "A4");
        assert!(!listener.listen_frequencies().unwrap().is_empty());
        assert!(matches!(
            listener.listen(&table),
            Err(AnalysisError::Capture(CaptureError::StreamClosed))
        ));
    }

    #[test]
    fn invalid_configuration_is_rejected_up_front() {
        let config = ListenerConfig {
            chunk_size: 0,
            ..Default::default()
        };
        let source = ReplaySource::new(tone(440.0, 44_100, 4096));
        assert!(matches!(
            Listener::new(source, config),
            Err(AnalysisError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn buffers_follow_the_source_rate() {
        let config = ListenerConfig {
            sample_rate: 44_100,
            chunk_size: 100,
            buffer_seconds: 0.1,
            persist_buffer: None,
        };
        let source = ReplaySource::new(tone(440.0, 8_000, 8_000));
        let mut listener = Listener::new(source, config).unwrap();
        assert_eq!(listener.config().sample_rate, 8_000);
        assert_eq!(listener.config().reads_per_cycle(), 8);

        let buffer = listener.capture().unwrap();
        assert_eq!(buffer.sample_rate(), 8_000);
        assert_eq!(buffer.len(), 800);
        assert!((buffer.duration() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn source_rate_is_validated() {
        // valid as configured, but the source delivers below the minimum rate
        let source = ReplaySource::new(tone(10.0, 50, 500));
        let config = ListenerConfig {
            chunk_size: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(matches!(
            Listener::new(source, config),
            Err(AnalysisError::InvalidConfiguration(_))
        ));

        // one default chunk does not fit in 0.1 s at 8 kHz
        let source = ReplaySource::new(tone(440.0, 8_000, 4096));
        assert!(matches!(
            Listener::new(source, ListenerConfig::default()),
            Err(AnalysisError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn persisted_buffers_round_trip_through_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffer.wav");
        let config = ListenerConfig {
            persist_buffer: Some(path.clone()),
            ..Default::default()
        };
        let original = tone(261.63, 44_100, 4096);
        let mut listener = Listener::new(ReplaySource::new(original.clone()), config).unwrap();

        let captured = listener.capture().unwrap();
        assert_eq!(captured, original);
        assert!(path.exists());
    }
}
