//! Round-trips signal buffers through uncompressed 16-bit PCM WAV files.

use crate::audio::SignalBuffer;
use crate::{AnalysisError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::debug;

/// Writes a buffer as a mono 16-bit PCM WAV file, replacing any existing file.
pub fn write_buffer<P: AsRef<Path>>(path: P, buffer: &SignalBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in buffer.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Reads a 16-bit PCM WAV file into a buffer.
///
/// Multi-channel files keep their first channel only.
pub fn read_buffer<P: AsRef<Path>>(path: P) -> Result<SignalBuffer> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(AnalysisError::UnsupportedWav(format!(
            "expected 16-bit integer samples, found {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    if spec.channels == 0 {
        return Err(AnalysisError::UnsupportedWav("file has no channels".into()));
    }

    let samples = reader
        .samples::<i16>()
        .step_by(spec.channels as usize)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(SignalBuffer::new(samples, spec.sample_rate))
}

/// Writes `buffer` to `path` and reads it straight back.
pub fn round_trip<P: AsRef<Path>>(path: P, buffer: &SignalBuffer) -> Result<SignalBuffer> {
    let path = path.as_ref();
    write_buffer(path, buffer)?;
    debug!("[WAV] Round-tripped {} samples through {}", buffer.len(), path.display());
    read_buffer(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_samples_and_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffer.wav");
        let buffer = SignalBuffer::new(vec![i16::MIN, -1, 0, 1, 1234, i16::MAX], 22_050);

        let restored = round_trip(&path, &buffer).unwrap();
        assert_eq!(restored, buffer);

        // the file is overwritten on the next cycle
        let next = SignalBuffer::new(vec![42; 3], 22_050);
        assert_eq!(round_trip(&path, &next).unwrap(), next);
    }

    #[test]
    fn empty_buffers_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let buffer = SignalBuffer::new(vec![], 44_100);
        assert_eq!(round_trip(&path, &buffer).unwrap(), buffer);
    }

    #[test]
    fn stereo_files_keep_the_first_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for (left, right) in [(1_i16, -1_i16), (2, -2), (3, -3)] {
            writer.write_sample(left).unwrap();
            writer.write_sample(right).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = read_buffer(&path).unwrap();
        assert_eq!(buffer.samples(), &[1, 2, 3]);
        assert_eq!(buffer.sample_rate(), 8_000);
    }

    #[test]
    fn float_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5_f32).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(read_buffer(&path), Err(AnalysisError::UnsupportedWav(_))));
    }
}
