//! WAV file recording using hound
//!
//! Writes captured audio as mono 32-bit float WAV files and reads WAV files
//! back for playback.

use hound::{WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::CaptureError;

/// WAV file recorder
pub struct WavRecorder {
    spec: WavSpec,
    recordings_dir: PathBuf,
}

impl WavRecorder {
    /// Create a recorder writing 48kHz mono f32 into the default directory
    pub fn new() -> Self {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        Self {
            spec,
            recordings_dir: crate::data_dir().join("recordings"),
        }
    }

    /// Set the recordings directory
    pub fn with_recordings_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.recordings_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.spec.sample_rate = rate;
        self
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Generate a unique filename for a new recording
    pub fn generate_filename(&self) -> PathBuf {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        self.recordings_dir
            .join(format!("recording_{}_{}.wav", timestamp, &uuid[..8]))
    }

    /// Save samples to a new WAV file and return its path
    pub fn save(&self, samples: &[f32]) -> Result<PathBuf, CaptureError> {
        std::fs::create_dir_all(&self.recordings_dir)?;

        let path = self.generate_filename();
        let writer = BufWriter::new(File::create(&path)?);
        let mut wav_writer = WavWriter::new(writer, self.spec)?;

        for &sample in samples {
            wav_writer.write_sample(sample)?;
        }
        wav_writer.finalize()?;

        Ok(path)
    }

    /// Load samples from a WAV file, mixed down to mono.
    ///
    /// Returns the samples and sample rate
    pub fn load(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32), hound::Error> {
        let reader = hound::WavReader::open(path.as_ref())?;

        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_value))
                    .collect::<Result<_, _>>()?
            }
        };

        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        Ok((samples, spec.sample_rate))
    }

    /// Get duration of samples in seconds
    pub fn duration_seconds(sample_count: usize, sample_rate: u32) -> f64 {
        sample_count as f64 / sample_rate as f64
    }
}

impl Default for WavRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_calculation() {
        assert_eq!(WavRecorder::duration_seconds(16000, 16000), 1.0);
        assert_eq!(WavRecorder::duration_seconds(96000, 48000), 2.0);
        assert_eq!(WavRecorder::duration_seconds(8000, 16000), 0.5);
    }

    #[test]
    fn test_save_then_load_keeps_rate() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = WavRecorder::new()
            .with_recordings_dir(dir.path().join("rec"))
            .with_sample_rate(16000);

        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 / 1600.0) - 0.5).collect();
        let path = recorder.save(&samples).unwrap();
        assert!(path.starts_with(dir.path().join("rec")));
        assert_eq!(path.extension().unwrap(), "wav");

        let (loaded, rate) = WavRecorder::load(&path).unwrap();
        assert_eq!(rate, 16000);
        assert_eq!(loaded.len(), samples.len());
    }

    #[test]
    fn test_load_mixes_int_stereo_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate) = WavRecorder::load(&path).unwrap();
        assert_eq!(rate, 8000);
        assert_eq!(samples.len(), 10);
        assert!((samples[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_load_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.wav");
        std::fs::write(&path, b"definitely not riff").unwrap();
        assert!(WavRecorder::load(&path).is_err());
        assert!(WavRecorder::load(dir.path().join("missing.wav")).is_err());
    }
}
