//! Audio capture, WAV files and output
//!
//! This module provides:
//! - The `AudioSource` seam the capture controller records from
//! - WAV file writing and reading via hound
//! - PipeWire microphone capture and playback engine (feature `pipewire`)

#[cfg(feature = "pipewire")]
mod capture;
#[cfg(feature = "pipewire")]
mod pw_stream;
#[cfg(feature = "pipewire")]
mod playback;
mod recorder;

#[cfg(feature = "pipewire")]
pub use capture::AudioCapture;
#[cfg(feature = "pipewire")]
pub use playback::AudioPlayer;
pub use recorder::WavRecorder;

/// Mono samples captured from a source
#[derive(Debug, Clone, Default)]
pub struct CapturedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl CapturedAudio {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        let seconds = WavRecorder::duration_seconds(self.samples.len(), self.sample_rate);
        (seconds * 1000.0).round() as u64
    }
}

/// A microphone or any other producer of mono f32 samples
pub trait AudioSource {
    fn start(&mut self) -> Result<(), String>;

    /// Stop producing and hand back everything captured since `start`
    fn stop(&mut self) -> Result<CapturedAudio, String>;

    fn is_running(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_duration() {
        let audio = CapturedAudio {
            samples: vec![0.0; 24000],
            sample_rate: 48000,
        };
        assert_eq!(audio.duration_ms(), 500);
        assert_eq!(CapturedAudio::default().duration_ms(), 0);
    }
}
