//! Recording controller
//!
//! Drives an audio source, writes the result to a WAV file and catalogs it.

#![cfg_attr(not(feature = "pipewire"), allow(dead_code))]

use chrono::{DateTime, Local, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::audio::{AudioSource, CapturedAudio, WavRecorder};
use crate::catalog::MediaCatalog;
use crate::error::CaptureError;
use crate::models::{MediaReference, MediaType, NewMediaItem};

/// Identifies one in-progress recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingHandle {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

pub struct CaptureController<S: AudioSource> {
    source: S,
    recordings_dir: std::path::PathBuf,
    active: Option<RecordingHandle>,
}

impl<S: AudioSource> CaptureController<S> {
    pub fn new(source: S, recorder: &WavRecorder) -> Self {
        Self {
            source,
            recordings_dir: recorder.recordings_dir().to_path_buf(),
            active: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn start_recording(&mut self) -> Result<RecordingHandle, CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        self.source.start().map_err(CaptureError::Source)?;

        let handle = RecordingHandle {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        info!("Recording {} started", handle.id);
        self.active = Some(handle.clone());
        Ok(handle)
    }

    fn finish(&mut self, handle: &RecordingHandle) -> Result<CapturedAudio, CaptureError> {
        match &self.active {
            Some(active) if active.id == handle.id => {}
            _ => return Err(CaptureError::UnknownHandle(handle.id)),
        }
        self.active = None;
        self.source.stop().map_err(CaptureError::Source)
    }

    /// Stop, save the audio as WAV and add it to the catalog
    pub fn stop_recording(
        &mut self,
        handle: &RecordingHandle,
        catalog: &mut MediaCatalog,
    ) -> Result<MediaReference, CaptureError> {
        let audio = self.finish(handle)?;
        if audio.samples.is_empty() || audio.sample_rate == 0 {
            warn!("Recording {} captured no audio", handle.id);
            return Err(CaptureError::NoAudio);
        }

        let recorder = WavRecorder::new()
            .with_recordings_dir(&self.recordings_dir)
            .with_sample_rate(audio.sample_rate);
        let path = recorder.save(&audio.samples)?;
        let uri = path.to_string_lossy().into_owned();

        let name = format!(
            "Audio {}",
            handle
                .started_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
        let item = NewMediaItem::new(uri.clone(), name, MediaType::Audio)
            .with_date(handle.started_at)
            .with_duration_ms(audio.duration_ms());

        if let Err(e) = catalog.append(item) {
            // Keep the catalog and the recordings directory in step
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }

        info!(
            "Recording saved to {:?} ({}Hz, {} samples)",
            path,
            audio.sample_rate,
            audio.samples.len()
        );
        MediaReference::new(uri).map_err(|_| CaptureError::NoAudio)
    }

    /// Stop without saving anything
    pub fn cancel_recording(&mut self, handle: &RecordingHandle) -> Result<(), CaptureError> {
        let audio = self.finish(handle)?;
        info!("Recording {} discarded ({} samples)", handle.id, audio.samples.len());
        Ok(())
    }
}
