//! Error types
//!
//! One enum per subsystem so callers can match on what went wrong.

use thiserror::Error;

/// Failures surfaced by a playback session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Reference is unreadable or its format is unsupported
    #[error("Media unavailable: {0}")]
    MediaUnavailable(String),

    /// Operation attempted after the session was torn down
    #[error("Playback session is closed")]
    SessionClosed,

    /// The engine faulted while handling a loaded reference
    #[error("Playback engine failure: {0}")]
    EngineFailure(String),
}

/// Failures reported by a playback engine implementation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("cannot open media: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Fault(String),
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => SessionError::MediaUnavailable(msg),
            EngineError::Fault(msg) => SessionError::EngineFailure(msg),
        }
    }
}

/// Media catalog persistence errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Settings persistence errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to persist setting {key}: {reason}")]
    Persist { key: String, reason: String },
}

/// Recording errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording matches handle {0}")]
    UnknownHandle(uuid::Uuid),

    #[error("No audio was captured")]
    NoAudio,

    #[error("Audio source error: {0}")]
    Source(String),

    #[error("Failed to write recording: {0}")]
    Wav(#[from] hound::Error),

    #[error("Recording I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
