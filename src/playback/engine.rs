use crate::error::EngineError;
use crate::models::{MediaReference, VolumeLevel};

/// A player able to decode and output one media stream at a time.
///
/// A session owns exactly one engine and calls `release` on it at most once.
pub trait PlaybackEngine {
    /// Open `reference` and get ready to play it from the start.
    /// Replaces whatever was prepared before.
    fn prepare(&mut self, reference: &MediaReference) -> Result<(), EngineError>;

    /// Start or resume output from the current position
    fn play(&mut self) -> Result<(), EngineError>;

    /// Stop output, keeping the position
    fn pause(&mut self) -> Result<(), EngineError>;

    fn set_volume(&mut self, level: VolumeLevel) -> Result<(), EngineError>;

    /// Free all resources held by the engine
    fn release(&mut self) -> Result<(), EngineError>;

    /// True once the prepared stream has played to its end
    fn is_finished(&self) -> bool {
        false
    }

    /// A failure the engine hit on its own since the last call, if any
    fn take_fault(&mut self) -> Option<String> {
        None
    }
}
