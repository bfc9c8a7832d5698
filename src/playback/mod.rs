//! Media playback
//!
//! - `PlaybackEngine`: what a decoder/output backend must provide
//! - `PlaybackSession`: lifecycle state machine around one engine
//! - `PlayerController`: session plus the persisted volume preference

mod controller;
mod engine;
pub(crate) mod session;

pub use controller::PlayerController;
pub use engine::PlaybackEngine;
