//! Player controller
//!
//! Owns the session for one visit of the player and keeps the engine volume
//! in step with the persisted preference.

use log::{debug, warn};
use tokio::sync::watch;

use super::engine::PlaybackEngine;
use super::session::{PlaybackSession, SessionState};
use crate::error::{SessionError, SettingsError};
use crate::models::{MediaReference, VolumeLevel};
use crate::settings::{SettingsBackend, SettingsStore};

pub struct PlayerController<E: PlaybackEngine> {
    session: PlaybackSession<E>,
    volume_rx: watch::Receiver<VolumeLevel>,
}

impl<E: PlaybackEngine> PlayerController<E> {
    /// Start a session and apply the stored volume right away
    pub fn new<B: SettingsBackend>(
        engine: E,
        settings: &SettingsStore<B>,
    ) -> Result<Self, SessionError> {
        let mut volume_rx = settings.observe_volume();
        let mut session = PlaybackSession::new(engine);
        let initial = *volume_rx.borrow_and_update();
        if let Err(e) = session.apply_volume(initial) {
            let _ = session.on_teardown();
            return Err(e);
        }
        Ok(Self { session, volume_rx })
    }

    pub fn session(&self) -> &PlaybackSession<E> {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn play(&mut self, reference: MediaReference) -> Result<(), SessionError> {
        self.session.load_and_play(reference)
    }

    /// Persist a new volume. The session picks it up on the next sync.
    pub fn set_volume<B: SettingsBackend>(
        &self,
        settings: &mut SettingsStore<B>,
        level: f32,
    ) -> Result<VolumeLevel, SettingsError> {
        settings.set_volume(level)
    }

    /// Forward the latest stored volume if it changed since the last sync.
    /// Returns whether a value was applied.
    pub fn sync_volume(&mut self) -> Result<bool, SessionError> {
        match self.volume_rx.has_changed() {
            Ok(true) => {
                let level = *self.volume_rx.borrow_and_update();
                self.session.apply_volume(level)?;
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(_) => {
                debug!("Settings store dropped, volume stays at {:?}", self.session.volume());
                Ok(false)
            }
        }
    }

    pub fn on_foreground(&mut self) -> Result<(), SessionError> {
        self.session.on_foreground()
    }

    pub fn on_background(&mut self) -> Result<(), SessionError> {
        self.session.on_background()
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    /// Pick up a fault the engine hit since the last check.
    /// Playback is left paused; the returned error is for the user.
    pub fn take_engine_fault(&mut self) -> Option<SessionError> {
        self.session.take_engine_fault()
    }

    /// End the visit and release the engine
    pub fn close(mut self) -> Result<(), SessionError> {
        self.session.on_teardown()
    }
}

impl<E: PlaybackEngine> Drop for PlayerController<E> {
    fn drop(&mut self) {
        if !self.session.is_closed() {
            warn!("Player dropped without closing, releasing engine");
            let _ = self.session.on_teardown();
        }
    }
}
