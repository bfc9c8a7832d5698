//! Playback session lifecycle
//!
//! A session ties one visit of the player to one engine. It follows the
//! application's visibility: output is paused while the app is in the
//! background and resumed when it returns, and the engine is released
//! exactly once when the player goes away.

use log::{debug, info, trace, warn};

use super::engine::PlaybackEngine;
use crate::error::SessionError;
use crate::models::{MediaReference, VolumeLevel};

/// Observable state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded yet
    Idle,
    /// A reference is loaded and producing output
    Playing,
    /// A reference is loaded, output is stopped at its position
    Paused,
    /// Engine released, terminal
    Closed,
}

/// Visibility of the application as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Foregrounded,
    Backgrounded,
}

pub struct PlaybackSession<E: PlaybackEngine> {
    engine: Option<E>,
    current: Option<MediaReference>,
    state: SessionState,
    lifecycle: Lifecycle,
    /// Playback was wanted when the app went to the background, or a load
    /// arrived while backgrounded.
    resume_on_foreground: bool,
    volume: Option<VolumeLevel>,
}

impl<E: PlaybackEngine> PlaybackSession<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Some(engine),
            current: None,
            state: SessionState::Idle,
            lifecycle: Lifecycle::Foregrounded,
            resume_on_foreground: false,
            volume: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn current_reference(&self) -> Option<&MediaReference> {
        self.current.as_ref()
    }

    /// Last volume forwarded to the engine
    pub fn volume(&self) -> Option<VolumeLevel> {
        self.volume
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    /// True when the loaded reference has played to its end
    pub fn is_finished(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|engine| engine.is_finished())
    }

    fn engine_mut(&mut self) -> Result<&mut E, SessionError> {
        self.engine.as_mut().ok_or(SessionError::SessionClosed)
    }

    /// Load `reference` and start playing it.
    ///
    /// Loading the reference that is already playing does nothing. If the app
    /// is in the background the reference is prepared and playback starts on
    /// the next foreground signal.
    pub fn load_and_play(&mut self, reference: MediaReference) -> Result<(), SessionError> {
        self.engine_mut()?;

        if self.current.as_ref() == Some(&reference) {
            match self.state {
                SessionState::Playing => {
                    trace!("{} is already playing", reference);
                    return Ok(());
                }
                SessionState::Paused => return self.start_or_defer(),
                _ => {}
            }
        }

        if self.state == SessionState::Playing {
            self.pause_engine()?;
        }

        let prepared = self.engine_mut()?.prepare(&reference);
        if let Err(e) = prepared {
            warn!("Cannot load {}: {}", reference, e);
            self.resume_on_foreground = false;
            if self.current.is_some() {
                self.state = SessionState::Paused;
            }
            return Err(SessionError::MediaUnavailable(e.to_string()));
        }

        info!("Loaded {}", reference);
        self.current = Some(reference);
        self.state = SessionState::Paused;
        self.start_or_defer()
    }

    /// Forward a volume to the engine, clamped into 0.0..=1.0.
    ///
    /// If the engine rejects it, output stops and stays stopped until the
    /// next load.
    pub fn apply_volume(&mut self, level: impl Into<VolumeLevel>) -> Result<(), SessionError> {
        let level = level.into();
        if let Err(e) = self.engine_mut()?.set_volume(level) {
            warn!("Volume change to {} failed: {}", level, e);
            if self.state == SessionState::Playing {
                if let Err(paused) = self.pause_engine() {
                    debug!("Pause after volume failure also failed: {}", paused);
                }
            }
            self.resume_on_foreground = false;
            return Err(SessionError::EngineFailure(e.to_string()));
        }
        debug!("Volume set to {}", level);
        self.volume = Some(level);
        Ok(())
    }

    /// The app became visible again
    pub fn on_foreground(&mut self) -> Result<(), SessionError> {
        self.engine_mut()?;
        self.lifecycle = Lifecycle::Foregrounded;

        if self.state == SessionState::Paused && self.resume_on_foreground {
            debug!("Resuming playback on foreground");
            return self.start_or_defer();
        }
        Ok(())
    }

    /// The app left the screen
    pub fn on_background(&mut self) -> Result<(), SessionError> {
        self.engine_mut()?;
        self.lifecycle = Lifecycle::Backgrounded;

        if self.state == SessionState::Playing {
            debug!("Pausing playback on background");
            self.pause_engine()?;
            self.resume_on_foreground = true;
        }
        Ok(())
    }

    /// Release the engine. Only the first call reaches the engine.
    pub fn on_teardown(&mut self) -> Result<(), SessionError> {
        let mut engine = self.engine.take().ok_or(SessionError::SessionClosed)?;
        self.state = SessionState::Closed;
        self.current = None;
        self.resume_on_foreground = false;

        info!("Releasing playback engine");
        engine
            .release()
            .map_err(|e| SessionError::EngineFailure(e.to_string()))
    }

    /// The engine faulted on its own while a reference was loaded.
    ///
    /// Playback stops where it is and stays stopped until the next load.
    /// Returns the failure to surface to the user.
    pub fn on_engine_fault(&mut self, detail: impl Into<String>) -> SessionError {
        if self.is_closed() {
            return SessionError::SessionClosed;
        }
        let detail = detail.into();
        warn!("Playback engine fault: {}", detail);
        if self.current.is_some() {
            self.state = SessionState::Paused;
        }
        self.resume_on_foreground = false;
        SessionError::EngineFailure(detail)
    }

    /// Collect a fault the engine hit on its own and apply it to the session
    pub fn take_engine_fault(&mut self) -> Option<SessionError> {
        let detail = self.engine.as_mut()?.take_fault()?;
        Some(self.on_engine_fault(detail))
    }

    fn start_or_defer(&mut self) -> Result<(), SessionError> {
        if self.lifecycle == Lifecycle::Backgrounded {
            debug!("In background, deferring playback");
            self.resume_on_foreground = true;
            self.state = SessionState::Paused;
            return Ok(());
        }

        self.resume_on_foreground = false;
        match self.engine_mut()?.play() {
            Ok(()) => {
                self.state = SessionState::Playing;
                Ok(())
            }
            Err(e) => {
                warn!("Playback failed to start: {}", e);
                self.state = SessionState::Paused;
                Err(e.into())
            }
        }
    }

    fn pause_engine(&mut self) -> Result<(), SessionError> {
        let paused = self.engine_mut()?.pause();
        self.state = SessionState::Paused;
        paused.map_err(|e| {
            warn!("Playback failed to pause: {}", e);
            self.resume_on_foreground = false;
            SessionError::EngineFailure(e.to_string())
        })
    }
}
