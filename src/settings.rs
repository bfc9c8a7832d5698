//! Persisted volume preference
//!
//! The volume is stored in dconf under `/com/mediabox/player/` and exposed
//! to the player as a watch channel, so every subscriber sees the latest
//! value immediately and then each change.

use log::{debug, error, warn};
use tokio::sync::watch;

use crate::error::SettingsError;
use crate::models::VolumeLevel;

const DCONF_PATH: &str = "/com/mediabox/player/";

/// Keys for dconf settings
mod keys {
    pub const VOLUME_LEVEL: &str = "volume-level";
}

/// Storage for the raw volume preference
pub trait SettingsBackend {
    fn load_volume(&self) -> Option<f32>;
    fn save_volume(&mut self, level: f32) -> Result<(), SettingsError>;
}

/// Settings stored in the user's dconf database
#[derive(Debug, Default)]
pub struct DconfBackend;

impl DconfBackend {
    fn key(name: &str) -> String {
        format!("{}{}", DCONF_PATH, name)
    }
}

impl SettingsBackend for DconfBackend {
    fn load_volume(&self) -> Option<f32> {
        let key = Self::key(keys::VOLUME_LEVEL);
        let raw = dconf_rs::get_string(&key).ok()?;
        match raw.trim().trim_matches('\'').parse::<f32>() {
            Ok(level) => Some(level),
            Err(e) => {
                warn!("Ignoring unparsable volume {:?} in dconf: {}", raw, e);
                None
            }
        }
    }

    fn save_volume(&mut self, level: f32) -> Result<(), SettingsError> {
        let key = Self::key(keys::VOLUME_LEVEL);
        dconf_rs::set_string(&key, &level.to_string()).map_err(|e| SettingsError::Persist {
            key,
            reason: e.to_string(),
        })
    }
}

/// Process-local settings for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryBackend {
    volume: Option<f32>,
}

#[cfg(test)]
impl MemoryBackend {
    pub fn with_volume(level: f32) -> Self {
        Self {
            volume: Some(level),
        }
    }
}

#[cfg(test)]
impl SettingsBackend for MemoryBackend {
    fn load_volume(&self) -> Option<f32> {
        self.volume
    }

    fn save_volume(&mut self, level: f32) -> Result<(), SettingsError> {
        self.volume = Some(level);
        Ok(())
    }
}

/// Volume preference with a latest-value stream for observers
pub struct SettingsStore<B: SettingsBackend> {
    backend: B,
    volume_tx: watch::Sender<VolumeLevel>,
}

impl<B: SettingsBackend> SettingsStore<B> {
    pub fn new(backend: B) -> Self {
        let initial = backend
            .load_volume()
            .map(VolumeLevel::new)
            .unwrap_or_default();
        debug!("Loaded volume preference {}", initial);
        let (volume_tx, _) = watch::channel(initial);
        Self { backend, volume_tx }
    }

    /// Subscribe to volume changes. The receiver starts at the current value.
    pub fn observe_volume(&self) -> watch::Receiver<VolumeLevel> {
        self.volume_tx.subscribe()
    }

    pub fn volume(&self) -> VolumeLevel {
        *self.volume_tx.borrow()
    }

    /// Clamp, persist and publish a new volume
    pub fn set_volume(&mut self, level: f32) -> Result<VolumeLevel, SettingsError> {
        let level = VolumeLevel::new(level);
        if let Err(e) = self.backend.save_volume(level.get()) {
            error!("{}", e);
            return Err(e);
        }
        self.volume_tx.send_replace(level);
        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    impl SettingsBackend for FailingBackend {
        fn load_volume(&self) -> Option<f32> {
            None
        }

        fn save_volume(&mut self, _level: f32) -> Result<(), SettingsError> {
            Err(SettingsError::Persist {
                key: keys::VOLUME_LEVEL.to_string(),
                reason: "read-only".to_string(),
            })
        }
    }

    #[test]
    fn test_default_volume_when_unset() {
        let store = SettingsStore::new(MemoryBackend::default());
        assert_eq!(store.volume(), VolumeLevel::DEFAULT);
        assert_eq!(store.volume().get(), 0.5);
    }

    #[test]
    fn test_loaded_volume_is_clamped() {
        let store = SettingsStore::new(MemoryBackend::with_volume(3.0));
        assert_eq!(store.volume().get(), 1.0);
    }

    #[test]
    fn test_new_subscriber_sees_latest_value() {
        let mut store = SettingsStore::new(MemoryBackend::default());
        store.set_volume(0.8).unwrap();
        store.set_volume(0.3).unwrap();

        let rx = store.observe_volume();
        assert_eq!(rx.borrow().get(), 0.3);
    }

    #[test]
    fn test_existing_subscriber_is_notified() {
        let mut store = SettingsStore::new(MemoryBackend::default());
        let mut rx = store.observe_volume();
        assert!(!rx.has_changed().unwrap());

        let applied = store.set_volume(-1.0).unwrap();
        assert_eq!(applied, VolumeLevel::MUTED);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().get(), 0.0);
    }

    #[test]
    fn test_failed_persist_does_not_publish() {
        let mut store = SettingsStore::new(FailingBackend);
        let rx = store.observe_volume();
        assert!(store.set_volume(0.9).is_err());
        assert_eq!(*rx.borrow(), VolumeLevel::DEFAULT);
        assert!(!rx.has_changed().unwrap());
    }
}
