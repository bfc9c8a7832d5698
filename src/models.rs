use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SessionError;

/// Catalog record identifier, assigned on append starting at 1
pub type RecordId = u64;

/// Kind of captured media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Image,
    Video,
}

impl MediaType {
    pub fn label(&self) -> &'static str {
        match self {
            MediaType::Audio => "audio",
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A media record stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: RecordId,
    pub uri: String,
    pub name: String,
    pub date: DateTime<Utc>,
    /// Duration in milliseconds (0 for images)
    pub duration_ms: u64,
    pub media_type: MediaType,
}

impl MediaItem {
    /// Playable locator for this record
    pub fn reference(&self) -> Result<MediaReference, SessionError> {
        MediaReference::new(self.uri.clone())
    }
}

/// A media record that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaItem {
    pub uri: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub duration_ms: u64,
    pub media_type: MediaType,
}

impl NewMediaItem {
    pub fn new(uri: impl Into<String>, name: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            date: Utc::now(),
            duration_ms: 0,
            media_type,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    pub(crate) fn into_item(self, id: RecordId) -> MediaItem {
        MediaItem {
            id,
            uri: self.uri,
            name: self.name,
            date: self.date,
            duration_ms: self.duration_ms,
            media_type: self.media_type,
        }
    }
}

/// Opaque locator of a playable resource (a file path for local media)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaReference(String);

impl MediaReference {
    /// Blank locators are rejected as unavailable media.
    pub fn new(locator: impl Into<String>) -> Result<Self, SessionError> {
        let locator = locator.into();
        if locator.trim().is_empty() {
            return Err(SessionError::MediaUnavailable(
                "empty media reference".to_string(),
            ));
        }
        Ok(Self(locator))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Playback volume, always within 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct VolumeLevel(f32);

impl VolumeLevel {
    pub const DEFAULT: VolumeLevel = VolumeLevel(0.5);
    pub const MUTED: VolumeLevel = VolumeLevel(0.0);
    pub const FULL: VolumeLevel = VolumeLevel(1.0);

    /// Clamp any input into range. NaN is treated as silence.
    pub fn new(level: f32) -> Self {
        if level.is_nan() {
            return Self::MUTED;
        }
        Self(level.clamp(0.0, 1.0))
    }

    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Default for VolumeLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<f32> for VolumeLevel {
    fn from(level: f32) -> Self {
        Self::new(level)
    }
}

impl fmt::Display for VolumeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_clamps_into_range() {
        assert_eq!(VolumeLevel::new(1.7).get(), 1.0);
        assert_eq!(VolumeLevel::new(-0.2).get(), 0.0);
        assert_eq!(VolumeLevel::new(0.25).get(), 0.25);
        assert_eq!(VolumeLevel::new(f32::NAN).get(), 0.0);
        assert_eq!(VolumeLevel::new(f32::INFINITY).get(), 1.0);
    }

    #[test]
    fn test_blank_reference_is_unavailable() {
        assert!(matches!(
            MediaReference::new("   "),
            Err(SessionError::MediaUnavailable(_))
        ));
        assert_eq!(MediaReference::new("a.wav").unwrap().as_str(), "a.wav");
    }

    #[test]
    fn test_media_type_serializes_lowercase() {
        let json = serde_json::to_string(&MediaType::Video).unwrap();
        assert_eq!(json, "\"video\"");
    }
}
