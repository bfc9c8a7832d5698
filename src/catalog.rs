//! JSON-based catalog of captured media
//!
//! Stores media metadata in a JSON file at ~/.local/share/mediabox/catalog.json

use crate::error::CatalogError;
use crate::models::{MediaItem, MediaType, NewMediaItem, RecordId};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Catalog of audio, image and video records
pub struct MediaCatalog {
    path: PathBuf,
    items: Vec<MediaItem>,
}

impl MediaCatalog {
    /// Open a catalog file. A missing file is an empty catalog.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();

        let items = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            info!("No catalog at {:?}, starting empty", path);
            Vec::new()
        };

        Ok(Self { path, items })
    }

    /// Get the default catalog path
    pub fn default_path() -> PathBuf {
        crate::data_dir().join("catalog.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.items)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn next_id(&self) -> RecordId {
        self.items.iter().map(|item| item.id).max().unwrap_or(0) + 1
    }

    /// Add a record and persist the catalog
    pub fn append(&mut self, item: NewMediaItem) -> Result<RecordId, CatalogError> {
        let id = self.next_id();
        let item = item.into_item(id);
        debug!("Cataloging {} {:?} as #{}", item.media_type, item.uri, id);
        self.items.push(item);

        if let Err(e) = self.save() {
            self.items.pop();
            return Err(e);
        }
        Ok(id)
    }

    /// Records of one kind, newest first
    pub fn query_by_type(&self, media_type: MediaType) -> Vec<MediaItem> {
        let mut matches: Vec<MediaItem> = self
            .items
            .iter()
            .filter(|item| item.media_type == media_type)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        matches
    }

    /// All records, newest first
    pub fn all(&self) -> Vec<MediaItem> {
        let mut items = self.items.clone();
        items.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        items
    }

    pub fn get(&self, id: RecordId) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Remove a record. Returns false when no record has that id.
    pub fn delete(&mut self, id: RecordId) -> Result<bool, CatalogError> {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return Ok(false);
        };
        let removed = self.items.remove(index);

        if let Err(e) = self.save() {
            self.items.insert(index, removed);
            return Err(e);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn catalog_in(dir: &tempfile::TempDir) -> MediaCatalog {
        let path = dir.path().join("nested").join("catalog.json");
        MediaCatalog::open(path).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(&dir);
        assert!(catalog.all().is_empty());
        assert!(!catalog.path().exists());
    }

    #[test]
    fn test_append_assigns_sequential_ids_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog_in(&dir);

        let first = catalog
            .append(
                NewMediaItem::new("/tmp/a.wav", "Audio A", MediaType::Audio)
                    .with_duration_ms(1500),
            )
            .unwrap();
        let second = catalog
            .append(NewMediaItem::new("/tmp/b.jpg", "Image B", MediaType::Image))
            .unwrap();
        assert_eq!((first, second), (1, 2));

        let reopened = MediaCatalog::open(catalog.path()).unwrap();
        assert_eq!(reopened.all().len(), 2);
        let audio = reopened.get(1).unwrap();
        assert_eq!(audio.uri, "/tmp/a.wav");
        assert_eq!(audio.duration_ms, 1500);
    }

    #[test]
    fn test_query_by_type_filters_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog_in(&dir);
        let now = Utc::now();

        catalog
            .append(
                NewMediaItem::new("old.mp4", "Old", MediaType::Video)
                    .with_date(now - Duration::days(1)),
            )
            .unwrap();
        catalog
            .append(
                NewMediaItem::new("a.wav", "Audio", MediaType::Audio)
                    .with_date(now),
            )
            .unwrap();
        catalog
            .append(
                NewMediaItem::new("new.mp4", "New", MediaType::Video)
                    .with_date(now),
            )
            .unwrap();

        let videos: Vec<String> = catalog
            .query_by_type(MediaType::Video)
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(videos, vec!["New", "Old"]);
        assert!(catalog.query_by_type(MediaType::Image).is_empty());

        // A second query sees the same records
        assert_eq!(catalog.query_by_type(MediaType::Video).len(), 2);
    }

    #[test]
    fn test_delete_removes_and_does_not_reuse_lower_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog_in(&dir);
        catalog
            .append(NewMediaItem::new("a.wav", "A", MediaType::Audio))
            .unwrap();
        catalog
            .append(NewMediaItem::new("b.wav", "B", MediaType::Audio))
            .unwrap();

        assert!(catalog.delete(1).unwrap());
        assert!(!catalog.delete(1).unwrap());
        assert!(catalog.get(1).is_none());

        let id = catalog
            .append(NewMediaItem::new("c.wav", "C", MediaType::Audio))
            .unwrap();
        assert_eq!(id, 3);

        let reopened = MediaCatalog::open(catalog.path()).unwrap();
        assert_eq!(reopened.all().len(), 2);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(MediaCatalog::open(&path), Err(CatalogError::Format(_))));
    }
}
