//! Tag index for built images.
//!
//! Maps tag references (e.g. "giftbot:1.0") to image ids. Serialized as JSON
//! for human readability.

use std::collections::BTreeMap;
use std::path::Path;

use capsule_shared::errors::{CapsuleError, CapsuleResult};
use serde::{Deserialize, Serialize};

use crate::runtime::types::ImageId;

const INDEX_VERSION: &str = "1.0";

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// Index of image tags.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ImageIndex {
    /// Schema version for future compatibility
    pub version: String,

    /// Map of tag reference → image id
    pub tags: BTreeMap<String, ImageId>,
}

// ============================================================================
// IMPLEMENTATION
// ============================================================================

impl ImageIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            tags: BTreeMap::new(),
        }
    }

    /// Load index from disk
    ///
    /// Returns an empty index if the file doesn't exist. A corrupted index is
    /// a storage error.
    pub fn load(index_path: &Path) -> CapsuleResult<Self> {
        if !index_path.exists() {
            tracing::debug!("Index file not found, starting with an empty index");
            return Ok(Self::new());
        }

        let contents = std::fs::read_to_string(index_path)
            .map_err(|e| CapsuleError::Storage(format!("failed to read index: {e}")))?;
        let index: Self = serde_json::from_str(&contents).map_err(|e| {
            CapsuleError::Storage(format!(
                "corrupted index {}: {}",
                index_path.display(),
                e
            ))
        })?;

        tracing::debug!("Loaded index with {} tags", index.len());
        Ok(index)
    }

    /// Save index to disk (write-then-rename).
    pub fn save(&self, index_path: &Path) -> CapsuleResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CapsuleError::Storage(format!("failed to serialize index: {e}")))?;

        let tmp_path = index_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| CapsuleError::Storage(format!("failed to write index: {e}")))?;
        std::fs::rename(&tmp_path, index_path)
            .map_err(|e| CapsuleError::Storage(format!("failed to replace index: {e}")))?;

        tracing::debug!("Saved index with {} tags", self.tags.len());
        Ok(())
    }

    /// Image id for a tag reference
    pub fn get(&self, tag: &str) -> Option<&ImageId> {
        self.tags.get(tag)
    }

    /// Point a tag at an image, returning the id it pointed at before
    pub fn set(&mut self, tag: String, id: ImageId) -> Option<ImageId> {
        self.tags.insert(tag, id)
    }

    /// Remove a tag
    pub fn remove(&mut self, tag: &str) -> Option<ImageId> {
        self.tags.remove(tag)
    }

    /// Tags pointing at an image, sorted
    pub fn tags_for(&self, id: &ImageId) -> Vec<String> {
        self.tags
            .iter()
            .filter(|(_, target)| *target == id)
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    /// Remove every tag pointing at an image, returning them
    pub fn remove_image(&mut self, id: &ImageId) -> Vec<String> {
        let removed = self.tags_for(id);
        for tag in &removed {
            self.tags.remove(tag);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for ImageIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(c: char) -> ImageId {
        ImageId::from_hex(&c.to_string().repeat(64)).unwrap()
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = ImageIndex::load(&dir.path().join("index.json")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");

        let mut index = ImageIndex::new();
        index.set("giftbot:1.0".into(), id('a'));
        index.set("giftbot:latest".into(), id('a'));
        index.set("other:latest".into(), id('b'));
        index.save(&path).unwrap();

        let loaded = ImageIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get("other:latest"), Some(&id('b')));
        assert_eq!(
            loaded.tags_for(&id('a')),
            vec!["giftbot:1.0".to_string(), "giftbot:latest".to_string()]
        );
    }

    #[test]
    fn test_retag_and_remove_image() {
        let mut index = ImageIndex::new();
        assert_eq!(index.set("app:latest".into(), id('a')), None);
        assert_eq!(index.set("app:latest".into(), id('b')), Some(id('a')));
        index.set("app:v2".into(), id('b'));

        assert_eq!(index.remove_image(&id('b')).len(), 2);
        assert!(index.is_empty());
    }

    #[test]
    fn test_corrupted_index_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ImageIndex::load(&path).unwrap_err(),
            CapsuleError::Storage(_)
        ));
    }
}
