//! Blob store trait and key type.
//!
//! The store is a flat key-value namespace. Keys use `/` separators
//! regardless of backend (e.g. `males/person/12.png`). Input traversal is
//! read-only; output writes must land atomically per key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Image extensions the pipeline recognizes when listing a prefix.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Whether a key carries one of the recognized image extensions.
pub fn is_image_key(key: &str) -> bool {
    key.rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Key of one blob in the store.
///
/// The inner field is private so a key is always non-empty, relative, and
/// free of `.` / `..` segments once constructed via [`ObjectKey::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Validate and wrap a raw key string.
    pub fn new(key: impl Into<String>) -> StoreResult<Self> {
        let key = key.into();
        let valid = !key.is_empty()
            && !key.starts_with('/')
            && !key.ends_with('/')
            && key.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..");
        if !valid {
            return Err(StoreError::InvalidKey { key });
        }
        Ok(ObjectKey(key))
    }

    /// Full key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment (`males/person/12.png` → `12.png`).
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Name without its extension (`12.png` → `12`).
    pub fn stem(&self) -> &str {
        let name = self.name();
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    }

    /// Extension, lowercased at the call site if needed.
    pub fn extension(&self) -> Option<&str> {
        self.name().rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flat blob namespace over some backing store.
///
/// Guarantees:
/// - `list(prefix)` returns every image blob under `prefix`, and re-listing
///   an unchanged store yields the same key set.
/// - `fetch` returns the exact bytes previously stored under the key.
/// - `put` replaces the whole blob; partially-written blobs are never
///   observable by a subsequent `fetch`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List image object keys under a prefix (recursive).
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectKey>>;

    /// Retrieve blob bytes. Returns `StoreError::NotFound` if absent.
    async fn fetch(&self, key: &ObjectKey) -> StoreResult<Vec<u8>>;

    /// Store blob bytes under a key, creating intermediate namespace levels.
    async fn put(&self, key: &ObjectKey, bytes: &[u8]) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_accessors() {
        let key = ObjectKey::new("males/person/12.png").unwrap();
        assert_eq!(key.name(), "12.png");
        assert_eq!(key.stem(), "12");
        assert_eq!(key.extension(), Some("png"));
    }

    #[test]
    fn key_without_extension() {
        let key = ObjectKey::new("males/person/readme").unwrap();
        assert_eq!(key.stem(), "readme");
        assert_eq!(key.extension(), None);
    }

    #[test]
    fn rejects_malformed_keys() {
        for raw in ["", "/abs.png", "trailing/", "a//b.png", "a/../b.png"] {
            assert!(ObjectKey::new(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn image_extension_filter() {
        assert!(is_image_key("males/person/1.png"));
        assert!(is_image_key("cloth/2.JPEG"));
        assert!(!is_image_key("males/person/manifest.txt"));
        assert!(!is_image_key("noext"));
    }
}
