//! Filesystem-backed blob store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::blob::{is_image_key, BlobStore, ObjectKey};
use crate::error::{StoreError, StoreResult};

/// Blob store rooted at a local directory.
///
/// Keys map directly onto relative paths under the root.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn blob_path(&self, key: &ObjectKey) -> PathBuf {
        let mut path = self.root.clone();
        for seg in key.as_str().split('/') {
            path.push(seg);
        }
        path
    }

    fn walk(&self, dir: &Path, rel: &str, out: &mut Vec<ObjectKey>) -> StoreResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let child_rel = if rel.is_empty() {
                name.to_string()
            } else {
                format!("{rel}/{name}")
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.walk(&entry.path(), &child_rel, out)?;
            } else if is_image_key(&child_rel) {
                out.push(ObjectKey::new(child_rel)?);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectKey>> {
        let mut dir = self.root.clone();
        let prefix = prefix.trim_matches('/');
        for seg in prefix.split('/').filter(|s| !s.is_empty()) {
            dir.push(seg);
        }
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        self.walk(&dir, prefix, &mut keys)?;
        Ok(keys)
    }

    async fn fetch(&self, key: &ObjectKey) -> StoreResult<Vec<u8>> {
        let path = self.blob_path(key);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StoreError::Io(e)
            }
        })
    }

    async fn put(&self, key: &ObjectKey, bytes: &[u8]) -> StoreResult<()> {
        let path = self.blob_path(key);
        let parent = path.parent().ok_or_else(|| StoreError::InvalidKey {
            key: key.to_string(),
        })?;
        fs::create_dir_all(parent)?;

        // Atomic write: temp file in the target directory, then rename.
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_fetch_roundtrip() {
        let (_dir, store) = make_store();
        let key = ObjectKey::new("males/person/1.png").unwrap();
        store.put(&key, b"pngbytes").await.unwrap();
        assert_eq!(store.fetch(&key).await.unwrap(), b"pngbytes");
    }

    #[tokio::test]
    async fn fetch_missing_is_not_found() {
        let (_dir, store) = make_store();
        let key = ObjectKey::new("nope.png").unwrap();
        match store.fetch(&key).await {
            Err(StoreError::NotFound { key }) => assert_eq!(key, "nope.png"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_filters_non_images() {
        let (_dir, store) = make_store();
        for name in ["males/person/1.png", "males/person/2.jpg"] {
            store
                .put(&ObjectKey::new(name).unwrap(), b"x")
                .await
                .unwrap();
        }
        // Non-image payload dropped from listings.
        std::fs::write(
            store.blob_path(&ObjectKey::new("males/person/notes.txt").unwrap()),
            b"text",
        )
        .unwrap();

        let mut keys: Vec<String> = store
            .list("males")
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["males/person/1.png", "males/person/2.jpg"]);
    }

    #[tokio::test]
    async fn list_missing_prefix_is_empty() {
        let (_dir, store) = make_store();
        assert!(store.list("females").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_overwrites_whole_blob() {
        let (_dir, store) = make_store();
        let key = ObjectKey::new("out/correct_try_on/males/1.png").unwrap();
        store.put(&key, b"first").await.unwrap();
        store.put(&key, b"second").await.unwrap();
        assert_eq!(store.fetch(&key).await.unwrap(), b"second");
    }
}
