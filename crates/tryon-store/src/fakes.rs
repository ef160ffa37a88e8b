//! In-memory fake for the blob store trait (testing only)
//!
//! Provides `MemoryBlobStore`, which satisfies the `BlobStore` contract
//! without touching disk or network.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::blob::{is_image_key, BlobStore, ObjectKey};
use crate::error::{StoreError, StoreResult};

/// In-memory blob store backed by a `BTreeMap<key, bytes>`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `(key, bytes)` pairs, panicking on bad keys.
    pub fn seeded<I, K, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, B)>,
        K: Into<String>,
        B: Into<Vec<u8>>,
    {
        let store = Self::new();
        {
            let mut blobs = store.blobs.lock().unwrap();
            for (key, bytes) in entries {
                blobs.insert(key.into(), bytes.into());
            }
        }
        store
    }

    /// Keys currently present, in key order.
    pub fn keys(&self) -> Vec<String> {
        self.blobs.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectKey>> {
        let prefix = prefix.trim_matches('/');
        let wanted = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        let blobs = self.blobs.lock().unwrap();
        blobs
            .keys()
            .filter(|k| k.starts_with(wanted.as_str()) && is_image_key(k))
            .map(|k| ObjectKey::new(k.clone()))
            .collect()
    }

    async fn fetch(&self, key: &ObjectKey) -> StoreResult<Vec<u8>> {
        let blobs = self.blobs.lock().unwrap();
        blobs
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &ObjectKey, bytes: &[u8]) -> StoreResult<()> {
        let mut blobs = self.blobs.lock().unwrap();
        blobs.insert(key.as_str().to_string(), bytes.to_vec());
        Ok(())
    }
}
