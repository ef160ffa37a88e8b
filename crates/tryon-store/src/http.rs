//! HTTP-backed blob store.
//!
//! Speaks to a remote object host exposing plain HTTP access to a bucket
//! (presigned-URL style, credentials handled outside this crate):
//!
//! - `GET  {base}/manifest.txt`: newline-delimited listing of every key
//! - `GET  {base}/{key}`: blob bytes
//! - `PUT  {base}/{key}`: blob upload

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::blob::{is_image_key, BlobStore, ObjectKey};
use crate::error::{StoreError, StoreResult};

const MANIFEST_KEY: &str = "manifest.txt";

/// Blob store backed by a remote HTTP object host.
pub struct HttpBlobStore {
    base_url: String,
    client: Client,
}

impl HttpBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Use a preconfigured client (timeouts, proxies).
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectKey>> {
        let url = self.url_for(MANIFEST_KEY);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Http {
                status: response.status().as_u16(),
                key: MANIFEST_KEY.to_string(),
            });
        }
        let body = response.text().await?;

        let prefix = prefix.trim_matches('/');
        let wanted = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };

        let mut keys = Vec::new();
        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() || !line.starts_with(wanted.as_str()) || !is_image_key(line) {
                continue;
            }
            keys.push(ObjectKey::new(line)?);
        }
        debug!(prefix, count = keys.len(), "listed remote keys");
        Ok(keys)
    }

    async fn fetch(&self, key: &ObjectKey) -> StoreResult<Vec<u8>> {
        let response = self.client.get(self.url_for(key.as_str())).send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            reqwest::StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            status => Err(StoreError::Http {
                status: status.as_u16(),
                key: key.to_string(),
            }),
        }
    }

    async fn put(&self, key: &ObjectKey, bytes: &[u8]) -> StoreResult<()> {
        let response = self
            .client
            .put(self.url_for(key.as_str()))
            .body(bytes.to_vec())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Http {
                status: response.status().as_u16(),
                key: key.to_string(),
            });
        }
        Ok(())
    }
}
