//! Error types for tryon-store

use thiserror::Error;

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the blob storage layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Object does not exist in the backing store
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Key is empty, absolute, or escapes the store root
    #[error("invalid object key: {key}")]
    InvalidKey { key: String },

    /// Remote store answered with an unexpected status
    #[error("unexpected HTTP status {status} for {key}")]
    Http { status: u16, key: String },

    /// Transport-level failure talking to a remote store
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local filesystem failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
