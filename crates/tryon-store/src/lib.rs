//! Tryon-Store: blob storage for the try-on dataset pipeline
//!
//! This crate provides the storage layer the sample source and result sink
//! sit on top of. It handles listing, fetching and writing image blobs in a
//! flat key namespace, independent of where the blobs actually live.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: read-only input traversal, append-only output writes.
//!
//! ## Key Components
//!
//! - `BlobStore`: async backend-agnostic trait (list/fetch/put)
//! - `FsBlobStore`: local-disk backend
//! - `HttpBlobStore`: remote backend speaking plain HTTP (presigned-URL style)
//! - `MemoryBlobStore`: in-memory fake for tests

mod blob;
mod error;
pub mod fakes;
mod fs;
mod http;

pub use blob::{is_image_key, BlobStore, ObjectKey, IMAGE_EXTENSIONS};
pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use http::HttpBlobStore;
