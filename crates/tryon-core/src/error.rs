//! Error taxonomy for the feedback loop.
//!
//! Adapter failures are recoverable per attempt, sample failures are
//! recoverable per pair, sink failures are recoverable per pair but audited;
//! only an unreachable backing store aborts a run.

use thiserror::Error;
use tryon_store::StoreError;

/// External generator call raised or returned an undecodable image.
///
/// Consumes one attempt slot; the next attempt falls back to the default
/// instruction.
#[derive(Error, Debug)]
pub enum GenerationFailure {
    /// The model backend raised.
    #[error("generator backend failed: {0}")]
    Backend(String),

    /// The backend answered but the payload is not a decodable image.
    #[error("generator returned an undecodable image: {0}")]
    Undecodable(String),
}

/// External evaluator call raised or returned an unparsable verdict.
///
/// Treated as a failed verdict (triggers a retry) but tagged separately in
/// run statistics so malformed responses are distinguishable from genuine
/// quality failures.
#[derive(Error, Debug)]
pub enum EvaluationFailure {
    /// The model backend raised.
    #[error("evaluator backend failed: {0}")]
    Backend(String),

    /// The response text could not be parsed into a structured verdict.
    #[error("evaluator response was not a structured verdict: {0}")]
    Unparsable(String),
}

/// An input pair could not be fetched or decoded.
///
/// The sample source skips the pair and logs it; it never reaches the
/// controller.
#[derive(Error, Debug)]
pub enum SampleLoadFailure {
    #[error("failed to fetch {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: image::ImageError,
    },
}

/// The result sink could not persist an outcome.
///
/// Fatal for the pair only; the batch continues and the pair is counted as
/// unrecorded.
#[derive(Error, Debug)]
pub enum SinkWriteFailure {
    #[error("failed to encode candidate image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to serialize attempt metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The sample source could not enumerate the backing store at all.
///
/// Surfaced before any pair is processed; aborts the run.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
