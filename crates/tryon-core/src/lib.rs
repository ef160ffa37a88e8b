//! Tryon-Core: closed-loop virtual try-on dataset generation
//!
//! The core of the pipeline is a bounded feedback loop per input pair:
//! generate a candidate try-on image with an external image-editing model,
//! judge it with an external vision evaluator against a fixed constraint
//! checklist, revise the instruction from the failure feedback, and retry up
//! to an iteration cap. Accepted candidates land in the `correct_try_on`
//! bucket; exhausted pairs keep their full per-attempt history in
//! `incorrect_try_on_{n}` buckets for failure-mode analysis.
//!
//! ## Key Components
//!
//! - [`SampleSource`]: deterministic walker over paired person/cloth blobs
//! - [`Generator`] / [`Evaluator`]: capability traits over the external models
//! - [`FeedbackLoop`]: the generate → evaluate → (retry | accept) state machine
//! - [`ResultSink`]: outcome-bucketed persistence with provenance metadata
//! - [`RunStatistics`]: batch-level yield and latency accounting

pub mod adapter;
pub mod config;
mod constraint;
mod controller;
pub mod error;
pub mod fakes;
pub mod http_adapter;
mod obs;
mod revise;
mod runner;
mod sample;
mod sink;
mod stats;
mod verdict;

pub use config::{LoopConfig, SinkConfig, SourceConfig, DEFAULT_INSTRUCTION, DEFAULT_MAX_ITERATIONS};
pub use constraint::Constraint;
pub use controller::{Attempt, AttemptFailure, FeedbackLoop, LoopResult, LoopState};
pub use error::{EvaluationFailure, GenerationFailure, SampleLoadFailure, SinkWriteFailure, SourceError};
pub use obs::init_tracing;
pub use revise::{FeedbackRevision, ReviseInstruction};
pub use runner::{BatchRunner, CancellationFlag};
pub use sample::{Cohort, ImageRef, PairKey, PairListing, SampleBatch, SamplePair, SampleSource};
pub use sink::{AttemptRecord, RecordedOutcome, ResultSink, CORRECT_BUCKET};
pub use stats::{LatencyStats, RunStatistics, RunSummary};
pub use verdict::{ConstraintCheck, Verdict};

pub use adapter::{Evaluator, Generator};
