//! Configuration structs for the pipeline.
//!
//! All knobs are explicit values passed at construction so multiple runs or
//! tests can use different configurations in the same process. Opaque
//! settings (model selection strings, credentials) pass through to the
//! adapters unmodified.

use crate::sample::Cohort;

/// Iteration cap bounding worst-case latency and cost per sample.
pub const DEFAULT_MAX_ITERATIONS: u32 = 4;

/// Neutral instruction used on attempt 1 and after adapter failures.
pub const DEFAULT_INSTRUCTION: &str = "Make the person in the first image wear the garment from the second image. High quality, photorealistic, no unintended changes.";

/// Feedback loop knobs.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum generate+evaluate cycles per pair.
    pub max_iterations: u32,

    /// Instruction for the first attempt, and the fallback after a
    /// generation or evaluation failure.
    pub default_instruction: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            default_instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }
}

/// Sample source knobs.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Cohort prefixes to walk, in order.
    pub cohorts: Vec<Cohort>,

    /// Sub-prefix holding person images within a cohort.
    pub person_prefix: String,

    /// Sub-prefix holding cloth images within a cohort.
    pub cloth_prefix: String,

    /// Maximum pairs yielded per run.
    pub batch_limit: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            cohorts: vec![Cohort::Males, Cohort::Females],
            person_prefix: "person".to_string(),
            cloth_prefix: "cloth".to_string(),
            batch_limit: 100,
        }
    }
}

/// Result sink knobs.
#[derive(Debug, Clone, Default)]
pub struct SinkConfig {
    /// Key prefix prepended to every output bucket (empty = store root).
    pub prefix: String,
}
