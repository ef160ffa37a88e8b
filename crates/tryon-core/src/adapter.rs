//! Capability traits over the external generator and evaluator models.
//!
//! Both models are volatile, large external systems; the controller only
//! ever sees these traits, so it stays testable with deterministic fakes.
//! Neither adapter retries; all retry policy lives in the controller.

use async_trait::async_trait;
use image::DynamicImage;

use crate::constraint::Constraint;
use crate::error::{EvaluationFailure, GenerationFailure};
use crate::verdict::Verdict;

/// The image-editing model producing candidate try-on images.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce one candidate image of `person` wearing `cloth`, steered by
    /// a natural-language instruction.
    async fn generate(
        &self,
        person: &DynamicImage,
        cloth: &DynamicImage,
        instruction: &str,
    ) -> Result<DynamicImage, GenerationFailure>;
}

/// The vision model judging candidates against the constraint checklist.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Judge `candidate` against every constraint, returning a structured
    /// verdict with free-text feedback for the next revision.
    async fn evaluate(
        &self,
        person: &DynamicImage,
        cloth: &DynamicImage,
        candidate: &DynamicImage,
        constraints: &[Constraint],
    ) -> Result<Verdict, EvaluationFailure>;
}
