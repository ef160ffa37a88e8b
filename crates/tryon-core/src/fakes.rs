//! Deterministic fakes for the model adapters (testing only)
//!
//! `ScriptedGenerator` and `ScriptedEvaluator` replay a fixed sequence of
//! outcomes, so loop tests can express "fail twice, then pass" without any
//! model nondeterminism.

use std::sync::Mutex;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};

use crate::adapter::{Evaluator, Generator};
use crate::constraint::Constraint;
use crate::error::{EvaluationFailure, GenerationFailure};
use crate::verdict::Verdict;

/// A tiny valid in-memory image for tests and fakes.
pub fn tiny_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([128, 64, 32])))
}

/// PNG-encoded bytes of [`tiny_image`], for seeding fake blob stores.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    tiny_image()
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )
        .expect("encoding a tiny PNG never fails");
    bytes
}

/// One scripted generator outcome.
pub enum GenStep {
    Image,
    Fail(GenerationFailure),
}

/// Generator that replays a fixed outcome sequence, then keeps succeeding.
///
/// Records every instruction it was called with, so tests can assert on the
/// revision chain.
pub struct ScriptedGenerator {
    steps: Mutex<Vec<GenStep>>,
    pub instructions: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(steps: Vec<GenStep>) -> Self {
        Self {
            steps: Mutex::new(steps),
            instructions: Mutex::new(Vec::new()),
        }
    }

    /// A generator that always succeeds.
    pub fn always_ok() -> Self {
        Self::new(Vec::new())
    }

    pub fn seen_instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        _person: &DynamicImage,
        _cloth: &DynamicImage,
        instruction: &str,
    ) -> Result<DynamicImage, GenerationFailure> {
        self.instructions
            .lock()
            .unwrap()
            .push(instruction.to_string());
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.is_empty() {
                GenStep::Image
            } else {
                steps.remove(0)
            }
        };
        match step {
            GenStep::Image => Ok(tiny_image()),
            GenStep::Fail(failure) => Err(failure),
        }
    }
}

/// One scripted evaluator outcome.
pub enum EvalStep {
    Verdict(Verdict),
    Fail(EvaluationFailure),
}

/// Evaluator that replays a fixed outcome sequence, then keeps passing.
pub struct ScriptedEvaluator {
    steps: Mutex<Vec<EvalStep>>,
    pub calls: Mutex<u32>,
}

impl ScriptedEvaluator {
    pub fn new(steps: Vec<EvalStep>) -> Self {
        Self {
            steps: Mutex::new(steps),
            calls: Mutex::new(0),
        }
    }

    /// An evaluator that passes every attempt.
    pub fn always_pass() -> Self {
        Self::new(Vec::new())
    }

    /// An evaluator that fails every attempt with the same feedback.
    pub fn always_fail(feedback: &str) -> Self {
        let steps = (0..16)
            .map(|_| EvalStep::Verdict(Verdict::uniform(false, feedback)))
            .collect();
        Self::new(steps)
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        _person: &DynamicImage,
        _cloth: &DynamicImage,
        _candidate: &DynamicImage,
        _constraints: &[Constraint],
    ) -> Result<Verdict, EvaluationFailure> {
        *self.calls.lock().unwrap() += 1;
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.is_empty() {
                EvalStep::Verdict(Verdict::uniform(true, "all constraints satisfied"))
            } else {
                steps.remove(0)
            }
        };
        match step {
            EvalStep::Verdict(verdict) => Ok(verdict),
            EvalStep::Fail(failure) => Err(failure),
        }
    }
}
