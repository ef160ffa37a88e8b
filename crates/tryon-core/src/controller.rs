//! The feedback loop controller: generate → evaluate → (retry | accept).

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::adapter::{Evaluator, Generator};
use crate::config::LoopConfig;
use crate::constraint::Constraint;
use crate::revise::ReviseInstruction;
use crate::sample::SamplePair;
use crate::verdict::Verdict;

/// Controller state, per pair.
///
/// `Retrying` loops back to `Generating` with a revised instruction;
/// `Accepted` and `Exhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Start,
    Generating,
    Evaluating,
    Retrying,
    Accepted,
    Exhausted,
}

/// Why an attempt ended without an interpretable verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// Generator raised or produced an undecodable image.
    Generation(String),
    /// Evaluator raised or returned an unparsable response.
    Evaluation(String),
}

/// One generate+evaluate cycle. Never mutated after evaluation completes.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// 1-based iteration index.
    pub index: u32,

    /// Instruction the generator was given for this attempt.
    pub instruction: String,

    /// Candidate image, absent when generation failed.
    pub image: Option<DynamicImage>,

    /// Structured verdict, absent on adapter failures.
    pub verdict: Option<Verdict>,

    /// Adapter failure that consumed this attempt, if any.
    pub failure: Option<AttemptFailure>,

    /// Wall-clock time spent in the generate call.
    pub generation_time: Duration,

    /// Wall-clock time spent in the evaluate call (zero if never reached).
    pub evaluation_time: Duration,
}

impl Attempt {
    /// Whether this attempt's verdict passed every constraint.
    pub fn passed(&self) -> bool {
        self.verdict
            .as_ref()
            .map(Verdict::overall_pass)
            .unwrap_or(false)
    }
}

/// Terminal record for one pair.
#[derive(Debug)]
pub enum LoopResult {
    /// Some attempt passed every constraint. The winning attempt is last;
    /// earlier entries are the failed attempts that preceded it.
    Accepted { attempts: Vec<Attempt> },

    /// The iteration cap was reached with no pass. Every attempt is
    /// retained for failure-mode analysis.
    Exhausted { attempts: Vec<Attempt> },
}

impl LoopResult {
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            LoopResult::Accepted { attempts } | LoopResult::Exhausted { attempts } => attempts,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, LoopResult::Accepted { .. })
    }

    /// The attempt that passed, for accepted results.
    pub fn winning_attempt(&self) -> Option<&Attempt> {
        match self {
            LoopResult::Accepted { attempts } => attempts.last(),
            LoopResult::Exhausted { .. } => None,
        }
    }
}

/// Drives the bounded generate/evaluate/retry cycle for one pair at a time.
pub struct FeedbackLoop {
    generator: Arc<dyn Generator>,
    evaluator: Arc<dyn Evaluator>,
    revise: Box<dyn ReviseInstruction>,
    config: LoopConfig,
}

impl FeedbackLoop {
    pub fn new(
        generator: Arc<dyn Generator>,
        evaluator: Arc<dyn Evaluator>,
        revise: Box<dyn ReviseInstruction>,
        config: LoopConfig,
    ) -> Self {
        Self {
            generator,
            evaluator,
            revise,
            config,
        }
    }

    /// Run the loop for one pair.
    ///
    /// Adapter failures consume an attempt slot but never abort the pair;
    /// only a fully-passing verdict or the iteration cap terminates it.
    /// Generate and evaluate are bracketed separately with wall-clock
    /// timers; input download time never lands here.
    pub async fn run_pair(&self, pair: &SamplePair) -> LoopResult {
        let mut instruction = self.config.default_instruction.clone();
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut state = LoopState::Start;

        info!(pair = %pair.key, cohort = %pair.cohort, ?state, "starting feedback loop");

        for index in 1..=self.config.max_iterations {
            state = LoopState::Generating;
            debug!(pair = %pair.key, attempt = index, ?state, "generating candidate");

            let generation_start = Instant::now();
            let candidate = self
                .generator
                .generate(&pair.person.image, &pair.cloth.image, &instruction)
                .await;
            let generation_time = generation_start.elapsed();

            let candidate = match candidate {
                Ok(image) => image,
                Err(failure) => {
                    warn!(pair = %pair.key, attempt = index, %failure, "generation failed");
                    attempts.push(Attempt {
                        index,
                        instruction: instruction.clone(),
                        image: None,
                        verdict: None,
                        failure: Some(AttemptFailure::Generation(failure.to_string())),
                        generation_time,
                        evaluation_time: Duration::ZERO,
                    });
                    // Do not re-use the failing instruction blindly.
                    instruction = self.config.default_instruction.clone();
                    continue;
                }
            };

            state = LoopState::Evaluating;
            debug!(pair = %pair.key, attempt = index, ?state, "evaluating candidate");

            let evaluation_start = Instant::now();
            let verdict = self
                .evaluator
                .evaluate(
                    &pair.person.image,
                    &pair.cloth.image,
                    &candidate,
                    &Constraint::ALL,
                )
                .await;
            let evaluation_time = evaluation_start.elapsed();

            match verdict {
                Ok(verdict) => {
                    let accepted = verdict.overall_pass();
                    let next_instruction = if accepted {
                        None
                    } else {
                        Some(self.revise.revise(&instruction, &verdict))
                    };

                    attempts.push(Attempt {
                        index,
                        instruction: instruction.clone(),
                        image: Some(candidate),
                        verdict: Some(verdict),
                        failure: None,
                        generation_time,
                        evaluation_time,
                    });

                    if accepted {
                        state = LoopState::Accepted;
                        info!(pair = %pair.key, attempt = index, ?state, "try-on accepted");
                        return LoopResult::Accepted { attempts };
                    }

                    state = LoopState::Retrying;
                    instruction = next_instruction.unwrap_or_else(|| {
                        self.config.default_instruction.clone()
                    });
                    debug!(pair = %pair.key, attempt = index, ?state, "retrying with revised instruction");
                }
                Err(failure) => {
                    warn!(pair = %pair.key, attempt = index, %failure, "evaluation failed");
                    attempts.push(Attempt {
                        index,
                        instruction: instruction.clone(),
                        image: Some(candidate),
                        verdict: None,
                        failure: Some(AttemptFailure::Evaluation(failure.to_string())),
                        generation_time,
                        evaluation_time,
                    });
                    // No feedback to revise from.
                    instruction = self.config.default_instruction.clone();
                    state = LoopState::Retrying;
                    debug!(pair = %pair.key, attempt = index, ?state, "retrying after evaluation failure");
                }
            }
        }

        state = LoopState::Exhausted;
        info!(pair = %pair.key, attempts = attempts.len(), ?state, "iteration cap reached");
        LoopResult::Exhausted { attempts }
    }
}
