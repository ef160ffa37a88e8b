//! Instruction revision strategies.

use crate::verdict::Verdict;

/// Composes the next generation instruction from the failure feedback.
///
/// Deterministic text composition, never a model call: the loop stays at
/// exactly two external-model calls per attempt. Pluggable so smarter
/// strategies can be substituted without touching the controller.
pub trait ReviseInstruction: Send + Sync {
    fn revise(&self, previous: &str, verdict: &Verdict) -> String;
}

/// Default strategy.
///
/// Prefers the instruction the evaluator itself proposed. Otherwise builds
/// on the default instruction (not the previous one, so a bad prompt does
/// not compound across retries) and appends a corrective clause for the
/// leading failed constraint plus the evaluator's feedback.
pub struct FeedbackRevision {
    default_instruction: String,
}

impl FeedbackRevision {
    pub fn new(default_instruction: impl Into<String>) -> Self {
        Self {
            default_instruction: default_instruction.into(),
        }
    }
}

impl ReviseInstruction for FeedbackRevision {
    fn revise(&self, _previous: &str, verdict: &Verdict) -> String {
        if let Some(improved) = &verdict.improved_instruction {
            return improved.clone();
        }

        let base = self.default_instruction.trim_end_matches('.');
        let mut next = match verdict.leading_failure() {
            Some(constraint) => format!("{}. In particular, {}.", base, constraint.correction()),
            None => format!("{base}."),
        };
        let feedback = verdict.feedback.trim();
        if !feedback.is_empty() {
            next.push_str(&format!(" Previous attempt failed because: {feedback}"));
        }
        next
    }
}
