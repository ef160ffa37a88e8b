//! Structured verdicts and parsing of evaluator model output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constraint::Constraint;
use crate::error::EvaluationFailure;

/// Result of one constraint check on one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintCheck {
    pub constraint: Constraint,
    pub passed: bool,
}

/// Structured judgement of one candidate image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// One check per constraint, in hierarchical order.
    pub checks: Vec<ConstraintCheck>,

    /// Free-text diagnosis from the evaluator, drives instruction revision.
    pub feedback: String,

    /// Evaluator-suggested replacement instruction, if it offered one.
    pub improved_instruction: Option<String>,
}

impl Verdict {
    /// Whether every constraint passed. Partial passes never accept.
    pub fn overall_pass(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// First failed constraint in hierarchical order, if any.
    pub fn leading_failure(&self) -> Option<Constraint> {
        self.checks.iter().find(|c| !c.passed).map(|c| c.constraint)
    }

    /// Build an all-pass or all-fail verdict (test and fake helper).
    pub fn uniform(passed: bool, feedback: impl Into<String>) -> Self {
        Verdict {
            checks: Constraint::ALL
                .iter()
                .map(|&constraint| ConstraintCheck { constraint, passed })
                .collect(),
            feedback: feedback.into(),
            improved_instruction: None,
        }
    }

    /// Parse raw evaluator model text into a verdict.
    ///
    /// Models frequently wrap the JSON in prose or a fenced code block, so
    /// parsing runs a salvage ladder: the whole response as JSON, then the
    /// first fenced block, then the outermost `{`..`}` substring. The JSON
    /// must carry a boolean for every constraint under `"checks"` and a
    /// `"feedback"` string; anything less is an [`EvaluationFailure`].
    pub fn parse(text: &str) -> Result<Verdict, EvaluationFailure> {
        let value = extract_json(text).ok_or_else(|| unparsable(text))?;
        let checks_obj = value
            .get("checks")
            .and_then(Value::as_object)
            .ok_or_else(|| unparsable(text))?;

        let mut checks = Vec::with_capacity(Constraint::ALL.len());
        for constraint in Constraint::ALL {
            let passed = checks_obj
                .get(constraint.as_str())
                .and_then(Value::as_bool)
                .ok_or_else(|| unparsable(text))?;
            checks.push(ConstraintCheck { constraint, passed });
        }

        let feedback = value
            .get("feedback")
            .and_then(Value::as_str)
            .ok_or_else(|| unparsable(text))?
            .to_string();

        let improved_instruction = value
            .get("improved_instruction")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        Ok(Verdict {
            checks,
            feedback,
            improved_instruction,
        })
    }
}

fn unparsable(text: &str) -> EvaluationFailure {
    let mut sample: String = text.chars().take(200).collect();
    if sample.len() < text.len() {
        sample.push('…');
    }
    EvaluationFailure::Unparsable(sample)
}

/// Salvage ladder: direct parse, fenced code block, brace substring.
fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
    } else {
        None
    }
}

/// Contents of the first ``` fenced block, tolerating a `json` language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body = after_fence
        .strip_prefix("json")
        .unwrap_or(after_fence)
        .trim_start_matches(['\r', '\n']);
    let close = body.find("```")?;
    Some(&body[..close])
}
