//! Run-wide statistics: dataset yield and steady-state latency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::controller::{AttemptFailure, LoopResult};

/// Latency distribution over one stage, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub mean_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
}

impl LatencyStats {
    fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self {
                count: 0,
                mean_ms: 0.0,
                p50_ms: 0,
                p95_ms: 0,
            };
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let sum: u64 = sorted.iter().sum();
        Self {
            count: sorted.len(),
            mean_ms: sum as f64 / sorted.len() as f64,
            p50_ms: percentile(&sorted, 50),
            p95_ms: percentile(&sorted, 95),
        }
    }
}

/// Nearest-rank percentile over a sorted slice.
fn percentile(sorted: &[u64], pct: u64) -> u64 {
    let rank = (pct as usize * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

/// Process-wide accumulator, updated after each pair's terminal result.
///
/// Latency is aggregated for the whole run rather than per pair, to
/// characterize steady-state throughput. If pairs are ever processed in
/// parallel, writes here must be serialized by the caller.
#[derive(Debug, Default)]
pub struct RunStatistics {
    pairs_processed: u64,
    accepted: u64,
    exhausted: u64,
    accepted_by_attempt: BTreeMap<u32, u64>,
    exhausted_by_attempt: BTreeMap<u32, u64>,
    generation_failures: u64,
    evaluation_failures: u64,
    decode_skips: u64,
    unrecorded: u64,
    generation_ms: Vec<u64>,
    evaluation_ms: Vec<u64>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one pair's terminal result into the accumulator.
    pub fn observe(&mut self, result: &LoopResult) {
        self.pairs_processed += 1;

        for attempt in result.attempts() {
            self.generation_ms
                .push(attempt.generation_time.as_millis() as u64);
            if attempt.evaluation_time.as_millis() > 0 || attempt.verdict.is_some() {
                self.evaluation_ms
                    .push(attempt.evaluation_time.as_millis() as u64);
            }
            match &attempt.failure {
                Some(AttemptFailure::Generation(_)) => self.generation_failures += 1,
                Some(AttemptFailure::Evaluation(_)) => self.evaluation_failures += 1,
                None => {}
            }
        }

        match result {
            LoopResult::Accepted { attempts } => {
                self.accepted += 1;
                if let Some(winner) = attempts.last() {
                    *self.accepted_by_attempt.entry(winner.index).or_insert(0) += 1;
                }
            }
            LoopResult::Exhausted { attempts } => {
                self.exhausted += 1;
                for attempt in attempts {
                    *self.exhausted_by_attempt.entry(attempt.index).or_insert(0) += 1;
                }
            }
        }
    }

    /// Count a pair skipped by the source before the loop saw it.
    pub fn record_decode_skip(&mut self) {
        self.decode_skips += 1;
    }

    /// Import the source's skip counter wholesale.
    pub fn set_decode_skips(&mut self, skips: u64) {
        self.decode_skips = skips;
    }

    /// Count a pair whose outcome could not be persisted, so dataset
    /// completeness stays auditable.
    pub fn record_unrecorded(&mut self) {
        self.unrecorded += 1;
    }

    /// Aggregate into the end-of-run summary.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            pairs_processed: self.pairs_processed,
            accepted: self.accepted,
            exhausted: self.exhausted,
            accepted_by_attempt: self.accepted_by_attempt.clone(),
            exhausted_by_attempt: self.exhausted_by_attempt.clone(),
            generation_failures: self.generation_failures,
            evaluation_failures: self.evaluation_failures,
            decode_skips: self.decode_skips,
            unrecorded: self.unrecorded,
            generation_latency: LatencyStats::from_samples(&self.generation_ms),
            evaluation_latency: LatencyStats::from_samples(&self.evaluation_ms),
        }
    }
}

/// End-of-run report: enough to judge dataset yield and systematic model
/// failure patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub pairs_processed: u64,
    pub accepted: u64,
    pub exhausted: u64,
    /// Winning attempt index → count, for acceptance distribution analysis.
    pub accepted_by_attempt: BTreeMap<u32, u64>,
    /// Attempt bucket → failed attempts recorded there.
    pub exhausted_by_attempt: BTreeMap<u32, u64>,
    pub generation_failures: u64,
    pub evaluation_failures: u64,
    pub decode_skips: u64,
    pub unrecorded: u64,
    pub generation_latency: LatencyStats,
    pub evaluation_latency: LatencyStats,
}

impl RunSummary {
    /// Render the human-readable report printed at the end of a batch.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("run summary\n");
        out.push_str(&format!("  pairs processed:     {}\n", self.pairs_processed));
        out.push_str(&format!("  accepted:            {}\n", self.accepted));
        out.push_str(&format!("  exhausted:           {}\n", self.exhausted));
        for (index, count) in &self.accepted_by_attempt {
            out.push_str(&format!("    accepted at attempt {index}: {count}\n"));
        }
        for (index, count) in &self.exhausted_by_attempt {
            out.push_str(&format!("    incorrect_try_on_{index}: {count}\n"));
        }
        out.push_str(&format!(
            "  generation failures: {}\n",
            self.generation_failures
        ));
        out.push_str(&format!(
            "  evaluation failures: {}\n",
            self.evaluation_failures
        ));
        out.push_str(&format!("  decode skips:        {}\n", self.decode_skips));
        out.push_str(&format!("  unrecorded:          {}\n", self.unrecorded));
        out.push_str(&format!(
            "  generation latency:  mean {:.0} ms, p50 {} ms, p95 {} ms ({} samples)\n",
            self.generation_latency.mean_ms,
            self.generation_latency.p50_ms,
            self.generation_latency.p95_ms,
            self.generation_latency.count,
        ));
        out.push_str(&format!(
            "  evaluation latency:  mean {:.0} ms, p50 {} ms, p95 {} ms ({} samples)\n",
            self.evaluation_latency.mean_ms,
            self.evaluation_latency.p50_ms,
            self.evaluation_latency.p95_ms,
            self.evaluation_latency.count,
        ));
        out
    }

    /// Emit the summary as a single structured tracing event.
    pub fn emit(&self) {
        tracing::info!(
            pairs_processed = self.pairs_processed,
            accepted = self.accepted,
            exhausted = self.exhausted,
            generation_failures = self.generation_failures,
            evaluation_failures = self.evaluation_failures,
            decode_skips = self.decode_skips,
            unrecorded = self.unrecorded,
            generation_mean_ms = self.generation_latency.mean_ms,
            evaluation_mean_ms = self.evaluation_latency.mean_ms,
            "run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Attempt;
    use crate::fakes::tiny_image;
    use crate::verdict::Verdict;
    use std::time::Duration;

    fn attempt(index: u32, passed: bool) -> Attempt {
        Attempt {
            index,
            instruction: "i".to_string(),
            image: Some(tiny_image()),
            verdict: Some(Verdict::uniform(passed, "")),
            failure: None,
            generation_time: Duration::from_millis(100 * index as u64),
            evaluation_time: Duration::from_millis(10 * index as u64),
        }
    }

    #[test]
    fn accepted_and_exhausted_counts() {
        let mut stats = RunStatistics::new();
        stats.observe(&LoopResult::Accepted {
            attempts: vec![attempt(1, true)],
        });
        stats.observe(&LoopResult::Exhausted {
            attempts: (1..=4).map(|i| attempt(i, false)).collect(),
        });

        let summary = stats.summary();
        assert_eq!(summary.pairs_processed, 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.exhausted, 1);
        assert_eq!(summary.accepted_by_attempt.get(&1), Some(&1));
        assert_eq!(summary.exhausted_by_attempt.len(), 4);
        assert_eq!(summary.exhausted_by_attempt.get(&4), Some(&1));
    }

    #[test]
    fn failure_kinds_are_distinct() {
        let mut stats = RunStatistics::new();
        let gen_failed = Attempt {
            verdict: None,
            image: None,
            failure: Some(AttemptFailure::Generation("oom".to_string())),
            evaluation_time: Duration::ZERO,
            ..attempt(1, false)
        };
        let eval_failed = Attempt {
            verdict: None,
            failure: Some(AttemptFailure::Evaluation("prose".to_string())),
            ..attempt(2, false)
        };
        stats.observe(&LoopResult::Accepted {
            attempts: vec![gen_failed, eval_failed, attempt(3, true)],
        });

        let summary = stats.summary();
        assert_eq!(summary.generation_failures, 1);
        assert_eq!(summary.evaluation_failures, 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.accepted_by_attempt.get(&3), Some(&1));
    }

    #[test]
    fn latency_percentiles() {
        let sorted: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&sorted, 50), 50);
        assert_eq!(percentile(&sorted, 95), 95);
        assert_eq!(percentile(&[42], 95), 42);
    }

    #[test]
    fn latency_excludes_unreached_evaluations() {
        let mut stats = RunStatistics::new();
        let gen_failed = Attempt {
            verdict: None,
            image: None,
            failure: Some(AttemptFailure::Generation("oom".to_string())),
            evaluation_time: Duration::ZERO,
            ..attempt(1, false)
        };
        stats.observe(&LoopResult::Exhausted {
            attempts: vec![gen_failed],
        });

        let summary = stats.summary();
        assert_eq!(summary.generation_latency.count, 1);
        assert_eq!(summary.evaluation_latency.count, 0);
    }

    #[test]
    fn render_mentions_buckets() {
        let mut stats = RunStatistics::new();
        stats.observe(&LoopResult::Exhausted {
            attempts: (1..=2).map(|i| attempt(i, false)).collect(),
        });
        let text = stats.summary().render();
        assert!(text.contains("incorrect_try_on_1: 1"));
        assert!(text.contains("incorrect_try_on_2: 1"));
    }
}
