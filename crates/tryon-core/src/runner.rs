//! Batch runner: wires source → controller → sink for a whole run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use crate::controller::FeedbackLoop;
use crate::error::SourceError;
use crate::sample::SampleSource;
use crate::sink::ResultSink;
use crate::stats::{RunStatistics, RunSummary};

/// Cooperative whole-batch cancellation.
///
/// Checked between pairs only: a cancelled run finishes the pair in
/// flight rather than leaving a partially-recorded result.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Sequentially processes one pair at a time.
///
/// Pairs are fully independent; the only shared state across them is the
/// statistics accumulator and the sink, both owned here.
pub struct BatchRunner {
    source: SampleSource,
    feedback_loop: FeedbackLoop,
    sink: ResultSink,
    cancel: CancellationFlag,
}

impl BatchRunner {
    pub fn new(source: SampleSource, feedback_loop: FeedbackLoop, sink: ResultSink) -> Self {
        Self {
            source,
            feedback_loop,
            sink,
            cancel: CancellationFlag::new(),
        }
    }

    /// Handle for requesting cancellation from another task.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Process the batch to completion (or cancellation) and report.
    ///
    /// The only fatal error is failing to enumerate the backing store
    /// before any pair is processed. Per-pair failures are absorbed into
    /// the statistics.
    pub async fn run(&self) -> Result<RunSummary, SourceError> {
        let mut stats = RunStatistics::new();
        let mut batch = self.source.pairs().await?;

        while let Some(pair) = batch.next().await {
            if self.cancel.is_cancelled() {
                info!("cancellation requested, stopping before next pair");
                break;
            }

            let result = self.feedback_loop.run_pair(&pair).await;
            stats.observe(&result);

            if let Err(failure) = self.sink.record(&pair, &result).await {
                error!(pair = %pair.key, %failure, "failed to record outcome");
                stats.record_unrecorded();
            }
        }

        stats.set_decode_skips(batch.skipped());
        let summary = stats.summary();
        summary.emit();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoopConfig, SinkConfig, SourceConfig};
    use crate::fakes::{png_bytes, ScriptedEvaluator, ScriptedGenerator};
    use crate::revise::FeedbackRevision;
    use crate::sample::Cohort;
    use tryon_store::fakes::MemoryBlobStore;

    fn seeded_source(pairs: &[&str], cohort: Cohort) -> SampleSource {
        let png = png_bytes();
        let entries: Vec<(String, Vec<u8>)> = pairs
            .iter()
            .flat_map(|stem| {
                vec![
                    (format!("{}/person/{stem}.png", cohort.prefix()), png.clone()),
                    (format!("{}/cloth/{stem}.png", cohort.prefix()), png.clone()),
                ]
            })
            .collect();
        SampleSource::new(
            Arc::new(MemoryBlobStore::seeded(entries)),
            SourceConfig {
                cohorts: vec![cohort],
                ..SourceConfig::default()
            },
        )
    }

    fn runner_with(source: SampleSource, evaluator: ScriptedEvaluator) -> BatchRunner {
        let config = LoopConfig::default();
        let feedback_loop = FeedbackLoop::new(
            Arc::new(ScriptedGenerator::always_ok()),
            Arc::new(evaluator),
            Box::new(FeedbackRevision::new(config.default_instruction.clone())),
            config,
        );
        let sink = ResultSink::new(Arc::new(MemoryBlobStore::new()), SinkConfig::default());
        BatchRunner::new(source, feedback_loop, sink)
    }

    #[tokio::test]
    async fn processes_whole_batch() {
        let runner = runner_with(
            seeded_source(&["1", "2", "3"], Cohort::Males),
            ScriptedEvaluator::always_pass(),
        );
        let summary = runner.run().await.unwrap();
        assert_eq!(summary.pairs_processed, 3);
        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.unrecorded, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_pair() {
        let runner = runner_with(
            seeded_source(&["1", "2", "3"], Cohort::Males),
            ScriptedEvaluator::always_pass(),
        );
        // Cancel before starting: no pair's loop is ever entered.
        runner.cancellation().cancel();
        let summary = runner.run().await.unwrap();
        assert_eq!(summary.pairs_processed, 0);
    }
}
