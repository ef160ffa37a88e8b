//! End-to-end scenarios for the feedback loop, driven through the batch
//! runner with scripted model fakes and in-memory stores.

use std::sync::Arc;

use tryon_core::fakes::{png_bytes, EvalStep, GenStep, ScriptedEvaluator, ScriptedGenerator};
use tryon_core::{
    BatchRunner, Cohort, EvaluationFailure, FeedbackLoop, FeedbackRevision, GenerationFailure,
    LoopConfig, ResultSink, RunSummary, SampleSource, SinkConfig, SourceConfig, Verdict,
    CORRECT_BUCKET,
};
use tryon_store::fakes::MemoryBlobStore;
use tryon_store::{BlobStore, ObjectKey};

/// One seeded person/cloth pair named `p1`/`c1` via the shared stem `1`.
fn single_pair_store() -> Arc<MemoryBlobStore> {
    let png = png_bytes();
    Arc::new(MemoryBlobStore::seeded(vec![
        ("males/person/1.png".to_string(), png.clone()),
        ("males/cloth/1.png".to_string(), png),
    ]))
}

async fn run_scenario(
    generator: ScriptedGenerator,
    evaluator: ScriptedEvaluator,
) -> (RunSummary, Arc<MemoryBlobStore>) {
    let input = single_pair_store();
    let output = Arc::new(MemoryBlobStore::new());

    let source = SampleSource::new(
        input,
        SourceConfig {
            cohorts: vec![Cohort::Males],
            ..SourceConfig::default()
        },
    );
    let config = LoopConfig::default();
    let feedback_loop = FeedbackLoop::new(
        Arc::new(generator),
        Arc::new(evaluator),
        Box::new(FeedbackRevision::new(config.default_instruction.clone())),
        config,
    );
    let sink = ResultSink::new(output.clone(), SinkConfig::default());

    let runner = BatchRunner::new(source, feedback_loop, sink);
    let summary = runner.run().await.expect("store is reachable");
    (summary, output)
}

#[tokio::test]
async fn immediate_success_writes_one_correct_file() {
    let (summary, output) = run_scenario(
        ScriptedGenerator::always_ok(),
        ScriptedEvaluator::always_pass(),
    )
    .await;

    assert_eq!(summary.pairs_processed, 1);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.exhausted, 0);
    assert_eq!(summary.accepted_by_attempt.get(&1), Some(&1));

    let image_key = ObjectKey::new(format!("{CORRECT_BUCKET}/males/1.png")).unwrap();
    assert!(output.fetch(&image_key).await.is_ok());
    // One image + one metadata record, nothing else.
    assert_eq!(output.keys().len(), 2);
}

#[tokio::test]
async fn full_exhaustion_fills_every_bucket() {
    let (summary, output) = run_scenario(
        ScriptedGenerator::always_ok(),
        ScriptedEvaluator::always_fail("garment mismatch"),
    )
    .await;

    assert_eq!(summary.accepted, 0);
    assert_eq!(summary.exhausted, 1);
    for bucket in 1..=4u32 {
        assert_eq!(summary.exhausted_by_attempt.get(&bucket), Some(&1));
        let key = ObjectKey::new(format!("incorrect_try_on_{bucket}/males/1.png")).unwrap();
        assert!(
            output.fetch(&key).await.is_ok(),
            "bucket {bucket} missing its image"
        );
    }
}

#[tokio::test]
async fn generation_failure_then_recovery_accepts_at_attempt_two() {
    let (summary, output) = run_scenario(
        ScriptedGenerator::new(vec![GenStep::Fail(GenerationFailure::Backend(
            "cuda out of memory".to_string(),
        ))]),
        ScriptedEvaluator::always_pass(),
    )
    .await;

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.generation_failures, 1);
    assert_eq!(summary.evaluation_failures, 0);
    assert_eq!(summary.accepted_by_attempt.get(&2), Some(&1));

    let image_key = ObjectKey::new(format!("{CORRECT_BUCKET}/males/1.png")).unwrap();
    assert!(output.fetch(&image_key).await.is_ok());
}

#[tokio::test]
async fn malformed_evaluator_output_is_distinct_from_quality_failure() {
    let (summary, _) = run_scenario(
        ScriptedGenerator::always_ok(),
        ScriptedEvaluator::new(vec![EvalStep::Fail(EvaluationFailure::Unparsable(
            "The image looks pretty good overall!".to_string(),
        ))]),
    )
    .await;

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.accepted_by_attempt.get(&2), Some(&1));
    assert_eq!(summary.evaluation_failures, 1);
    assert_eq!(summary.generation_failures, 0);
}

#[tokio::test]
async fn mixed_verdicts_accept_only_on_full_pass() {
    // Attempt 1: one constraint fails. Attempt 2: full pass.
    let mut partial = Verdict::uniform(true, "texture slightly off");
    partial.checks[4].passed = false; // texture_fidelity

    let (summary, _) = run_scenario(
        ScriptedGenerator::always_ok(),
        ScriptedEvaluator::new(vec![EvalStep::Verdict(partial)]),
    )
    .await;

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.accepted_by_attempt.get(&2), Some(&1));
    // A partial pass is a quality failure, not an adapter failure.
    assert_eq!(summary.evaluation_failures, 0);
}

#[tokio::test]
async fn undecodable_input_pair_never_reaches_the_loop() {
    let input = Arc::new(MemoryBlobStore::seeded(vec![
        ("males/person/1.png".to_string(), b"garbage".to_vec()),
        ("males/cloth/1.png".to_string(), png_bytes()),
    ]));
    let output = Arc::new(MemoryBlobStore::new());

    let source = SampleSource::new(
        input,
        SourceConfig {
            cohorts: vec![Cohort::Males],
            ..SourceConfig::default()
        },
    );
    let config = LoopConfig::default();
    let feedback_loop = FeedbackLoop::new(
        Arc::new(ScriptedGenerator::always_ok()),
        Arc::new(ScriptedEvaluator::always_pass()),
        Box::new(FeedbackRevision::new(config.default_instruction.clone())),
        config,
    );
    let sink = ResultSink::new(output.clone(), SinkConfig::default());

    let summary = BatchRunner::new(source, feedback_loop, sink)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.pairs_processed, 0);
    assert_eq!(summary.decode_skips, 1);
    assert!(output.keys().is_empty());
}
