//! Result sink: outcome-bucketed persistence with provenance metadata.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use tryon_store::{BlobStore, ObjectKey};
use uuid::Uuid;

use crate::config::SinkConfig;
use crate::controller::{Attempt, AttemptFailure, LoopResult};
use crate::error::SinkWriteFailure;
use crate::sample::{Cohort, SamplePair};
use crate::verdict::ConstraintCheck;

/// Destination bucket for accepted try-ons.
pub const CORRECT_BUCKET: &str = "correct_try_on";

/// Provenance metadata written next to every persisted image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub run_id: Uuid,
    pub pair_key: String,
    pub cohort: Cohort,
    pub attempt_index: u32,
    pub instruction: String,
    pub accepted: bool,
    /// Per-constraint results, absent on adapter-failure attempts.
    pub checks: Option<Vec<ConstraintCheck>>,
    pub feedback: Option<String>,
    /// Adapter failure that consumed the attempt, if any.
    pub failure: Option<String>,
    pub generation_ms: u64,
    pub evaluation_ms: u64,
    /// SHA-256 of the written PNG, absent when generation failed.
    pub image_digest: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Keys written for one pair.
#[derive(Debug, Clone)]
pub struct RecordedOutcome {
    pub keys: Vec<ObjectKey>,
}

/// Persists loop results into outcome buckets, mirroring the input cohort
/// partitioning so provenance traces back to the source pair.
///
/// Accepted pairs land in `correct_try_on/{cohort}/`; exhausted pairs keep
/// every attempt under `incorrect_try_on_{n}/{cohort}/` where `n` is the
/// 1-based attempt index, so the Nth bucket holds images that reached and
/// failed at iteration N. Each write is independent and atomic at the pair
/// granularity: a crash after pair K never corrupts pairs 1..K-1.
pub struct ResultSink {
    store: Arc<dyn BlobStore>,
    mirror: Option<Arc<dyn BlobStore>>,
    config: SinkConfig,
    run_id: Uuid,
}

impl ResultSink {
    pub fn new(store: Arc<dyn BlobStore>, config: SinkConfig) -> Self {
        Self {
            store,
            mirror: None,
            config,
            run_id: Uuid::new_v4(),
        }
    }

    /// Also upload every artifact to a second store under the same keys.
    pub fn with_mirror(mut self, mirror: Arc<dyn BlobStore>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Persist one pair's terminal result.
    ///
    /// Failures here are fatal for the pair only; the caller counts the
    /// pair as unrecorded and moves on.
    pub async fn record(
        &self,
        pair: &SamplePair,
        result: &LoopResult,
    ) -> Result<RecordedOutcome, SinkWriteFailure> {
        let mut keys = Vec::new();
        match result {
            LoopResult::Accepted { attempts } => {
                // Only the winning attempt is persisted for accepted pairs.
                if let Some(winner) = attempts.last() {
                    self.write_attempt(pair, winner, CORRECT_BUCKET, true, &mut keys)
                        .await?;
                }
                info!(pair = %pair.key, files = keys.len(), "recorded accepted try-on");
            }
            LoopResult::Exhausted { attempts } => {
                for attempt in attempts {
                    let bucket = format!("incorrect_try_on_{}", attempt.index);
                    self.write_attempt(pair, attempt, &bucket, false, &mut keys)
                        .await?;
                }
                info!(pair = %pair.key, files = keys.len(), "recorded exhausted try-on history");
            }
        }
        Ok(RecordedOutcome { keys })
    }

    async fn write_attempt(
        &self,
        pair: &SamplePair,
        attempt: &Attempt,
        bucket: &str,
        accepted: bool,
        keys: &mut Vec<ObjectKey>,
    ) -> Result<(), SinkWriteFailure> {
        let base = self.bucket_key(bucket, pair.cohort, pair.key.as_str());

        let png = match &attempt.image {
            Some(image) => {
                let mut bytes = Vec::new();
                image.write_to(
                    &mut std::io::Cursor::new(&mut bytes),
                    image::ImageOutputFormat::Png,
                )?;
                Some(bytes)
            }
            // Generation-failure attempts have no image; the metadata
            // record alone carries the failure into the bucket.
            None => None,
        };

        let record = AttemptRecord {
            run_id: self.run_id,
            pair_key: pair.key.as_str().to_string(),
            cohort: pair.cohort,
            attempt_index: attempt.index,
            instruction: attempt.instruction.clone(),
            accepted,
            checks: attempt.verdict.as_ref().map(|v| v.checks.clone()),
            feedback: attempt.verdict.as_ref().map(|v| v.feedback.clone()),
            failure: attempt.failure.as_ref().map(|f| match f {
                AttemptFailure::Generation(reason) => format!("generation: {reason}"),
                AttemptFailure::Evaluation(reason) => format!("evaluation: {reason}"),
            }),
            generation_ms: attempt.generation_time.as_millis() as u64,
            evaluation_ms: attempt.evaluation_time.as_millis() as u64,
            image_digest: png.as_ref().map(|bytes| hex::encode(Sha256::digest(bytes))),
            recorded_at: Utc::now(),
        };

        if let Some(bytes) = &png {
            let image_key = ObjectKey::new(format!("{base}.png"))?;
            self.put_everywhere(&image_key, bytes).await?;
            keys.push(image_key);
        }

        let metadata = serde_json::to_vec_pretty(&record)?;
        let metadata_key = ObjectKey::new(format!("{base}.json"))?;
        self.put_everywhere(&metadata_key, &metadata).await?;
        keys.push(metadata_key);

        debug!(pair = %pair.key, attempt = attempt.index, bucket, "persisted attempt");
        Ok(())
    }

    async fn put_everywhere(&self, key: &ObjectKey, bytes: &[u8]) -> Result<(), SinkWriteFailure> {
        self.store.put(key, bytes).await?;
        if let Some(mirror) = &self.mirror {
            mirror.put(key, bytes).await?;
        }
        Ok(())
    }

    fn bucket_key(&self, bucket: &str, cohort: Cohort, pair_key: &str) -> String {
        let prefix = self.config.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{bucket}/{}/{pair_key}", cohort.prefix())
        } else {
            format!("{prefix}/{bucket}/{}/{pair_key}", cohort.prefix())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::LoopResult;
    use crate::fakes::tiny_image;
    use crate::sample::{ImageRef, PairKey};
    use crate::verdict::Verdict;
    use std::time::Duration;
    use tryon_store::fakes::MemoryBlobStore;

    fn pair() -> SamplePair {
        SamplePair {
            key: PairKey::new("12"),
            cohort: Cohort::Females,
            person: ImageRef {
                key: ObjectKey::new("females/person/12.png").unwrap(),
                image: tiny_image(),
            },
            cloth: ImageRef {
                key: ObjectKey::new("females/cloth/12.png").unwrap(),
                image: tiny_image(),
            },
        }
    }

    fn attempt(index: u32, verdict: Option<Verdict>, failure: Option<AttemptFailure>) -> Attempt {
        Attempt {
            index,
            instruction: "instruction".to_string(),
            image: failure
                .as_ref()
                .map_or(true, |f| matches!(f, AttemptFailure::Evaluation(_)))
                .then(tiny_image),
            verdict,
            failure,
            generation_time: Duration::from_millis(120),
            evaluation_time: Duration::from_millis(40),
        }
    }

    #[tokio::test]
    async fn accepted_writes_single_correct_entry() {
        let store = Arc::new(MemoryBlobStore::new());
        let sink = ResultSink::new(store.clone(), SinkConfig::default());

        let result = LoopResult::Accepted {
            attempts: vec![attempt(1, Some(Verdict::uniform(true, "ok")), None)],
        };
        let outcome = sink.record(&pair(), &result).await.unwrap();

        let keys: Vec<String> = outcome.keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "correct_try_on/females/12.png",
                "correct_try_on/females/12.json"
            ]
        );

        // Metadata round-trips and the digest matches the written bytes.
        let meta = store
            .fetch(&ObjectKey::new("correct_try_on/females/12.json").unwrap())
            .await
            .unwrap();
        let record: AttemptRecord = serde_json::from_slice(&meta).unwrap();
        assert!(record.accepted);
        assert_eq!(record.attempt_index, 1);
        let png = store
            .fetch(&ObjectKey::new("correct_try_on/females/12.png").unwrap())
            .await
            .unwrap();
        assert_eq!(
            record.image_digest.unwrap(),
            hex::encode(Sha256::digest(&png))
        );
    }

    #[tokio::test]
    async fn exhausted_buckets_by_attempt_index() {
        let store = Arc::new(MemoryBlobStore::new());
        let sink = ResultSink::new(store.clone(), SinkConfig::default());

        let attempts = (1..=4)
            .map(|i| attempt(i, Some(Verdict::uniform(false, "bad")), None))
            .collect();
        let result = LoopResult::Exhausted { attempts };
        sink.record(&pair(), &result).await.unwrap();

        for i in 1..=4 {
            let key = ObjectKey::new(format!("incorrect_try_on_{i}/females/12.png")).unwrap();
            assert!(store.fetch(&key).await.is_ok(), "missing bucket {i}");
        }
    }

    #[tokio::test]
    async fn generation_failure_attempt_writes_metadata_only() {
        let store = Arc::new(MemoryBlobStore::new());
        let sink = ResultSink::new(store.clone(), SinkConfig::default());

        let result = LoopResult::Exhausted {
            attempts: vec![attempt(
                1,
                None,
                Some(AttemptFailure::Generation("oom".to_string())),
            )],
        };
        let outcome = sink.record(&pair(), &result).await.unwrap();
        assert_eq!(outcome.keys.len(), 1);
        assert!(outcome.keys[0].to_string().ends_with("12.json"));

        let meta = store.fetch(&outcome.keys[0]).await.unwrap();
        let record: AttemptRecord = serde_json::from_slice(&meta).unwrap();
        assert!(record.image_digest.is_none());
        assert_eq!(record.failure.as_deref(), Some("generation: oom"));
    }

    #[tokio::test]
    async fn mirror_receives_every_artifact() {
        let store = Arc::new(MemoryBlobStore::new());
        let mirror = Arc::new(MemoryBlobStore::new());
        let sink =
            ResultSink::new(store, SinkConfig::default()).with_mirror(mirror.clone());

        let result = LoopResult::Accepted {
            attempts: vec![attempt(1, Some(Verdict::uniform(true, "ok")), None)],
        };
        sink.record(&pair(), &result).await.unwrap();
        assert_eq!(mirror.keys().len(), 2);
    }

    #[tokio::test]
    async fn prefix_prepends_every_bucket() {
        let store = Arc::new(MemoryBlobStore::new());
        let sink = ResultSink::new(
            store.clone(),
            SinkConfig {
                prefix: "out".to_string(),
            },
        );

        let result = LoopResult::Accepted {
            attempts: vec![attempt(1, Some(Verdict::uniform(true, "ok")), None)],
        };
        let outcome = sink.record(&pair(), &result).await.unwrap();
        assert!(outcome.keys[0]
            .to_string()
            .starts_with("out/correct_try_on/females/"));
    }
}
