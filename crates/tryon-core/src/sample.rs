//! Sample source: deterministic traversal of paired person/cloth blobs.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tryon_store::{BlobStore, ObjectKey};

use crate::config::SourceConfig;
use crate::error::{SampleLoadFailure, SourceError};

/// Input cohort, mirrored into the output partitioning for provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
    Males,
    Females,
}

impl Cohort {
    /// Top-level store prefix for this cohort.
    pub fn prefix(&self) -> &'static str {
        match self {
            Cohort::Males => "males",
            Cohort::Females => "females",
        }
    }
}

impl std::fmt::Display for Cohort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl std::str::FromStr for Cohort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "males" | "male" => Ok(Cohort::Males),
            "females" | "female" => Ok(Cohort::Females),
            other => Err(format!("unknown cohort: {other}")),
        }
    }
}

/// Stable identifier shared by both halves of a pair (the common filename
/// stem, e.g. `12` for `males/person/12.png` + `males/cloth/12.png`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey(String);

impl PairKey {
    pub fn new(stem: impl Into<String>) -> Self {
        PairKey(stem.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sort key: numeric stems order by value and precede non-numeric stems,
    /// which fall back to lexicographic order.
    fn sort_key(&self) -> (u8, u64, &str) {
        match self.0.parse::<u64>() {
            Ok(n) => (0, n, ""),
            Err(_) => (1, 0, self.0.as_str()),
        }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An unresolved pairing: keys only, nothing fetched yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairListing {
    pub key: PairKey,
    pub cohort: Cohort,
    pub person: ObjectKey,
    pub cloth: ObjectKey,
}

/// A decoded image together with the key it came from.
#[derive(Debug, Clone)]
pub struct ImageRef {
    pub key: ObjectKey,
    pub image: DynamicImage,
}

/// One fully-loaded input to the feedback loop. Immutable once read.
#[derive(Debug, Clone)]
pub struct SamplePair {
    pub key: PairKey,
    pub cohort: Cohort,
    pub person: ImageRef,
    pub cloth: ImageRef,
}

/// Walks the backing store and yields [`SamplePair`]s lazily.
///
/// Re-scanning an unchanged store yields pairs in the same order (numeric
/// sort of the stem when possible, lexicographic otherwise) so partial runs
/// can be resumed deterministically.
pub struct SampleSource {
    store: Arc<dyn BlobStore>,
    config: SourceConfig,
}

impl SampleSource {
    pub fn new(store: Arc<dyn BlobStore>, config: SourceConfig) -> Self {
        Self { store, config }
    }

    /// Enumerate and pair keys without fetching any payloads.
    ///
    /// Objects with no counterpart on the other side of the pairing are
    /// logged and skipped. An unreachable store is fatal here, before any
    /// pair is processed.
    pub async fn scan(&self) -> Result<Vec<PairListing>, SourceError> {
        let mut listings = Vec::new();

        for &cohort in &self.config.cohorts {
            let person_prefix = format!("{}/{}", cohort.prefix(), self.config.person_prefix);
            let cloth_prefix = format!("{}/{}", cohort.prefix(), self.config.cloth_prefix);

            let mut persons: BTreeMap<String, ObjectKey> = BTreeMap::new();
            for key in self.store.list(&person_prefix).await? {
                persons.insert(key.stem().to_string(), key);
            }

            let mut cloths: BTreeMap<String, ObjectKey> = BTreeMap::new();
            for key in self.store.list(&cloth_prefix).await? {
                cloths.insert(key.stem().to_string(), key);
            }

            for (stem, person) in persons {
                match cloths.remove(&stem) {
                    Some(cloth) => listings.push(PairListing {
                        key: PairKey::new(stem),
                        cohort,
                        person,
                        cloth,
                    }),
                    None => warn!(%person, "person image has no cloth counterpart, skipping"),
                }
            }
            for (_, cloth) in cloths {
                warn!(%cloth, "cloth image has no person counterpart, skipping");
            }
        }

        listings.sort_by(|a, b| {
            (a.cohort.prefix(), a.key.sort_key()).cmp(&(b.cohort.prefix(), b.key.sort_key()))
        });
        debug!(pairs = listings.len(), "scanned sample pairs");
        Ok(listings)
    }

    /// Fetch and decode both halves of a listed pair.
    pub async fn load(&self, listing: &PairListing) -> Result<SamplePair, SampleLoadFailure> {
        let person = self.load_image(&listing.person).await?;
        let cloth = self.load_image(&listing.cloth).await?;
        Ok(SamplePair {
            key: listing.key.clone(),
            cohort: listing.cohort,
            person,
            cloth,
        })
    }

    /// Start a capped, lazily-loading pass over the store.
    pub async fn pairs(&self) -> Result<SampleBatch<'_>, SourceError> {
        let listings = self.scan().await?;
        Ok(SampleBatch {
            source: self,
            listings: listings.into(),
            yielded: 0,
            skipped: 0,
        })
    }

    async fn load_image(&self, key: &ObjectKey) -> Result<ImageRef, SampleLoadFailure> {
        let bytes = self
            .store
            .fetch(key)
            .await
            .map_err(|source| SampleLoadFailure::Fetch {
                key: key.to_string(),
                source,
            })?;
        let image = image::load_from_memory(&bytes).map_err(|source| SampleLoadFailure::Decode {
            key: key.to_string(),
            source,
        })?;
        Ok(ImageRef {
            key: key.clone(),
            image,
        })
    }
}

/// One capped pass over the source.
///
/// Pairs that fail to fetch or decode are logged, counted and skipped;
/// they never abort the batch and do not consume the cap.
pub struct SampleBatch<'a> {
    source: &'a SampleSource,
    listings: VecDeque<PairListing>,
    yielded: usize,
    skipped: u64,
}

impl SampleBatch<'_> {
    /// Next decodable pair, or `None` when the cap or the store is exhausted.
    pub async fn next(&mut self) -> Option<SamplePair> {
        while self.yielded < self.source.config.batch_limit {
            let listing = self.listings.pop_front()?;
            match self.source.load(&listing).await {
                Ok(pair) => {
                    self.yielded += 1;
                    return Some(pair);
                }
                Err(failure) => {
                    warn!(pair = %listing.key, %failure, "skipping undecodable pair");
                    self.skipped += 1;
                }
            }
        }
        None
    }

    /// Pairs skipped so far because their payload failed to fetch or decode.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
