// Indexing pipeline
// Full-catalog rebuild with a scorched-earth collection swap: the old
// collection is dropped only once a complete new embedding set is ready, so
// a failed run never degrades what is already searchable.


use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{self, CatalogRecord, ValidationIssue, canonical};
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::index::{DistanceMetric, IndexPoint, VectorIndex};
use crate::{MenuError, Result};

/// Stages of one indexing run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingStage {
    Loading,
    Validating,
    Canonicalizing,
    Embedding,
    Recreating,
    Upserting,
    Verifying,
    Done,
}

impl fmt::Display for IndexingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Validating => "validating",
            Self::Canonicalizing => "canonicalizing",
            Self::Embedding => "embedding",
            Self::Recreating => "recreating",
            Self::Upserting => "upserting",
            Self::Verifying => "verifying",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Outcome of one indexing run.
#[derive(Debug, Clone)]
pub struct IndexingReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub dry_run: bool,
    pub total_records: usize,
    pub valid_records: usize,
    pub legacy_records: usize,
    pub extended_records: usize,
    pub precomputed_texts: usize,
    pub issues: Vec<ValidationIssue>,
    pub indexed_points: usize,
    pub verified_points: Option<u64>,
    pub warnings: Vec<String>,
}

impl IndexingReport {
    #[inline]
    pub fn records_per_second(&self) -> f64 {
        let seconds = self.duration.as_secs_f64();
        if seconds > 0.0 {
            self.indexed_points as f64 / seconds
        } else {
            0.0
        }
    }
}

type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Orchestrates a full catalog (re)population of the vector index.
pub struct IndexingPipeline<E, V> {
    embedder: E,
    index: V,
    collection: String,
    dimension: usize,
    batch_size: usize,
    max_concurrent_batches: usize,
    progress: Option<ProgressCallback>,
}

impl<E: EmbeddingProvider, V: VectorIndex> IndexingPipeline<E, V> {
    #[inline]
    pub fn new(embedder: E, index: V, config: &Config) -> Self {
        Self {
            embedder,
            index,
            collection: config.index.collection.clone(),
            dimension: config.embedding.dimension as usize,
            batch_size: config.embedding.batch_size as usize,
            max_concurrent_batches: config.embedding.max_concurrent_batches,
            progress: None,
        }
    }

    /// Register a callback invoked after every upserted point with
    /// `(points_done, points_total)`.
    #[inline]
    pub fn with_progress(
        mut self,
        callback: impl Fn(usize, usize) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Load the catalog file and run the pipeline on its contents.
    #[inline]
    pub fn run_from_file(&self, path: &Path, dry_run: bool) -> Result<IndexingReport> {
        info!(stage = %IndexingStage::Loading, "Loading catalog from {}", path.display());
        let values = catalog::load_catalog(path)?;
        self.run(values, dry_run)
    }

    /// Run the pipeline over raw catalog elements.
    ///
    /// Validation inspects every element and reports the full issue list.
    /// With `dry_run` the index is never touched. Otherwise the complete
    /// embedding set is produced first, then the collection is destructively
    /// recreated and repopulated; an embedding failure therefore leaves the
    /// previously indexed collection intact.
    #[inline]
    pub fn run(&self, values: Vec<Value>, dry_run: bool) -> Result<IndexingReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(run_id = %run_id, dry_run, "Starting indexing run over {} elements", values.len());

        info!(stage = %IndexingStage::Validating, "Validating {} catalog elements", values.len());
        let (records, issues) = catalog::parse_records(&values);
        let total_records = values.len();

        if !issues.is_empty() {
            warn!(
                "{} of {} catalog elements failed validation",
                issues.len(),
                total_records
            );
        }
        if records.len() * 2 < total_records {
            return Err(MenuError::Validation(format!(
                "too many invalid records: {} of {} elements failed validation",
                issues.len(),
                total_records
            )));
        }

        let legacy_records = records.iter().filter(|r| !r.is_extended()).count();
        let extended_records = records.len() - legacy_records;
        let precomputed_texts = records
            .iter()
            .filter(|r| match r {
                CatalogRecord::Extended(e) => e.canonical_text.is_some(),
                CatalogRecord::Legacy(_) => false,
            })
            .count();

        let mut report = IndexingReport {
            run_id,
            started_at,
            duration: start.elapsed(),
            dry_run,
            total_records,
            valid_records: records.len(),
            legacy_records,
            extended_records,
            precomputed_texts,
            issues,
            indexed_points: 0,
            verified_points: None,
            warnings: Vec::new(),
        };

        if dry_run {
            report.duration = start.elapsed();
            info!(
                "Dry run complete: {} valid, {} rejected, index untouched",
                report.valid_records,
                report.issues.len()
            );
            return Ok(report);
        }

        info!(stage = %IndexingStage::Canonicalizing, "Building canonical texts");
        let texts: Vec<String> = records.iter().map(canonical::build).collect();

        info!(
            stage = %IndexingStage::Embedding,
            "Embedding {} texts in batches of {} ({} concurrent)",
            texts.len(),
            self.batch_size,
            self.max_concurrent_batches
        );
        let vectors = self.embed_in_batches(&texts)?;
        if vectors.len() != records.len() {
            return Err(MenuError::EmbeddingUnavailable(format!(
                "embedding set incomplete: {} vectors for {} records",
                vectors.len(),
                records.len()
            )));
        }

        // Point of no return: everything needed for the new collection is in
        // hand, so the old one can be discarded.
        warn!(
            stage = %IndexingStage::Recreating,
            "Recreating collection '{}': existing points will be discarded",
            self.collection
        );
        self.index
            .recreate_collection(&self.collection, self.dimension, DistanceMetric::Cosine)?;

        info!(stage = %IndexingStage::Upserting, "Upserting {} points", records.len());
        let total_points = records.len();
        for (done, (record, vector)) in records.iter().zip(vectors).enumerate() {
            let payload = serde_json::to_value(record).map_err(anyhow::Error::from)?;
            self.index.upsert_point(
                &self.collection,
                IndexPoint {
                    id: record.effective_id(),
                    vector,
                    payload,
                },
            )?;
            report.indexed_points += 1;
            if let Some(callback) = &self.progress {
                callback(done + 1, total_points);
            }
        }

        info!(stage = %IndexingStage::Verifying, "Verifying point count");
        match self.index.describe_collection(&self.collection) {
            Ok(info) => {
                report.verified_points = Some(info.points_count);
                if info.points_count != report.indexed_points as u64 {
                    let warning = format!(
                        "collection reports {} points but {} were upserted",
                        info.points_count, report.indexed_points
                    );
                    warn!("{}", warning);
                    report.warnings.push(warning);
                }
            }
            Err(error) => {
                let warning = format!("could not verify collection: {error}");
                warn!("{}", warning);
                report.warnings.push(warning);
            }
        }

        report.duration = start.elapsed();
        info!(
            stage = %IndexingStage::Done,
            "Indexed {} points in {:.2}s ({:.1} records/s)",
            report.indexed_points,
            report.duration.as_secs_f64(),
            report.records_per_second()
        );
        Ok(report)
    }

    /// Embed all texts in `batch_size` chunks, dispatching chunks to a
    /// bounded worker pool. Order is preserved; the first failure aborts the
    /// run (remaining chunks are not started).
    fn embed_in_batches(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let chunks: Vec<&[String]> = texts.chunks(self.batch_size).collect();
        let workers = self.max_concurrent_batches.clamp(1, chunks.len());

        if workers == 1 {
            let mut all = Vec::with_capacity(texts.len());
            for chunk in &chunks {
                all.extend(self.embedder.embed(chunk)?);
            }
            return Ok(all);
        }

        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let slots: Vec<Mutex<Option<Result<Vec<Vec<f32>>>>>> =
            (0..chunks.len()).map(|_| Mutex::new(None)).collect();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        if failed.load(Ordering::SeqCst) {
                            break;
                        }
                        let slot = next.fetch_add(1, Ordering::SeqCst);
                        if slot >= chunks.len() {
                            break;
                        }
                        debug!("Embedding batch {}/{}", slot + 1, chunks.len());
                        let result = self.embedder.embed(chunks[slot]);
                        if result.is_err() {
                            failed.store(true, Ordering::SeqCst);
                        }
                        *slots[slot].lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
                    }
                });
            }
        });

        let mut all = Vec::with_capacity(texts.len());
        for slot in slots {
            match slot.into_inner().unwrap_or_else(PoisonError::into_inner) {
                Some(Ok(vectors)) => all.extend(vectors),
                Some(Err(error)) => return Err(error),
                None => {
                    return Err(MenuError::EmbeddingUnavailable(
                        "embedding batch aborted after an earlier failure".to_string(),
                    ));
                }
            }
        }
        Ok(all)
    }
}
