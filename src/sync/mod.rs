// Sync service
// Bridges single-record mutations from the external system of record into
// the live vector index. Non-destructive: only the targeted id is touched.


use tracing::{debug, info, warn};

use crate::catalog::{CatalogRecord, canonical};
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::index::{DistanceMetric, IndexPoint, VectorIndex};
use crate::{MenuError, Result};

/// Incremental upsert/delete of individual records against an already
/// populated collection. Both operations are idempotent per id and safe to
/// retry.
pub struct SyncService<E, V> {
    embedder: E,
    index: V,
    collection: String,
    dimension: usize,
}

impl<E: EmbeddingProvider, V: VectorIndex> SyncService<E, V> {
    #[inline]
    pub fn new(embedder: E, index: V, config: &Config) -> Self {
        Self {
            embedder,
            index,
            collection: config.index.collection.clone(),
            dimension: config.embedding.dimension as usize,
        }
    }

    /// Validate, embed and upsert one record. Returns the record id.
    ///
    /// Re-applying the same upsert replaces the point with identical content
    /// and is observably a no-op.
    #[inline]
    pub fn upsert_record(&self, record: &CatalogRecord) -> Result<i64> {
        record.validate()?;
        let id = record.effective_id();

        let text = canonical::build(record);
        debug!(id, "Embedding canonical text ({} chars)", text.chars().count());

        let mut vectors = self.embedder.embed(std::slice::from_ref(&text))?;
        let vector = vectors.pop().ok_or_else(|| {
            MenuError::EmbeddingUnavailable("provider returned no embedding".to_string())
        })?;

        self.index
            .ensure_collection(&self.collection, self.dimension, DistanceMetric::Cosine)?;

        let payload = serde_json::to_value(record).map_err(anyhow::Error::from)?;
        self.index.upsert_point(
            &self.collection,
            IndexPoint {
                id,
                vector,
                payload,
            },
        )?;

        info!(id, collection = %self.collection, "Record synchronized");
        Ok(id)
    }

    /// Remove one record from the index. An absent id reports `NotFound`,
    /// distinct from a store outage, so callers can tell "nothing to do"
    /// from "system down".
    #[inline]
    pub fn delete_record(&self, id: i64) -> Result<()> {
        match self.index.delete_point(&self.collection, id) {
            Ok(()) => {
                info!(id, collection = %self.collection, "Record removed from index");
                Ok(())
            }
            Err(error) => {
                if matches!(error, MenuError::NotFound(_)) {
                    warn!(id, "Delete requested for an id that is not indexed");
                }
                Err(error)
            }
        }
    }
}
