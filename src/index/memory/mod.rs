// In-memory vector index
// Exact cosine scan over a mutex-guarded map. Stands in for the real store
// in tests and offline runs; honors the same contract as the remote client.

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;

use super::{CollectionInfo, DistanceMetric, IndexPoint, ScoredPoint, VectorIndex};
use crate::{MenuError, Result};

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    collections: Mutex<HashMap<String, MemoryCollection>>,
}

#[derive(Debug)]
struct MemoryCollection {
    dimension: usize,
    metric: DistanceMetric,
    points: BTreeMap<i64, (Vec<f32>, Value)>,
}

impl InMemoryIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryCollection>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    // Similarity contract is [0, 1]; negative cosine clamps to zero.
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

impl VectorIndex for InMemoryIndex {
    #[inline]
    fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let mut collections = self.lock();
        match collections.get(name) {
            Some(existing) => {
                if existing.dimension == dimension && existing.metric == metric {
                    Ok(())
                } else {
                    Err(MenuError::SchemaMismatch(format!(
                        "collection '{}' exists with dimension {} metric {}, requested dimension {} metric {}",
                        name, existing.dimension, existing.metric, dimension, metric
                    )))
                }
            }
            None => {
                debug!("Creating in-memory collection '{}'", name);
                collections.insert(
                    name.to_string(),
                    MemoryCollection {
                        dimension,
                        metric,
                        points: BTreeMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    #[inline]
    fn recreate_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        debug!("Recreating in-memory collection '{}'", name);
        self.lock().insert(
            name.to_string(),
            MemoryCollection {
                dimension,
                metric,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    #[inline]
    fn describe_collection(&self, name: &str) -> Result<CollectionInfo> {
        let collections = self.lock();
        let collection = collections
            .get(name)
            .ok_or_else(|| MenuError::NotFound(format!("collection '{name}' does not exist")))?;

        Ok(CollectionInfo {
            points_count: collection.points.len() as u64,
            dimension: collection.dimension,
            metric: collection.metric,
            status: "green".to_string(),
        })
    }

    #[inline]
    fn upsert_point(&self, name: &str, point: IndexPoint) -> Result<()> {
        let mut collections = self.lock();
        let collection = collections.get_mut(name).ok_or_else(|| {
            MenuError::IndexUnavailable(format!("collection '{name}' does not exist"))
        })?;

        if point.vector.len() != collection.dimension {
            return Err(MenuError::SchemaMismatch(format!(
                "vector has dimension {}, collection '{}' expects {}",
                point.vector.len(),
                name,
                collection.dimension
            )));
        }

        collection
            .points
            .insert(point.id, (point.vector, point.payload));
        Ok(())
    }

    #[inline]
    fn delete_point(&self, name: &str, id: i64) -> Result<()> {
        let mut collections = self.lock();
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| MenuError::NotFound(format!("collection '{name}' does not exist")))?;

        if collection.points.remove(&id).is_none() {
            return Err(MenuError::NotFound(format!(
                "point {id} does not exist in collection '{name}'"
            )));
        }
        Ok(())
    }

    #[inline]
    fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let collections = self.lock();
        let collection = collections.get(name).ok_or_else(|| {
            MenuError::IndexUnavailable(format!("collection '{name}' does not exist"))
        })?;

        if vector.len() != collection.dimension {
            return Err(MenuError::SchemaMismatch(format!(
                "query vector has dimension {}, collection '{}' expects {}",
                vector.len(),
                name,
                collection.dimension
            )));
        }

        let mut hits: Vec<ScoredPoint> = collection
            .points
            .iter()
            .map(|(id, (stored, payload))| ScoredPoint {
                id: *id,
                score: cosine_similarity(vector, stored),
                payload: payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}
