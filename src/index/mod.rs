// Vector index gateway
// Capability interface over an external vector store: collection lifecycle,
// per-id upsert/delete and similarity search. The index is a derived,
// rebuildable cache of the external system of record, never the source of
// truth.

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Distance metric of a collection. Fixed for the collection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclid,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "Cosine"),
            Self::Dot => write!(f, "Dot"),
            Self::Euclid => write!(f, "Euclid"),
        }
    }
}

/// The unit stored in the index: record identity, embedding vector and the
/// full record payload used to reconstruct results without re-embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    pub id: i64,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// One search hit: payload plus similarity score in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: i64,
    pub score: f32,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub points_count: u64,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub status: String,
}

/// Capability interface over the vector store.
///
/// Failure contract: transport problems surface as
/// `MenuError::IndexUnavailable`; a collection that exists with a different
/// schema surfaces as `MenuError::SchemaMismatch`; deleting or describing
/// something absent surfaces as `MenuError::NotFound`, distinct from
/// outages so callers can tell "nothing to do" from "system down".
pub trait VectorIndex: Send + Sync {
    /// Create the collection if absent; no-op when present with a matching
    /// schema.
    fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    /// Destructively drop and recreate the collection with the given schema.
    fn recreate_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    fn describe_collection(&self, name: &str) -> Result<CollectionInfo>;

    /// Insert or replace the point with this id, atomically from the
    /// caller's view. Re-applying the same upsert is a no-op observably.
    fn upsert_point(&self, name: &str, point: IndexPoint) -> Result<()>;

    fn delete_point(&self, name: &str, id: i64) -> Result<()>;

    /// Up to `limit` points ordered by similarity descending.
    fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>>;
}

impl<T: VectorIndex + ?Sized> VectorIndex for &T {
    #[inline]
    fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        (**self).ensure_collection(name, dimension, metric)
    }

    #[inline]
    fn recreate_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        (**self).recreate_collection(name, dimension, metric)
    }

    #[inline]
    fn describe_collection(&self, name: &str) -> Result<CollectionInfo> {
        (**self).describe_collection(name)
    }

    #[inline]
    fn upsert_point(&self, name: &str, point: IndexPoint) -> Result<()> {
        (**self).upsert_point(name, point)
    }

    #[inline]
    fn delete_point(&self, name: &str, id: i64) -> Result<()> {
        (**self).delete_point(name, id)
    }

    #[inline]
    fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        (**self).search(name, vector, limit)
    }
}
