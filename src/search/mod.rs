// Search service
// One natural-language query: validate, normalize, embed, similarity-search,
// shape the ranked result list. Scores are returned raw; interpretation is
// the caller's job via the documented bands.

#[cfg(test)]
mod tests;

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::normalizer;
use crate::{MenuError, Result};

/// Latency target for one end-to-end search. Exceeding it is logged, never
/// enforced.
pub const SEARCH_LATENCY_TARGET: Duration = Duration::from_secs(2);

/// Interpretation bands for similarity scores. Advisory only: the service
/// never filters results by score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    NearExact,
    High,
    Moderate,
    Low,
    VeryLow,
}

impl ScoreBand {
    #[inline]
    pub fn classify(score: f32) -> Self {
        if score >= 0.9 {
            Self::NearExact
        } else if score >= 0.7 {
            Self::High
        } else if score >= 0.5 {
            Self::Moderate
        } else if score >= 0.3 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NearExact => "near-exact",
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
            Self::VeryLow => "very low",
        };
        write!(f, "{label}")
    }
}

/// One ranked result: the indexed record payload and its raw similarity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub score: f32,
    pub payload: Value,
}

impl SearchHit {
    #[inline]
    pub fn band(&self) -> ScoreBand {
        ScoreBand::classify(self.score)
    }
}

/// Shaped response for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub hits: Vec<SearchHit>,
    #[serde(skip)]
    pub elapsed: Duration,
}

pub struct SearchService<E, V> {
    embedder: E,
    index: V,
    collection: String,
    max_results: usize,
    max_query_length: usize,
}

impl<E: EmbeddingProvider, V: VectorIndex> SearchService<E, V> {
    #[inline]
    pub fn new(embedder: E, index: V, config: &Config) -> Self {
        Self {
            embedder,
            index,
            collection: config.index.collection.clone(),
            max_results: config.search.max_results,
            max_query_length: config.search.max_query_length,
        }
    }

    /// Run one semantic search.
    ///
    /// Malformed input is rejected with `InvalidQuery` before any external
    /// call. Results come back ordered by similarity descending with raw
    /// scores in [0, 1]; no score threshold is applied server-side.
    #[inline]
    pub fn search(&self, query: &str, top_k: usize) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(MenuError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }
        if query.chars().count() > self.max_query_length {
            return Err(MenuError::InvalidQuery(format!(
                "query exceeds {} characters",
                self.max_query_length
            )));
        }
        if top_k == 0 || top_k > self.max_results {
            return Err(MenuError::InvalidQuery(format!(
                "top_k must be between 1 and {}",
                self.max_results
            )));
        }

        let start = Instant::now();
        let normalized = normalizer::normalize(query);
        debug!(query, normalized = %normalized, top_k, "Running semantic search");

        let mut vectors = self.embedder.embed(std::slice::from_ref(&normalized))?;
        let vector = vectors.pop().ok_or_else(|| {
            MenuError::EmbeddingUnavailable("provider returned no embedding".to_string())
        })?;

        let mut points = self.index.search(&self.collection, &vector, top_k)?;
        // The gateway already orders by similarity; keep the contract even
        // against a sloppy backend.
        points.sort_by(|a, b| b.score.total_cmp(&a.score));

        let hits: Vec<SearchHit> = points
            .into_iter()
            .map(|point| SearchHit {
                id: point.id,
                score: point.score,
                payload: point.payload,
            })
            .collect();

        let elapsed = start.elapsed();
        if elapsed >= SEARCH_LATENCY_TARGET {
            warn!(
                "Search took {:.3}s, above the {:.0}s target",
                elapsed.as_secs_f64(),
                SEARCH_LATENCY_TARGET.as_secs_f64()
            );
        }

        info!(
            total = hits.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Search completed"
        );

        Ok(SearchResponse {
            query: query.to_string(),
            total: hits.len(),
            hits,
            elapsed,
        })
    }
}
