use std::sync::Mutex;

use serde_json::json;

use super::*;
use crate::index::{DistanceMetric, InMemoryIndex, IndexPoint};

const DIMENSION: usize = 3;

/// Provider that returns a fixed vector and records what it was asked to
/// embed.
struct FixedEmbedder {
    vector: Vec<f32>,
    requests: Mutex<Vec<String>>,
}

impl FixedEmbedder {
    fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl EmbeddingProvider for FixedEmbedder {
    fn embed(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        self.requests
            .lock()
            .expect("requests lock should not be poisoned")
            .extend(texts.iter().cloned());
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn ping(&self) -> crate::Result<()> {
        Ok(())
    }
}

struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        Err(MenuError::EmbeddingUnavailable(
            "provider offline".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn ping(&self) -> crate::Result<()> {
        Err(MenuError::EmbeddingUnavailable(
            "provider offline".to_string(),
        ))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.dimension = DIMENSION as u32;
    config.index.collection = "test_items".to_string();
    config
}

/// Collection with three points at decreasing similarity to [1, 0, 0].
fn seeded_index() -> InMemoryIndex {
    let index = InMemoryIndex::new();
    index
        .ensure_collection("test_items", DIMENSION, DistanceMetric::Cosine)
        .expect("collection should be created");
    for (id, vector) in [
        (1, vec![1.0, 0.0, 0.0]),
        (2, vec![0.8, 0.6, 0.0]),
        (3, vec![0.1, 0.0, 0.995]),
    ] {
        index
            .upsert_point(
                "test_items",
                IndexPoint {
                    id,
                    vector,
                    payload: json!({"ID": id, "Nivel0": "Configuración"}),
                },
            )
            .expect("point should be upserted");
    }
    index
}

#[test]
fn empty_query_is_rejected_before_any_external_call() {
    let config = test_config();
    let embedder = FixedEmbedder::new(vec![1.0, 0.0, 0.0]);
    let service = SearchService::new(&embedder, seeded_index(), &config);

    for query in ["", "   ", "\t\n"] {
        let error = service
            .search(query, 3)
            .expect_err("blank query should be rejected");
        assert!(matches!(error, MenuError::InvalidQuery(_)));
        assert_eq!(error.code(), "INVALID_QUERY");
    }

    assert!(
        embedder
            .requests
            .lock()
            .expect("requests lock should not be poisoned")
            .is_empty(),
        "no embedding request may be issued for rejected input"
    );
}

#[test]
fn out_of_range_top_k_is_rejected() {
    let config = test_config();
    let service = SearchService::new(
        FixedEmbedder::new(vec![1.0, 0.0, 0.0]),
        seeded_index(),
        &config,
    );

    assert!(matches!(
        service.search("alertas", 0),
        Err(MenuError::InvalidQuery(_))
    ));
    assert!(matches!(
        service.search("alertas", 21),
        Err(MenuError::InvalidQuery(_))
    ));
}

#[test]
fn overlong_query_is_rejected() {
    let config = test_config();
    let service = SearchService::new(
        FixedEmbedder::new(vec![1.0, 0.0, 0.0]),
        seeded_index(),
        &config,
    );

    let query = "a".repeat(1001);
    let error = service
        .search(&query, 3)
        .expect_err("overlong query should be rejected");
    assert!(matches!(error, MenuError::InvalidQuery(_)));
}

#[test]
fn query_is_normalized_before_embedding() {
    let config = test_config();
    let embedder = FixedEmbedder::new(vec![1.0, 0.0, 0.0]);
    let service = SearchService::new(&embedder, seeded_index(), &config);

    service
        .search("  ¿Dónde configuro las ALERTAS?  ", 3)
        .expect("search should succeed");

    let requests = embedder
        .requests
        .lock()
        .expect("requests lock should not be poisoned");
    assert_eq!(*requests, vec!["¿donde configuro las alertas?".to_string()]);
}

#[test]
fn results_come_back_in_descending_score_order() {
    let config = test_config();
    let service = SearchService::new(
        FixedEmbedder::new(vec![1.0, 0.0, 0.0]),
        seeded_index(),
        &config,
    );

    let response = service.search("alertas", 3).expect("search should succeed");

    assert_eq!(response.total, 3);
    assert_eq!(response.query, "alertas");
    let ids: Vec<i64> = response.hits.iter().map(|hit| hit.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(
        response
            .hits
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );
    assert!(
        response
            .hits
            .iter()
            .all(|hit| (0.0..=1.0).contains(&hit.score))
    );
}

#[test]
fn low_scores_are_returned_not_filtered() {
    let config = test_config();
    let service = SearchService::new(
        FixedEmbedder::new(vec![1.0, 0.0, 0.0]),
        seeded_index(),
        &config,
    );

    let response = service.search("alertas", 3).expect("search should succeed");

    let lowest = response.hits.last().expect("three hits expected");
    assert_eq!(lowest.id, 3);
    assert!(lowest.score < 0.3, "seeded point 3 scores very low");
    assert_eq!(lowest.band(), ScoreBand::VeryLow);
}

#[test]
fn top_k_limits_the_result_count() {
    let config = test_config();
    let service = SearchService::new(
        FixedEmbedder::new(vec![1.0, 0.0, 0.0]),
        seeded_index(),
        &config,
    );

    let response = service.search("alertas", 2).expect("search should succeed");
    assert_eq!(response.total, 2);
    assert_eq!(response.hits.len(), 2);
}

#[test]
fn embedding_outage_is_reported_not_swallowed() {
    let config = test_config();
    let service = SearchService::new(FailingEmbedder, seeded_index(), &config);

    let error = service
        .search("alertas", 3)
        .expect_err("outage must not become an empty result list");
    assert!(matches!(error, MenuError::EmbeddingUnavailable(_)));
}

#[test]
fn missing_collection_is_reported_as_index_unavailable() {
    let config = test_config();
    let service = SearchService::new(
        FixedEmbedder::new(vec![1.0, 0.0, 0.0]),
        InMemoryIndex::new(),
        &config,
    );

    let error = service
        .search("alertas", 3)
        .expect_err("missing collection must not become an empty result list");
    assert!(matches!(error, MenuError::IndexUnavailable(_)));
}

#[test]
fn score_bands_follow_the_documented_thresholds() {
    assert_eq!(ScoreBand::classify(0.95), ScoreBand::NearExact);
    assert_eq!(ScoreBand::classify(0.9), ScoreBand::NearExact);
    assert_eq!(ScoreBand::classify(0.85), ScoreBand::High);
    assert_eq!(ScoreBand::classify(0.7), ScoreBand::High);
    assert_eq!(ScoreBand::classify(0.6), ScoreBand::Moderate);
    assert_eq!(ScoreBand::classify(0.5), ScoreBand::Moderate);
    assert_eq!(ScoreBand::classify(0.4), ScoreBand::Low);
    assert_eq!(ScoreBand::classify(0.3), ScoreBand::Low);
    assert_eq!(ScoreBand::classify(0.29), ScoreBand::VeryLow);
    assert_eq!(ScoreBand::classify(0.0), ScoreBand::VeryLow);
}
