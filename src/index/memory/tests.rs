use serde_json::json;

use super::*;

const COLLECTION: &str = "test_items";

fn point(id: i64, vector: Vec<f32>) -> IndexPoint {
    IndexPoint {
        id,
        vector,
        payload: json!({"id": id}),
    }
}

fn seeded_index() -> InMemoryIndex {
    let index = InMemoryIndex::new();
    index
        .ensure_collection(COLLECTION, 3, DistanceMetric::Cosine)
        .expect("collection should be created");
    index
        .upsert_point(COLLECTION, point(1, vec![1.0, 0.0, 0.0]))
        .expect("point should be upserted");
    index
        .upsert_point(COLLECTION, point(2, vec![0.0, 1.0, 0.0]))
        .expect("point should be upserted");
    index
}

#[test]
fn ensure_collection_is_idempotent() {
    let index = InMemoryIndex::new();
    index
        .ensure_collection(COLLECTION, 3, DistanceMetric::Cosine)
        .expect("first ensure should succeed");
    index
        .ensure_collection(COLLECTION, 3, DistanceMetric::Cosine)
        .expect("second ensure with same schema should be a no-op");
}

#[test]
fn ensure_collection_detects_schema_drift() {
    let index = InMemoryIndex::new();
    index
        .ensure_collection(COLLECTION, 3, DistanceMetric::Cosine)
        .expect("collection should be created");

    let error = index
        .ensure_collection(COLLECTION, 4, DistanceMetric::Cosine)
        .expect_err("different dimension should be rejected");
    assert!(matches!(error, crate::MenuError::SchemaMismatch(_)));

    let error = index
        .ensure_collection(COLLECTION, 3, DistanceMetric::Dot)
        .expect_err("different metric should be rejected");
    assert_eq!(error.code(), "SCHEMA_MISMATCH");
}

#[test]
fn upsert_same_id_replaces_the_point() {
    let index = seeded_index();

    index
        .upsert_point(COLLECTION, point(1, vec![0.0, 0.0, 1.0]))
        .expect("second upsert should succeed");

    let info = index
        .describe_collection(COLLECTION)
        .expect("collection should describe");
    assert_eq!(info.points_count, 2, "upsert must replace, not duplicate");

    let hits = index
        .search(COLLECTION, &[0.0, 0.0, 1.0], 1)
        .expect("search should succeed");
    assert_eq!(hits[0].id, 1);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn upsert_rejects_wrong_dimension() {
    let index = seeded_index();

    let error = index
        .upsert_point(COLLECTION, point(3, vec![1.0, 0.0]))
        .expect_err("short vector should be rejected");
    assert!(matches!(error, crate::MenuError::SchemaMismatch(_)));
}

#[test]
fn search_orders_by_similarity_descending() {
    let index = seeded_index();
    index
        .upsert_point(COLLECTION, point(3, vec![0.7, 0.7, 0.0]))
        .expect("point should be upserted");

    let hits = index
        .search(COLLECTION, &[1.0, 0.1, 0.0], 3)
        .expect("search should succeed");

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, 1);
    assert_eq!(hits[1].id, 3);
    assert_eq!(hits[2].id, 2);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
}

#[test]
fn search_respects_limit() {
    let index = seeded_index();

    let hits = index
        .search(COLLECTION, &[1.0, 0.0, 0.0], 1)
        .expect("search should succeed");
    assert_eq!(hits.len(), 1);
}

#[test]
fn opposite_vectors_clamp_to_zero_score() {
    let index = seeded_index();

    let hits = index
        .search(COLLECTION, &[-1.0, 0.0, 0.0], 2)
        .expect("search should succeed");
    let against_one = hits
        .iter()
        .find(|h| h.id == 1)
        .expect("point 1 should be present");
    assert_eq!(against_one.score, 0.0);
}

#[test]
fn delete_absent_point_is_not_found() {
    let index = seeded_index();

    let error = index
        .delete_point(COLLECTION, 99)
        .expect_err("absent id should be NotFound");
    assert!(matches!(error, crate::MenuError::NotFound(_)));
    assert_eq!(error.code(), "NOT_FOUND");
}

#[test]
fn delete_removes_the_point_from_results() {
    let index = seeded_index();

    index
        .delete_point(COLLECTION, 1)
        .expect("delete should succeed");

    let hits = index
        .search(COLLECTION, &[1.0, 0.0, 0.0], 5)
        .expect("search should succeed");
    assert!(hits.iter().all(|h| h.id != 1));
}

#[test]
fn recreate_collection_discards_points() {
    let index = seeded_index();

    index
        .recreate_collection(COLLECTION, 3, DistanceMetric::Cosine)
        .expect("recreate should succeed");

    let info = index
        .describe_collection(COLLECTION)
        .expect("collection should describe");
    assert_eq!(info.points_count, 0);
}

#[test]
fn missing_collection_errors_are_distinct() {
    let index = InMemoryIndex::new();

    assert!(matches!(
        index.describe_collection("nope"),
        Err(crate::MenuError::NotFound(_))
    ));
    assert!(matches!(
        index.search("nope", &[1.0], 1),
        Err(crate::MenuError::IndexUnavailable(_))
    ));
}
