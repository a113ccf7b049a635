use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::config::EmbeddingConfig;

fn test_config(url: &str) -> EmbeddingConfig {
    EmbeddingConfig {
        base_url: url.to_string(),
        api_key: "sk-test".to_string(),
        model: "text-embedding-3-small".to_string(),
        dimension: 4,
        batch_size: 8,
        timeout_seconds: 5,
        max_retries: 0,
        max_concurrent_batches: 1,
    }
}

fn embedding_body(vectors: &[(usize, [f32; 4])]) -> serde_json::Value {
    let data: Vec<_> = vectors
        .iter()
        .map(|(index, embedding)| json!({"index": index, "embedding": embedding, "object": "embedding"}))
        .collect();
    json!({"object": "list", "data": data, "model": "text-embedding-3-small"})
}

#[test]
fn client_configuration() {
    let config = test_config("http://embeddings.test:8080");
    let client = OpenAiEmbedder::new(&config).expect("client should build");

    assert_eq!(client.model, "text-embedding-3-small");
    assert_eq!(client.dimension(), 4);
    assert_eq!(client.batch_size, 8);
    assert_eq!(client.max_retries, 0);
    assert_eq!(client.base_url.host_str(), Some("embeddings.test"));
}

#[test]
fn builder_methods_override_settings() {
    let client = OpenAiEmbedder::new(&test_config("http://localhost:9999"))
        .expect("client should build")
        .with_timeout(std::time::Duration::from_secs(60))
        .with_max_retries(5);

    assert_eq!(client.max_retries, 5);
}

#[test]
fn empty_input_short_circuits_without_a_request() {
    let client = OpenAiEmbedder::new(&test_config("http://127.0.0.1:9"))
        .expect("client should build");

    let vectors = client.embed(&[]).expect("empty input should succeed");
    assert!(vectors.is_empty());
}

#[tokio::test]
async fn embeds_a_batch_in_request_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": ["first text", "second text"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(&[
            // Out of order on purpose: the client must re-order by index.
            (1, [0.0, 1.0, 0.0, 0.0]),
            (0, [1.0, 0.0, 0.0, 0.0]),
        ])))
        .mount(&server)
        .await;

    let client = OpenAiEmbedder::new(&test_config(&server.uri())).expect("client should build");
    let vectors = client
        .embed(&["first text".to_string(), "second text".to_string()])
        .expect("embedding should succeed");

    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0], vec![1.0, 0.0, 0.0, 0.0]);
    assert_eq!(vectors[1], vec![0.0, 1.0, 0.0, 0.0]);
}

#[tokio::test]
async fn large_inputs_are_chunked_by_batch_size() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({"input": ["a", "b"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(&[
            (0, [1.0, 0.0, 0.0, 0.0]),
            (1, [0.0, 1.0, 0.0, 0.0]),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({"input": ["c"]})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_body(&[(0, [0.0, 0.0, 1.0, 0.0])])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = EmbeddingConfig {
        batch_size: 2,
        ..test_config(&server.uri())
    };
    let client = OpenAiEmbedder::new(&config).expect("client should build");
    let vectors = client
        .embed(&["a".to_string(), "b".to_string(), "c".to_string()])
        .expect("embedding should succeed");

    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[2], vec![0.0, 0.0, 1.0, 0.0]);
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let config = EmbeddingConfig {
        max_retries: 3,
        ..test_config(&server.uri())
    };
    let client = OpenAiEmbedder::new(&config).expect("client should build");

    let error = client
        .embed(&["text".to_string()])
        .expect_err("auth failure should be surfaced");
    assert!(matches!(error, crate::MenuError::EmbeddingUnavailable(_)));
    assert_eq!(error.code(), "EMBEDDING_UNAVAILABLE");
    assert!(error.to_string().contains("authentication"));
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_body(&[(0, [1.0, 0.0, 0.0, 0.0])])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = EmbeddingConfig {
        max_retries: 2,
        ..test_config(&server.uri())
    };
    let client = OpenAiEmbedder::new(&config).expect("client should build");

    let vectors = client
        .embed(&["text".to_string()])
        .expect("retry should recover");
    assert_eq!(vectors.len(), 1);
}

#[tokio::test]
async fn response_count_mismatch_is_detected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_body(&[(0, [1.0, 0.0, 0.0, 0.0])])),
        )
        .mount(&server)
        .await;

    let client = OpenAiEmbedder::new(&test_config(&server.uri())).expect("client should build");
    let error = client
        .embed(&["one".to_string(), "two".to_string()])
        .expect_err("count mismatch should be surfaced");
    assert!(error.to_string().contains("count mismatch"));
}

#[tokio::test]
async fn dimension_mismatch_is_detected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"data": [{"index": 0, "embedding": [1.0, 0.0]}]}),
        ))
        .mount(&server)
        .await;

    let client = OpenAiEmbedder::new(&test_config(&server.uri())).expect("client should build");
    let error = client
        .embed(&["text".to_string()])
        .expect_err("dimension mismatch should be surfaced");
    assert!(error.to_string().contains("dimension mismatch"));
}

#[tokio::test]
async fn ping_checks_the_models_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiEmbedder::new(&test_config(&server.uri())).expect("client should build");
    client.ping().expect("ping should succeed");
}

#[test]
fn unreachable_provider_surfaces_as_embedding_unavailable() {
    let config = EmbeddingConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_seconds: 1,
        ..test_config("http://127.0.0.1:9")
    };
    let client = OpenAiEmbedder::new(&config).expect("client should build");

    let error = client
        .embed(&["text".to_string()])
        .expect_err("unreachable provider should be unavailable");
    assert!(matches!(error, crate::MenuError::EmbeddingUnavailable(_)));
}
