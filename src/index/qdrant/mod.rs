
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::{CollectionInfo, DistanceMetric, IndexPoint, ScoredPoint, VectorIndex};
use crate::config::IndexConfig;
use crate::{MenuError, Result};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Qdrant REST client implementing the vector index gateway.
#[derive(Debug, Clone)]
pub struct QdrantIndex {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: DistanceMetric,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct UpsertPointsRequest {
    points: Vec<PointStruct>,
}

#[derive(Debug, Serialize)]
struct PointStruct {
    id: i64,
    vector: Vec<f32>,
    payload: Value,
}

#[derive(Debug, Serialize)]
struct DeletePointsRequest {
    points: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct SearchPointsRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    status: String,
    #[serde(default)]
    points_count: Option<u64>,
    config: CollectionConfigDto,
}

#[derive(Debug, Deserialize)]
struct CollectionConfigDto {
    params: CollectionParamsDto,
}

#[derive(Debug, Deserialize)]
struct CollectionParamsDto {
    vectors: VectorParamsDto,
}

#[derive(Debug, Deserialize)]
struct VectorParamsDto {
    size: usize,
    distance: DistanceMetric,
}

#[derive(Debug, Deserialize)]
struct ScoredPointDto {
    id: i64,
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

impl QdrantIndex {
    #[inline]
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let base_url = config
            .index_url()
            .map_err(|e| MenuError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            agent,
            max_retries: config.max_retries,
        })
    }

    #[inline]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MenuError::Config(format!("invalid index URL for {path:?}: {e}")))
    }

    fn get(&self, url: &Url) -> std::result::Result<String, ureq::Error> {
        let mut request = self.agent.get(url.as_str());
        if !self.api_key.is_empty() {
            request = request.header("api-key", &self.api_key);
        }
        request.call().and_then(|mut resp| resp.body_mut().read_to_string())
    }

    fn send(&self, method: &str, url: &Url, body: &str) -> std::result::Result<String, ureq::Error> {
        let mut request = match method {
            "PUT" => self.agent.put(url.as_str()),
            _ => self.agent.post(url.as_str()),
        };
        request = request.header("Content-Type", "application/json");
        if !self.api_key.is_empty() {
            request = request.header("api-key", &self.api_key);
        }
        request.send(body).and_then(|mut resp| resp.body_mut().read_to_string())
    }

    fn delete(&self, url: &Url) -> std::result::Result<String, ureq::Error> {
        let mut request = self.agent.delete(url.as_str());
        if !self.api_key.is_empty() {
            request = request.header("api-key", &self.api_key);
        }
        request.call().and_then(|mut resp| resp.body_mut().read_to_string())
    }

    /// Run a request, retrying transient failures (5xx, transport) with
    /// exponential backoff. Status errors below 500 are returned to the
    /// caller untouched so it can map 404 and friends.
    fn call_with_retry<F>(&self, mut request_fn: F) -> std::result::Result<String, ureq::Error>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let attempts = self.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let retryable = match &error {
                        ureq::Error::StatusCode(status) => *status >= 500,
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => true,
                        _ => false,
                    };

                    if !retryable {
                        return Err(error);
                    }

                    warn!(
                        "Transient vector store error: {}, attempt {}/{}",
                        error, attempt, attempts
                    );
                    last_error = Some(error);

                    if attempt < attempts {
                        let delay =
                            Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 500);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ureq::Error::ConnectionFailed))
    }

    fn unavailable(operation: &str, error: &ureq::Error) -> MenuError {
        MenuError::IndexUnavailable(format!("{operation} failed: {error}"))
    }

    fn parse<T: serde::de::DeserializeOwned>(operation: &str, text: &str) -> Result<T> {
        serde_json::from_str::<ApiResponse<T>>(text)
            .map(|response| response.result)
            .map_err(|e| {
                MenuError::IndexUnavailable(format!("{operation} returned unexpected body: {e}"))
            })
    }

    fn fetch_collection(&self, name: &str) -> Result<Option<CollectionDescription>> {
        let url = self.endpoint(&format!("/collections/{name}"))?;
        match self.call_with_retry(|| self.get(&url)) {
            Ok(text) => Ok(Some(Self::parse("describe collection", &text)?)),
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(error) => Err(Self::unavailable("describe collection", &error)),
        }
    }

    fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let url = self.endpoint(&format!("/collections/{name}"))?;
        let request = CreateCollectionRequest {
            vectors: VectorParams {
                size: dimension,
                distance: metric,
            },
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| MenuError::IndexUnavailable(format!("failed to serialize request: {e}")))?;

        self.call_with_retry(|| self.send("PUT", &url, &body))
            .map_err(|e| Self::unavailable("create collection", &e))?;

        info!(
            "Created collection '{}' (dimension {}, metric {})",
            name, dimension, metric
        );
        Ok(())
    }
}

impl VectorIndex for QdrantIndex {
    #[inline]
    fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        match self.fetch_collection(name)? {
            Some(description) => {
                let params = description.config.params.vectors;
                if params.size == dimension && params.distance == metric {
                    debug!("Collection '{}' already exists with matching schema", name);
                    Ok(())
                } else {
                    Err(MenuError::SchemaMismatch(format!(
                        "collection '{}' exists with dimension {} metric {}, requested dimension {} metric {}",
                        name, params.size, params.distance, dimension, metric
                    )))
                }
            }
            None => self.create_collection(name, dimension, metric),
        }
    }

    #[inline]
    fn recreate_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let url = self.endpoint(&format!("/collections/{name}"))?;
        match self.call_with_retry(|| self.delete(&url)) {
            Ok(_) => debug!("Dropped collection '{}'", name),
            // Nothing to drop on a first run.
            Err(ureq::Error::StatusCode(404)) => {}
            Err(error) => return Err(Self::unavailable("drop collection", &error)),
        }

        self.create_collection(name, dimension, metric)
    }

    #[inline]
    fn describe_collection(&self, name: &str) -> Result<CollectionInfo> {
        let description = self
            .fetch_collection(name)?
            .ok_or_else(|| MenuError::NotFound(format!("collection '{name}' does not exist")))?;

        let params = description.config.params.vectors;
        Ok(CollectionInfo {
            points_count: description.points_count.unwrap_or(0),
            dimension: params.size,
            metric: params.distance,
            status: description.status,
        })
    }

    #[inline]
    fn upsert_point(&self, name: &str, point: IndexPoint) -> Result<()> {
        let url = self.endpoint(&format!("/collections/{name}/points?wait=true"))?;
        let request = UpsertPointsRequest {
            points: vec![PointStruct {
                id: point.id,
                vector: point.vector,
                payload: point.payload,
            }],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| MenuError::IndexUnavailable(format!("failed to serialize request: {e}")))?;

        self.call_with_retry(|| self.send("PUT", &url, &body))
            .map_err(|e| match e {
                ureq::Error::StatusCode(404) => {
                    MenuError::IndexUnavailable(format!("collection '{name}' does not exist"))
                }
                error => Self::unavailable("upsert point", &error),
            })?;

        debug!("Upserted point {} into collection '{}'", point.id, name);
        Ok(())
    }

    #[inline]
    fn delete_point(&self, name: &str, id: i64) -> Result<()> {
        // Existence check first: qdrant's delete succeeds for absent ids,
        // but callers must be able to tell "nothing to do" from an outage.
        let point_url = self.endpoint(&format!("/collections/{name}/points/{id}"))?;
        match self.call_with_retry(|| self.get(&point_url)) {
            Ok(_) => {}
            Err(ureq::Error::StatusCode(404)) => {
                return Err(MenuError::NotFound(format!(
                    "point {id} does not exist in collection '{name}'"
                )));
            }
            Err(error) => return Err(Self::unavailable("retrieve point", &error)),
        }

        let url = self.endpoint(&format!("/collections/{name}/points/delete?wait=true"))?;
        let request = DeletePointsRequest { points: vec![id] };
        let body = serde_json::to_string(&request)
            .map_err(|e| MenuError::IndexUnavailable(format!("failed to serialize request: {e}")))?;

        self.call_with_retry(|| self.send("POST", &url, &body))
            .map_err(|e| Self::unavailable("delete point", &e))?;

        debug!("Deleted point {} from collection '{}'", id, name);
        Ok(())
    }

    #[inline]
    fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let url = self.endpoint(&format!("/collections/{name}/points/search"))?;
        let request = SearchPointsRequest {
            vector,
            limit,
            with_payload: true,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| MenuError::IndexUnavailable(format!("failed to serialize request: {e}")))?;

        let text = self
            .call_with_retry(|| self.send("POST", &url, &body))
            .map_err(|e| match e {
                ureq::Error::StatusCode(404) => {
                    MenuError::IndexUnavailable(format!("collection '{name}' does not exist"))
                }
                error => Self::unavailable("search", &error),
            })?;

        let hits: Vec<ScoredPointDto> = Self::parse("search", &text)?;
        debug!("Search in '{}' returned {} hits", name, hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| ScoredPoint {
                id: hit.id,
                score: hit.score.clamp(0.0, 1.0),
                payload: hit.payload.unwrap_or(Value::Null),
            })
            .collect())
    }
}
