#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::embeddings::EmbeddingProvider;
use crate::{MenuError, Result};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Client for an OpenAI-compatible embeddings endpoint (`/v1/embeddings`).
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    base_url: Url,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    agent: ureq::Agent,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .provider_url()
            .map_err(|e| MenuError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension as usize,
            batch_size: config.batch_size as usize,
            agent,
            max_retries: config.max_retries,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let url = self
            .base_url
            .join("/v1/embeddings")
            .map_err(|e| MenuError::Config(format!("invalid embeddings URL: {e}")))?;

        let request_json = serde_json::to_string(&request).map_err(|e| {
            MenuError::EmbeddingUnavailable(format!("failed to serialize request: {e}"))
        })?;

        let response_text = self.request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbeddingsResponse = serde_json::from_str(&response_text).map_err(|e| {
            MenuError::EmbeddingUnavailable(format!("failed to parse embeddings response: {e}"))
        })?;

        if response.data.len() != texts.len() {
            return Err(MenuError::EmbeddingUnavailable(format!(
                "response count mismatch: requested {} embeddings, received {}",
                texts.len(),
                response.data.len()
            )));
        }

        // The provider tags each embedding with its input index; re-order so
        // position i always corresponds to texts[i].
        let mut data = response.data;
        data.sort_by_key(|object| object.index);

        for object in &data {
            if object.embedding.len() != self.dimension {
                return Err(MenuError::EmbeddingUnavailable(format!(
                    "embedding dimension mismatch: expected {}, received {}",
                    self.dimension,
                    object.embedding.len()
                )));
            }
        }

        Ok(data.into_iter().map(|object| object.embedding).collect())
    }

    fn request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let attempts = self.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!("Embedding request attempt {}/{}", attempt, attempts);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let retryable = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status == 401 || *status == 403 {
                                warn!("Embedding provider rejected credentials (HTTP {})", status);
                                return Err(MenuError::EmbeddingUnavailable(format!(
                                    "authentication failed (HTTP {status})"
                                )));
                            }
                            // Rate limits and server errors are transient.
                            *status == 429 || *status >= 500
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => true,
                        _ => false,
                    };

                    if !retryable {
                        return Err(MenuError::EmbeddingUnavailable(format!(
                            "request failed: {error}"
                        )));
                    }

                    warn!(
                        "Transient embedding provider error: {}, attempt {}/{}",
                        error, attempt, attempts
                    );
                    last_error = Some(error);

                    if attempt < attempts {
                        let delay =
                            Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 500);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!(
            "Embedding provider unreachable after {} attempts at {}",
            attempts, self.base_url
        );

        Err(MenuError::EmbeddingUnavailable(match last_error {
            Some(error) => format!("request failed after {attempts} attempts: {error}"),
            None => format!("request failed after {attempts} attempts"),
        }))
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            results.extend(self.embed_batch(chunk)?);
        }

        debug!("Generated {} embeddings", results.len());
        Ok(results)
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/v1/models")
            .map_err(|e| MenuError::Config(format!("invalid models URL: {e}")))?;

        self.request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        debug!("Embedding provider reachable at {}", self.base_url);
        Ok(())
    }
}
