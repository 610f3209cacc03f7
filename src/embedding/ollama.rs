//! Ollama embeddings client.

use super::http::{AttemptError, with_retry};
use super::{Embedder, HttpConfig, RetryPolicy, build_http_client, prepare_input, record_request};
use crate::Result;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "ollama";

/// Embeddings from a local Ollama server.
pub struct OllamaEmbedder {
    endpoint: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
    client: reqwest::blocking::Client,
}

impl OllamaEmbedder {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:11434";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "nomic-embed-text";

    /// Dimensions of `nomic-embed-text`.
    pub const DEFAULT_DIMENSIONS: usize = 768;

    /// Creates a client, reading `OLLAMA_HOST` if set.
    #[must_use]
    pub fn new() -> Self {
        let endpoint =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());
        Self {
            endpoint,
            model: Self::DEFAULT_MODEL.to_string(),
            dimensions: Self::DEFAULT_DIMENSIONS,
            retry: RetryPolicy::default(),
            client: build_http_client(HttpConfig::default()),
        }
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model and its dimensions.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Returns the endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn attempt(&self, prompt: &str) -> std::result::Result<Vec<f32>, AttemptError> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt,
        };
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.endpoint))
            .json(&request)
            .send()
            .map_err(|e| {
                tracing::error!(
                    provider = PROVIDER,
                    model = %self.model,
                    error = %e,
                    error_kind = super::request_error_kind(&e),
                    is_timeout = e.is_timeout(),
                    is_connect = e.is_connect(),
                    "Embedding request failed"
                );
                AttemptError::from_transport("ollama_embeddings", &e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(
                provider = PROVIDER,
                model = %self.model,
                status = %status,
                body = %body,
                "Embedding API returned error status"
            );
            return Err(AttemptError::from_status("ollama_embeddings", status, &body));
        }

        let parsed: EmbeddingResponse = response.json().map_err(|e| {
            AttemptError::Fatal(crate::Error::OperationFailed {
                operation: "ollama_embeddings_response".to_string(),
                cause: e.to_string(),
            })
        })?;
        if parsed.embedding.is_empty() {
            return Err(AttemptError::Fatal(crate::Error::OperationFailed {
                operation: "ollama_embeddings_response".to_string(),
                cause: "empty embedding".to_string(),
            }));
        }
        Ok(parsed.embedding)
    }
}

impl Default for OllamaEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let prompt = prepare_input(text)?;
        let result = with_retry(PROVIDER, self.retry, || self.attempt(&prompt));
        record_request(PROVIDER, if result.is_ok() { "success" } else { "error" });
        result
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::time::Duration;

    #[test]
    fn test_builder() {
        let embedder = OllamaEmbedder::new()
            .with_endpoint("http://ollama:11434/")
            .with_model("mxbai-embed-large", 1024);
        assert_eq!(embedder.endpoint(), "http://ollama:11434");
        assert_eq!(embedder.model_name(), "mxbai-embed-large");
        assert_eq!(embedder.dimensions(), 1024);
    }

    #[test]
    fn test_empty_text_rejected_before_request() {
        let embedder = OllamaEmbedder::new().with_endpoint("http://127.0.0.1:9");
        assert!(matches!(embedder.embed("   "), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unreachable_server_fails() {
        let embedder = OllamaEmbedder::new()
            .with_endpoint("http://127.0.0.1:9")
            .with_retry(RetryPolicy::new(1, Duration::ZERO))
            .with_http_config(HttpConfig {
                timeout_ms: 500,
                connect_timeout_ms: 200,
            });
        assert!(embedder.embed("hello").is_err());
    }
}
