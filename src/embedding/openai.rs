//! OpenAI embeddings client.

use super::http::{AttemptError, with_retry};
use super::{Embedder, HttpConfig, RetryPolicy, build_http_client, prepare_input, record_request};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "openai";

/// Embeddings from the OpenAI API.
pub struct OpenAiEmbedder {
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
    client: reqwest::blocking::Client,
}

impl OpenAiEmbedder {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-small";

    /// Dimensions of `text-embedding-3-small`.
    pub const DEFAULT_DIMENSIONS: usize = 1536;

    /// Creates a client, reading `OPENAI_API_KEY` if set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            dimensions: Self::DEFAULT_DIMENSIONS,
            retry: RetryPolicy::default(),
            client: build_http_client(HttpConfig::default()),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
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

    /// Returns true if an API key is configured.
    #[must_use]
    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn attempt(&self, api_key: &str, input: &str) -> std::result::Result<Vec<f32>, AttemptError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input,
        };
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.endpoint))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .map_err(|e| {
                tracing::error!(
                    provider = PROVIDER,
                    model = %self.model,
                    error = %e,
                    error_kind = super::request_error_kind(&e),
                    "Embedding request failed"
                );
                AttemptError::from_transport("openai_embeddings", &e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(
                provider = PROVIDER,
                model = %self.model,
                status = %status,
                "Embedding API returned error status"
            );
            return Err(AttemptError::from_status("openai_embeddings", status, &body));
        }

        let parsed: EmbeddingResponse = response.json().map_err(|e| {
            AttemptError::Fatal(Error::OperationFailed {
                operation: "openai_embeddings_response".to_string(),
                cause: e.to_string(),
            })
        })?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                AttemptError::Fatal(Error::OperationFailed {
                    operation: "openai_embeddings_response".to_string(),
                    cause: "response contained no embedding".to_string(),
                })
            })
    }
}

impl Default for OpenAiEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::FeatureNotEnabled("OpenAI API key not configured".to_string()))?;
        let input = prepare_input(text)?;
        let result = with_retry(PROVIDER, self.retry, || {
            self.attempt(api_key.expose_secret(), &input)
        });
        record_request(PROVIDER, if result.is_ok() { "success" } else { "error" });
        result
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_feature_not_enabled() {
        let mut embedder = OpenAiEmbedder::new();
        embedder.api_key = None;
        assert!(matches!(
            embedder.embed("hello"),
            Err(Error::FeatureNotEnabled(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let embedder = OpenAiEmbedder::new().with_api_key("sk-test");
        assert!(embedder.has_api_key());
        assert_eq!(embedder.model_name(), "text-embedding-3-small");
        assert_eq!(embedder.dimensions(), 1536);
    }

    #[test]
    fn test_response_parsing() {
        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[0.1,0.2]}],"model":"x"}"#).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }
}
