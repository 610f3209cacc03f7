//! Backend factory for storage and embedding initialization.
//!
//! ```text
//! BackendFactory
//!   ├── create_document_store() → Arc<dyn DocumentStore>
//!   ├── create_vector_store()   → Option<Arc<dyn VectorStore>>
//!   └── create_embedder()       → Arc<dyn Embedder>
//! ```
//!
//! # Graceful Degradation
//!
//! The document store is required. The vector store is optional: it is
//! `None` when disabled in configuration, and an unreachable ChromaDB server
//! is logged without failing startup so the document workflows stay usable.

use crate::config::{EmbeddingConfig, EmbeddingProvider, OrgloomConfig};
use crate::embedding::{
    Embedder, FailoverEmbedder, HashEmbedder, HttpConfig, OllamaEmbedder, OpenAiEmbedder,
    RetryPolicy,
};
use crate::storage::{
    ChromaVectorStore, DocumentStore, InMemoryDocumentStore, InMemoryVectorStore,
    SqliteDocumentStore, VectorStore,
};
use crate::Result;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

/// Dimensions of the offline hash embedder when none are configured.
pub const DEFAULT_HASH_DIMENSIONS: usize = 384;

/// Backends built from configuration.
pub struct BackendSet {
    /// Authoritative document store.
    pub documents: Arc<dyn DocumentStore>,
    /// Vector store, if enabled.
    pub vectors: Option<Arc<dyn VectorStore>>,
    /// Embedder for vector sync.
    pub embedder: Arc<dyn Embedder>,
}

impl BackendSet {
    /// Returns true if vector similarity is available.
    #[must_use]
    pub fn has_vector(&self) -> bool {
        self.vectors.is_some()
    }
}

/// Factory for creating backends.
pub struct BackendFactory;

impl BackendFactory {
    /// Creates all backends from `config`.
    ///
    /// With `ephemeral`, both stores live in memory and nothing touches disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the document store cannot be opened.
    pub fn create_all(config: &OrgloomConfig, ephemeral: bool) -> Result<BackendSet> {
        let documents = if ephemeral {
            tracing::debug!("Using in-memory document store");
            Arc::new(InMemoryDocumentStore::new()) as Arc<dyn DocumentStore>
        } else {
            Self::create_document_store(config)?
        };
        let vectors = Self::create_vector_store(config, ephemeral);
        let embedder = Self::create_embedder(&config.embedding);
        Ok(BackendSet {
            documents,
            vectors,
            embedder,
        })
    }

    /// Opens the `SQLite` document store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn create_document_store(config: &OrgloomConfig) -> Result<Arc<dyn DocumentStore>> {
        let path = config.database_path();
        let store = SqliteDocumentStore::new(&path)?;
        tracing::debug!(path = %path.display(), "Opened SQLite document store");
        Ok(Arc::new(store))
    }

    /// Creates the vector store.
    ///
    /// A configured Chroma URL selects [`ChromaVectorStore`]; otherwise the
    /// in-process store is used, persisted under the data directory unless
    /// `ephemeral`.
    #[must_use]
    pub fn create_vector_store(config: &OrgloomConfig, ephemeral: bool) -> Option<Arc<dyn VectorStore>> {
        if !config.chroma.enabled {
            tracing::debug!("Vector store disabled");
            return None;
        }

        if let Some(url) = &config.chroma.url {
            let store = ChromaVectorStore::new(url.clone())
                .with_tenant(config.chroma.tenant.clone(), config.chroma.database.clone())
                .with_http_config(http_config(&config.embedding));
            if let Err(e) = store.heartbeat() {
                tracing::warn!(url = %url, error = %e, "ChromaDB heartbeat failed, continuing");
            }
            return Some(Arc::new(store));
        }

        if ephemeral {
            return Some(Arc::new(InMemoryVectorStore::new()));
        }
        let path = config.vector_snapshot_path();
        match InMemoryVectorStore::with_path(&path) {
            Ok(store) => {
                tracing::debug!(path = %path.display(), "Created file-backed vector store");
                Some(Arc::new(store))
            },
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load vector snapshot, using an empty in-memory store"
                );
                Some(Arc::new(InMemoryVectorStore::new()))
            },
        }
    }

    /// Creates the embedder for the configured provider.
    ///
    /// Ollama is wrapped in a [`FailoverEmbedder`] that falls back to `OpenAI`
    /// when an API key is configured.
    #[must_use]
    pub fn create_embedder(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
        match config.provider {
            EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(
                config.dimensions.unwrap_or(DEFAULT_HASH_DIMENSIONS),
            )),
            EmbeddingProvider::OpenAi => Arc::new(openai_embedder(config, true)),
            EmbeddingProvider::Ollama => {
                let mut ollama = OllamaEmbedder::new()
                    .with_retry(retry_policy(config))
                    .with_http_config(http_config(config));
                if let Some(url) = &config.url {
                    ollama = ollama.with_endpoint(url.clone());
                }
                if let Some(model) = &config.model {
                    ollama = ollama.with_model(
                        model.clone(),
                        config.dimensions.unwrap_or(OllamaEmbedder::DEFAULT_DIMENSIONS),
                    );
                }
                if config.api_key.is_some() {
                    tracing::debug!("Ollama embedder with OpenAI failover");
                    Arc::new(FailoverEmbedder::new(
                        Box::new(ollama),
                        Box::new(openai_embedder(config, false)),
                    ))
                } else {
                    Arc::new(ollama)
                }
            },
        }
    }
}

fn openai_embedder(config: &EmbeddingConfig, primary: bool) -> OpenAiEmbedder {
    let mut openai = OpenAiEmbedder::new()
        .with_retry(retry_policy(config))
        .with_http_config(http_config(config));
    if let Some(key) = &config.api_key {
        openai = openai.with_api_key(key.expose_secret());
    }
    if primary {
        if let Some(url) = &config.url {
            openai = openai.with_endpoint(url.clone());
        }
        if let Some(model) = &config.model {
            openai = openai.with_model(
                model.clone(),
                config.dimensions.unwrap_or(OpenAiEmbedder::DEFAULT_DIMENSIONS),
            );
        }
    }
    openai
}

fn retry_policy(config: &EmbeddingConfig) -> RetryPolicy {
    RetryPolicy::new(config.retries, Duration::from_millis(config.retry_base_ms))
}

fn http_config(config: &EmbeddingConfig) -> HttpConfig {
    HttpConfig {
        timeout_ms: config.timeout_ms,
        ..HttpConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_backends() {
        let config = OrgloomConfig::default();
        let backends = BackendFactory::create_all(&config, true).unwrap();
        assert_eq!(backends.documents.backend_name(), "memory");
        assert!(backends.has_vector());
    }

    #[test]
    fn test_disabled_vector_store() {
        let mut config = OrgloomConfig::default();
        config.chroma.enabled = false;
        assert!(BackendFactory::create_vector_store(&config, true).is_none());
    }

    #[test]
    fn test_on_disk_backends() {
        let dir = tempfile::tempdir().unwrap();
        let config = OrgloomConfig::default().with_data_dir(dir.path());
        let backends = BackendFactory::create_all(&config, false).unwrap();
        assert_eq!(backends.documents.backend_name(), "sqlite");
        assert!(dir.path().join("orgloom.db").exists());
    }

    #[test]
    fn test_embedder_selection() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Hash,
            dimensions: Some(12),
            ..EmbeddingConfig::default()
        };
        let embedder = BackendFactory::create_embedder(&config);
        assert_eq!(embedder.dimensions(), 12);

        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Ollama,
            model: Some("mxbai-embed-large".to_string()),
            dimensions: Some(1024),
            ..EmbeddingConfig::default()
        };
        let embedder = BackendFactory::create_embedder(&config);
        assert_eq!(embedder.model_name(), "mxbai-embed-large");
        assert_eq!(embedder.dimensions(), 1024);
    }
}
