//! Embedding generation.
//!
//! Providers:
//! - [`OllamaEmbedder`]: local Ollama server (`nomic-embed-text`)
//! - [`OpenAiEmbedder`]: OpenAI embeddings API
//! - [`FailoverEmbedder`]: tries a primary provider, then a secondary
//! - [`HashEmbedder`]: deterministic feature hashing, no network
//!
//! Text is always cleaned with [`prepare_input`] before it is sent.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

mod failover;
mod hash;
mod http;
mod ollama;
mod openai;
mod similarity;
pub mod text;

pub use failover::FailoverEmbedder;
pub use hash::HashEmbedder;
pub use http::{HttpConfig, RetryPolicy, build_http_client, request_error_kind};
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;
pub use similarity::{cosine_similarity, euclidean_distance};

use crate::{Error, Result};

/// Version tag written into vector metadata.
pub const EMBEDDING_VERSION: &str = "1.0";

/// Trait for embedding generators.
pub trait Embedder: Send + Sync {
    /// Model identifier, written into vector metadata.
    fn model_name(&self) -> &str;

    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for empty text, or an error if the
    /// provider fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts, in order.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Strips HTML tags and trims the text.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if nothing is left.
pub fn prepare_input(text: &str) -> Result<String> {
    let cleaned = text::strip_html(text);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(Error::InvalidInput("text is empty".to_string()));
    }
    Ok(cleaned.to_string())
}

fn record_request(provider: &'static str, status: &'static str) {
    metrics::counter!(
        "embedding_requests_total",
        "provider" => provider,
        "status" => status
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_input_strips_tags() {
        assert_eq!(prepare_input("  <p>Hello <b>world</b></p> ").unwrap(), "Hello world");
    }

    #[test]
    fn test_prepare_input_empty() {
        assert!(matches!(prepare_input("<br/>  "), Err(Error::InvalidInput(_))));
        assert!(matches!(prepare_input(""), Err(Error::InvalidInput(_))));
    }
}
