//! Vector store trait.
//!
//! Embeddings are grouped into named collections, one per record kind and
//! organization (`entities_{orgId}`, `relations_{orgId}`, `topics_{orgId}`).
//!
//! # Available Implementations
//!
//! | Backend | Use Case |
//! |---------|----------|
//! | `InMemoryVectorStore` | Tests, offline use, optional JSON file persistence |
//! | `ChromaVectorStore` | A running ChromaDB server |

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An embedding with its source text and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record ID (the document ID it was built from).
    pub id: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Text the embedding was computed from.
    #[serde(default)]
    pub document: Option<String>,
    /// Flat metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    /// Creates a record with no document text or metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            embedding,
            document: None,
            metadata: Map::new(),
        }
    }

    /// Sets the document text.
    #[must_use]
    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A similarity search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Record ID.
    pub id: String,
    /// Similarity normalized to `0.0..=1.0`, higher is closer.
    pub score: f32,
    /// Stored document text.
    pub document: Option<String>,
    /// Stored metadata.
    pub metadata: Map<String, Value>,
}

/// Trait for vector stores.
///
/// Methods take `&self`; implementations use interior mutability so a store
/// can be shared as `Arc<dyn VectorStore>`. Reads against a collection that
/// does not exist behave as reads against an empty collection.
pub trait VectorStore: Send + Sync {
    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding dimensions do not match the
    /// collection or the write fails.
    fn upsert(&self, collection: &str, record: VectorRecord) -> Result<()>;

    /// Reads a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, collection: &str, id: &str) -> Result<Option<VectorRecord>>;

    /// Returns true if a record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn contains(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id)?.is_some())
    }

    /// Removes a record, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn remove(&self, collection: &str, id: &str) -> Result<bool>;

    /// Returns the `limit` most similar records, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    fn query(&self, collection: &str, embedding: &[f32], limit: usize)
    -> Result<Vec<VectorMatch>>;

    /// Counts records in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn count(&self, collection: &str) -> Result<usize>;

    /// Lists record IDs in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn list_ids(&self, collection: &str) -> Result<Vec<String>>;

    /// Lists collection names.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn list_collections(&self) -> Result<Vec<String>>;

    /// Drops a collection, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_collection(&self, collection: &str) -> Result<bool>;
}
