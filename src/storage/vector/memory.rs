//! In-memory vector store with optional JSON persistence.
//!
//! Search is brute-force O(n) cosine similarity over one collection, which
//! is fine for the few thousand entities an organization typically has.

use crate::embedding::cosine_similarity;
use crate::storage::traits::{VectorMatch, VectorRecord, VectorStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const BACKEND: &str = "memory";

/// One named collection of embeddings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VectorCollection {
    /// Fixed by the first record written.
    dimensions: usize,
    records: BTreeMap<String, VectorRecord>,
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, VectorCollection>,
    dirty: bool,
}

/// Vector store kept in memory, optionally persisted to a JSON file.
///
/// Each collection takes its dimensions from the first record written to it;
/// later writes and queries with other dimensions are rejected.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    path: Option<PathBuf>,
    state: RwLock<State>,
}

impl InMemoryVectorStore {
    /// Creates a store without file persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store persisted at `path` and loads it if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: Some(path.into()),
            state: RwLock::default(),
        };
        store.load()?;
        Ok(store)
    }

    /// Returns the persistence path.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replaces the in-memory state with the file contents.
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "load_vector_store".to_string(),
            cause: e.to_string(),
        })?;
        let collections: BTreeMap<String, VectorCollection> =
            serde_json::from_str(&content).map_err(|e| Error::OperationFailed {
                operation: "parse_vector_store".to_string(),
                cause: e.to_string(),
            })?;

        let mut state = self.write();
        state.collections = collections;
        state.dirty = false;
        Ok(())
    }

    /// Writes the store to its file if anything changed since the last save.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut state = self.write();
        if !state.dirty {
            return Ok(());
        }

        let content =
            serde_json::to_string(&state.collections).map_err(|e| Error::OperationFailed {
                operation: "serialize_vector_store".to_string(),
                cause: e.to_string(),
            })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_vector_store_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        fs::write(path, content).map_err(|e| Error::OperationFailed {
            operation: "write_vector_store".to_string(),
            cause: e.to_string(),
        })?;

        state.dirty = false;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| {
            tracing::warn!(backend = BACKEND, "Vector store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| {
            tracing::warn!(backend = BACKEND, "Vector store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

fn dimension_mismatch(collection: &str, expected: usize, got: usize) -> Error {
    Error::InvalidInput(format!(
        "embedding dimension mismatch in '{collection}': expected {expected}, got {got}"
    ))
}

impl VectorStore for InMemoryVectorStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn upsert(&self, collection: &str, record: VectorRecord) -> Result<()> {
        if record.embedding.is_empty() {
            return Err(Error::InvalidInput("embedding is empty".to_string()));
        }
        let mut state = self.write();
        let target = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| VectorCollection {
                dimensions: record.embedding.len(),
                records: BTreeMap::new(),
            });
        if target.records.is_empty() {
            target.dimensions = record.embedding.len();
        } else if target.dimensions != record.embedding.len() {
            return Err(dimension_mismatch(
                collection,
                target.dimensions,
                record.embedding.len(),
            ));
        }
        target.records.insert(record.id.clone(), record);
        state.dirty = true;
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<VectorRecord>> {
        Ok(self
            .read()
            .collections
            .get(collection)
            .and_then(|c| c.records.get(id))
            .cloned())
    }

    fn remove(&self, collection: &str, id: &str) -> Result<bool> {
        let mut state = self.write();
        let removed = state
            .collections
            .get_mut(collection)
            .is_some_and(|c| c.records.remove(id).is_some());
        if removed {
            state.dirty = true;
        }
        Ok(removed)
    }

    fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorMatch>> {
        let state = self.read();
        let Some(target) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        if !target.records.is_empty() && target.dimensions != embedding.len() {
            return Err(dimension_mismatch(
                collection,
                target.dimensions,
                embedding.len(),
            ));
        }

        let mut matches: Vec<VectorMatch> = target
            .records
            .values()
            .map(|record| VectorMatch {
                id: record.id.clone(),
                score: f32::midpoint(cosine_similarity(embedding, &record.embedding), 1.0),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .read()
            .collections
            .get(collection)
            .map_or(0, |c| c.records.len()))
    }

    fn list_ids(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .read()
            .collections
            .get(collection)
            .map(|c| c.records.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.read().collections.keys().cloned().collect())
    }

    fn delete_collection(&self, collection: &str) -> Result<bool> {
        let mut state = self.write();
        let removed = state.collections.remove(collection).is_some();
        if removed {
            state.dirty = true;
        }
        Ok(removed)
    }
}

impl Drop for InMemoryVectorStore {
    fn drop(&mut self) {
        if let Err(e) = self.save() {
            tracing::warn!(error = %e, "Failed to save vector store on drop");
        }
    }
}
