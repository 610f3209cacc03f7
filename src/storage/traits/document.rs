//! Document store trait.
//!
//! The document store is the persistence collaborator behind every workflow
//! in the crate. It offers approximate Firestore semantics over whitelisted
//! [`Collection`]s.
//!
//! | Operation | Missing document | Existing document |
//! |-----------|------------------|-------------------|
//! | `get` | `None` | the document |
//! | `set` | inserted | fields replaced, `createdAt` kept |
//! | `update` | [`Error::NotFound`] | fields merged |
//! | `delete` | `false` | removed, `true` |
//! | `add` | inserted under a fresh UUID | n/a |

use crate::models::{Collection, Document, Fields, QueryConditions};
use crate::{Error, Result};
use serde::de::DeserializeOwned;

/// Trait for document stores.
///
/// Implementations must be thread-safe and use interior mutability so a
/// store can be shared as `Arc<dyn DocumentStore>`.
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in metrics and logs.
    fn backend_name(&self) -> &'static str;

    /// Reads a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Creates or replaces a document.
    ///
    /// `id` in `fields` is ignored. String `createdAt` / `updatedAt` values in
    /// `fields` are honoured; otherwise both default to now, and an existing
    /// document keeps its original `createdAt`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set(&self, collection: Collection, id: &str, fields: Fields) -> Result<Document>;

    /// Merges `fields` into an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the document does not exist.
    fn update(&self, collection: Collection, id: &str, fields: Fields) -> Result<Document>;

    /// Deletes a document, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, collection: Collection, id: &str) -> Result<bool>;

    /// Deletes several documents, returning how many existed.
    ///
    /// # Errors
    ///
    /// Returns an error if any delete fails.
    fn delete_many(&self, collection: Collection, ids: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete(collection, id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Deletes documents across collections as one unit.
    ///
    /// Returns, per target, whether the document existed. Backends with
    /// transactions either remove every target or none of them.
    ///
    /// # Errors
    ///
    /// Returns an error if any delete fails.
    fn delete_batch(&self, targets: &[(Collection, String)]) -> Result<Vec<bool>> {
        targets
            .iter()
            .map(|(collection, id)| self.delete(*collection, id))
            .collect()
    }

    /// Inserts a document under a generated UUID v4.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn add(&self, collection: Collection, fields: Fields) -> Result<Document> {
        let id = uuid::Uuid::new_v4().to_string();
        self.set(collection, &id, fields)
    }

    /// Returns documents matching `conditions`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for invalid field names, or an error if
    /// the read fails.
    fn query(&self, collection: Collection, conditions: &QueryConditions)
    -> Result<Vec<Document>>;

    /// Returns every document in a collection, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        self.query(collection, &QueryConditions::new())
    }

    /// Counts documents in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn count(&self, collection: Collection) -> Result<usize>;

    /// Returns true if a document exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn exists(&self, collection: Collection, id: &str) -> Result<bool> {
        Ok(self.get(collection, id)?.is_some())
    }
}

/// Reads a document as a typed record.
///
/// # Errors
///
/// Returns an error if the read fails or the document has an unexpected shape.
pub fn get_record<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Result<Option<T>> {
    store
        .get(collection, id)?
        .map(|doc| doc.to_record())
        .transpose()
}

/// Reads matching documents as typed records.
///
/// Documents that do not fit `T` are skipped with a warning.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn query_records<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    conditions: &QueryConditions,
) -> Result<Vec<T>> {
    let docs = store.query(collection, conditions)?;
    Ok(docs
        .iter()
        .filter_map(|doc| match doc.to_record::<T>() {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(collection = %collection, id = %doc.id, error = %e, "Skipping malformed document");
                None
            },
        })
        .collect())
}

/// Reads every document of a collection as typed records.
///
/// # Errors
///
/// Returns an error if the read fails.
pub fn list_records<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
) -> Result<Vec<T>> {
    query_records(store, collection, &QueryConditions::new())
}

/// Updates a document, converting `NotFound` into `Ok(None)`.
///
/// # Errors
///
/// Returns any error other than [`Error::NotFound`].
pub fn update_if_exists(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
    fields: Fields,
) -> Result<Option<Document>> {
    match store.update(collection, id, fields) {
        Ok(doc) => Ok(Some(doc)),
        Err(Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
