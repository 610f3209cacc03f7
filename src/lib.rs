//! # Orgloom
//!
//! Local-first knowledge store for business planning.
//!
//! Orgloom keeps organizations, themes, focus initiatives, meeting notes,
//! topics, entities and relations in a single `SQLite` document store with
//! Firestore-like semantics, and mirrors entity, relation and topic
//! embeddings into an optional vector store (ChromaDB or an in-process
//! fallback).
//!
//! ## Features
//!
//! - Document store with `get` / `set` / `update` / `delete` / `add` and
//!   condition-based queries over whitelisted collections
//! - Relationship diagrams (theme, organization, initiative, topic)
//! - Sequential embedding regeneration with cooperative cancellation
//! - Sync-flag repair, dangling topic cleanup and data-quality reports
//! - JSON and CSV import/export
//!
//! ## Example
//!
//! ```rust,ignore
//! use orgloom::models::{Collection, QueryConditions, fields_from_value};
//! use orgloom::storage::{DocumentStore, SqliteDocumentStore};
//!
//! let store = SqliteDocumentStore::new("./orgloom.db")?;
//! let theme = store.add(Collection::Themes, fields_from_value(serde_json::json!({"title": "Growth"}))?)?;
//! let themes = store.query(Collection::Themes, &QueryConditions::new().order_by("position"))?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod embedding;
pub mod io;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::OrgloomConfig;
pub use embedding::Embedder;
pub use models::{Collection, Document, QueryConditions};
pub use services::{
    CancellationToken, DiagramBuilder, RegenerationService, ServiceContainer, ThemeService,
};
pub use storage::{DocumentStore, VectorStore};

/// Error type for orgloom operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unknown collection, malformed field name, empty embedding text |
/// | `NotFound` | `update` on a document that does not exist |
/// | `OperationFailed` | `SQLite`, filesystem, HTTP or serialization failures |
/// | `Conflict` | Theme reorder against a stale ordering |
/// | `Cancelled` | A batch job observed its cancellation token |
/// | `FeatureNotEnabled` | Vector operations while the vector store is disabled |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A collection name is not in the whitelist
    /// - A query field name contains characters other than `[A-Za-z0-9_]`
    /// - Text to embed is empty after cleaning
    /// - Embedding dimensions do not match
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A document was not found.
    #[error("document '{id}' not found in '{collection}'")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Document ID.
        id: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` database operations fail
    /// - Filesystem I/O errors occur
    /// - Embedding or ChromaDB HTTP requests fail
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The stored state changed underneath the caller.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A long-running operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Feature not enabled in configuration.
    #[error("feature not enabled: {0}")]
    FeatureNotEnabled(String),
}

/// Result type alias for orgloom operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current time as an RFC 3339 string in UTC.
///
/// All `createdAt` / `updatedAt` fields written by the store use this
/// representation.
///
/// ```rust
/// let now = orgloom::current_timestamp();
/// assert!(now.ends_with('Z'));
/// ```
#[must_use]
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
