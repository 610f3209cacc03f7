//! Storage layer.
//!
//! Two independent stores back every workflow:
//! - **Documents**: the authoritative record store ([`SqliteDocumentStore`],
//!   [`InMemoryDocumentStore`])
//! - **Vectors**: embeddings for similarity search ([`ChromaVectorStore`],
//!   [`InMemoryVectorStore`])
//!
//! The two are not transactional with each other. Each synced record carries
//! a `chromaSynced` flag so drift can be detected and repaired.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::significant_drop_tightening)]

pub mod document;
pub mod sqlite;
pub mod traits;
pub mod vector;

pub use document::{InMemoryDocumentStore, SqliteDocumentStore};
pub use sqlite::acquire_lock;
pub use traits::{
    DocumentStore, VectorMatch, VectorRecord, VectorStore, get_record, list_records,
    query_records, update_if_exists,
};
pub use vector::{ChromaVectorStore, InMemoryVectorStore};
