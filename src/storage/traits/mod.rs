//! Storage traits.
//!
//! - [`DocumentStore`]: Firestore-like documents in whitelisted collections
//! - [`VectorStore`]: embeddings grouped into named collections

mod document;
mod vector;

pub use document::{DocumentStore, get_record, list_records, query_records, update_if_exists};
pub use vector::{VectorMatch, VectorRecord, VectorStore};
