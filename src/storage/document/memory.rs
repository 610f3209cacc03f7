//! In-memory document store.

use super::{PreparedWrite, merge_fields};
use crate::models::{Collection, Document, Fields, QueryConditions, SortDirection, sort_order};
use crate::storage::sqlite::timed;
use crate::storage::traits::DocumentStore;
use crate::{Error, Result, current_timestamp};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const BACKEND: &str = "memory";

type Documents = HashMap<Collection, BTreeMap<String, Document>>;

/// Document store kept entirely in memory.
///
/// Query semantics match [`super::SqliteDocumentStore`], including typed
/// equality and the `id` tiebreak on ordering. Used by tests and by the CLI
/// when `--ephemeral` is passed.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<Documents>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Documents> {
        self.documents.read().unwrap_or_else(|poisoned| {
            tracing::warn!(backend = BACKEND, "Document store lock was poisoned, recovering");
            metrics::counter!("storage_lock_poisoned_total", "backend" => BACKEND).increment(1);
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Documents> {
        self.documents.write().unwrap_or_else(|poisoned| {
            tracing::warn!(backend = BACKEND, "Document store lock was poisoned, recovering");
            metrics::counter!("storage_lock_poisoned_total", "backend" => BACKEND).increment(1);
            poisoned.into_inner()
        })
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        timed(BACKEND, "get", || {
            Ok(self
                .read()
                .get(&collection)
                .and_then(|docs| docs.get(id))
                .cloned())
        })
    }

    fn set(&self, collection: Collection, id: &str, fields: Fields) -> Result<Document> {
        timed(BACKEND, "set", || {
            let write = PreparedWrite::new(fields);
            let mut guard = self.write();
            let docs = guard.entry(collection).or_default();
            let now = current_timestamp();
            let created_at = docs
                .get(id)
                .map(|existing| existing.created_at.clone())
                .or(write.created_at)
                .unwrap_or_else(|| now.clone());
            let doc = Document {
                id: id.to_string(),
                data: write.fields,
                created_at,
                updated_at: write.updated_at.unwrap_or(now),
            };
            docs.insert(id.to_string(), doc.clone());
            Ok(doc)
        })
    }

    fn update(&self, collection: Collection, id: &str, fields: Fields) -> Result<Document> {
        timed(BACKEND, "update", || {
            let write = PreparedWrite::new(fields);
            let mut guard = self.write();
            let doc = guard
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| Error::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            merge_fields(&mut doc.data, write.fields);
            doc.updated_at = write.updated_at.unwrap_or_else(current_timestamp);
            Ok(doc.clone())
        })
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        timed(BACKEND, "delete", || {
            Ok(self
                .write()
                .get_mut(&collection)
                .is_some_and(|docs| docs.remove(id).is_some()))
        })
    }

    fn delete_batch(&self, targets: &[(Collection, String)]) -> Result<Vec<bool>> {
        timed(BACKEND, "delete_batch", || {
            let mut guard = self.write();
            Ok(targets
                .iter()
                .map(|(collection, id)| {
                    guard
                        .get_mut(collection)
                        .is_some_and(|docs| docs.remove(id).is_some())
                })
                .collect())
        })
    }

    fn query(
        &self,
        collection: Collection,
        conditions: &QueryConditions,
    ) -> Result<Vec<Document>> {
        conditions.validate()?;
        timed(BACKEND, "query", || {
            let guard = self.read();
            let Some(docs) = guard.get(&collection) else {
                return Ok(Vec::new());
            };

            // BTreeMap iteration is already ordered by id.
            let mut matched: Vec<Document> = docs
                .values()
                .filter(|doc| conditions.matches(&doc.data))
                .cloned()
                .collect();

            if let Some((field, direction)) = &conditions.order_by {
                matched.sort_by(|a, b| {
                    let ord = sort_order(a.data.get(field), b.data.get(field));
                    let ord = match direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    };
                    ord.then_with(|| a.id.cmp(&b.id))
                });
            }

            if let Some(limit) = conditions.limit {
                matched.truncate(limit);
            }
            Ok(matched)
        })
    }

    fn count(&self, collection: Collection) -> Result<usize> {
        timed(BACKEND, "count", || {
            Ok(self.read().get(&collection).map_or(0, BTreeMap::len))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operator, fields_from_value};
    use serde_json::json;

    fn fields(v: serde_json::Value) -> Fields {
        fields_from_value(v).unwrap()
    }

    #[test]
    fn test_set_update_delete() {
        let store = InMemoryDocumentStore::new();
        store
            .set(Collection::Entities, "e1", fields(json!({"name": "Acme"})))
            .unwrap();
        let updated = store
            .update(Collection::Entities, "e1", fields(json!({"type": "company"})))
            .unwrap();
        assert_eq!(updated.str_field("name"), Some("Acme"));
        assert_eq!(updated.str_field("type"), Some("company"));
        assert!(store.delete(Collection::Entities, "e1").unwrap());
        assert!(!store.delete(Collection::Entities, "e1").unwrap());
    }

    #[test]
    fn test_add_generates_uuid() {
        let store = InMemoryDocumentStore::new();
        let doc = store.add(Collection::Topics, fields(json!({}))).unwrap();
        assert!(uuid::Uuid::parse_str(&doc.id).is_ok());
        assert_eq!(store.count(Collection::Topics).unwrap(), 1);
    }

    #[test]
    fn test_query_desc_with_limit() {
        let store = InMemoryDocumentStore::new();
        for (id, pos) in [("a", 1), ("b", 3), ("c", 2), ("d", 3)] {
            store
                .set(Collection::Themes, id, fields(json!({"position": pos})))
                .unwrap();
        }
        let docs = store
            .query(
                Collection::Themes,
                &QueryConditions::new().order_by_desc("position").with_limit(3),
            )
            .unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "c"]);
    }

    #[test]
    fn test_legacy_condition_ignored_with_equalities() {
        let store = InMemoryDocumentStore::new();
        store
            .set(Collection::Themes, "a", fields(json!({"k": "x", "n": 1})))
            .unwrap();
        let conditions = QueryConditions::new()
            .where_eq("k", "x")
            .where_op("n", Operator::Gt, 5);
        assert_eq!(store.query(Collection::Themes, &conditions).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_field_rejected() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .query(Collection::Themes, &QueryConditions::new().where_eq("a.b", 1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
