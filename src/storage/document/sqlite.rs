//! `SQLite` document store.

use super::{PreparedWrite, merge_fields};
use crate::models::{Collection, Document, Fields, QueryConditions};
use crate::storage::sqlite::{acquire_lock, build_query_clause, open_connection, timed, with_transaction};
use crate::storage::traits::DocumentStore;
use crate::{Error, Result, current_timestamp};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// `SQLite`-backed document store.
///
/// All collections share one `documents` table keyed by
/// `(collection, id)`. Fields are stored as a JSON object in `data`;
/// `created_at` / `updated_at` are separate columns.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>`. WAL mode and a 5 second `busy_timeout` let
/// other processes (the desktop shell, a second CLI) share the file.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteDocumentStore {
    /// Opens or creates a store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_connection(&db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_in_memory".to_string(),
            cause: e.to_string(),
        })?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (`None` for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_updated
                ON documents(collection, updated_at DESC);",
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_documents_table".to_string(),
            cause: e.to_string(),
        })
    }

    fn fetch(conn: &Connection, collection: Collection, id: &str) -> Result<Option<Document>> {
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT data, created_at, updated_at FROM documents
                 WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| Error::OperationFailed {
                operation: "get_document".to_string(),
                cause: e.to_string(),
            })?;

        row.map(|(data, created_at, updated_at)| {
            Ok(Document {
                id: id.to_string(),
                data: parse_data(&data)?,
                created_at,
                updated_at,
            })
        })
        .transpose()
    }

    fn write(conn: &Connection, collection: Collection, doc: &Document) -> Result<()> {
        let data = serde_json::to_string(&doc.data).map_err(|e| Error::OperationFailed {
            operation: "serialize_document".to_string(),
            cause: e.to_string(),
        })?;
        conn.execute(
            "INSERT INTO documents (collection, id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(collection, id) DO UPDATE SET
                data = excluded.data,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            params![
                collection.as_str(),
                doc.id,
                data,
                doc.created_at,
                doc.updated_at
            ],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "write_document".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }
}

fn parse_data(data: &str) -> Result<Fields> {
    serde_json::from_str(data).map_err(|e| Error::OperationFailed {
        operation: "parse_document".to_string(),
        cause: e.to_string(),
    })
}

impl DocumentStore for SqliteDocumentStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self), fields(operation = "get", backend = BACKEND, collection = %collection))]
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        timed(BACKEND, "get", || {
            let conn = acquire_lock(&self.conn);
            Self::fetch(&conn, collection, id)
        })
    }

    #[instrument(skip(self, fields), fields(operation = "set", backend = BACKEND, collection = %collection))]
    fn set(&self, collection: Collection, id: &str, fields: Fields) -> Result<Document> {
        timed(BACKEND, "set", || {
            let conn = acquire_lock(&self.conn);
            let write = PreparedWrite::new(fields);
            with_transaction(&conn, |conn| {
                let existing_created: Option<String> = conn
                    .query_row(
                        "SELECT created_at FROM documents WHERE collection = ?1 AND id = ?2",
                        params![collection.as_str(), id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|e| Error::OperationFailed {
                        operation: "get_created_at".to_string(),
                        cause: e.to_string(),
                    })?;

                let now = current_timestamp();
                let doc = Document {
                    id: id.to_string(),
                    data: write.fields,
                    created_at: existing_created
                        .or(write.created_at)
                        .unwrap_or_else(|| now.clone()),
                    updated_at: write.updated_at.unwrap_or(now),
                };
                Self::write(conn, collection, &doc)?;
                Ok(doc)
            })
        })
    }

    #[instrument(skip(self, fields), fields(operation = "update", backend = BACKEND, collection = %collection))]
    fn update(&self, collection: Collection, id: &str, fields: Fields) -> Result<Document> {
        timed(BACKEND, "update", || {
            let conn = acquire_lock(&self.conn);
            let write = PreparedWrite::new(fields);
            with_transaction(&conn, |conn| {
                let mut doc =
                    Self::fetch(conn, collection, id)?.ok_or_else(|| Error::NotFound {
                        collection: collection.to_string(),
                        id: id.to_string(),
                    })?;
                merge_fields(&mut doc.data, write.fields);
                doc.updated_at = write.updated_at.unwrap_or_else(current_timestamp);
                Self::write(conn, collection, &doc)?;
                Ok(doc)
            })
        })
    }

    #[instrument(skip(self), fields(operation = "delete", backend = BACKEND, collection = %collection))]
    fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        timed(BACKEND, "delete", || {
            let conn = acquire_lock(&self.conn);
            let deleted = conn
                .execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection.as_str(), id],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "delete_document".to_string(),
                    cause: e.to_string(),
                })?;
            Ok(deleted > 0)
        })
    }

    #[instrument(skip(self, ids), fields(operation = "delete_many", backend = BACKEND, collection = %collection, count = ids.len()))]
    fn delete_many(&self, collection: Collection, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        timed(BACKEND, "delete_many", || {
            let conn = acquire_lock(&self.conn);
            with_transaction(&conn, |conn| {
                let mut stmt = conn
                    .prepare("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
                    .map_err(|e| Error::OperationFailed {
                        operation: "prepare_delete_many".to_string(),
                        cause: e.to_string(),
                    })?;
                let mut deleted = 0;
                for id in ids {
                    deleted += stmt
                        .execute(params![collection.as_str(), id])
                        .map_err(|e| Error::OperationFailed {
                            operation: "delete_many".to_string(),
                            cause: e.to_string(),
                        })?;
                }
                Ok(deleted)
            })
        })
    }

    #[instrument(skip(self, targets), fields(operation = "delete_batch", backend = BACKEND, count = targets.len()))]
    fn delete_batch(&self, targets: &[(Collection, String)]) -> Result<Vec<bool>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        timed(BACKEND, "delete_batch", || {
            let conn = acquire_lock(&self.conn);
            with_transaction(&conn, |conn| {
                let mut stmt = conn
                    .prepare("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
                    .map_err(|e| Error::OperationFailed {
                        operation: "prepare_delete_batch".to_string(),
                        cause: e.to_string(),
                    })?;
                let mut existed = Vec::with_capacity(targets.len());
                for (collection, id) in targets {
                    let deleted = stmt
                        .execute(params![collection.as_str(), id])
                        .map_err(|e| Error::OperationFailed {
                            operation: "delete_batch".to_string(),
                            cause: e.to_string(),
                        })?;
                    existed.push(deleted > 0);
                }
                Ok(existed)
            })
        })
    }

    #[instrument(skip(self, conditions), fields(operation = "query", backend = BACKEND, collection = %collection))]
    fn query(
        &self,
        collection: Collection,
        conditions: &QueryConditions,
    ) -> Result<Vec<Document>> {
        conditions.validate()?;
        timed(BACKEND, "query", || {
            let conn = acquire_lock(&self.conn);
            let clause = build_query_clause(conditions);
            let sql = format!(
                "SELECT id, data, created_at, updated_at FROM documents WHERE collection = ?{}",
                clause.sql
            );
            let mut stmt = conn.prepare(&sql).map_err(|e| Error::OperationFailed {
                operation: "prepare_query".to_string(),
                cause: e.to_string(),
            })?;

            let params = std::iter::once(SqlValue::Text(collection.as_str().to_string()))
                .chain(clause.params);
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(|e| Error::OperationFailed {
                    operation: "query_documents".to_string(),
                    cause: e.to_string(),
                })?;

            let mut documents = Vec::new();
            for row in rows {
                let (id, data, created_at, updated_at) =
                    row.map_err(|e| Error::OperationFailed {
                        operation: "query_row".to_string(),
                        cause: e.to_string(),
                    })?;
                documents.push(Document {
                    id,
                    data: parse_data(&data)?,
                    created_at,
                    updated_at,
                });
            }
            Ok(documents)
        })
    }

    #[instrument(skip(self), fields(operation = "count", backend = BACKEND, collection = %collection))]
    fn count(&self, collection: Collection) -> Result<usize> {
        timed(BACKEND, "count", || {
            let conn = acquire_lock(&self.conn);
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                    params![collection.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "count_documents".to_string(),
                    cause: e.to_string(),
                })?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    #[instrument(skip(self), fields(operation = "exists", backend = BACKEND, collection = %collection))]
    fn exists(&self, collection: Collection, id: &str) -> Result<bool> {
        timed(BACKEND, "exists", || {
            let conn = acquire_lock(&self.conn);
            let exists = conn
                .query_row(
                    "SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection.as_str(), id],
                    |_| Ok(true),
                )
                .optional()
                .map_err(|e| Error::OperationFailed {
                    operation: "document_exists".to_string(),
                    cause: e.to_string(),
                })?
                .unwrap_or(false);
            Ok(exists)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields_from_value;
    use serde_json::json;

    fn fields(v: serde_json::Value) -> Fields {
        fields_from_value(v).unwrap()
    }

    #[test]
    fn test_set_get_roundtrip() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store
            .set(Collection::Themes, "t1", fields(json!({"title": "Growth"})))
            .unwrap();
        let doc = store.get(Collection::Themes, "t1").unwrap().unwrap();
        assert_eq!(doc.str_field("title"), Some("Growth"));
        assert!(store.get(Collection::Topics, "t1").unwrap().is_none());
    }

    #[test]
    fn test_set_preserves_created_at() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let first = store
            .set(
                Collection::Themes,
                "t1",
                fields(json!({"title": "a", "createdAt": "2020-01-01T00:00:00.000Z"})),
            )
            .unwrap();
        let second = store
            .set(
                Collection::Themes,
                "t1",
                fields(json!({"title": "b", "createdAt": "2030-01-01T00:00:00.000Z"})),
            )
            .unwrap();
        assert_eq!(first.created_at, "2020-01-01T00:00:00.000Z");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.str_field("title"), Some("b"));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let err = store
            .update(Collection::Themes, "nope", fields(json!({"a": 1})))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_query_filters_and_orders() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        for (id, org, pos) in [("a", "o1", 3), ("b", "o1", 1), ("c", "o2", 2)] {
            store
                .set(
                    Collection::Themes,
                    id,
                    fields(json!({"organizationId": org, "position": pos})),
                )
                .unwrap();
        }
        let docs = store
            .query(
                Collection::Themes,
                &QueryConditions::new()
                    .where_eq("organizationId", "o1")
                    .order_by("position"),
            )
            .unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_delete_batch_spans_collections() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store.set(Collection::Topics, "a", fields(json!({}))).unwrap();
        store.set(Collection::Entities, "a", fields(json!({}))).unwrap();
        store.set(Collection::Entities, "b", fields(json!({}))).unwrap();
        let existed = store
            .delete_batch(&[
                (Collection::Topics, "a".to_string()),
                (Collection::Entities, "a".to_string()),
                (Collection::MeetingNotes, "a".to_string()),
            ])
            .unwrap();
        assert_eq!(existed, vec![true, true, false]);
        assert_eq!(store.count(Collection::Topics).unwrap(), 0);
        assert!(store.exists(Collection::Entities, "b").unwrap());
    }

    #[test]
    fn test_delete_many_in_one_transaction() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        for id in ["a", "b", "c"] {
            store
                .set(Collection::Topics, id, fields(json!({})))
                .unwrap();
        }
        let deleted = store
            .delete_many(
                Collection::Topics,
                &["a".to_string(), "c".to_string(), "zzz".to_string()],
            )
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count(Collection::Topics).unwrap(), 1);
    }
}
