//! Document store integration tests.
//!
//! Runs the same scenarios against the in-memory and `SQLite` stores and
//! checks that an on-disk database survives reopening.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use orgloom::models::{Collection, Operator, QueryConditions, fields_from_value};
use orgloom::storage::{DocumentStore, InMemoryDocumentStore, SqliteDocumentStore};
use orgloom::Error;
use serde_json::{Value, json};
use tempfile::TempDir;
use test_case::test_case;

fn memory() -> Box<dyn DocumentStore> {
    Box::new(InMemoryDocumentStore::new())
}

fn sqlite() -> Box<dyn DocumentStore> {
    Box::new(SqliteDocumentStore::in_memory().expect("Failed to open SQLite"))
}

fn put(store: &dyn DocumentStore, collection: Collection, id: &str, value: Value) {
    store
        .set(collection, id, fields_from_value(value).unwrap())
        .unwrap();
}

fn ids(docs: &[orgloom::Document]) -> Vec<&str> {
    docs.iter().map(|d| d.id.as_str()).collect()
}

fn seed_themes(store: &dyn DocumentStore) {
    put(store, Collection::Themes, "a", json!({"title": "Alpha", "position": 3, "owner": "o1"}));
    put(store, Collection::Themes, "b", json!({"title": "Beta", "position": 1, "owner": "o2"}));
    put(store, Collection::Themes, "c", json!({"title": "Gamma", "position": 2, "owner": "o1"}));
}

#[test_case(memory(); "memory")]
#[test_case(sqlite(); "sqlite")]
fn test_set_get_update(store: Box<dyn DocumentStore>) {
    put(store.as_ref(), Collection::Themes, "t1", json!({"title": "Growth", "tags": ["x"]}));

    let doc = store.get(Collection::Themes, "t1").unwrap().unwrap();
    assert_eq!(doc.str_field("title"), Some("Growth"));
    assert_eq!(doc.get("tags"), Some(&json!(["x"])));

    let updated = store
        .update(
            Collection::Themes,
            "t1",
            fields_from_value(json!({"description": "More"})).unwrap(),
        )
        .unwrap();
    assert_eq!(updated.str_field("title"), Some("Growth"));
    assert_eq!(updated.str_field("description"), Some("More"));
    assert_eq!(updated.created_at, doc.created_at);
}

#[test_case(memory(); "memory")]
#[test_case(sqlite(); "sqlite")]
fn test_update_missing_is_not_found(store: Box<dyn DocumentStore>) {
    let result = store.update(
        Collection::Topics,
        "missing",
        fields_from_value(json!({"title": "x"})).unwrap(),
    );
    assert!(matches!(result, Err(Error::NotFound { .. })));
}

#[test_case(memory(); "memory")]
#[test_case(sqlite(); "sqlite")]
fn test_add_and_delete(store: Box<dyn DocumentStore>) {
    let doc = store
        .add(Collection::Entities, fields_from_value(json!({"name": "Acme"})).unwrap())
        .unwrap();
    assert!(!doc.id.is_empty());
    assert!(store.exists(Collection::Entities, &doc.id).unwrap());
    assert_eq!(store.count(Collection::Entities).unwrap(), 1);

    assert!(store.delete(Collection::Entities, &doc.id).unwrap());
    assert!(!store.delete(Collection::Entities, &doc.id).unwrap());
    assert!(store.get(Collection::Entities, &doc.id).unwrap().is_none());
}

#[test_case(memory(); "memory")]
#[test_case(sqlite(); "sqlite")]
fn test_query_equality_and_order(store: Box<dyn DocumentStore>) {
    seed_themes(store.as_ref());

    let docs = store
        .query(
            Collection::Themes,
            &QueryConditions::new().where_eq("owner", "o1").order_by("position"),
        )
        .unwrap();
    assert_eq!(ids(&docs), vec!["c", "a"]);

    let docs = store
        .query(
            Collection::Themes,
            &QueryConditions::new().order_by_desc("position").with_limit(2),
        )
        .unwrap();
    assert_eq!(ids(&docs), vec!["a", "c"]);
}

#[test_case(memory(); "memory")]
#[test_case(sqlite(); "sqlite")]
fn test_query_comparison(store: Box<dyn DocumentStore>) {
    seed_themes(store.as_ref());
    let docs = store
        .query(
            Collection::Themes,
            &QueryConditions::new()
                .where_op("position", Operator::Ge, 2)
                .order_by("position"),
        )
        .unwrap();
    assert_eq!(ids(&docs), vec!["c", "a"]);
}

#[test_case(memory(); "memory")]
#[test_case(sqlite(); "sqlite")]
fn test_query_from_json(store: Box<dyn DocumentStore>) {
    seed_themes(store.as_ref());
    let conditions = QueryConditions::from_json(&json!({
        "owner": "o1",
        "orderBy": "title",
        "orderDirection": "desc"
    }))
    .unwrap();
    let docs = store.query(Collection::Themes, &conditions).unwrap();
    assert_eq!(ids(&docs), vec!["c", "a"]);
}

#[test_case(memory(); "memory")]
#[test_case(sqlite(); "sqlite")]
fn test_invalid_field_name_rejected(store: Box<dyn DocumentStore>) {
    let conditions = QueryConditions::new().where_eq("title'; DROP TABLE", "x");
    assert!(matches!(
        store.query(Collection::Themes, &conditions),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_sqlite_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("orgloom.db");
    {
        let store = SqliteDocumentStore::new(&path).unwrap();
        put(&store, Collection::MeetingNotes, "m1", json!({"title": "Weekly"}));
    }
    let store = SqliteDocumentStore::new(&path).unwrap();
    let doc = store.get(Collection::MeetingNotes, "m1").unwrap().unwrap();
    assert_eq!(doc.str_field("title"), Some("Weekly"));
}

#[test]
fn test_unknown_collection_rejected() {
    assert!(matches!(
        "notACollection".parse::<Collection>(),
        Err(Error::InvalidInput(_))
    ));
}
