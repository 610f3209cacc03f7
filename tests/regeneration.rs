//! Embedding regeneration integration tests.
//!
//! Drives the full service stack (document store, hash embedder, in-process
//! vector store) through a [`ServiceContainer`].

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use orgloom::config::EmbeddingProvider;
use orgloom::models::{
    Collection, OrgScope, RegenerationProgress, RegenerationStatus, SyncFlag, fields_from_value,
};
use orgloom::services::regeneration::{RegenerationMode, TargetKinds};
use orgloom::services::{CancellationToken, RegenerationRequest, ServiceContainer};
use orgloom::{DocumentStore, OrgloomConfig};
use serde_json::{Value, json};
use std::cell::Cell;

fn container() -> ServiceContainer {
    let mut config = OrgloomConfig::default();
    config.embedding.provider = EmbeddingProvider::Hash;
    config.embedding.dimensions = Some(32);
    config.regeneration.item_delay_ms = 0;
    ServiceContainer::ephemeral(config).unwrap()
}

fn put(store: &dyn DocumentStore, collection: Collection, id: &str, value: Value) {
    store
        .set(collection, id, fields_from_value(value).unwrap())
        .unwrap();
}

fn seed(store: &dyn DocumentStore) {
    put(store, Collection::Entities, "e1", json!({"name": "Acme", "type": "company", "organizationId": "o1"}));
    put(store, Collection::Entities, "e2", json!({"name": "Bob", "type": "person", "organizationId": "o1"}));
    put(store, Collection::Entities, "e3", json!({"name": "Other", "organizationId": "o2"}));
    put(store, Collection::Entities, "e4", json!({"name": "Orphan"}));
    put(
        store,
        Collection::Relations,
        "r1",
        json!({
            "topicId": "tp1",
            "sourceEntityId": "e1",
            "targetEntityId": "e2",
            "relationType": "employs"
        }),
    );
    put(
        store,
        Collection::Relations,
        "r2",
        json!({"sourceEntityId": "e1", "targetEntityId": "e2", "relationType": "knows"}),
    );
    put(
        store,
        Collection::Topics,
        "m1-topic-tp1",
        json!({"title": "Pricing", "content": "Discuss pricing", "organizationId": "o1"}),
    );
}

fn synced(store: &dyn DocumentStore, collection: Collection, id: &str) -> bool {
    let doc = store.get(collection, id).unwrap().unwrap();
    SyncFlag::from_value(doc.get("chromaSynced")).is_synced()
}

#[test]
fn test_regenerate_missing_for_one_org() {
    let container = container();
    let store = container.documents();
    seed(store.as_ref());

    let service = container.regeneration().unwrap();
    let missing = service.count_missing(&OrgScope::parse("o1")).unwrap();
    assert_eq!(missing.entities, 2);
    assert_eq!(missing.relations, 1);
    assert_eq!(missing.topics, 1);
    assert_eq!(missing.total, 4);

    let request = RegenerationRequest {
        organization: OrgScope::parse("o1"),
        ..RegenerationRequest::default()
    };
    let progress = service
        .run(&request, &CancellationToken::new(), &|_: &RegenerationProgress| {})
        .unwrap();
    assert_eq!(progress.status, RegenerationStatus::Completed);
    assert_eq!(progress.total, 4);
    assert_eq!(progress.stats.success, 4);
    assert_eq!(progress.stats.errors, 0);

    let vectors = container.vectors().unwrap();
    assert!(vectors.contains("entities_o1", "e1").unwrap());
    assert!(vectors.contains("relations_o1", "r1").unwrap());
    assert!(vectors.contains("topics_o1", "m1-topic-tp1").unwrap());
    assert!(!vectors.contains("entities_o2", "e3").unwrap());
    assert!(synced(store.as_ref(), Collection::Entities, "e2"));
    assert!(!synced(store.as_ref(), Collection::Entities, "e3"));

    let again = service
        .run(&request, &CancellationToken::new(), &|_: &RegenerationProgress| {})
        .unwrap();
    assert_eq!(again.total, 0);
    assert_eq!(service.count_missing(&OrgScope::parse("o1")).unwrap().total, 0);
}

#[test]
fn test_regenerate_all_skips_present_unless_forced() {
    let container = container();
    let store = container.documents();
    seed(store.as_ref());
    let service = container.regeneration().unwrap();

    let entities = RegenerationRequest {
        organization: OrgScope::parse("o1"),
        kinds: TargetKinds::Entities,
        ..RegenerationRequest::default()
    };
    service
        .run(&entities, &CancellationToken::new(), &|_: &RegenerationProgress| {})
        .unwrap();

    let all = RegenerationRequest {
        mode: RegenerationMode::All,
        ..entities.clone()
    };
    let progress = service
        .run(&all, &CancellationToken::new(), &|_: &RegenerationProgress| {})
        .unwrap();
    assert_eq!(progress.total, 2);
    assert_eq!(progress.stats.skipped, 2);

    let forced = RegenerationRequest { force: true, ..all };
    let progress = service
        .run(&forced, &CancellationToken::new(), &|_: &RegenerationProgress| {})
        .unwrap();
    assert_eq!(progress.stats.success, 2);
}

#[test]
fn test_cancellation_stops_between_items() {
    let container = container();
    seed(container.documents().as_ref());
    let service = container.regeneration().unwrap();

    let cancel = CancellationToken::new();
    let processed = Cell::new(0usize);
    let observer = |p: &RegenerationProgress| {
        processed.set(p.current);
        if p.current == 1 {
            cancel.cancel();
        }
    };
    let request = RegenerationRequest {
        organization: OrgScope::parse("o1"),
        ..RegenerationRequest::default()
    };
    let progress = service.run(&request, &cancel, &observer).unwrap();
    assert_eq!(progress.status, RegenerationStatus::Cancelled);
    assert_eq!(progress.current, 1);
    assert_eq!(processed.get(), 1);
}

#[test]
fn test_regeneration_requires_vector_store() {
    let mut config = OrgloomConfig::default();
    config.embedding.provider = EmbeddingProvider::Hash;
    config.chroma.enabled = false;
    let container = ServiceContainer::ephemeral(config).unwrap();
    assert!(matches!(
        container.regeneration(),
        Err(orgloom::Error::FeatureNotEnabled(_))
    ));
}
