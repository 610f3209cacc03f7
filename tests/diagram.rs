//! Relationship diagram integration tests.
//!
//! Loads records through the document store so the lenient field parsing
//! (JSON-encoded lists, `parentId` trees) is exercised end to end.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use orgloom::models::{Collection, LinkKind, NodeKind, TypeFilter, fields_from_value};
use orgloom::services::diagram::PARENT_NODE_ID;
use orgloom::services::{DiagramBuilder, DiagramData};
use orgloom::storage::{DocumentStore, InMemoryDocumentStore};
use serde_json::{Value, json};
use std::collections::HashSet;

fn put(store: &dyn DocumentStore, collection: Collection, id: &str, value: Value) {
    store
        .set(collection, id, fields_from_value(value).unwrap())
        .unwrap();
}

fn seeded() -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new();
    put(&store, Collection::Organizations, "div", json!({"name": "Division"}));
    put(&store, Collection::Organizations, "o1", json!({"name": "Sales", "parentId": "div"}));
    put(
        &store,
        Collection::Organizations,
        "c1",
        json!({"name": "Acme", "type": "company", "parentId": "div"}),
    );
    put(&store, Collection::Themes, "t2", json!({"title": "Second", "position": 2}));
    put(
        &store,
        Collection::Themes,
        "t1",
        json!({"title": "First", "position": 1, "initiativeIds": "[\"i1\"]"}),
    );
    put(
        &store,
        Collection::FocusInitiatives,
        "i1",
        json!({
            "title": "Expand",
            "organizationId": "o1",
            "relatedOrganizations": ["c1"],
            "topicIds": "[\"tp1\", \"gone\"]"
        }),
    );
    put(
        &store,
        Collection::FocusInitiatives,
        "i2",
        json!({"title": "Shared", "themeIds": ["t1", "t2"], "organizationId": "o1"}),
    );
    put(
        &store,
        Collection::Topics,
        "m1-topic-tp1",
        json!({"title": "Pricing", "meetingNoteId": "m1"}),
    );
    store
}

fn assert_no_dangling_links(diagram: &orgloom::models::RelationshipDiagram) {
    let ids: HashSet<&str> = diagram.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.len(), diagram.nodes.len(), "node ids must be unique");
    for link in &diagram.links {
        assert!(ids.contains(link.source.as_str()), "dangling source {}", link.source);
        assert!(ids.contains(link.target.as_str()), "dangling target {}", link.target);
    }
}

#[test]
fn test_diagram_from_store() {
    let store = seeded();
    let data = DiagramData::load(&store).unwrap();
    assert_eq!(data.themes[0].id, "t1");

    let diagram = DiagramBuilder::new("HQ").build(&data, None, &TypeFilter::All);
    assert_no_dangling_links(&diagram);

    let parent = diagram.node(PARENT_NODE_ID).unwrap();
    assert!(parent.is_parent);
    assert_eq!(parent.label, "HQ");

    assert_eq!(diagram.node("t1_o1").unwrap().label, "Sales");
    assert_eq!(diagram.node("t1_c1").unwrap().kind, NodeKind::Company);
    assert_eq!(diagram.node("t1_i1_tp1").unwrap().label, "Pricing");
    assert!(diagram.node("t2_i2").is_some());
    assert!(diagram.node("t2_i1").is_none());

    assert!(diagram.links.iter().any(|l| l.source == "t1_i1"
        && l.target == "t1_i1_tp1"
        && l.kind == LinkKind::Topic));
    assert_eq!(diagram.stats.missing_topic_ids, vec!["gone".to_string()]);
    assert_eq!(diagram.stats.themes, 2);
}

#[test]
fn test_selected_theme_and_type_filter() {
    let store = seeded();
    let data = DiagramData::load(&store).unwrap();

    let diagram = DiagramBuilder::default().build(&data, Some("t1"), &TypeFilter::parse("company"));
    assert_no_dangling_links(&diagram);
    assert!(diagram.node("t2").is_none());
    assert!(diagram.node("t1_c1").is_some());
    assert!(diagram.node("t1_o1").is_none());
    assert!(!diagram.links.iter().any(|l| l.source == "t1_o1"));
}

#[test]
fn test_empty_store_yields_empty_diagram() {
    let store = InMemoryDocumentStore::new();
    let data = DiagramData::load(&store).unwrap();
    let diagram = DiagramBuilder::default().build(&data, None, &TypeFilter::All);
    assert!(diagram.is_empty());
    assert!(diagram.links.is_empty());
}
