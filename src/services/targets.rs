//! Scoped record selection shared by the batch workflows.

use crate::models::{Entity, OrgScope, RecordKind, Relation, Topic};
use crate::storage::{DocumentStore, list_records};
use crate::Result;
use std::collections::HashMap;

/// A record as seen by the sync workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    /// Record kind.
    pub kind: RecordKind,
    /// Stored document ID.
    pub id: String,
    /// Resolved organization.
    pub organization_id: Option<String>,
    /// Stored `chromaSynced` flag.
    pub synced: bool,
    /// Human-readable label for logs.
    pub label: String,
    /// Relations only: the record has no `topicId`.
    pub missing_topic: bool,
}

impl SyncTarget {
    /// Vector collection holding this record, if it has an organization.
    #[must_use]
    pub fn vector_collection(&self) -> Option<String> {
        self.organization_id
            .as_deref()
            .map(|org| self.kind.vector_collection(org))
    }
}

/// Loads every record of `kind` with its resolved organization.
///
/// Relation organizations fall back to the source or target entity's.
///
/// # Errors
///
/// Returns an error if a store read fails.
pub fn load_all(store: &dyn DocumentStore, kind: RecordKind) -> Result<Vec<SyncTarget>> {
    Ok(match kind {
        RecordKind::Entity => list_records::<Entity>(store, kind.collection())?
            .into_iter()
            .map(|e| SyncTarget {
                kind,
                label: e.name.clone(),
                synced: e.chroma_synced.is_synced(),
                organization_id: e.organization_id,
                id: e.id,
                missing_topic: false,
            })
            .collect(),
        RecordKind::Relation => {
            let entity_orgs = entity_organizations(store)?;
            list_records::<Relation>(store, kind.collection())?
                .into_iter()
                .map(|r| SyncTarget {
                    kind,
                    label: r.relation_type.clone(),
                    synced: r.chroma_synced.is_synced(),
                    organization_id: relation_organization(&r, &entity_orgs),
                    missing_topic: r.topic_id.is_none(),
                    id: r.id,
                })
                .collect()
        },
        RecordKind::Topic => list_records::<Topic>(store, kind.collection())?
            .into_iter()
            .map(|t| SyncTarget {
                kind,
                label: t.title.clone(),
                synced: t.chroma_synced.is_synced(),
                organization_id: t.organization_id,
                id: t.id,
                missing_topic: false,
            })
            .collect(),
    })
}

/// Loads the records of `kind` that fall inside `scope`.
///
/// # Errors
///
/// Returns an error if a store read fails.
pub fn load_scoped(
    store: &dyn DocumentStore,
    kind: RecordKind,
    scope: &OrgScope,
) -> Result<Vec<SyncTarget>> {
    Ok(load_all(store, kind)?
        .into_iter()
        .filter(|t| scope.includes(t.organization_id.as_deref()))
        .collect())
}

/// Distinct organizations of `targets`, sorted.
#[must_use]
pub fn organizations(targets: &[SyncTarget]) -> Vec<String> {
    let mut orgs: Vec<String> = targets
        .iter()
        .filter_map(|t| t.organization_id.clone())
        .collect();
    orgs.sort();
    orgs.dedup();
    orgs
}

fn entity_organizations(store: &dyn DocumentStore) -> Result<HashMap<String, String>> {
    Ok(list_records::<Entity>(store, RecordKind::Entity.collection())?
        .into_iter()
        .filter_map(|e| Some((e.id, e.organization_id?)))
        .collect())
}

fn relation_organization(
    relation: &Relation,
    entity_orgs: &HashMap<String, String>,
) -> Option<String> {
    relation.organization_id.clone().or_else(|| {
        [&relation.source_entity_id, &relation.target_entity_id]
            .into_iter()
            .flatten()
            .find_map(|id| entity_orgs.get(id).cloned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Collection, fields_from_value};
    use crate::storage::InMemoryDocumentStore;
    use serde_json::json;

    #[test]
    fn test_relation_org_resolution_and_scope() {
        let store = InMemoryDocumentStore::new();
        let put = |c, id: &str, v| store.set(c, id, fields_from_value(v).unwrap()).unwrap();
        put(Collection::Entities, "e1", json!({"name": "A", "organizationId": "o1"}));
        put(Collection::Relations, "r1", json!({"targetEntityId": "e1", "topicId": "t"}));
        put(Collection::Relations, "r2", json!({"organizationId": "o2"}));
        put(Collection::Relations, "r3", json!({"sourceEntityId": "ghost"}));

        let all = load_all(&store, RecordKind::Relation).unwrap();
        assert_eq!(all.len(), 3);
        let scoped =
            load_scoped(&store, RecordKind::Relation, &OrgScope::Organization("o1".into())).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "r1");
        assert!(!scoped[0].missing_topic);

        let in_any = load_scoped(&store, RecordKind::Relation, &OrgScope::All).unwrap();
        assert_eq!(organizations(&in_any), vec!["o1", "o2"]);
    }
}
