//! Dangling topic-ID detection and cleanup on focus initiatives.

use crate::models::{Collection, FocusInitiative, OrgScope, Topic, fields_from_value};
use crate::storage::{DocumentStore, list_records};
use crate::{Result, current_timestamp};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

/// An initiative referencing topics that do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeIssue {
    /// Initiative ID.
    pub initiative_id: String,
    /// Initiative title, or its ID when untitled.
    pub initiative_title: String,
    /// Topic IDs with no matching topic.
    pub missing_topic_ids: Vec<String>,
    /// Topic IDs listed on the initiative.
    pub total_topic_ids: usize,
}

/// Result of [`check_data_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Initiatives with at least one dangling topic ID.
    pub initiatives_with_missing_topics: Vec<InitiativeIssue>,
    /// Dangling IDs across all initiatives.
    pub total_missing_topic_ids: usize,
}

/// A per-initiative failure during cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupError {
    /// Initiative ID.
    pub initiative_id: String,
    /// Error message.
    pub error: String,
}

/// Result of [`cleanup_missing_topic_ids`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Initiatives rewritten.
    pub cleaned_initiatives: usize,
    /// Topic IDs removed.
    pub removed_topic_ids: usize,
    /// Per-initiative failures.
    pub errors: Vec<CleanupError>,
}

/// Topic IDs an initiative may reference: short IDs and stored IDs.
fn valid_topic_ids(store: &dyn DocumentStore, scope: &OrgScope) -> Result<HashSet<String>> {
    Ok(list_records::<Topic>(store, Collection::Topics)?
        .into_iter()
        .filter(|t| in_scope(scope, t.organization_id.as_deref()))
        .flat_map(|t| [t.short_id(), t.id])
        .collect())
}

fn scoped_initiatives(store: &dyn DocumentStore, scope: &OrgScope) -> Result<Vec<FocusInitiative>> {
    Ok(list_records::<FocusInitiative>(store, Collection::FocusInitiatives)?
        .into_iter()
        .filter(|i| in_scope(scope, i.organization_id.as_deref()))
        .collect())
}

/// Unlike the sync workflows, the `All` scope here includes records without
/// an organization.
fn in_scope(scope: &OrgScope, organization_id: Option<&str>) -> bool {
    matches!(scope, OrgScope::All) || scope.includes(organization_id)
}

/// Lists initiatives whose `topicIds` reference missing topics.
///
/// # Errors
///
/// Returns an error if a store read fails.
pub fn check_data_integrity(store: &dyn DocumentStore, scope: &OrgScope) -> Result<IntegrityReport> {
    let valid = valid_topic_ids(store, scope)?;
    let mut report = IntegrityReport::default();

    for initiative in scoped_initiatives(store, scope)? {
        let missing: Vec<String> = initiative
            .topic_ids
            .iter()
            .filter(|id| id.trim().is_empty() || !valid.contains(*id))
            .cloned()
            .collect();
        if missing.is_empty() {
            continue;
        }
        report.total_missing_topic_ids += missing.len();
        report.initiatives_with_missing_topics.push(InitiativeIssue {
            initiative_title: if initiative.title.is_empty() {
                initiative.id.clone()
            } else {
                initiative.title.clone()
            },
            initiative_id: initiative.id,
            total_topic_ids: initiative.topic_ids.len(),
            missing_topic_ids: missing,
        });
    }

    tracing::info!(
        initiatives = report.initiatives_with_missing_topics.len(),
        missing = report.total_missing_topic_ids,
        "Data integrity check finished"
    );
    Ok(report)
}

/// Removes dangling topic IDs from initiatives.
///
/// Each affected initiative's `topicIds` is rewritten as a native array.
/// A failed write is recorded and the next initiative is processed.
///
/// # Errors
///
/// Returns an error if loading topics or initiatives fails.
pub fn cleanup_missing_topic_ids(store: &dyn DocumentStore, scope: &OrgScope) -> Result<CleanupReport> {
    let valid = valid_topic_ids(store, scope)?;
    let mut report = CleanupReport::default();

    for initiative in scoped_initiatives(store, scope)? {
        let kept: Vec<&String> = initiative
            .topic_ids
            .iter()
            .filter(|id| !id.trim().is_empty() && valid.contains(*id))
            .collect();
        let removed = initiative.topic_ids.len() - kept.len();
        if removed == 0 {
            continue;
        }

        let write = fields_from_value(json!({
            "topicIds": kept,
            "updatedAt": current_timestamp(),
        }))
        .and_then(|fields| store.update(Collection::FocusInitiatives, &initiative.id, fields));
        match write {
            Ok(_) => {
                report.cleaned_initiatives += 1;
                report.removed_topic_ids += removed;
                tracing::debug!(initiative_id = %initiative.id, removed, "Removed dangling topic ids");
            },
            Err(e) => {
                tracing::warn!(initiative_id = %initiative.id, error = %e, "Failed to clean initiative");
                report.errors.push(CleanupError {
                    initiative_id: initiative.id.clone(),
                    error: e.to_string(),
                });
            },
        }
    }

    tracing::info!(
        cleaned = report.cleaned_initiatives,
        removed = report.removed_topic_ids,
        errors = report.errors.len(),
        "Topic id cleanup finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryDocumentStore;

    fn store() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        let put = |c, id: &str, v| store.set(c, id, fields_from_value(v).unwrap()).unwrap();
        put(Collection::Topics, "n1-topic-t1", json!({"title": "One", "organizationId": "o1"}));
        put(Collection::Topics, "t2", json!({"title": "Two", "organizationId": "o2"}));
        put(
            Collection::FocusInitiatives,
            "i1",
            json!({"title": "Init", "organizationId": "o1", "topicIds": "[\"t1\",\"gone\",\"t2\"]"}),
        );
        put(
            Collection::FocusInitiatives,
            "i2",
            json!({"organizationId": "o2", "topicIds": ["t2"]}),
        );
        store
    }

    #[test]
    fn test_check_all_scope() {
        let store = store();
        let report = check_data_integrity(&store, &OrgScope::All).unwrap();
        assert_eq!(report.total_missing_topic_ids, 1);
        let issue = &report.initiatives_with_missing_topics[0];
        assert_eq!(issue.initiative_id, "i1");
        assert_eq!(issue.missing_topic_ids, vec!["gone"]);
        assert_eq!(issue.total_topic_ids, 3);
    }

    #[test]
    fn test_check_org_scope_uses_org_topics() {
        let store = store();
        let report = check_data_integrity(&store, &OrgScope::Organization("o1".into())).unwrap();
        assert_eq!(report.total_missing_topic_ids, 2);
    }

    #[test]
    fn test_cleanup_rewrites_native_array() {
        let store = store();
        let report = cleanup_missing_topic_ids(&store, &OrgScope::All).unwrap();
        assert_eq!(report.cleaned_initiatives, 1);
        assert_eq!(report.removed_topic_ids, 1);
        let doc = store.get(Collection::FocusInitiatives, "i1").unwrap().unwrap();
        assert_eq!(doc.get("topicIds"), Some(&json!(["t1", "t2"])));
        assert!(check_data_integrity(&store, &OrgScope::All).unwrap().initiatives_with_missing_topics.is_empty());
    }
}
