//! Vector-store sync bookkeeping shared by the sync, regeneration, repair
//! and quality workflows.

use crate::models::Collection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field holding the per-record sync flag.
pub const SYNC_FLAG_FIELD: &str = "chromaSynced";

/// Field holding the last sync error message.
pub const SYNC_ERROR_FIELD: &str = "chromaSyncError";

/// Field holding the time of the last sync attempt.
pub const SYNC_ATTEMPT_FIELD: &str = "lastChromaSyncAttempt";

/// Kinds of record mirrored into the vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Knowledge-graph entity.
    Entity,
    /// Knowledge-graph relation.
    Relation,
    /// Meeting-note topic.
    Topic,
}

impl RecordKind {
    /// All kinds, in processing order.
    pub const ALL: [Self; 3] = [Self::Entity, Self::Relation, Self::Topic];

    /// Document collection holding records of this kind.
    #[must_use]
    pub const fn collection(self) -> Collection {
        match self {
            Self::Entity => Collection::Entities,
            Self::Relation => Collection::Relations,
            Self::Topic => Collection::Topics,
        }
    }

    /// Prefix of this kind's per-organization vector collections.
    #[must_use]
    pub const fn vector_prefix(self) -> &'static str {
        match self {
            Self::Entity => "entities",
            Self::Relation => "relations",
            Self::Topic => "topics",
        }
    }

    /// Vector collection name for an organization, e.g. `entities_org-1`.
    #[must_use]
    pub fn vector_collection(self, organization_id: &str) -> String {
        format!("{}_{organization_id}", self.vector_prefix())
    }

    /// Parses a kind name, singular or plural (`entity` / `entities`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "entity" | "entities" => Some(Self::Entity),
            "relation" | "relations" => Some(Self::Relation),
            "topic" | "topics" => Some(Self::Topic),
            _ => None,
        }
    }

    /// Singular label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Relation => "relation",
            Self::Topic => "topic",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organization scope for batch workflows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrgScope {
    /// Every record that has an organization ID.
    #[default]
    All,
    /// Records of a single organization.
    Organization(String),
}

impl OrgScope {
    /// Parses `all` (any case) or an organization ID.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().is_empty() || s.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Organization(s.trim().to_string())
        }
    }

    /// Returns true if a record owned by `organization_id` is in scope.
    ///
    /// Records without an organization are never in scope.
    #[must_use]
    pub fn includes(&self, organization_id: Option<&str>) -> bool {
        match (self, organization_id) {
            (_, None) => false,
            (Self::All, Some(_)) => true,
            (Self::Organization(wanted), Some(org)) => wanted == org,
        }
    }
}

impl fmt::Display for OrgScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Organization(id) => f.write_str(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_collection_name() {
        assert_eq!(
            RecordKind::Relation.vector_collection("org-1"),
            "relations_org-1"
        );
        assert_eq!(RecordKind::Topic.collection(), Collection::Topics);
    }

    #[test]
    fn test_record_kind_parse() {
        assert_eq!(RecordKind::parse("Entities"), Some(RecordKind::Entity));
        assert_eq!(RecordKind::parse("relation"), Some(RecordKind::Relation));
        assert_eq!(RecordKind::parse("notes"), None);
    }

    #[test]
    fn test_org_scope() {
        assert_eq!(OrgScope::parse("All"), OrgScope::All);
        let scope = OrgScope::parse("o1");
        assert!(scope.includes(Some("o1")));
        assert!(!scope.includes(Some("o2")));
        assert!(!scope.includes(None));
        assert!(OrgScope::All.includes(Some("x")));
        assert!(!OrgScope::All.includes(None));
    }
}
