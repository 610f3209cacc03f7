//! Relationship diagram types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of node in a relationship diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Theme.
    Theme,
    /// Organization (also the synthetic parent node).
    Organization,
    /// Company.
    Company,
    /// Focus initiative.
    Initiative,
    /// Topic leaf.
    Topic,
}

/// Kind of link in a relationship diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Parent to theme, theme to organization.
    Main,
    /// Organization to initiative.
    Branch,
    /// Initiative to topic.
    Topic,
}

/// Organization type filter applied while building a diagram.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    /// Keep every organization.
    #[default]
    All,
    /// Keep organizations whose type equals the given string.
    #[serde(untagged)]
    Only(String),
}

impl TypeFilter {
    /// Parses a filter; `all` (any case) or empty keeps everything.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Only(s.to_string())
        }
    }

    /// Returns true if an organization of `org_type` passes the filter.
    #[must_use]
    pub fn accepts(&self, org_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == org_type,
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(t) => f.write_str(t),
        }
    }
}

/// A diagram node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramNode {
    /// Node ID, unique within the diagram.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Node kind.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// True for the synthetic parent node.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_parent: bool,
    /// ID of the record this node was built from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// A directed diagram link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramLink {
    /// Source node ID.
    pub source: String,
    /// Target node ID.
    pub target: String,
    /// Link kind.
    #[serde(rename = "type")]
    pub kind: LinkKind,
}

/// Counters gathered while building a diagram.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramStats {
    /// Themes rendered.
    pub themes: usize,
    /// Organization nodes added.
    pub organizations: usize,
    /// Initiative nodes added.
    pub initiatives: usize,
    /// Topic nodes added.
    pub topics: usize,
    /// Topic IDs referenced by initiatives but not found.
    pub missing_topic_ids: Vec<String>,
    /// Links dropped because an endpoint was missing.
    pub dropped_links: usize,
}

/// A relationship diagram.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDiagram {
    /// Nodes in insertion order.
    pub nodes: Vec<DiagramNode>,
    /// Links whose endpoints all exist.
    pub links: Vec<DiagramLink>,
    /// Build counters.
    pub stats: DiagramStats,
}

impl RelationshipDiagram {
    /// Returns true if the diagram has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by ID.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_filter_parse() {
        assert_eq!(TypeFilter::parse("ALL"), TypeFilter::All);
        assert_eq!(TypeFilter::parse(""), TypeFilter::All);
        assert_eq!(
            TypeFilter::parse("company"),
            TypeFilter::Only("company".to_string())
        );
        assert!(TypeFilter::parse("company").accepts("company"));
        assert!(!TypeFilter::parse("company").accepts("organization"));
        assert!(TypeFilter::All.accepts("anything"));
    }

    #[test]
    fn test_node_serializes_type_field() {
        let node = DiagramNode {
            id: "t1".to_string(),
            label: "Theme".to_string(),
            kind: NodeKind::Theme,
            is_parent: false,
            source_id: None,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "theme");
        assert!(json.get("isParent").is_none());
    }
}
