//! Relationship diagram construction.
//!
//! Builds the theme → organization → initiative → topic graph rendered by the
//! analytics view. Node IDs are scoped by theme so the same organization or
//! initiative can appear under several themes:
//!
//! | Node | ID |
//! |------|----|
//! | parent | `parent-department` |
//! | theme | `{themeId}` |
//! | organization | `{themeId}_{orgId}` |
//! | initiative | `{themeId}_{initiativeId}` |
//! | topic | `{themeId}_{initiativeId}_{topicId}` |

use crate::models::{
    Collection, DiagramLink, DiagramNode, DiagramStats, FocusInitiative, LinkKind, NodeKind,
    OrgNode, RelationshipDiagram, Theme, Topic, TypeFilter,
};
use crate::services::themes::sort_by_position;
use crate::storage::{DocumentStore, list_records};
use crate::Result;
use std::collections::HashSet;

/// ID of the synthetic parent node.
pub const PARENT_NODE_ID: &str = "parent-department";

/// Default label of the parent node.
pub const DEFAULT_ROOT_LABEL: &str = "Information & Communications Division";

/// Records a diagram is built from.
#[derive(Debug, Clone, Default)]
pub struct DiagramData {
    /// Themes, in display order.
    pub themes: Vec<Theme>,
    /// All focus initiatives.
    pub initiatives: Vec<FocusInitiative>,
    /// Organization tree, if any organizations exist.
    pub org_tree: Option<OrgNode>,
    /// All topics.
    pub topics: Vec<Topic>,
}

impl DiagramData {
    /// Loads everything a diagram needs from the document store.
    ///
    /// # Errors
    ///
    /// Returns an error if a store read fails.
    pub fn load(store: &dyn DocumentStore) -> Result<Self> {
        let mut themes: Vec<Theme> = list_records(store, Collection::Themes)?;
        sort_by_position(&mut themes);

        let org_docs = store.list(Collection::Organizations)?;
        let org_tree = if org_docs.is_empty() {
            None
        } else {
            let flat = org_docs
                .iter()
                .filter_map(|doc| {
                    let parent = doc.str_field("parentId").map(str::to_string);
                    match doc.to_record::<OrgNode>() {
                        Ok(node) => Some((node, parent)),
                        Err(e) => {
                            tracing::warn!(id = %doc.id, error = %e, "Skipping malformed organization");
                            None
                        },
                    }
                })
                .collect();
            Some(OrgNode::from_flat(flat))
        };

        Ok(Self {
            themes,
            initiatives: list_records(store, Collection::FocusInitiatives)?,
            org_tree,
            topics: list_records(store, Collection::Topics)?,
        })
    }
}

/// Builds [`RelationshipDiagram`]s.
#[derive(Debug, Clone)]
pub struct DiagramBuilder {
    root_label: String,
}

impl Default for DiagramBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_LABEL)
    }
}

/// Accumulates nodes and links for one build.
#[derive(Default)]
struct Graph {
    nodes: Vec<DiagramNode>,
    node_ids: HashSet<String>,
    links: Vec<DiagramLink>,
}

impl Graph {
    fn node(&mut self, id: String, label: &str, kind: NodeKind, source_id: Option<&str>) {
        self.node_ids.insert(id.clone());
        self.nodes.push(DiagramNode {
            id,
            label: label.to_string(),
            kind,
            is_parent: false,
            source_id: source_id.map(str::to_string),
        });
    }

    fn link(&mut self, source: &str, target: &str, kind: LinkKind) {
        self.links.push(DiagramLink {
            source: source.to_string(),
            target: target.to_string(),
            kind,
        });
    }

    fn has(&self, id: &str) -> bool {
        self.node_ids.contains(id)
    }
}

impl DiagramBuilder {
    /// Creates a builder whose parent node carries `root_label`.
    #[must_use]
    pub fn new(root_label: impl Into<String>) -> Self {
        Self {
            root_label: root_label.into(),
        }
    }

    /// Builds the diagram for one theme (`selected_theme_id`) or all themes.
    #[must_use]
    pub fn build(
        &self,
        data: &DiagramData,
        selected_theme_id: Option<&str>,
        type_filter: &TypeFilter,
    ) -> RelationshipDiagram {
        let org_tree = data.org_tree.as_ref();
        if org_tree.is_none() && data.themes.is_empty() {
            return RelationshipDiagram::default();
        }

        let themes: Vec<&Theme> = match selected_theme_id {
            Some(id) => data.themes.iter().filter(|t| t.id == id).collect(),
            None => data.themes.iter().collect(),
        };
        if themes.is_empty() {
            return RelationshipDiagram::default();
        }

        let mut graph = Graph::default();
        let mut stats = DiagramStats::default();
        let mut missing_topics: Vec<String> = Vec::new();

        if org_tree.is_some() {
            graph.node_ids.insert(PARENT_NODE_ID.to_string());
            graph.nodes.push(DiagramNode {
                id: PARENT_NODE_ID.to_string(),
                label: self.root_label.clone(),
                kind: NodeKind::Organization,
                is_parent: true,
                source_id: None,
            });
        }

        for theme in themes {
            graph.node(theme.id.clone(), &theme.title, NodeKind::Theme, Some(theme.id.as_str()));
            stats.themes += 1;
            if org_tree.is_some() {
                graph.link(PARENT_NODE_ID, &theme.id, LinkKind::Main);
            }

            let initiatives: Vec<&FocusInitiative> = data
                .initiatives
                .iter()
                .filter(|i| i.belongs_to(theme))
                .collect();

            for org_id in organization_ids(&initiatives) {
                let found = org_tree.and_then(|tree| tree.find(&org_id));
                let org_type = found
                    .and_then(|n| n.node_type.as_deref())
                    .unwrap_or("organization");
                if !type_filter.accepts(org_type) {
                    continue;
                }
                let label = found.map_or(org_id.as_str(), OrgNode::label);
                let kind = if org_type == "company" {
                    NodeKind::Company
                } else {
                    NodeKind::Organization
                };
                let node_id = format!("{}_{org_id}", theme.id);
                graph.node(node_id.clone(), label, kind, Some(org_id.as_str()));
                graph.link(&theme.id, &node_id, LinkKind::Main);
                stats.organizations += 1;
            }

            for initiative in initiatives {
                let initiative_node = format!("{}_{}", theme.id, initiative.id);
                graph.node(
                    initiative_node.clone(),
                    &initiative.title,
                    NodeKind::Initiative,
                    Some(initiative.id.as_str()),
                );
                stats.initiatives += 1;

                if let Some(org_id) = &initiative.organization_id {
                    let org_node = format!("{}_{org_id}", theme.id);
                    if graph.has(&org_node) {
                        graph.link(&org_node, &initiative_node, LinkKind::Branch);
                    }
                }

                for topic_id in initiative.topic_ids.iter() {
                    let topic = data
                        .topics
                        .iter()
                        .find(|t| t.id == *topic_id || t.short_id() == *topic_id);
                    let Some(topic) = topic else {
                        if !missing_topics.contains(topic_id) {
                            missing_topics.push(topic_id.clone());
                        }
                        continue;
                    };
                    let topic_node = format!("{initiative_node}_{topic_id}");
                    graph.node(topic_node.clone(), &topic.title, NodeKind::Topic, Some(topic.id.as_str()));
                    graph.link(&initiative_node, &topic_node, LinkKind::Topic);
                    stats.topics += 1;
                }
            }
        }

        if !missing_topics.is_empty() {
            tracing::warn!(
                count = missing_topics.len(),
                topic_ids = ?missing_topics,
                "Initiatives reference topics that do not exist"
            );
        }

        let total_links = graph.links.len();
        let Graph {
            nodes,
            node_ids,
            links,
        } = graph;
        let links: Vec<DiagramLink> = links
            .into_iter()
            .filter(|l| node_ids.contains(&l.source) && node_ids.contains(&l.target))
            .collect();
        stats.dropped_links = total_links - links.len();
        if stats.dropped_links > 0 {
            tracing::error!(
                dropped = stats.dropped_links,
                "Diagram links referenced missing nodes and were dropped"
            );
        }
        stats.missing_topic_ids = missing_topics;

        tracing::debug!(
            nodes = nodes.len(),
            links = links.len(),
            themes = stats.themes,
            topics = stats.topics,
            "Built relationship diagram"
        );
        RelationshipDiagram {
            nodes,
            links,
            stats,
        }
    }
}

/// Initiative organizations plus related organizations, deduplicated in
/// first-seen order.
fn organization_ids(initiatives: &[&FocusInitiative]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for initiative in initiatives {
        let related = initiative.related_organizations.iter();
        for id in initiative.organization_id.iter().chain(related) {
            if !id.is_empty() && seen.insert(id.clone()) {
                ids.push(id.clone());
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StringList;

    fn list(ids: &[&str]) -> StringList {
        StringList(ids.iter().map(ToString::to_string).collect())
    }

    fn sample() -> DiagramData {
        let org_tree = OrgNode {
            id: "root".to_string(),
            children: vec![
                OrgNode {
                    id: "o1".to_string(),
                    name: Some("Sales".to_string()),
                    ..OrgNode::default()
                },
                OrgNode {
                    id: "c1".to_string(),
                    name: Some("Acme".to_string()),
                    node_type: Some("company".to_string()),
                    ..OrgNode::default()
                },
            ],
            ..OrgNode::default()
        };
        DiagramData {
            themes: vec![Theme {
                id: "t1".to_string(),
                title: "Growth".to_string(),
                initiative_ids: list(&["i1"]),
                ..Theme::default()
            }],
            initiatives: vec![
                FocusInitiative {
                    id: "i1".to_string(),
                    title: "Expand".to_string(),
                    organization_id: Some("o1".to_string()),
                    topic_ids: list(&["tp1", "ghost"]),
                    related_organizations: list(&["c1", "o1"]),
                    ..FocusInitiative::default()
                },
                FocusInitiative {
                    id: "i2".to_string(),
                    theme_id: Some("t1".to_string()),
                    ..FocusInitiative::default()
                },
            ],
            org_tree: Some(org_tree),
            topics: vec![Topic {
                id: "m1-topic-tp1".to_string(),
                title: "Pricing".to_string(),
                ..Topic::default()
            }],
        }
    }

    #[test]
    fn test_full_graph() {
        let diagram = DiagramBuilder::default().build(&sample(), None, &TypeFilter::All);
        let parent = diagram.node(PARENT_NODE_ID).unwrap();
        assert!(parent.is_parent);
        assert_eq!(parent.label, DEFAULT_ROOT_LABEL);
        assert_eq!(diagram.node("t1_o1").unwrap().label, "Sales");
        assert_eq!(diagram.node("t1_c1").unwrap().kind, NodeKind::Company);
        assert!(diagram.node("t1_i2").is_some());
        assert_eq!(diagram.node("t1_i1_tp1").unwrap().label, "Pricing");
        assert_eq!(diagram.stats.missing_topic_ids, vec!["ghost"]);
        assert_eq!(diagram.stats.organizations, 2);
        assert_eq!(diagram.stats.dropped_links, 0);
        assert!(diagram.links.contains(&DiagramLink {
            source: "t1_o1".to_string(),
            target: "t1_i1".to_string(),
            kind: LinkKind::Branch,
        }));
    }

    #[test]
    fn test_type_filter_drops_branch_link() {
        let diagram = DiagramBuilder::default().build(
            &sample(),
            None,
            &TypeFilter::parse("company"),
        );
        assert!(diagram.node("t1_o1").is_none());
        assert!(diagram.node("t1_c1").is_some());
        assert!(!diagram.links.iter().any(|l| l.kind == LinkKind::Branch));
    }

    #[test]
    fn test_unknown_selected_theme_is_empty() {
        let diagram =
            DiagramBuilder::default().build(&sample(), Some("nope"), &TypeFilter::All);
        assert!(diagram.is_empty());
    }

    #[test]
    fn test_no_tree_no_parent() {
        let mut data = sample();
        data.org_tree = None;
        let diagram = DiagramBuilder::new("Root").build(&data, None, &TypeFilter::All);
        assert!(diagram.node(PARENT_NODE_ID).is_none());
        // Without a tree, organizations fall back to their IDs.
        assert_eq!(diagram.node("t1_o1").unwrap().label, "o1");
    }

    #[test]
    fn test_empty_inputs() {
        let diagram =
            DiagramBuilder::default().build(&DiagramData::default(), None, &TypeFilter::All);
        assert!(diagram.is_empty());
    }
}
