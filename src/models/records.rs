//! Typed views over stored documents.
//!
//! Documents are free-form JSON. These records read the fields the graph,
//! regeneration and repair workflows need, and tolerate the representations
//! seen in real data: list fields stored either as native arrays or as
//! JSON-encoded strings, and sync flags stored as numbers, booleans or text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A list of strings that may arrive as a native array or a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StringList(pub Vec<String>);

impl StringList {
    /// Parses a raw field value.
    ///
    /// - arrays keep their string elements (other element types are dropped)
    /// - strings are parsed as JSON arrays; unparsable strings yield an empty list
    /// - anything else yields an empty list
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            Value::String(s) if s.trim().is_empty() => Self::default(),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(parsed @ Value::Array(_)) => Self::from_value(&parsed),
                Ok(_) | Err(_) => {
                    tracing::warn!(raw = %s, "Failed to parse JSON-encoded list, treating as empty");
                    Self::default()
                },
            },
            _ => Self::default(),
        }
    }

    /// Returns true if the list contains `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|v| v == id)
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

impl From<Vec<String>> for StringList {
    fn from(v: Vec<String>) -> Self {
        Self(v)
    }
}

impl<'a> IntoIterator for &'a StringList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The `chromaSynced` flag.
///
/// Absent, `null`, `0`, `false` and `"0"` mean not synced; `1`, `true` and
/// `"1"` (and any other non-zero number) mean synced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SyncFlag(pub bool);

impl SyncFlag {
    /// Normalizes a raw field value.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        let synced = match value {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => matches!(s.trim(), "1" | "true"),
            _ => false,
        };
        Self(synced)
    }

    /// Returns true if the record is marked synced.
    #[must_use]
    pub const fn is_synced(self) -> bool {
        self.0
    }

    /// Returns the stored representation (`1` or `0`).
    #[must_use]
    pub fn to_value(self) -> Value {
        Value::from(i64::from(self.0))
    }
}

impl<'de> Deserialize<'de> for SyncFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(Self::from_value(value.as_ref()))
    }
}

/// Deserializes an optional string, treating empty strings as absent.
fn non_empty_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Deserializes a string that may be missing or null.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(non_empty_string(deserializer)?.unwrap_or_default())
}

/// Deserializes a number that may be stored as text.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Deserializes an integer position, rounding floats and parsing text.
#[allow(clippy::cast_possible_truncation)]
fn lenient_position<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(lenient_number(deserializer)?
        .filter(|f| f.is_finite())
        .map(|f| f.round() as i64))
}

/// Deserializes a metadata object, accepting JSON-encoded strings.
fn metadata_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Map<String, Value>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => map,
        Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    })
}

/// Deserializes child nodes, treating `null` as no children.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A theme grouping initiatives in the relationship diagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    /// Theme ID.
    pub id: String,
    /// Display title.
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    /// Optional description.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub description: Option<String>,
    /// Initiatives explicitly attached to this theme.
    #[serde(default)]
    pub initiative_ids: StringList,
    /// Sort position (1-based once reordered).
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: Option<i64>,
}

/// A focus initiative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusInitiative {
    /// Initiative ID.
    pub id: String,
    /// Display title.
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    /// Owning organization.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub organization_id: Option<String>,
    /// Single theme link (older records).
    #[serde(default, deserialize_with = "non_empty_string")]
    pub theme_id: Option<String>,
    /// Theme links.
    #[serde(default)]
    pub theme_ids: StringList,
    /// Linked topic IDs.
    #[serde(default)]
    pub topic_ids: StringList,
    /// Other organizations involved.
    #[serde(default)]
    pub related_organizations: StringList,
}

impl FocusInitiative {
    /// Returns true if this initiative belongs under `theme`.
    #[must_use]
    pub fn belongs_to(&self, theme: &Theme) -> bool {
        theme.initiative_ids.contains(&self.id)
            || self.theme_id.as_deref() == Some(theme.id.as_str())
            || self.theme_ids.contains(&theme.id)
    }
}

static TOPIC_KEY_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(.+)-topic-(.+)$").ok());

/// A composite topic document ID, `{meetingNoteId}-topic-{topicId}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicKey {
    /// Meeting note the topic was extracted from.
    pub meeting_note_id: String,
    /// Topic ID within the note.
    pub topic_id: String,
}

impl TopicKey {
    /// Splits a composite topic ID. Returns `None` for plain IDs.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        let captures = TOPIC_KEY_PATTERN.as_ref()?.captures(id)?;
        Some(Self {
            meeting_note_id: captures.get(1)?.as_str().to_string(),
            topic_id: captures.get(2)?.as_str().to_string(),
        })
    }

    /// Returns the short topic ID for a stored ID, composite or not.
    #[must_use]
    pub fn short_id(id: &str) -> String {
        Self::parse(id).map_or_else(|| id.to_string(), |k| k.topic_id)
    }
}

/// A topic extracted from a meeting note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Stored document ID (possibly composite).
    pub id: String,
    /// Topic ID inside the meeting note, if stored separately.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub topic_id: Option<String>,
    /// Display title.
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    /// Body text.
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: String,
    /// Source meeting note.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub meeting_note_id: Option<String>,
    /// Owning organization.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub organization_id: Option<String>,
    /// Keywords.
    #[serde(default)]
    pub keywords: StringList,
    /// Short summary.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub summary: Option<String>,
    /// Semantic category label.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub semantic_category: Option<String>,
    /// Importance label, e.g. `high`.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub importance: Option<String>,
    /// Sync flag.
    #[serde(default)]
    pub chroma_synced: SyncFlag,
}

impl Topic {
    /// Returns the topic ID used in initiative `topicIds` lists.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.topic_id
            .clone()
            .unwrap_or_else(|| TopicKey::short_id(&self.id))
    }

    /// Returns the meeting note ID, from the field or the composite ID.
    #[must_use]
    pub fn meeting_note(&self) -> Option<String> {
        self.meeting_note_id
            .clone()
            .or_else(|| TopicKey::parse(&self.id).map(|k| k.meeting_note_id))
    }
}

/// A knowledge-graph entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Entity ID.
    pub id: String,
    /// Display name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Entity type (person, company, product, ...).
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub entity_type: String,
    /// Alternative names.
    #[serde(default)]
    pub aliases: StringList,
    /// Free-form metadata.
    #[serde(default, deserialize_with = "metadata_map")]
    pub metadata: Map<String, Value>,
    /// Owning organization.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub organization_id: Option<String>,
    /// Owning company.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub company_id: Option<String>,
    /// Sync flag.
    #[serde(default)]
    pub chroma_synced: SyncFlag,
}

/// A knowledge-graph relation between two entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// Relation ID.
    pub id: String,
    /// Topic the relation was extracted from.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub topic_id: Option<String>,
    /// Source entity.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub source_entity_id: Option<String>,
    /// Target entity.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub target_entity_id: Option<String>,
    /// Relation type.
    #[serde(default, deserialize_with = "lenient_string")]
    pub relation_type: String,
    /// Description.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub description: Option<String>,
    /// Extraction confidence.
    #[serde(default, deserialize_with = "lenient_number")]
    pub confidence: Option<f64>,
    /// Free-form metadata.
    #[serde(default, deserialize_with = "metadata_map")]
    pub metadata: Map<String, Value>,
    /// Owning organization.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub organization_id: Option<String>,
    /// Owning company.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub company_id: Option<String>,
    /// Sync flag.
    #[serde(default)]
    pub chroma_synced: SyncFlag,
}

/// A node in the organization tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgNode {
    /// Node ID.
    pub id: String,
    /// Name.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub name: Option<String>,
    /// Title (used when `name` is absent).
    #[serde(default, deserialize_with = "non_empty_string")]
    pub title: Option<String>,
    /// Node type, e.g. `organization` or `company`.
    #[serde(default, rename = "type", deserialize_with = "non_empty_string")]
    pub node_type: Option<String>,
    /// Child nodes.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: Vec<Self>,
}

impl OrgNode {
    /// Depth-first search for a node by ID.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Display label: name, then title, then ID.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.id)
    }

    /// Builds a tree from flat organization documents linked by `parentId`.
    ///
    /// Roots are nodes without a parent, or whose parent is unknown. A
    /// synthetic root holds all of them.
    #[must_use]
    pub fn from_flat(nodes: Vec<(Self, Option<String>)>) -> Self {
        use std::collections::HashMap;

        let ids: std::collections::HashSet<String> =
            nodes.iter().map(|(n, _)| n.id.clone()).collect();
        let mut children: HashMap<String, Vec<Self>> = HashMap::new();
        let mut roots = Vec::new();
        for (node, parent) in nodes {
            match parent.filter(|p| ids.contains(p) && *p != node.id) {
                Some(p) => children.entry(p).or_default().push(node),
                None => roots.push(node),
            }
        }

        let roots = roots
            .into_iter()
            .map(|r| attach_children(r, &mut children, 0))
            .collect();
        Self {
            id: "root".to_string(),
            name: None,
            title: None,
            node_type: None,
            children: roots,
        }
    }
}

/// Recursively moves children out of the lookup table onto their parents.
fn attach_children(
    mut node: OrgNode,
    children: &mut std::collections::HashMap<String, Vec<OrgNode>>,
    depth: usize,
) -> OrgNode {
    // Nodes on a parent cycle never reach a root and are dropped.
    if depth > 64 {
        return node;
    }
    if let Some(kids) = children.remove(&node.id) {
        node.children = kids
            .into_iter()
            .map(|k| attach_children(k, children, depth + 1))
            .collect();
    }
    node
}
