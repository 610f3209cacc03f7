//! Generic documents and the collection whitelist.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Field map stored for every document.
pub type Fields = Map<String, Value>;

/// Collections the document store accepts.
///
/// Collection names are interpolated nowhere in SQL, but the whitelist still
/// rejects typos and unknown names at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    /// Organization tree nodes.
    Organizations,
    /// Members of organizations.
    OrganizationMembers,
    /// Free-form organization pages.
    OrganizationContents,
    /// Focus initiatives.
    FocusInitiatives,
    /// Meeting notes.
    MeetingNotes,
    /// Themes grouping initiatives.
    Themes,
    /// Topics extracted from meeting notes.
    Topics,
    /// Knowledge-graph entities.
    Entities,
    /// Knowledge-graph relations.
    Relations,
    /// Companies.
    Companies,
    /// Concepts.
    Concepts,
    /// Page-level embeddings.
    PageEmbeddings,
    /// Saved theme hierarchy layouts.
    ThemeHierarchyConfigs,
    /// AI provider settings.
    AiSettings,
    /// Backup bookkeeping.
    BackupHistory,
}

impl Collection {
    /// Returns all collections in declaration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Organizations,
            Self::OrganizationMembers,
            Self::OrganizationContents,
            Self::FocusInitiatives,
            Self::MeetingNotes,
            Self::Themes,
            Self::Topics,
            Self::Entities,
            Self::Relations,
            Self::Companies,
            Self::Concepts,
            Self::PageEmbeddings,
            Self::ThemeHierarchyConfigs,
            Self::AiSettings,
            Self::BackupHistory,
        ]
    }

    /// Returns the wire name of the collection.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Organizations => "organizations",
            Self::OrganizationMembers => "organizationMembers",
            Self::OrganizationContents => "organizationContents",
            Self::FocusInitiatives => "focusInitiatives",
            Self::MeetingNotes => "meetingNotes",
            Self::Themes => "themes",
            Self::Topics => "topics",
            Self::Entities => "entities",
            Self::Relations => "relations",
            Self::Companies => "companies",
            Self::Concepts => "concepts",
            Self::PageEmbeddings => "pageEmbeddings",
            Self::ThemeHierarchyConfigs => "themeHierarchyConfigs",
            Self::AiSettings => "aiSettings",
            Self::BackupHistory => "backupHistory",
        }
    }

    /// Parses a collection name, returning `None` if it is not whitelisted.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("unknown collection: {s}")))
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document ID, unique within its collection.
    pub id: String,
    /// Document fields, excluding `id`.
    pub data: Fields,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Last update time (RFC 3339).
    pub updated_at: String,
}

impl Document {
    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Returns a string field, if present and a string.
    #[must_use]
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    /// Deserializes the document into a typed record.
    ///
    /// The document's `id`, `createdAt` and `updatedAt` are merged into the
    /// field map first so records can declare them as ordinary fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the fields do not match `T`.
    pub fn to_record<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.flattened())).map_err(|e| {
            Error::InvalidInput(format!("document '{}' has unexpected shape: {e}", self.id))
        })
    }

    /// Returns the fields with `id`, `createdAt` and `updatedAt` included.
    #[must_use]
    pub fn flattened(&self) -> Fields {
        let mut fields = self.data.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        fields
            .entry("createdAt")
            .or_insert_with(|| Value::String(self.created_at.clone()));
        fields
            .entry("updatedAt")
            .or_insert_with(|| Value::String(self.updated_at.clone()));
        fields
    }
}

/// Converts a JSON value into a field map.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the value is not a JSON object.
pub fn fields_from_value(value: Value) -> Result<Fields> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidInput(format!(
            "document data must be a JSON object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_parse_roundtrip() {
        for collection in Collection::all() {
            assert_eq!(Collection::parse(collection.as_str()), Some(*collection));
        }
    }

    #[test]
    fn test_collection_rejects_unknown() {
        assert!(Collection::parse("sqlite_master").is_none());
        assert!("users; DROP TABLE".parse::<Collection>().is_err());
    }

    #[test]
    fn test_collection_serde_uses_wire_name() {
        let json = serde_json::to_string(&Collection::FocusInitiatives).unwrap();
        assert_eq!(json, "\"focusInitiatives\"");
    }

    #[test]
    fn test_fields_from_value_requires_object() {
        assert!(fields_from_value(json!({"a": 1})).is_ok());
        assert!(fields_from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_flattened_includes_id_and_timestamps() {
        let doc = Document {
            id: "d1".to_string(),
            data: fields_from_value(json!({"title": "x"})).unwrap(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            updated_at: "2024-01-02T00:00:00.000Z".to_string(),
        };
        let flat = doc.flattened();
        assert_eq!(flat["id"], "d1");
        assert_eq!(flat["createdAt"], "2024-01-01T00:00:00.000Z");
        assert_eq!(flat["title"], "x");
    }
}
