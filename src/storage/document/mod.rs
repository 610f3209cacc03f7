//! Document store implementations.

mod memory;
mod sqlite;

pub use memory::InMemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

use crate::models::Fields;
use serde_json::Value;

/// Fields of a write with the reserved keys split out.
#[derive(Debug)]
struct PreparedWrite {
    fields: Fields,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl PreparedWrite {
    /// Strips `id`, `createdAt` and `updatedAt` from `fields`.
    ///
    /// Only non-empty string timestamps are kept; anything else is dropped
    /// and replaced by the store.
    fn new(mut fields: Fields) -> Self {
        fields.remove("id");
        let created_at = take_timestamp(&mut fields, "createdAt");
        let updated_at = take_timestamp(&mut fields, "updatedAt");
        Self {
            fields,
            created_at,
            updated_at,
        }
    }
}

fn take_timestamp(fields: &mut Fields, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

/// Merges `patch` into `target`; keys in `patch` win.
fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepared_write_strips_reserved() {
        let Value::Object(fields) = json!({
            "id": "ignored",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": 12,
            "title": "x"
        }) else {
            unreachable!()
        };
        let prepared = PreparedWrite::new(fields);
        assert_eq!(prepared.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert!(prepared.updated_at.is_none());
        assert_eq!(prepared.fields.len(), 1);
    }

    #[test]
    fn test_merge_fields() {
        let Value::Object(mut target) = json!({"a": 1, "b": 2}) else {
            unreachable!()
        };
        let Value::Object(patch) = json!({"b": null, "c": 3}) else {
            unreachable!()
        };
        merge_fields(&mut target, patch);
        assert_eq!(Value::Object(target), json!({"a": 1, "b": null, "c": 3}));
    }
}
