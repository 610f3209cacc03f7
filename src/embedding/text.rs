//! Text composition for record embeddings.
//!
//! Names and relation types are repeated so they dominate the embedding.

use crate::models::{Entity, Relation, Topic};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static HTML_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<[^>]*>").ok());
static WHITESPACE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\s+").ok());

const ENTITY_METADATA_KEYS: &[&str] =
    &["role", "department", "position", "industry", "email", "website"];
const RELATION_METADATA_KEYS: &[&str] = &["date", "amount", "percentage", "description", "source"];
const TOPIC_KEYWORD_LIMIT: usize = 5;

/// Removes HTML tags and collapses runs of whitespace.
#[must_use]
pub fn strip_html(text: &str) -> String {
    let without_tags = HTML_TAG
        .as_ref()
        .map_or_else(|| text.to_string(), |re| re.replace_all(text, " ").into_owned());
    WHITESPACE
        .as_ref()
        .map_or(without_tags.clone(), |re| {
            re.replace_all(&without_tags, " ").into_owned()
        })
        .trim()
        .to_string()
}

fn metadata_parts(metadata: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    let parts: Vec<String> = keys
        .iter()
        .filter_map(|key| {
            let value = match metadata.get(*key)? {
                Value::String(s) if !s.trim().is_empty() => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some(if *key == "percentage" {
                format!("{key}: {value}%")
            } else {
                format!("{key}: {value}")
            })
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Text embedded for an entity.
#[must_use]
pub fn entity_text(entity: &Entity) -> String {
    let mut parts = vec![entity.name.clone(); 3];
    if !entity.aliases.is_empty() {
        let aliases: Vec<&str> = entity.aliases.iter().map(String::as_str).collect();
        parts.push(format!("aliases: {}", aliases.join(", ")));
    }
    if let Some(meta) = metadata_parts(&entity.metadata, ENTITY_METADATA_KEYS) {
        parts.push(meta);
    }
    parts.join("\n\n")
}

/// Text embedded for a relation.
///
/// `source_name` / `target_name` are the resolved entity names; callers
/// pass the entity IDs when a name cannot be resolved.
#[must_use]
pub fn relation_text(
    relation: &Relation,
    source_name: Option<&str>,
    target_name: Option<&str>,
) -> String {
    let mut parts = vec![relation.relation_type.clone(); 3];
    match (source_name, target_name) {
        (Some(source), Some(target)) => parts.push(format!("{source} and {target}")),
        (Some(one), None) | (None, Some(one)) => parts.push(format!("related to {one}")),
        (None, None) => {},
    }
    if let Some(description) = &relation.description {
        parts.push(description.clone());
    }
    if let Some(meta) = metadata_parts(&relation.metadata, RELATION_METADATA_KEYS) {
        parts.push(meta);
    }
    parts.join("\n\n")
}

/// Text embedded for a topic.
#[must_use]
pub fn topic_text(topic: &Topic) -> String {
    let mut parts = vec![topic.title.clone(), topic.title.clone()];
    if let Some(summary) = &topic.summary {
        parts.push(summary.clone());
    }
    if !topic.keywords.is_empty() {
        let keywords: Vec<&str> = topic
            .keywords
            .iter()
            .take(TOPIC_KEYWORD_LIMIT)
            .map(String::as_str)
            .collect();
        parts.push(keywords.join(" "));
    }
    if !topic.content.trim().is_empty() {
        parts.push(topic.content.clone());
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StringList;
    use serde_json::json;

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<div>a</div>\n\n<b>b</b>"), "a b");
        assert_eq!(strip_html("plain"), "plain");
    }

    #[test]
    fn test_entity_text() {
        let Value::Object(metadata) = json!({"role": "CTO", "email": "", "website": "x.io"}) else {
            unreachable!()
        };
        let entity = Entity {
            name: "Ada".to_string(),
            aliases: StringList(vec!["A.L.".to_string()]),
            metadata,
            ..Entity::default()
        };
        assert_eq!(
            entity_text(&entity),
            "Ada\n\nAda\n\nAda\n\naliases: A.L.\n\nrole: CTO, website: x.io"
        );
    }

    #[test]
    fn test_relation_text_single_side() {
        let relation = Relation {
            relation_type: "invests".to_string(),
            description: Some("Series A".to_string()),
            ..Relation::default()
        };
        let text = relation_text(&relation, None, Some("Acme"));
        assert_eq!(
            text,
            "invests\n\ninvests\n\ninvests\n\nrelated to Acme\n\nSeries A"
        );
    }

    #[test]
    fn test_topic_text_limits_keywords() {
        let topic = Topic {
            title: "Budget".to_string(),
            keywords: StringList((1..=7).map(|i| format!("k{i}")).collect()),
            content: "body".to_string(),
            ..Topic::default()
        };
        assert_eq!(topic_text(&topic), "Budget\n\nBudget\n\nk1 k2 k3 k4 k5\n\nbody");
    }
}
