//! Query conditions for collection reads.
//!
//! Conditions come in two shapes, mirroring the IPC payloads the desktop
//! front end sends:
//!
//! ```json
//! { "topicId": "t-1", "orderBy": "position", "orderDirection": "desc" }
//! { "field": "position", "operator": ">=", "value": 3 }
//! ```
//!
//! Equality filters are ANDed together. The single `field`/`operator`/`value`
//! filter is only honoured when no equality filters are present.

use crate::models::Fields;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Keys in a JSON conditions object that are not equality filters.
const RESERVED_KEYS: &[&str] = &[
    "orderBy",
    "orderDirection",
    "field",
    "operator",
    "value",
    "limit",
];

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `==`
    #[serde(rename = "==")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    Ne,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
}

impl Operator {
    /// Parses an operator, falling back to `==` for anything unrecognised.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            _ => Self::Eq,
        }
    }

    /// Returns the operator symbol.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// Parses a direction; only `desc` (any case) is descending.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Field name.
    pub field: String,
    /// Operator.
    pub operator: Operator,
    /// Right-hand value.
    pub value: Value,
}

impl Condition {
    /// Evaluates the condition against a document's fields.
    #[must_use]
    pub fn matches(&self, fields: &Fields) -> bool {
        let stored = fields.get(&self.field);
        match self.operator {
            Operator::Eq => values_equal(stored, &self.value),
            Operator::Ne => !values_equal(stored, &self.value),
            Operator::Lt => compare_values(stored, &self.value).is_some_and(Ordering::is_lt),
            Operator::Le => compare_values(stored, &self.value).is_some_and(Ordering::is_le),
            Operator::Gt => compare_values(stored, &self.value).is_some_and(Ordering::is_gt),
            Operator::Ge => compare_values(stored, &self.value).is_some_and(Ordering::is_ge),
        }
    }
}

/// Conditions for a collection query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryConditions {
    /// Equality filters, ANDed.
    pub equals: Vec<(String, Value)>,
    /// Single comparison filter, used only when `equals` is empty.
    pub legacy: Option<Condition>,
    /// Sort field and direction.
    pub order_by: Option<(String, SortDirection)>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl QueryConditions {
    /// Creates empty conditions (match everything).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            equals: Vec::new(),
            legacy: None,
            order_by: None,
            limit: None,
        }
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    /// Sets the single comparison filter.
    #[must_use]
    pub fn where_op(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.legacy = Some(Condition {
            field: field.into(),
            operator,
            value: value.into(),
        });
        self
    }

    /// Orders results ascending by a field.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some((field.into(), SortDirection::Asc));
        self
    }

    /// Orders results descending by a field.
    #[must_use]
    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some((field.into(), SortDirection::Desc));
        self
    }

    /// Limits the number of results.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parses the JSON conditions object used over IPC.
    ///
    /// `null` parses as empty conditions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the value is not an object or a
    /// field name is invalid.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(object) => object,
            other => {
                return Err(Error::InvalidInput(format!(
                    "query conditions must be an object, got {other}"
                )));
            },
        };

        let mut conditions = Self::new();
        for (key, value) in object {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            conditions.equals.push((key.clone(), value.clone()));
        }

        if let Some(field) = object.get("field").and_then(Value::as_str) {
            let operator = object
                .get("operator")
                .and_then(Value::as_str)
                .map_or(Operator::Eq, Operator::parse);
            conditions.legacy = Some(Condition {
                field: field.to_string(),
                operator,
                value: object.get("value").cloned().unwrap_or(Value::Null),
            });
        }

        if let Some(order_by) = object.get("orderBy").and_then(Value::as_str) {
            let direction = object
                .get("orderDirection")
                .and_then(Value::as_str)
                .map_or(SortDirection::Asc, SortDirection::parse);
            conditions.order_by = Some((order_by.to_string(), direction));
        }

        conditions.limit = object
            .get("limit")
            .and_then(Value::as_u64)
            .and_then(|l| usize::try_from(l).ok());

        conditions.validate()?;
        Ok(conditions)
    }

    /// Validates every field name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a field name outside `[A-Za-z0-9_]+`.
    pub fn validate(&self) -> Result<()> {
        let fields = self
            .equals
            .iter()
            .map(|(f, _)| f.as_str())
            .chain(self.legacy.iter().map(|c| c.field.as_str()))
            .chain(self.order_by.iter().map(|(f, _)| f.as_str()));
        for field in fields {
            validate_field_name(field)?;
        }
        Ok(())
    }

    /// Returns the filters that are actually applied.
    #[must_use]
    pub fn effective_filters(&self) -> Vec<Condition> {
        if self.equals.is_empty() {
            return self.legacy.iter().cloned().collect();
        }
        self.equals
            .iter()
            .map(|(field, value)| Condition {
                field: field.clone(),
                operator: Operator::Eq,
                value: value.clone(),
            })
            .collect()
    }

    /// Evaluates all effective filters against a document's fields.
    #[must_use]
    pub fn matches(&self, fields: &Fields) -> bool {
        self.effective_filters().iter().all(|c| c.matches(fields))
    }
}

/// Checks that a field name is safe to embed in a JSON path.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the name is empty or contains
/// characters other than ASCII letters, digits and `_`.
pub fn validate_field_name(field: &str) -> Result<()> {
    if !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid field name: {field}")))
    }
}

/// Equality used by queries.
///
/// `null` matches a missing field. Numbers compare numerically. A string
/// condition also matches a number or boolean with the same text.
#[must_use]
pub fn values_equal(stored: Option<&Value>, condition: &Value) -> bool {
    match (stored, condition) {
        (None | Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(Value::Number(a)), Value::String(b)) => a.to_string() == *b,
        (Some(Value::Bool(a)), Value::String(b)) => a.to_string() == *b,
        (Some(a), b) => a == b,
    }
}

/// Ordering used by `<`, `<=`, `>`, `>=`: numbers with numbers, strings with strings.
#[must_use]
pub fn compare_values(stored: Option<&Value>, condition: &Value) -> Option<Ordering> {
    match (stored?, condition) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

/// Total order used for `orderBy`, matching `SQLite`'s ordering of
/// `json_extract` results: nulls, then numbers (booleans as 0/1), then text.
#[must_use]
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> (u8, f64, String) {
        match v {
            None | Some(Value::Null) => (0, 0.0, String::new()),
            Some(Value::Bool(b)) => (1, if *b { 1.0 } else { 0.0 }, String::new()),
            Some(Value::Number(n)) => (1, n.as_f64().unwrap_or(0.0), String::new()),
            Some(Value::String(s)) => (2, 0.0, s.clone()),
            Some(other) => (2, 0.0, other.to_string()),
        }
    }
    let (ra, na, sa) = rank(a);
    let (rb, nb, sb) = rank(b);
    ra.cmp(&rb)
        .then_with(|| na.partial_cmp(&nb).unwrap_or(Ordering::Equal))
        .then_with(|| sa.cmp(&sb))
}
