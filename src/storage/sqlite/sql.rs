//! SQL generation for document queries.
//!
//! Document fields live in a JSON `data` column and are addressed with
//! `json_extract` / `json_type`. JSON paths are always bound as parameters;
//! field names are validated before they get here anyway.
//!
//! The generated predicates mirror [`Condition::matches`] so the `SQLite` and
//! in-memory stores return the same documents.

use crate::models::{Condition, Operator, QueryConditions, SortDirection};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// A `WHERE` / `ORDER BY` / `LIMIT` tail with its bound parameters.
#[derive(Debug, Default)]
pub struct QueryClause {
    /// SQL appended after `WHERE collection = ?1`.
    pub sql: String,
    /// Parameters, in order, after the collection parameter.
    pub params: Vec<SqlValue>,
}

/// Builds the query tail for a set of conditions.
#[must_use]
pub fn build_query_clause(conditions: &QueryConditions) -> QueryClause {
    let mut clause = QueryClause::default();

    for condition in conditions.effective_filters() {
        let predicate = condition_sql(&condition, &mut clause.params);
        clause.sql.push_str(" AND ");
        clause.sql.push_str(&predicate);
    }

    match &conditions.order_by {
        Some((field, direction)) => {
            let dir = match direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            clause
                .sql
                .push_str(&format!(" ORDER BY json_extract(data, ?) {dir}, id ASC"));
            clause.params.push(json_path(field));
        },
        None => clause.sql.push_str(" ORDER BY id ASC"),
    }

    if let Some(limit) = conditions.limit {
        clause.sql.push_str(" LIMIT ?");
        clause
            .params
            .push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    clause
}

/// Renders one condition as a boolean SQL expression that is never `NULL`.
fn condition_sql(condition: &Condition, params: &mut Vec<SqlValue>) -> String {
    let path = json_path(&condition.field);
    match condition.operator {
        Operator::Eq => format!("COALESCE({}, 0)", equality_sql(&path, &condition.value, params)),
        Operator::Ne => format!(
            "NOT COALESCE({}, 0)",
            equality_sql(&path, &condition.value, params)
        ),
        Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
            let op = match condition.operator {
                Operator::Lt => "<",
                Operator::Le => "<=",
                Operator::Gt => ">",
                _ => ">=",
            };
            let (types, bound) = match &condition.value {
                Value::Number(n) => ("('integer', 'real')", number_param(n)),
                Value::String(s) => ("('text')", SqlValue::Text(s.clone())),
                _ => return "0".to_string(),
            };
            params.extend([path.clone(), path, bound]);
            format!(
                "COALESCE((json_type(data, ?) IN {types} AND json_extract(data, ?) {op} ?), 0)"
            )
        },
    }
}

/// Equality predicate; see [`crate::models::values_equal`].
fn equality_sql(path: &SqlValue, value: &Value, params: &mut Vec<SqlValue>) -> String {
    match value {
        Value::Null => {
            params.push(path.clone());
            "(json_extract(data, ?) IS NULL)".to_string()
        },
        Value::Bool(b) => {
            params.push(path.clone());
            params.push(SqlValue::Text(b.to_string()));
            "(json_type(data, ?) = ?)".to_string()
        },
        Value::Number(n) => {
            params.extend([path.clone(), path.clone(), number_param(n)]);
            "(json_type(data, ?) IN ('integer', 'real') AND json_extract(data, ?) = ?)".to_string()
        },
        Value::String(s) => {
            let text = SqlValue::Text(s.clone());
            params.extend([
                path.clone(),
                path.clone(),
                text.clone(),
                path.clone(),
                path.clone(),
                text.clone(),
                path.clone(),
                path.clone(),
                text,
            ]);
            "((json_type(data, ?) = 'text' AND json_extract(data, ?) = ?) \
             OR (json_type(data, ?) IN ('integer', 'real') AND CAST(json_extract(data, ?) AS TEXT) = ?) \
             OR (json_type(data, ?) IN ('true', 'false') AND json_type(data, ?) = ?))"
                .to_string()
        },
        Value::Array(_) | Value::Object(_) => {
            params.extend([
                path.clone(),
                path.clone(),
                SqlValue::Text(value.to_string()),
            ]);
            "(json_type(data, ?) IN ('array', 'object') AND json_extract(data, ?) = ?)".to_string()
        },
    }
}

fn json_path(field: &str) -> SqlValue {
    SqlValue::Text(format!("$.{field}"))
}

fn number_param(n: &serde_json::Number) -> SqlValue {
    n.as_i64().map_or_else(
        || SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        SqlValue::Integer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn placeholders(sql: &str) -> usize {
        sql.matches('?').count()
    }

    #[test]
    fn test_parameter_count_matches_placeholders() {
        let conditions = QueryConditions::new()
            .where_eq("a", "x")
            .where_eq("b", 3)
            .where_eq("c", true)
            .where_eq("d", Value::Null)
            .where_eq("e", json!(["x"]))
            .order_by_desc("position")
            .with_limit(5);
        let clause = build_query_clause(&conditions);
        assert_eq!(placeholders(&clause.sql), clause.params.len());
        assert!(clause.sql.contains("DESC"));
        assert!(clause.sql.ends_with("LIMIT ?"));
    }

    #[test]
    fn test_legacy_comparison() {
        let conditions = QueryConditions::new().where_op("position", Operator::Ge, 2);
        let clause = build_query_clause(&conditions);
        assert!(clause.sql.contains(">= ?"));
        assert_eq!(placeholders(&clause.sql), clause.params.len());
    }

    #[test]
    fn test_comparison_with_unsupported_value_matches_nothing() {
        let conditions = QueryConditions::new().where_op("flag", Operator::Lt, true);
        let clause = build_query_clause(&conditions);
        assert!(clause.sql.starts_with(" AND 0"));
    }

    #[test]
    fn test_default_order_is_id() {
        let clause = build_query_clause(&QueryConditions::new());
        assert_eq!(clause.sql, " ORDER BY id ASC");
        assert!(clause.params.is_empty());
    }
}
