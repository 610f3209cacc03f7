//! CSV import into a single collection.

use crate::models::{Collection, Fields};
use crate::storage::DocumentStore;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use tracing::instrument;

/// A row that could not be imported.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvRowError {
    /// 1-based data row number (the header is row 0).
    pub row: usize,
    /// Failure description.
    pub error: String,
}

/// Outcome of [`import_csv`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvImportReport {
    /// Rows written.
    pub imported: usize,
    /// Rows that failed.
    pub failed: usize,
    /// Per-row failures.
    pub errors: Vec<CsvRowError>,
}

/// Types a CSV cell.
///
/// JSON arrays and objects, numbers and booleans are parsed; anything else
/// (including quoted JSON strings) stays a string.
#[must_use]
pub fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if (trimmed.starts_with('[') || trimmed.starts_with('{'))
        && let Ok(value) = serde_json::from_str::<Value>(trimmed)
    {
        return value;
    }
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {},
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            return Value::from(n);
        }
    }
    Value::String(trimmed.to_string())
}

/// Imports CSV rows from `reader` into `collection`.
///
/// The header row names the fields. An `id` column, when non-empty, is the
/// document ID (`set`); otherwise the row is `add`ed. Failing rows are
/// recorded and the import continues. Empty cells are omitted.
///
/// # Errors
///
/// Returns an error only if the header row cannot be read.
#[instrument(skip(store, reader), fields(operation = "import_csv", collection = %collection))]
pub fn import_csv<R: Read>(
    store: &dyn DocumentStore,
    collection: Collection,
    reader: R,
) -> Result<CsvImportReport> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| Error::OperationFailed {
            operation: "read_csv_headers".to_string(),
            cause: e.to_string(),
        })?
        .clone();
    if headers.iter().all(str::is_empty) {
        return Err(Error::InvalidInput("CSV has no header row".to_string()));
    }

    let mut report = CsvImportReport::default();
    for (index, record) in csv_reader.records().enumerate() {
        let row = index + 1;
        let result = record
            .map_err(|e| Error::InvalidInput(e.to_string()))
            .and_then(|record| import_row(store, collection, &headers, &record));
        match result {
            Ok(()) => report.imported += 1,
            Err(e) => {
                tracing::warn!(row, error = %e, "Skipping CSV row");
                report.failed += 1;
                report.errors.push(CsvRowError {
                    row,
                    error: e.to_string(),
                });
            },
        }
    }

    tracing::info!(
        imported = report.imported,
        failed = report.failed,
        "CSV import finished"
    );
    Ok(report)
}

fn import_row(
    store: &dyn DocumentStore,
    collection: Collection,
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
) -> Result<()> {
    let mut fields = Fields::new();
    let mut id = None;
    for (header, cell) in headers.iter().zip(record.iter()) {
        if header.is_empty() || cell.is_empty() {
            continue;
        }
        if header == "id" {
            id = Some(cell.to_string());
        } else {
            fields.insert(header.to_string(), parse_cell(cell));
        }
    }
    if fields.is_empty() {
        return Err(Error::InvalidInput("row has no values".to_string()));
    }
    match id {
        Some(id) => store.set(collection, &id, fields).map(|_| ()),
        None => store.add(collection, fields).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryDocumentStore;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("12", json!(12); "integer")]
    #[test_case("1.5", json!(1.5); "float")]
    #[test_case("true", json!(true); "boolean")]
    #[test_case(r#"["a","b"]"#, json!(["a", "b"]); "array")]
    #[test_case("[not json", json!("[not json"); "broken array")]
    #[test_case("Sales", json!("Sales"); "string")]
    fn test_parse_cell(raw: &str, expected: Value) {
        assert_eq!(parse_cell(raw), expected);
    }

    #[test]
    fn test_import_with_and_without_id() {
        let store = InMemoryDocumentStore::new();
        let data = "id,name,level,topicIds\n\
                    org-1,Sales,1,\"[\"\"a\"\"]\"\n\
                    ,Marketing,2,\n";
        let report = import_csv(&store, Collection::Organizations, data.as_bytes()).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 0);

        let org = store.get(Collection::Organizations, "org-1").unwrap().unwrap();
        assert_eq!(org.get("level"), Some(&json!(1)));
        assert_eq!(org.get("topicIds"), Some(&json!(["a"])));
        assert_eq!(store.count(Collection::Organizations).unwrap(), 2);
    }

    #[test]
    fn test_empty_row_is_reported() {
        let store = InMemoryDocumentStore::new();
        let data = "id,name\nx,\n,Ok\n";
        let report = import_csv(&store, Collection::Companies, data.as_bytes()).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].row, 1);
    }
}
