//! JSON export and import of whole collections.

use crate::models::{Collection, Fields};
use crate::storage::DocumentStore;
use crate::{Error, Result, current_timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::instrument;

/// Format version written by [`export_collections`].
pub const EXPORT_VERSION: u32 = 1;

/// On-disk layout of an export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    /// Format version.
    pub version: u32,
    /// Export time (RFC 3339).
    pub exported_at: String,
    /// Documents keyed by collection name. Each document carries its `id`.
    pub collections: BTreeMap<String, Vec<Fields>>,
}

/// Writes `collections` to `path` as JSON.
///
/// Returns the number of documents written per collection.
///
/// # Errors
///
/// Returns an error if a store read or the file write fails.
#[instrument(skip(store, collections), fields(operation = "export", path = %path.display()))]
pub fn export_collections(
    store: &dyn DocumentStore,
    collections: &[Collection],
    path: &Path,
) -> Result<BTreeMap<String, usize>> {
    let mut export = ExportFile {
        version: EXPORT_VERSION,
        exported_at: current_timestamp(),
        collections: BTreeMap::new(),
    };
    let mut counts = BTreeMap::new();
    for collection in collections {
        let docs: Vec<Fields> = store
            .list(*collection)?
            .iter()
            .map(crate::models::Document::flattened)
            .collect();
        counts.insert(collection.as_str().to_string(), docs.len());
        export.collections.insert(collection.as_str().to_string(), docs);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create_export_dir", &e))?;
    }
    let file = File::create(path).map_err(|e| io_error("create_export_file", &e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &export).map_err(|e| Error::OperationFailed {
        operation: "serialize_export".to_string(),
        cause: e.to_string(),
    })?;
    writer.flush().map_err(|e| io_error("write_export_file", &e))?;

    tracing::info!(
        collections = counts.len(),
        documents = counts.values().sum::<usize>(),
        "Exported collections"
    );
    Ok(counts)
}

/// Reads an export from `path` and `set`s every document.
///
/// Unknown collections and documents without an `id` are skipped with a
/// warning. Returns the number of documents written per collection.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the version is
/// unsupported, or a store write fails.
#[instrument(skip(store), fields(operation = "import", path = %path.display()))]
pub fn import_collections(
    store: &dyn DocumentStore,
    path: &Path,
) -> Result<BTreeMap<String, usize>> {
    let file = File::open(path).map_err(|e| io_error("open_import_file", &e))?;
    let export: ExportFile =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::InvalidInput(format!(
            "{} is not a valid export: {e}",
            path.display()
        )))?;
    if export.version != EXPORT_VERSION {
        return Err(Error::InvalidInput(format!(
            "unsupported export version {}",
            export.version
        )));
    }

    let mut counts = BTreeMap::new();
    for (name, docs) in export.collections {
        let Some(collection) = Collection::parse(&name) else {
            tracing::warn!(collection = %name, documents = docs.len(), "Skipping unknown collection");
            continue;
        };
        let mut written = 0usize;
        for mut fields in docs {
            let id = match fields.remove("id") {
                Some(serde_json::Value::String(id)) if !id.is_empty() => id,
                _ => {
                    tracing::warn!(collection = %name, "Skipping document without id");
                    continue;
                },
            };
            store.set(collection, &id, fields)?;
            written += 1;
        }
        counts.insert(name, written);
    }

    tracing::info!(
        collections = counts.len(),
        documents = counts.values().sum::<usize>(),
        "Imported collections"
    );
    Ok(counts)
}

fn io_error(operation: &str, e: &std::io::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}
