//! Import and export of documents.
//!
//! | Format | Import | Export | Notes |
//! |--------|--------|--------|-------|
//! | JSON | ✓ | ✓ | Whole collections, `{version, exportedAt, collections}` |
//! | CSV | ✓ | - | One collection per file, header row names fields |
//!
//! # Examples
//!
//! ```rust,ignore
//! use orgloom::io::{export_collections, import_collections};
//! use orgloom::models::Collection;
//!
//! let counts = export_collections(store.as_ref(), &[Collection::Themes], "backup.json".as_ref())?;
//! let imported = import_collections(other.as_ref(), "backup.json".as_ref())?;
//! ```

mod collections;
mod csv_import;

pub use collections::{EXPORT_VERSION, ExportFile, export_collections, import_collections};
pub use csv_import::{CsvImportReport, CsvRowError, import_csv, parse_cell};
