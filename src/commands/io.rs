//! Import and export command handlers.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use orgloom::io::{export_collections, import_collections, import_csv};
use orgloom::models::Collection;
use orgloom::services::ServiceContainer;

use super::{CmdResult, print_json};

/// Export command.
///
/// With no collections named, every collection is exported.
pub fn cmd_export(container: &ServiceContainer, output: &Path, collections: &[String]) -> CmdResult {
    let collections: Vec<Collection> = if collections.is_empty() {
        Collection::all().to_vec()
    } else {
        collections
            .iter()
            .map(|name| name.parse())
            .collect::<orgloom::Result<_>>()?
    };
    let counts = export_collections(container.documents().as_ref(), &collections, output)?;
    print_json(&counts)
}

/// Import command.
pub fn cmd_import(container: &ServiceContainer, input: &Path) -> CmdResult {
    let counts = import_collections(container.documents().as_ref(), input)?;
    print_json(&counts)
}

/// CSV import command.
pub fn cmd_import_csv(container: &ServiceContainer, collection: &str, input: &Path) -> CmdResult {
    let collection: Collection = collection.parse()?;
    let file = File::open(input)?;
    let report = import_csv(container.documents().as_ref(), collection, BufReader::new(file))?;
    print_json(&report)
}
