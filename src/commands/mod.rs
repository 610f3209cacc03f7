//! Command handlers module.
//!
//! This module organizes the CLI command implementations into separate files:
//! - `doc.rs`: Raw document store access
//! - `themes.rs`: Theme management and relationship diagrams
//! - `embeddings.rs`: Embedding regeneration and similarity search
//! - `maintenance.rs`: Repair, integrity, quality and cascading deletes
//! - `io.rs`: JSON export/import and CSV import
//! - `config.rs`: Configuration display

mod config;
mod doc;
mod embeddings;
mod io;
mod maintenance;
mod themes;

use clap::Subcommand;
use serde::Serialize;

pub use config::cmd_config;
pub use doc::cmd_doc;
pub use embeddings::{cmd_embeddings, cmd_search};
pub use io::{cmd_export, cmd_import, cmd_import_csv};
pub use maintenance::{cmd_entities, cmd_integrity, cmd_notes, cmd_quality, cmd_repair};
pub use themes::{cmd_diagram, cmd_themes};

/// Result type of command handlers.
pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Document subcommands.
#[derive(Subcommand)]
pub enum DocAction {
    /// Print one document.
    Get {
        /// Collection name.
        collection: String,
        /// Document ID.
        id: String,
    },

    /// Create or replace a document.
    Set {
        /// Collection name.
        collection: String,
        /// Document ID.
        id: String,
        /// Fields as a JSON object.
        data: String,
    },

    /// Merge fields into an existing document.
    Update {
        /// Collection name.
        collection: String,
        /// Document ID.
        id: String,
        /// Fields as a JSON object.
        data: String,
    },

    /// Delete a document.
    Delete {
        /// Collection name.
        collection: String,
        /// Document ID.
        id: String,
    },

    /// Add a document with a generated ID.
    Add {
        /// Collection name.
        collection: String,
        /// Fields as a JSON object.
        data: String,
    },

    /// List every document of a collection.
    List {
        /// Collection name.
        collection: String,
    },

    /// Query a collection.
    Query {
        /// Collection name.
        collection: String,
        /// Conditions as a JSON object, e.g. `{"organizationId": "o1", "orderBy": "title"}`.
        #[arg(default_value = "{}")]
        conditions: String,
    },
}

/// Theme subcommands.
#[derive(Subcommand)]
pub enum ThemeAction {
    /// List themes in display order.
    List,

    /// Create a theme at the end of the list.
    Create {
        /// Title.
        title: String,
        /// Description.
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Move `active` to the position of `over`.
    Reorder {
        /// Theme being moved.
        active: String,
        /// Theme whose position it takes.
        over: String,
    },

    /// Delete a theme.
    Delete {
        /// Theme ID.
        id: String,
    },
}

/// Embedding subcommands.
#[derive(Subcommand)]
pub enum EmbeddingsAction {
    /// Regenerate vector-store embeddings.
    Regenerate {
        /// Organization ID or `all`.
        #[arg(short, long, default_value = "all")]
        org: String,
        /// Record kinds: all, entities, relations or topics.
        #[arg(short, long, default_value = "all")]
        kind: String,
        /// Regenerate every record, not only unsynced ones.
        #[arg(long)]
        all: bool,
        /// Re-embed even when a vector already exists.
        #[arg(long)]
        force: bool,
    },

    /// Count records without a synced embedding.
    Missing {
        /// Organization ID or `all`.
        #[arg(short, long, default_value = "all")]
        org: String,
    },
}

/// Repair subcommands.
#[derive(Subcommand)]
pub enum RepairAction {
    /// Fix sync flags against the vector store.
    Sync {
        /// Organization ID or `all`.
        #[arg(short, long, default_value = "all")]
        org: String,
    },

    /// Detect (and optionally fix) document / vector drift.
    Consistency {
        /// Organization ID or `all`.
        #[arg(short, long, default_value = "all")]
        org: String,
        /// Apply repairs instead of only reporting.
        #[arg(long)]
        fix: bool,
    },

    /// Remove dangling topic IDs from initiatives.
    Topics {
        /// Organization ID or `all`.
        #[arg(short, long, default_value = "all")]
        org: String,
    },
}

/// Integrity subcommands.
#[derive(Subcommand)]
pub enum IntegrityAction {
    /// Report initiatives referencing missing topics.
    Check {
        /// Organization ID or `all`.
        #[arg(short, long, default_value = "all")]
        org: String,
    },
}

/// Entity subcommands.
#[derive(Subcommand)]
pub enum EntitiesAction {
    /// Delete entities with their relations and vectors.
    Delete {
        /// Entity IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// Meeting note subcommands.
#[derive(Subcommand)]
pub enum NotesAction {
    /// Delete a meeting note with its topics, relations and entities.
    Delete {
        /// Meeting note ID.
        id: String,
    },
}

/// Prints a value as pretty JSON on stdout.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parses a JSON argument.
pub fn parse_json(raw: &str) -> Result<serde_json::Value, orgloom::Error> {
    serde_json::from_str(raw)
        .map_err(|e| orgloom::Error::InvalidInput(format!("invalid JSON argument: {e}")))
}
