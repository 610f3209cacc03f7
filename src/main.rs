//! Binary entry point for orgloom.
//!
//! This binary provides the CLI interface for the orgloom knowledge store.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use commands::{
    DocAction, EmbeddingsAction, EntitiesAction, IntegrityAction, NotesAction, RepairAction,
    ThemeAction,
};
use orgloom::config::{CONFIG_PATH_ENV, OrgloomConfig};
use orgloom::observability::{self, InitOptions};
use orgloom::services::ServiceContainer;

/// Orgloom - a local-first knowledge store for business planning.
#[derive(Parser)]
#[command(name = "orgloom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Use in-memory stores; nothing is read from or written to disk.
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Serve Prometheus metrics while the command runs.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Read and write raw documents.
    Doc {
        /// Document subcommand.
        #[command(subcommand)]
        action: DocAction,
    },

    /// Manage themes.
    Themes {
        /// Theme subcommand.
        #[command(subcommand)]
        action: ThemeAction,
    },

    /// Build the relationship diagram as JSON.
    Diagram {
        /// Restrict to one theme.
        #[arg(short, long)]
        theme: Option<String>,

        /// Organization type filter (`all`, `company`, ...).
        #[arg(long = "type", default_value = "all")]
        type_filter: String,
    },

    /// Regenerate or count embeddings.
    Embeddings {
        /// Embedding subcommand.
        #[command(subcommand)]
        action: EmbeddingsAction,
    },

    /// Find entities, relations or topics similar to a text.
    Search {
        /// Query text.
        query: String,

        /// Record kind: entity, relation or topic.
        #[arg(short, long, default_value = "topic")]
        kind: String,

        /// Organization ID or `all`.
        #[arg(short, long, default_value = "all")]
        org: String,

        /// Maximum number of hits.
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Repair drift between documents and vectors.
    Repair {
        /// Repair subcommand.
        #[command(subcommand)]
        action: RepairAction,
    },

    /// Check referential integrity.
    Integrity {
        /// Integrity subcommand.
        #[command(subcommand)]
        action: IntegrityAction,
    },

    /// Report embedding data quality.
    Quality {
        /// Organization ID or `all`.
        #[arg(short, long, default_value = "all")]
        org: String,

        /// Record kind: entity, relation or topic. All three when omitted.
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Manage entities.
    Entities {
        /// Entity subcommand.
        #[command(subcommand)]
        action: EntitiesAction,
    },

    /// Manage meeting notes.
    Notes {
        /// Note subcommand.
        #[command(subcommand)]
        action: NotesAction,
    },

    /// Export collections to a JSON file.
    Export {
        /// Output file.
        output: PathBuf,

        /// Collections to export (repeatable); all when omitted.
        #[arg(short, long = "collection")]
        collections: Vec<String>,
    },

    /// Import collections from a JSON export.
    Import {
        /// Input file.
        input: PathBuf,
    },

    /// Import CSV rows into a collection.
    ImportCsv {
        /// Target collection.
        collection: String,

        /// Input file.
        input: PathBuf,
    },

    /// Manage configuration.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration.
    Show,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "orgloom", &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init_from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: cli.metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

fn run_command(cli: Cli, config: OrgloomConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Config {
        action: ConfigAction::Show,
    } = &cli.command
    {
        return commands::cmd_config(&config, config_source(cli.config.as_deref()).as_deref());
    }

    let container = if cli.ephemeral {
        ServiceContainer::ephemeral(config)?
    } else {
        ServiceContainer::from_config(config)?
    };

    match cli.command {
        Commands::Doc { action } => commands::cmd_doc(&container, action),
        Commands::Themes { action } => commands::cmd_themes(&container, action),
        Commands::Diagram { theme, type_filter } => {
            commands::cmd_diagram(&container, theme.as_deref(), &type_filter)
        },
        Commands::Embeddings { action } => commands::cmd_embeddings(&container, action),
        Commands::Search {
            query,
            kind,
            org,
            limit,
        } => commands::cmd_search(&container, &query, &kind, &org, limit),
        Commands::Repair { action } => commands::cmd_repair(&container, action),
        Commands::Integrity { action } => commands::cmd_integrity(&container, action),
        Commands::Quality { org, kind } => commands::cmd_quality(&container, &org, kind.as_deref()),
        Commands::Entities { action } => commands::cmd_entities(&container, action),
        Commands::Notes { action } => commands::cmd_notes(&container, action),
        Commands::Export {
            output,
            collections,
        } => commands::cmd_export(&container, &output, &collections),
        Commands::Import { input } => commands::cmd_import(&container, &input),
        Commands::ImportCsv { collection, input } => {
            commands::cmd_import_csv(&container, &collection, &input)
        },
        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    }
}

/// Loads configuration from `path`, or the default location.
fn load_config(path: Option<&Path>) -> orgloom::Result<OrgloomConfig> {
    match path {
        Some(path) => {
            let mut config = OrgloomConfig::load_from_file(path)?;
            config.apply_env_overrides();
            Ok(config)
        },
        None => OrgloomConfig::load_default(),
    }
}

/// The config file that was loaded, if any.
fn config_source(path: Option<&Path>) -> Option<PathBuf> {
    path.map(Path::to_path_buf)
        .or_else(|| OrgloomConfig::default_path().filter(|p| p.exists()))
}
