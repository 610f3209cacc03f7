//! Config command handler.
//!
//! Contains the implementation of the `config show` CLI command.

use std::path::Path;

use orgloom::OrgloomConfig;
use secrecy::ExposeSecret;

use super::CmdResult;

/// Config command.
#[allow(clippy::print_stdout)]
pub fn cmd_config(config: &OrgloomConfig, source: Option<&Path>) -> CmdResult {
    println!("Current Configuration");
    println!("=====================");
    println!();

    println!("Config File:");
    match source {
        Some(path) => println!("  {}", path.display()),
        None => println!("  (none - using defaults)"),
    }
    println!();

    println!("Data Directory: {}", config.data_dir.display());
    println!("Database: {}", config.database_path().display());
    println!();

    println!("Embedding:");
    println!("  Provider: {}", config.embedding.provider.as_str());
    println!(
        "  Model: {}",
        config.embedding.model.as_deref().unwrap_or("(default)")
    );
    println!(
        "  URL: {}",
        config.embedding.url.as_deref().unwrap_or("(default)")
    );
    println!(
        "  API Key: {}",
        config
            .embedding
            .api_key
            .as_ref()
            .map_or("(not set)", |key| mask(key.expose_secret()))
    );
    println!(
        "  Retries: {} (base {}ms, timeout {}ms)",
        config.embedding.retries, config.embedding.retry_base_ms, config.embedding.timeout_ms
    );
    println!();

    println!("Vector Store:");
    println!("  Enabled: {}", config.chroma.enabled);
    match &config.chroma.url {
        Some(url) => {
            println!("  ChromaDB: {url}");
            println!("  Tenant: {}", config.chroma.tenant);
            println!("  Database: {}", config.chroma.database);
        },
        None => println!("  Snapshot: {}", config.vector_snapshot_path().display()),
    }
    println!();

    println!("Regeneration:");
    println!("  Item Delay: {}ms", config.regeneration.item_delay_ms);
    println!();

    println!("Observability:");
    println!(
        "  Log Level: {}",
        config.logging.level.as_deref().unwrap_or("info")
    );
    println!(
        "  Log Format: {}",
        config.logging.format.as_deref().unwrap_or("pretty")
    );
    println!(
        "  Log File: {}",
        config.logging.file.as_deref().unwrap_or("(stderr)")
    );
    println!(
        "  Metrics: {}",
        if config.metrics.enabled.unwrap_or(false) {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    println!("Diagram:");
    println!("  Root Label: {}", config.diagram.root_label);
    Ok(())
}

const fn mask(key: &str) -> &'static str {
    if key.is_empty() { "(not set)" } else { "********" }
}
