//! Configuration management.
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! file, and environment variables (after `.env` has been loaded by the
//! binary).

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ORGLOOM_CONFIG_PATH";

/// Main configuration for orgloom.
#[derive(Debug, Clone)]
pub struct OrgloomConfig {
    /// Directory for the database, vector snapshot and logs.
    pub data_dir: PathBuf,
    /// `SQLite` database file. Defaults to `{data_dir}/orgloom.db`.
    pub database_path: Option<PathBuf>,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Vector store settings.
    pub chroma: ChromaConfig,
    /// Regeneration settings.
    pub regeneration: RegenerationConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
    /// Diagram settings.
    pub diagram: DiagramConfig,
}

/// Available embedding providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingProvider {
    /// Ollama, falling back to `OpenAI` when a key is configured.
    #[default]
    Ollama,
    /// `OpenAI`.
    OpenAi,
    /// Deterministic offline feature hashing.
    Hash,
}

impl EmbeddingProvider {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" => Self::OpenAi,
            "hash" | "offline" => Self::Hash,
            _ => Self::Ollama,
        }
    }

    /// Returns the provider name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Hash => "hash",
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Provider.
    pub provider: EmbeddingProvider,
    /// Model name; provider default when unset.
    pub model: Option<String>,
    /// Output dimensions for the model; provider default when unset.
    pub dimensions: Option<usize>,
    /// Base URL for the provider.
    pub url: Option<String>,
    /// `OpenAI` API key.
    pub api_key: Option<SecretString>,
    /// Additional attempts on transient failures.
    pub retries: u32,
    /// Base backoff delay in milliseconds.
    pub retry_base_ms: u64,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: None,
            dimensions: None,
            url: None,
            api_key: None,
            retries: 3,
            retry_base_ms: 1_000,
            timeout_ms: 30_000,
        }
    }
}

/// Vector store configuration.
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    /// Whether the vector store is used at all.
    pub enabled: bool,
    /// ChromaDB server URL. When unset the in-process store is used.
    pub url: Option<String>,
    /// Chroma tenant.
    pub tenant: String,
    /// Chroma database.
    pub database: String,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
        }
    }
}

/// Regeneration configuration.
#[derive(Debug, Clone, Copy)]
pub struct RegenerationConfig {
    /// Pause between items in milliseconds.
    pub item_delay_ms: u64,
}

impl Default for RegenerationConfig {
    fn default() -> Self {
        Self { item_delay_ms: 100 }
    }
}

impl RegenerationConfig {
    /// Pause between items.
    #[must_use]
    pub const fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

/// Logging section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `orgloom=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// Metrics section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSettings {
    /// Whether the Prometheus exporter is installed.
    pub enabled: Option<bool>,
    /// Listener port.
    pub port: Option<u16>,
}

/// Diagram configuration.
#[derive(Debug, Clone)]
pub struct DiagramConfig {
    /// Label of the root organization node.
    pub root_label: String,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            root_label: crate::services::diagram::DEFAULT_ROOT_LABEL.to_string(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Database path.
    pub database_path: Option<String>,
    /// Embedding section.
    pub embedding: Option<ConfigFileEmbedding>,
    /// Chroma section.
    pub chroma: Option<ConfigFileChroma>,
    /// Regeneration section.
    pub regeneration: Option<ConfigFileRegeneration>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
    /// Diagram section.
    pub diagram: Option<ConfigFileDiagram>,
}

/// Embedding section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEmbedding {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Model dimensions.
    pub dimensions: Option<usize>,
    /// Base URL.
    pub url: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Retries.
    pub retries: Option<u32>,
    /// Base backoff in milliseconds.
    pub retry_base_ms: Option<u64>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Chroma section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileChroma {
    /// Enabled flag.
    pub enabled: Option<bool>,
    /// Server URL.
    pub url: Option<String>,
    /// Tenant.
    pub tenant: Option<String>,
    /// Database.
    pub database: Option<String>,
}

/// Regeneration section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRegeneration {
    /// Pause between items.
    pub item_delay_ms: Option<u64>,
}

/// Diagram section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDiagram {
    /// Root node label.
    pub root_label: Option<String>,
}

impl Default for OrgloomConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("", "", "orgloom")
            .map_or_else(|| PathBuf::from(".orgloom"), |dirs| dirs.data_dir().to_path_buf());
        Self {
            data_dir,
            database_path: None,
            embedding: EmbeddingConfig::default(),
            chroma: ChromaConfig::default(),
            regeneration: RegenerationConfig::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
            diagram: DiagramConfig::default(),
        }
    }
}

impl OrgloomConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self::from_config_file(file))
    }

    /// Default config file location: `{config_dir}/orgloom/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("orgloom").join("config.toml"))
    }

    /// Loads configuration from `ORGLOOM_CONFIG_PATH` or the default
    /// location, then applies environment overrides.
    ///
    /// A missing default file yields the defaults. A missing or invalid file
    /// named by `ORGLOOM_CONFIG_PATH` is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config file cannot be parsed.
    pub fn load_default() -> crate::Result<Self> {
        let mut config = if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            Self::load_from_file(Path::new(&path))?
        } else {
            match Self::default_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Self::default(),
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Converts a `ConfigFile` to `OrgloomConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        config.database_path = file.database_path.map(PathBuf::from);

        if let Some(embedding) = file.embedding {
            if let Some(provider) = embedding.provider {
                config.embedding.provider = EmbeddingProvider::parse(&provider);
            }
            config.embedding.model = embedding.model;
            config.embedding.dimensions = embedding.dimensions;
            config.embedding.url = embedding.url;
            config.embedding.api_key = embedding.api_key.map(SecretString::from);
            if let Some(v) = embedding.retries {
                config.embedding.retries = v;
            }
            if let Some(v) = embedding.retry_base_ms {
                config.embedding.retry_base_ms = v;
            }
            if let Some(v) = embedding.timeout_ms {
                config.embedding.timeout_ms = v;
            }
        }
        if let Some(chroma) = file.chroma {
            if let Some(v) = chroma.enabled {
                config.chroma.enabled = v;
            }
            config.chroma.url = chroma.url;
            if let Some(v) = chroma.tenant {
                config.chroma.tenant = v;
            }
            if let Some(v) = chroma.database {
                config.chroma.database = v;
            }
        }
        if let Some(v) = file.regeneration.and_then(|r| r.item_delay_ms) {
            config.regeneration.item_delay_ms = v;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }
        if let Some(label) = file.diagram.and_then(|d| d.root_label) {
            config.diagram.root_label = label;
        }

        config
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_string("ORGLOOM_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("ORGLOOM_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env_string("ORGLOOM_EMBEDDING_PROVIDER") {
            self.embedding.provider = EmbeddingProvider::parse(&v);
        }
        if let Some(v) = env_string("ORGLOOM_EMBEDDING_MODEL") {
            self.embedding.model = Some(v);
        }
        if self.embedding.url.is_none()
            && let Some(v) = env_string("OLLAMA_HOST")
        {
            self.embedding.url = Some(v);
        }
        if let Some(v) = env_string("OPENAI_API_KEY") {
            self.embedding.api_key = Some(SecretString::from(v));
        }
        if let Some(v) = env_string("ORGLOOM_CHROMA_URL") {
            self.chroma.url = Some(v);
        }
        if let Some(v) = env_bool("ORGLOOM_CHROMA_ENABLED") {
            self.chroma.enabled = v;
        }
        if let Some(v) = env_string("ORGLOOM_LOG_FORMAT") {
            self.logging.format = Some(v);
        }
        if let Some(v) = env_string("ORGLOOM_LOG_FILE") {
            self.logging.file = Some(v);
        }
        if let Some(v) = env_bool("ORGLOOM_METRICS_ENABLED") {
            self.metrics.enabled = Some(v);
        }
        if let Some(v) = env_string("ORGLOOM_METRICS_PORT").and_then(|p| p.parse().ok()) {
            self.metrics.port = Some(v);
        }
    }

    /// Resolved `SQLite` database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("orgloom.db"))
    }

    /// Snapshot file of the in-process vector store.
    #[must_use]
    pub fn vector_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("vectors.json")
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|value| matches!(value.to_lowercase().as_str(), "true" | "1" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let config = OrgloomConfig::default().with_data_dir("/tmp/o");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/o/orgloom.db"));
        assert!(config.chroma.enabled);
        assert_eq!(config.regeneration.item_delay(), Duration::from_millis(100));
        assert_eq!(config.embedding.retries, 3);
    }

    #[test]
    fn test_from_toml() {
        let config = OrgloomConfig::from_toml(
            r#"
            data_dir = "/data"
            [embedding]
            provider = "openai"
            api_key = "sk-test"
            retries = 1
            [chroma]
            enabled = false
            [regeneration]
            item_delay_ms = 0
            [logging]
            format = "json"
            [diagram]
            root_label = "HQ"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(
            config.embedding.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-test".to_string())
        );
        assert_eq!(config.embedding.retries, 1);
        assert!(!config.chroma.enabled);
        assert_eq!(config.regeneration.item_delay_ms, 0);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.diagram.root_label, "HQ");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(OrgloomConfig::from_toml("data_dir = [").is_err());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(EmbeddingProvider::parse("OpenAI"), EmbeddingProvider::OpenAi);
        assert_eq!(EmbeddingProvider::parse("hash"), EmbeddingProvider::Hash);
        assert_eq!(EmbeddingProvider::parse("other"), EmbeddingProvider::Ollama);
    }
}
