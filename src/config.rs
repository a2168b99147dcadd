//! Configuration System
//!
//! Service configuration lives in a TOML file with `[storage]`, `[api]`,
//! `[project]`, `[billing]` and `[logging]` sections. `CLINICDESK_*`
//! environment variables override individual settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::billing::numbering::DEFAULT_PREFIX;
use crate::billing::DEFAULT_TAX_RATE;
use crate::crud::DEFAULT_PAGE_SIZE;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub project: ProjectSettings,

    #[serde(default)]
    pub billing: BillingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which document store backs the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process, lost on restart
    Memory,
    #[default]
    Sqlite,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite database file (sqlite backend only)
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("clinicdesk").join("clinicdesk.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./clinicdesk_data/clinicdesk.db".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Project (branding, menu, custom entities) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectSettings {
    /// Project JSON file; the embedded default is used when unset
    #[serde(default)]
    pub config_path: Option<String>,

    /// Page size of every list view
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,
}

fn default_items_per_page() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            config_path: None,
            items_per_page: default_items_per_page(),
        }
    }
}

/// Invoicing defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingConfig {
    /// Default tax rate in percent
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,

    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}

fn default_invoice_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            invoice_prefix: default_invoice_prefix(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("clinicdesk").join("config.toml")),
            Some(PathBuf::from("/etc/clinicdesk/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `CLINICDESK_*` overrides read through `lookup`
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("CLINICDESK_STORAGE_BACKEND") {
            match backend.to_lowercase().as_str() {
                "memory" => self.storage.backend = StorageBackend::Memory,
                "sqlite" => self.storage.backend = StorageBackend::Sqlite,
                other => tracing::warn!(backend = %other, "Ignoring unknown storage backend"),
            }
        }
        if let Some(path) = lookup("CLINICDESK_DB_PATH") {
            self.storage.path = path;
        }

        if let Some(host) = lookup("CLINICDESK_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("CLINICDESK_API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }

        if let Some(path) = lookup("CLINICDESK_PROJECT_CONFIG") {
            self.project.config_path = Some(path);
        }
        if let Some(size) = lookup("CLINICDESK_ITEMS_PER_PAGE").and_then(|s| s.parse().ok()) {
            self.project.items_per_page = size;
        }

        if let Some(rate) = lookup("CLINICDESK_TAX_RATE").and_then(|r| r.parse().ok()) {
            self.billing.tax_rate = rate;
        }

        if let Some(level) = lookup("CLINICDESK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("CLINICDESK_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Listen address for the API server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# ClinicDesk Configuration
#
# Environment variables override these settings:
# - CLINICDESK_STORAGE_BACKEND
# - CLINICDESK_DB_PATH
# - CLINICDESK_API_HOST
# - CLINICDESK_API_PORT
# - CLINICDESK_PROJECT_CONFIG
# - CLINICDESK_ITEMS_PER_PAGE
# - CLINICDESK_TAX_RATE
# - CLINICDESK_LOG_LEVEL
# - CLINICDESK_LOG_FORMAT

[storage]
# Document store: "sqlite" (persistent) or "memory"
backend = "sqlite"

# SQLite database file
path = "~/.local/share/clinicdesk/clinicdesk.db"

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8090

# Allowed CORS origins
cors_origins = ["http://localhost:5173", "http://127.0.0.1:5173"]

# Request timeout in seconds
request_timeout_secs = 30

[project]
# Project JSON (branding, menu, custom entities); embedded default when unset
# config_path = "/etc/clinicdesk/project.json"

# Rows per page in list views
items_per_page = 5

[billing]
# Default tax rate (percent)
tax_rate = 16.0

# Invoice numbers look like FAC-1, FAC-2, ...
invoice_prefix = "FAC"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
