//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::fetch::PollerConfig;
use crate::sources::{
    IndexerAuth, IndexerConfig as IndexerClientConfig, SubgraphConfig as SubgraphClientConfig,
};
use crate::stream::ProjectorConfig as StreamProjectorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub subgraph: SubgraphConfig,

    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub poller: PollingConfig,

    #[serde(default)]
    pub projector: ProjectorConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Subgraph endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphConfig {
    #[serde(default = "default_subgraph_url")]
    pub url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_subgraph_url() -> String {
    "http://localhost:8000/subgraphs/name/fundflow".to_string()
}

fn default_request_timeout() -> u64 {
    15_000
}

fn default_page_size() -> u32 {
    100
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            url: default_subgraph_url(),
            request_timeout_ms: default_request_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl SubgraphConfig {
    pub fn client_config(&self) -> SubgraphClientConfig {
        SubgraphClientConfig {
            url: self.url.clone(),
            request_timeout_ms: self.request_timeout_ms,
            page_size: self.page_size,
        }
    }
}

/// Portfolio indexer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_indexer_url")]
    pub url: String,

    #[serde(default = "default_chain")]
    pub chain: String,

    /// API key; sent according to `auth_scheme`
    pub api_key: Option<String>,

    /// "bearer" or "basic"
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_indexer_url() -> String {
    "https://api.covalenthq.com".to_string()
}

fn default_chain() -> String {
    "base-mainnet".to_string()
}

fn default_auth_scheme() -> String {
    "bearer".to_string()
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: default_indexer_url(),
            chain: default_chain(),
            api_key: None,
            auth_scheme: default_auth_scheme(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl IndexerConfig {
    pub fn client_config(&self) -> Result<IndexerClientConfig, ConfigError> {
        let auth = match (self.api_key.as_deref(), self.auth_scheme.as_str()) {
            (None, _) | (Some(""), _) => IndexerAuth::None,
            (Some(key), "bearer") => IndexerAuth::Bearer(key.to_string()),
            (Some(key), "basic") => IndexerAuth::Basic {
                username: key.to_string(),
                password: None,
            },
            (Some(_), other) => {
                return Err(ConfigError::Invalid(format!(
                    "indexer.auth_scheme must be \"bearer\" or \"basic\", got {:?}",
                    other
                )))
            }
        };

        Ok(IndexerClientConfig {
            base_url: self.url.clone(),
            chain: self.chain.clone(),
            auth,
            request_timeout_ms: self.request_timeout_ms,
        })
    }
}

/// Polling and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_poll_interval() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2_000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl PollingConfig {
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            poll_interval_ms: self.poll_interval_ms,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
        }
    }
}

/// Balance projection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectorConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval() -> u64 {
    100
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl ProjectorConfig {
    pub fn projector_config(&self) -> StreamProjectorConfig {
        StreamProjectorConfig {
            tick_interval_ms: self.tick_interval_ms,
        }
    }
}

/// Metadata cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: String,
}

fn default_cache_path() -> String {
    dirs::cache_dir()
        .map(|p| p.join("fundflow").join("metadata.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./fundflow_cache/metadata.json".to_string())
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

impl CacheConfig {
    /// Cache path with a leading `~/` expanded to the home directory
    pub fn resolved_path(&self) -> PathBuf {
        match (self.path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.path),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

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

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Invalid(error) => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))
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
            dirs::config_dir().map(|p| p.join("fundflow").join("config.toml")),
            Some(PathBuf::from("/etc/fundflow/config.toml")),
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

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("FUNDFLOW_SUBGRAPH_URL") {
            self.subgraph.url = url;
        }

        if let Some(url) = var("FUNDFLOW_INDEXER_URL") {
            self.indexer.url = url;
        }
        if let Some(key) = var("FUNDFLOW_INDEXER_KEY") {
            self.indexer.api_key = Some(key);
        }

        if let Some(interval) = var("FUNDFLOW_POLL_INTERVAL_MS") {
            match interval.parse() {
                Ok(ms) => self.poller.poll_interval_ms = ms,
                Err(_) => {
                    tracing::warn!(value = %interval, "Ignoring invalid FUNDFLOW_POLL_INTERVAL_MS")
                }
            }
        }

        if let Some(level) = var("FUNDFLOW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("FUNDFLOW_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Fundflow Configuration
#
# Environment variables override these settings:
# - FUNDFLOW_SUBGRAPH_URL
# - FUNDFLOW_INDEXER_URL
# - FUNDFLOW_INDEXER_KEY
# - FUNDFLOW_POLL_INTERVAL_MS
# - FUNDFLOW_LOG_LEVEL
# - FUNDFLOW_LOG_FORMAT

[subgraph]
# GraphQL endpoint of the fund subgraph
url = "http://localhost:8000/subgraphs/name/fundflow"

# Request timeout (ms)
request_timeout_ms = 15000

# Maximum records per list query
page_size = 100

[indexer]
# Portfolio indexer base URL
url = "https://api.covalenthq.com"

# Chain name used in API paths
chain = "base-mainnet"

# API key and how to send it: "bearer" or "basic"
# api_key = ""
auth_scheme = "bearer"

# Request timeout (ms)
request_timeout_ms = 15000

[poller]
# Time between refreshes (ms)
poll_interval_ms = 30000

# Consecutive rate-limited attempts before giving up until the next refresh
max_retries = 3

# Delay before retrying a rate-limited request (ms)
retry_delay_ms = 2000

[projector]
# Minimum time between balance redraws (ms)
tick_interval_ms = 100

[cache]
# Fund metadata URI cache
path = "~/.cache/fundflow/metadata.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
