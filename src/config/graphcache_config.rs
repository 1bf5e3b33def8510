//! GraphCache configuration file handling
//!
//! Loads and manages the ~/.config/graphcache/config.yaml file.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn config_dir() -> PathBuf {
    // Always use ~/.config for consistency across platforms (macOS, Linux)
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("graphcache");
    path
}

/// Entity store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Enable WAL mode for better concurrency
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// How long a writer waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_store_path() -> PathBuf {
    config_dir().join("graph.db")
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl StoreConfig {
    /// Store settings for a database at `path`, other settings default
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Remote graph API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphApiConfig {
    /// API root (e.g. https://graph.facebook.com)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Access token; takes precedence over `access_token_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Environment variable holding the access token
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on `paging.next` pages followed per edge list
    #[serde(default = "default_max_edge_pages")]
    pub max_edge_pages: u32,
}

fn default_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_access_token_env() -> String {
    "GRAPH_ACCESS_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_edge_pages() -> u32 {
    10
}

impl GraphApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured token, else the one in the token environment variable
    pub fn resolve_access_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .or_else(|| std::env::var(&self.access_token_env).ok())
            .filter(|token| !token.is_empty())
    }
}

impl Default for GraphApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
            access_token_env: default_access_token_env(),
            timeout_secs: default_timeout_secs(),
            max_edge_pages: default_max_edge_pages(),
        }
    }
}

/// Sync engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remove stored edges missing from a fresh edge list by default
    #[serde(default)]
    pub prune_edges: bool,

    /// Maximum entity refreshes in flight for batch refreshes
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            prune_edges: false,
            concurrency: default_concurrency(),
        }
    }
}

/// GraphCache configuration
///
/// Represents the complete ~/.config/graphcache/config.yaml file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCacheConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub graph_api: GraphApiConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl GraphCacheConfig {
    /// Create a configuration with every setting at its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path (~/.config/graphcache/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::GraphCacheError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading GraphCache configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            store = %config.store.path.display(),
            base_url = %config.graph_api.base_url,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save_default(&self) -> Result<()> {
        let path = Self::default_path();
        self.save(&path)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving GraphCache configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/graphcache/config.yaml)
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }
}
