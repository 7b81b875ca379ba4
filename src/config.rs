//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (SQLSTASH_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [store]
//! namespace = "sqlstash"
//!
//! [query]
//! default_quota = 100000
//! default_ttl_secs = 3600
//!
//! [worker]
//! threads = 4
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! SQLSTASH_STORE__NAMESPACE=myapp
//! SQLSTASH_QUERY__DEFAULT_QUOTA=500
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::query::{CURSOR_BATCH, DEFAULT_QUOTA, DEFAULT_TTL};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Result store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Key namespace prefixed onto every stored key
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Snapshot file for the in-memory store (none = volatile)
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// Query execution defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Cap on rows stored per query
    #[serde(default = "default_quota")]
    pub default_quota: u64,

    /// Row-log lifetime in seconds, re-applied on each append
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Rows requested from the cursor per pull
    #[serde(default = "default_cursor_batch")]
    pub cursor_batch: usize,
}

impl QueryConfig {
    /// The configured TTL as a [`Duration`].
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker threads for query execution
    /// 0 = use all available CPU cores
    #[serde(default)]
    pub threads: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_namespace() -> String {
    "sqlstash".to_string()
}
fn default_quota() -> u64 {
    DEFAULT_QUOTA
}
fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}
fn default_cursor_batch() -> usize {
    CURSOR_BATCH
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (SQLSTASH_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("SQLSTASH_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SQLSTASH_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: StoreConfig::default(),
            query: QueryConfig::default(),
            worker: WorkerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            namespace: default_namespace(),
            snapshot_path: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            default_quota: default_quota(),
            default_ttl_secs: default_ttl_secs(),
            cursor_batch: default_cursor_batch(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig { threads: 0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
