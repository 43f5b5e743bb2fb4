//! Configuration parsing and validation.
//!
//! Event Harvester is configured via a TOML file (default
//! `./config/harvest.toml`). Every section except `[db]` is optional and
//! falls back to the defaults below.
//!
//! ```toml
//! [db]
//! path = "./data/events.sqlite"
//!
//! [source]
//! path = "./emails.txt"
//! separator = "***** SEPARATION *****"
//! max_emails = 12
//! batch_size = 3
//!
//! [model]
//! name = "gemini-1.5-flash"
//! endpoint = "https://generativelanguage.googleapis.com/v1beta"
//! timeout_secs = 60
//! calls_per_window = 50
//! window_secs = 60
//!
//! [server]
//! bind = "127.0.0.1:7340"
//!
//! [logging]
//! level = "info"
//! file = "./data/harvest.log"
//! ```
//!
//! The model API key is never read from this file's defaults: it must be
//! supplied by the caller (`--api-key`, `GEMINI_API_KEY`, or `model.api_key`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use event_harvester_core::batch::{BATCH_SIZE, MAX_EMAILS, SEPARATOR};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Where raw email text comes from and how it is batched.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_max_emails")]
    pub max_emails: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            separator: default_separator(),
            max_emails: default_max_emails(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_separator() -> String {
    SEPARATOR.to_string()
}
fn default_max_emails() -> usize {
    MAX_EMAILS
}
fn default_batch_size() -> usize {
    BATCH_SIZE
}

/// Language model endpoint and call quota.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_calls_per_window")]
    pub calls_per_window: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            endpoint: default_endpoint(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            calls_per_window: default_calls_per_window(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_model_name() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_calls_per_window() -> u32 {
    50
}
fn default_window_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// A config with only a database path; everything else defaulted.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            source: SourceConfig::default(),
            model: ModelConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.source.separator.is_empty() {
        anyhow::bail!("source.separator must not be empty");
    }
    if config.source.max_emails == 0 {
        anyhow::bail!("source.max_emails must be >= 1");
    }
    if config.source.batch_size == 0 {
        anyhow::bail!("source.batch_size must be >= 1");
    }
    if config.model.calls_per_window == 0 {
        anyhow::bail!("model.calls_per_window must be >= 1");
    }
    if config.model.window_secs == 0 {
        anyhow::bail!("model.window_secs must be >= 1");
    }
    if config.model.timeout_secs == 0 {
        anyhow::bail!("model.timeout_secs must be >= 1");
    }
    Ok(())
}
