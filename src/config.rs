//! Configuration parsing and validation.
//!
//! Configuration lives in a TOML file. Only `[db]` is required; every other
//! section falls back to the defaults below.
//!
//! ```toml
//! [db]
//! path = "./data/navkit.sqlite"
//!
//! [remote]
//! database_id = "2f1c..."
//! api_key_env = "NOTION_API_KEY"
//!
//! [import]
//! concurrency = 3
//! batch_delay_ms = 500
//!
//! [link_check]
//! concurrency = 5
//! timeout_secs = 5
//! mode = "status"
//!
//! [metadata]
//! concurrency = 5
//! timeout_secs = 8
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::link_check::ProbeMode;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub link_check: LinkCheckConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Connection settings for the hosted record database.
///
/// The API key itself never appears in the file; `api_key_env` names the
/// environment variable it is read from when the client is built.
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    pub database_id: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_notion_version")]
    pub notion_version: String,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_remote_max_retries")]
    pub max_retries: u32,
}

fn default_api_key_env() -> String {
    "NOTION_API_KEY".to_string()
}
fn default_base_url() -> String {
    "https://api.notion.com".to_string()
}
fn default_notion_version() -> String {
    "2022-06-28".to_string()
}
fn default_remote_timeout_secs() -> u64 {
    30
}
fn default_remote_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_import_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_true")]
    pub dedupe_within_batch: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            concurrency: default_import_concurrency(),
            batch_delay_ms: default_batch_delay_ms(),
            dedupe_within_batch: true,
        }
    }
}

impl ImportConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

fn default_import_concurrency() -> usize {
    3
}
fn default_batch_delay_ms() -> u64 {
    500
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinkCheckConfig {
    #[serde(default = "default_link_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_link_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default)]
    pub mode: ProbeMode,
}

impl Default for LinkCheckConfig {
    fn default() -> Self {
        Self {
            concurrency: default_link_concurrency(),
            timeout_secs: default_link_timeout_secs(),
            batch_delay_ms: default_batch_delay_ms(),
            mode: ProbeMode::default(),
        }
    }
}

fn default_link_concurrency() -> usize {
    5
}
fn default_link_timeout_secs() -> u64 {
    5
}

/// Page metadata fetching used to enrich imported bookmarks.
#[derive(Debug, Deserialize, Clone)]
pub struct MetadataConfig {
    #[serde(default = "default_link_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_metadata_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            concurrency: default_link_concurrency(),
            timeout_secs: default_metadata_timeout_secs(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

fn default_metadata_timeout_secs() -> u64 {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

fn default_max_history() -> usize {
    30
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log severity threshold used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.import.concurrency == 0 {
        anyhow::bail!("import.concurrency must be > 0");
    }

    if config.link_check.concurrency == 0 {
        anyhow::bail!("link_check.concurrency must be > 0");
    }
    if config.link_check.timeout_secs == 0 {
        anyhow::bail!("link_check.timeout_secs must be > 0");
    }

    if config.metadata.concurrency == 0 {
        anyhow::bail!("metadata.concurrency must be > 0");
    }
    if config.metadata.timeout_secs == 0 {
        anyhow::bail!("metadata.timeout_secs must be > 0");
    }

    if config.stats.max_history == 0 {
        anyhow::bail!("stats.max_history must be > 0");
    }

    if let Some(remote) = &config.remote {
        if remote.database_id.trim().is_empty() {
            anyhow::bail!("remote.database_id must not be empty");
        }
        if remote.max_retries == 0 {
            anyhow::bail!("remote.max_retries must be >= 1");
        }
        if !remote.base_url.starts_with("http://") && !remote.base_url.starts_with("https://") {
            anyhow::bail!(
                "remote.base_url must be an http(s) URL, got '{}'",
                remote.base_url
            );
        }
    }

    Ok(config)
}
