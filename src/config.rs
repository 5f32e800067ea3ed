use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Runtime configuration. Everything the pipeline touches comes in through
/// here; there are no process-wide singletons.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub filter: FilterConfig,
    pub clean: CleanConfig,
    pub suspicious: SuspiciousConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Export URL template; `{date}` is replaced by `yyyy-mm-dd`.
    pub export_url: String,
    pub timeout_seconds: u64,
    /// Exports smaller than this are treated as a broken upstream export.
    pub min_bytes: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            export_url: String::new(),
            timeout_seconds: 30,
            min_bytes: 100_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for the filesystem object store.
    pub root: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub domains: Vec<String>,
    pub emails: Vec<String>,
}

impl FilterConfig {
    pub fn domain_set(&self) -> HashSet<String> {
        self.domains.iter().map(|d| d.trim().to_lowercase()).collect()
    }

    pub fn email_set(&self) -> HashSet<String> {
        self.emails.iter().map(|e| e.trim().to_lowercase()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Civil timezone the raw export's wall-clock timestamps are written in.
    pub timezone: String,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Brussels".to_string(),
        }
    }
}

impl CleanConfig {
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse()
            .map_err(|e| PipelineError::Config(format!("bad timezone '{}': {}", self.timezone, e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuspiciousConfig {
    /// Absolute bid ceiling.
    pub max_bid: i64,
    /// Bid-to-cost ratio above which a bid is flagged.
    pub ratio: i64,
}

impl Default for SuspiciousConfig {
    fn default() -> Self {
        Self { max_bid: 800, ratio: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Optional webhook endpoint for operational warnings. Warnings go to the
    /// log when unset.
    pub webhook_url: Option<String>,
    pub subject_prefix: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            subject_prefix: "auction-ingest".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads the config file if it exists, falling back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
