//! Operator configuration
//!
//! Loaded from a JSON file (`POOLWATCH_CONFIG`, default `poolwatch.json`)
//! with selected keys overridable from the environment:
//! - POOLWATCH_ENABLED: `true`/`false`
//! - POOLWATCH_WALLET: wallet address
//! - POOLWATCH_MODE: `total`, `individual` or `mix`
//! - POOLWATCH_EXPECTED_HASH: default expected hashrate in H/s
//! - POOLWATCH_STATE_FILE: path of the persisted alert record

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerts::config::{Mode, NotifyTarget, ThresholdSet};

pub const DEFAULT_CONFIG_PATH: &str = "poolwatch.json";
pub const DEFAULT_API_URL: &str = "https://api.ethermine.org";

/// Full job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub mode: Mode,
    /// Default expected hashrate in raw H/s
    #[serde(default)]
    pub expected_hash: f64,
    #[serde(default)]
    pub workers: HashMap<String, WorkerConfig>,
    #[serde(default)]
    pub stale_check: bool,
    #[serde(default = "default_stale_tolerance")]
    pub stale_tolerance_percent: f64,
    #[serde(default)]
    pub continuous_report: bool,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default)]
    pub notify: Vec<NotifyTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub expected_hash: f64,
}

/// Pool API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_stale_tolerance() -> f64 {
    10.0
}

fn default_state_file() -> PathBuf {
    PathBuf::from("reported.lock.json")
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl MonitorConfig {
    /// Read the file at `path` and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_json(&raw)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from the path named by `POOLWATCH_CONFIG`
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("POOLWATCH_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("POOLWATCH_ENABLED") {
            self.enabled = parse_flag(&v)?;
        }
        if let Some(v) = lookup("POOLWATCH_WALLET") {
            self.wallet_address = v.trim().to_string();
        }
        if let Some(v) = lookup("POOLWATCH_MODE") {
            self.mode = v.parse()?;
        }
        if let Some(v) = lookup("POOLWATCH_EXPECTED_HASH") {
            self.expected_hash = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("expected hash '{}' is not a number", v)))?;
        }
        if let Some(v) = lookup("POOLWATCH_STATE_FILE") {
            self.state_file = PathBuf::from(v);
        }
        Ok(())
    }

    /// Reject configurations that must not reach the pool API
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Err(ConfigError::Disabled);
        }
        if self.wallet_address.trim().is_empty() {
            return Err(ConfigError::MissingWallet);
        }
        Ok(())
    }

    /// Threshold view handed to the evaluator
    pub fn thresholds(&self) -> ThresholdSet {
        let mut thresholds = ThresholdSet::new(self.mode, self.expected_hash)
            .with_continuous_report(self.continuous_report);
        thresholds.stale_tolerance_percent = self.stale_tolerance_percent;
        thresholds.stale_check_enabled = self.stale_check;

        for (worker, cfg) in &self.workers {
            thresholds = thresholds.with_worker(worker.clone(), cfg.expected_hash);
        }
        thresholds
    }

    /// Configured targets, falling back to the log when none are set
    pub fn notify_targets(&self) -> Vec<NotifyTarget> {
        if self.notify.is_empty() {
            vec![NotifyTarget::Log]
        } else {
            self.notify.clone()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Monitoring job is disabled")]
    Disabled,

    #[error("Wallet address not set")]
    MissingWallet,

    #[error("Invalid expected hashrate for {}, set a positive 'expected_hash'", threshold_owner(.worker))]
    MissingThreshold { worker: Option<String> },

    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("flag '{}' is not a boolean", value))),
    }
}

fn threshold_owner(worker: &Option<String>) -> &str {
    worker.as_deref().unwrap_or("wallet")
}
