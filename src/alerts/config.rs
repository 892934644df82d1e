//! Alert threshold and target types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Which statistics a cycle evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Wallet-wide reported hashrate only
    #[default]
    Total,
    /// Every worker against its own threshold
    Individual,
    /// Wallet-wide first, drill into workers only when it is low
    Mix,
}

impl std::str::FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "total" | "0" => Ok(Mode::Total),
            "individual" | "1" => Ok(Mode::Individual),
            "mix" | "2" => Ok(Mode::Mix),
            other => Err(ConfigError::Invalid(format!("unknown mode '{}'", other))),
        }
    }
}

/// Operator thresholds consulted by the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub mode: Mode,
    /// Wallet-wide expected hashrate, also the default for workers (raw H/s)
    pub global_expected_hashrate: f64,
    /// Per-worker overrides (raw H/s)
    #[serde(default)]
    pub per_worker_expected_hashrate: HashMap<String, f64>,
    pub stale_tolerance_percent: f64,
    pub stale_check_enabled: bool,
    /// Re-send the digest every cycle while a problem is outstanding
    pub continuous_report: bool,
}

impl ThresholdSet {
    pub fn new(mode: Mode, global_expected_hashrate: f64) -> Self {
        Self {
            mode,
            global_expected_hashrate,
            per_worker_expected_hashrate: HashMap::new(),
            stale_tolerance_percent: 10.0,
            stale_check_enabled: false,
            continuous_report: false,
        }
    }

    /// Override the expected hashrate of one worker
    pub fn with_worker(mut self, worker: impl Into<String>, expected: f64) -> Self {
        self.per_worker_expected_hashrate.insert(worker.into(), expected);
        self
    }

    /// Enable the stale-share check with the given tolerance
    pub fn with_stale_check(mut self, tolerance_percent: f64) -> Self {
        self.stale_check_enabled = true;
        self.stale_tolerance_percent = tolerance_percent;
        self
    }

    pub fn with_continuous_report(mut self, enabled: bool) -> Self {
        self.continuous_report = enabled;
        self
    }

    /// Expected hashrate for a worker, or the wallet-wide value for `None`
    pub fn expected_hash(&self, worker: Option<&str>) -> f64 {
        worker
            .and_then(|w| self.per_worker_expected_hashrate.get(w))
            .copied()
            .unwrap_or(self.global_expected_hashrate)
    }

    /// Wallet-wide threshold, rejecting unset or non-positive values
    pub fn global_threshold(&self) -> Result<f64, ConfigError> {
        let expected = self.expected_hash(None);
        if expected > 0.0 {
            Ok(expected)
        } else {
            Err(ConfigError::MissingThreshold { worker: None })
        }
    }

    /// Threshold for one worker, rejecting unset or non-positive values
    pub fn worker_threshold(&self, worker: &str) -> Result<f64, ConfigError> {
        let expected = self.expected_hash(Some(worker));
        if expected > 0.0 {
            Ok(expected)
        } else {
            Err(ConfigError::MissingThreshold {
                worker: Some(worker.to_string()),
            })
        }
    }
}

/// Notification target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotifyTarget {
    /// Log to tracing
    Log,
    /// Telegram bot message
    Telegram { bot_token: String, chat_id: String },
    /// IFTTT Maker webhook, message passed as `value1`
    Ifttt { event: String, key: String },
    /// Generic HTTP webhook
    Webhook {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl NotifyTarget {
    /// Line separator understood by the target
    pub fn line_break(&self) -> &'static str {
        match self {
            NotifyTarget::Ifttt { .. } => "<br>",
            NotifyTarget::Log | NotifyTarget::Telegram { .. } | NotifyTarget::Webhook { .. } => {
                "\n"
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NotifyTarget::Log => "log",
            NotifyTarget::Telegram { .. } => "telegram",
            NotifyTarget::Ifttt { .. } => "ifttt",
            NotifyTarget::Webhook { .. } => "webhook",
        }
    }
}
