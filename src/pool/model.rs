//! Pool API records

use serde::{Deserialize, Serialize};

/// Pool-wide statistics for one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Reported hashrate in raw H/s
    pub reported_hashrate: f64,
    /// Shares rejected as outdated
    #[serde(default)]
    pub stale_shares: u64,
    /// Accepted shares
    #[serde(default)]
    pub valid_shares: u64,
}

/// Per-worker statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSnapshot {
    /// Worker name as reported by the miner
    #[serde(rename = "worker")]
    pub id: String,
    /// `None` when the worker reported nothing (offline), distinct from zero
    #[serde(default)]
    pub reported_hashrate: Option<f64>,
}

impl WorkerSnapshot {
    pub fn new(id: impl Into<String>, reported_hashrate: Option<f64>) -> Self {
        Self {
            id: id.into(),
            reported_hashrate,
        }
    }
}

/// Response envelope shared by every pool endpoint
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const STATUS_OK: &'static str = "OK";

    /// Unwrap the payload, treating any non-OK status as a failure
    pub fn into_data(self) -> Result<T, String> {
        if self.status != Self::STATUS_OK {
            return Err(match self.error {
                Some(e) => format!("status {}: {}", self.status, e),
                None => format!("status {}", self.status),
            });
        }
        self.data.ok_or_else(|| "response carried no data".to_string())
    }
}
