//! HTTP client for the pool statistics API

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::model::{ApiResponse, StatsSnapshot, WorkerSnapshot};

/// Source of pool-wide and per-worker statistics
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Fetch pool-wide stats for the wallet
    async fn fetch_global(&self) -> Result<StatsSnapshot, TransportError>;

    /// Fetch the current worker list for the wallet
    async fn fetch_workers(&self) -> Result<Vec<WorkerSnapshot>, TransportError>;
}

/// Client for an Ethermine-compatible miner API
#[derive(Debug, Clone)]
pub struct PoolClient {
    http_client: reqwest::Client,
    base_url: String,
    wallet: String,
}

impl PoolClient {
    pub fn new(
        base_url: impl Into<String>,
        wallet: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            wallet: wallet.into(),
        })
    }

    /// Build the URL of a miner endpoint
    pub fn endpoint_url(&self, function: &str) -> String {
        format!("{}/miner/{}/{}", self.base_url, self.wallet, function)
    }

    async fn get<T: DeserializeOwned>(&self, function: &str) -> Result<T, TransportError> {
        let url = self.endpoint_url(function);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Deserialization(e.to_string()))?;

        let data = envelope.into_data().map_err(TransportError::Api)?;

        tracing::debug!(url = %url, "Pool API call succeeded");
        Ok(data)
    }
}

#[async_trait]
impl StatsSource for PoolClient {
    async fn fetch_global(&self) -> Result<StatsSnapshot, TransportError> {
        self.get("currentStats").await
    }

    async fn fetch_workers(&self) -> Result<Vec<WorkerSnapshot>, TransportError> {
        self.get("workers").await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Pool API returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Pool API is not working: {0}")]
    Api(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
