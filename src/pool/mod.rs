//! Pool statistics source
//!
//! Fetches wallet-wide and per-worker hashrate from the mining pool API.

pub mod client;
pub mod model;

pub use client::{PoolClient, StatsSource, TransportError};
pub use model::{StatsSnapshot, WorkerSnapshot};
