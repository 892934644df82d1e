//! Poolwatch: Mining Pool Hashrate Monitor
//!
//! A cron-driven job that polls a mining pool API for wallet and worker
//! hashrate, compares it against operator thresholds, and notifies once when
//! performance degrades and once when it recovers.
//!
//! # Features
//!
//! - **Three Modes**: wallet total, individual workers, or total with worker drill-down
//! - **Deduplicated Alerts**: a persisted flag suppresses repeats until recovery
//! - **Continuous Reporting**: optionally re-send the digest every cycle
//! - **Stale Share Check**: informational alert whenever stale shares exceed a tolerance
//! - **Targets**: log, Telegram, IFTTT and generic webhooks
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use poolwatch::alerts::{AlertChecker, FileStateStore, Mode, Notifier, NotifyTarget, ThresholdSet};
//! use poolwatch::pool::PoolClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = PoolClient::new("https://api.ethermine.org", "0xabc", Duration::from_secs(30))?;
//! let checker = AlertChecker::new(
//!     Arc::new(source),
//!     Arc::new(Notifier::new(vec![NotifyTarget::Log])?),
//!     Arc::new(FileStateStore::new("reported.lock.json")),
//!     ThresholdSet::new(Mode::Total, 200_000_000.0),
//! );
//!
//! let report = checker.run_cycle().await?;
//! println!("Decision: {:?}", report.decision);
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod config;
pub mod pool;

// Re-export commonly used types
pub use alerts::{AlertChecker, CycleError, CycleReport, ReportDecision};
pub use config::{ConfigError, MonitorConfig};
pub use pool::{PoolClient, StatsSnapshot, StatsSource, WorkerSnapshot};
