//! Poolwatch job
//!
//! Runs one monitoring cycle and exits. Schedule it externally (cron or a
//! systemd timer) and make sure runs do not overlap.
//!
//! Environment variables:
//! - POOLWATCH_CONFIG: Path of the JSON config (default: poolwatch.json)
//! - POOLWATCH_ENABLED, POOLWATCH_WALLET, POOLWATCH_MODE,
//!   POOLWATCH_EXPECTED_HASH, POOLWATCH_STATE_FILE: Config overrides
//! - RUST_LOG: Log level (default: info)
//!
//! The process exits 0 even when the cycle fails; failures are logged so the
//! scheduler does not retry.

use std::sync::Arc;

use poolwatch::alerts::{AlertChecker, FileStateStore, Notifier};
use poolwatch::{ConfigError, CycleError, CycleReport, MonitorConfig, PoolClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poolwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Job started");

    match run().await {
        Ok(report) => {
            tracing::info!(
                decision = ?report.decision,
                problems = report.problems.len(),
                stale_alert = report.stale_alert,
                "Cycle finished"
            );
        }
        Err(CycleError::Config(ConfigError::Disabled)) => {
            tracing::info!("Monitoring disabled, nothing to do");
        }
        Err(e) => {
            tracing::error!(error = %e, "Cycle failed");
        }
    }

    tracing::info!("Job ended");
}

async fn run() -> Result<CycleReport, CycleError> {
    let config = MonitorConfig::from_env()?;
    config.validate()?;

    tracing::info!(
        wallet = %config.wallet_address,
        mode = ?config.mode,
        state_file = %config.state_file.display(),
        "Configuration loaded"
    );

    let source = PoolClient::new(
        config.api.base_url.clone(),
        config.wallet_address.clone(),
        config.api.timeout(),
    )?;
    let notifier = Notifier::new(config.notify_targets())?;
    let store = FileStateStore::new(&config.state_file);

    let checker = AlertChecker::new(
        Arc::new(source),
        Arc::new(notifier),
        Arc::new(store),
        config.thresholds(),
    );

    checker.run_cycle().await
}
