//! One monitoring cycle
//!
//! Fetches statistics, evaluates them, and drives the report state machine:
//!
//! ```text
//!            problems                 problems (continuous_report)
//!  NORMAL ─────────────► ALERTED ───────────────────────────────┐
//!    ▲      (alert)        │  ▲                    (re-alert)    │
//!    │                     │  └──────────────────────────────────┘
//!    └─────────────────────┘
//!      no problems (recovery)
//! ```
//!
//! Repeated problems without `continuous_report` stay ALERTED silently, and
//! no problems while NORMAL is a no-op. The stale-share alert is outside the
//! state machine and fires on every cycle its condition holds.

use std::sync::Arc;

use super::config::{Mode, ThresholdSet};
use super::evaluator::{self, EvalError, ProblemSet};
use super::message;
use super::notifier::{AlertSink, DeliveryError};
use super::state::{AlertStateStore, StateError};
use crate::config::ConfigError;
use crate::pool::{StatsSource, TransportError};

/// What the report state machine does with one cycle's problem set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDecision {
    /// NORMAL to ALERTED, send the digest
    Alert,
    /// Still ALERTED, digest re-sent because of continuous reporting
    Repeat,
    /// Still ALERTED, nothing sent
    Suppress,
    /// ALERTED to NORMAL, send the recovery notice
    Recover,
    /// NORMAL with nothing to report
    Idle,
}

impl ReportDecision {
    pub fn decide(outstanding: bool, has_problems: bool, continuous_report: bool) -> Self {
        match (outstanding, has_problems) {
            (false, true) => ReportDecision::Alert,
            (true, true) if continuous_report => ReportDecision::Repeat,
            (true, true) => ReportDecision::Suppress,
            (true, false) => ReportDecision::Recover,
            (false, false) => ReportDecision::Idle,
        }
    }
}

/// Outcome of a completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub decision: ReportDecision,
    pub problems: ProblemSet,
    /// A stale-share alert was raised this cycle
    pub stale_alert: bool,
    /// The stale-share alert could not be delivered
    pub stale_delivery_failed: bool,
}

/// Runs monitoring cycles against a stats source, sink and state store
pub struct AlertChecker {
    source: Arc<dyn StatsSource>,
    sink: Arc<dyn AlertSink>,
    store: Arc<dyn AlertStateStore>,
    thresholds: ThresholdSet,
}

impl AlertChecker {
    pub fn new(
        source: Arc<dyn StatsSource>,
        sink: Arc<dyn AlertSink>,
        store: Arc<dyn AlertStateStore>,
        thresholds: ThresholdSet,
    ) -> Self {
        Self {
            source,
            sink,
            store,
            thresholds,
        }
    }

    /// Run a single evaluation cycle to completion
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let mode = self.thresholds.mode;

        if mode != Mode::Individual {
            self.thresholds.global_threshold()?;
        }

        let stats = if evaluator::needs_global_stats(mode, &self.thresholds) {
            Some(self.source.fetch_global().await?)
        } else {
            None
        };

        let workers = if evaluator::needs_worker_stats(mode, stats.as_ref(), &self.thresholds)? {
            Some(self.source.fetch_workers().await?)
        } else {
            None
        };

        let evaluation =
            evaluator::evaluate(mode, stats.as_ref(), workers.as_deref(), &self.thresholds)?;

        let stale_alert = evaluation.stale_alert.is_some();
        let mut stale_delivery_failed = false;
        if let Some(stale) = &evaluation.stale_alert {
            if let Err(e) = self.sink.send(stale).await {
                tracing::error!(error = %e, "Failed to deliver stale share alert");
                stale_delivery_failed = true;
            }
        }

        let decision = ReportDecision::decide(
            self.store.is_outstanding(),
            !evaluation.problems.is_empty(),
            self.thresholds.continuous_report,
        );
        tracing::info!(
            mode = ?mode,
            problems = evaluation.problems.len(),
            decision = ?decision,
            "Evaluation complete"
        );

        self.apply(decision, &evaluation.problems).await?;

        Ok(CycleReport {
            decision,
            problems: evaluation.problems,
            stale_alert,
            stale_delivery_failed,
        })
    }

    /// Deliver first, then persist, so a failed delivery is retried next cycle
    async fn apply(&self, decision: ReportDecision, problems: &ProblemSet) -> Result<(), CycleError> {
        match decision {
            ReportDecision::Alert | ReportDecision::Repeat => {
                self.sink.send(&message::problem_digest(problems)).await?;
                if self.store.mark_outstanding()? {
                    tracing::info!("Alert raised");
                }
            }
            ReportDecision::Suppress => {
                tracing::info!("Problem still outstanding, alert suppressed");
            }
            ReportDecision::Recover => {
                self.sink.send(&message::recovery()).await?;
                if self.store.clear()? {
                    tracing::info!("Alert cleared");
                }
            }
            ReportDecision::Idle => {}
        }
        Ok(())
    }
}

/// Errors that end a cycle early
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Evaluation(#[from] EvalError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Alert state error: {0}")]
    State(#[from] StateError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::alerts::state::MemoryStateStore;
    use crate::pool::{StatsSnapshot, WorkerSnapshot};

    #[derive(Default)]
    struct FakeSource {
        stats: Mutex<Option<StatsSnapshot>>,
        workers: Mutex<Vec<WorkerSnapshot>>,
        global_calls: AtomicUsize,
        worker_calls: AtomicUsize,
    }

    impl FakeSource {
        fn set_stats(&self, reported: f64, stale: u64, valid: u64) {
            *self.stats.lock() = Some(StatsSnapshot {
                reported_hashrate: reported,
                stale_shares: stale,
                valid_shares: valid,
            });
        }

        fn set_workers(&self, workers: Vec<WorkerSnapshot>) {
            *self.workers.lock() = workers;
        }
    }

    #[async_trait]
    impl StatsSource for FakeSource {
        async fn fetch_global(&self) -> Result<StatsSnapshot, TransportError> {
            self.global_calls.fetch_add(1, Ordering::SeqCst);
            self.stats
                .lock()
                .clone()
                .ok_or_else(|| TransportError::Api("status NOTOK".to_string()))
        }

        async fn fetch_workers(&self) -> Result<Vec<WorkerSnapshot>, TransportError> {
            self.worker_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.workers.lock().clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
        fail_stale: AtomicBool,
        fail_reports: AtomicBool,
    }

    impl RecordingSink {
        fn count(&self, prefix: &str) -> usize {
            self.sent.lock().iter().filter(|m| m.starts_with(prefix)).count()
        }
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send(&self, message: &message::Message) -> Result<(), DeliveryError> {
            let text = message.render("\n");
            let failing = if text.starts_with(STALE) {
                &self.fail_stale
            } else {
                &self.fail_reports
            };
            if failing.load(Ordering::SeqCst) {
                return Err(DeliveryError::Webhook("down".to_string()));
            }
            self.sent.lock().push(text);
            Ok(())
        }
    }

    const ALERT: &str = "Reported hashrate is lower";
    const RECOVERY: &str = "Previously failed workers";
    const STALE: &str = "Stale shares are too high";

    struct Harness {
        source: Arc<FakeSource>,
        sink: Arc<RecordingSink>,
        store: Arc<MemoryStateStore>,
        checker: AlertChecker,
    }

    fn harness(thresholds: ThresholdSet) -> Harness {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(MemoryStateStore::new());
        let checker = AlertChecker::new(source.clone(), sink.clone(), store.clone(), thresholds);
        Harness {
            source,
            sink,
            store,
            checker,
        }
    }

    #[test]
    fn test_decision_table() {
        use ReportDecision::*;
        assert_eq!(ReportDecision::decide(false, true, false), Alert);
        assert_eq!(ReportDecision::decide(false, true, true), Alert);
        assert_eq!(ReportDecision::decide(true, true, false), Suppress);
        assert_eq!(ReportDecision::decide(true, true, true), Repeat);
        assert_eq!(ReportDecision::decide(true, false, true), Recover);
        assert_eq!(ReportDecision::decide(false, false, false), Idle);
    }

    #[tokio::test]
    async fn test_recovery_reported_once() {
        for continuous in [false, true] {
            let h = harness(ThresholdSet::new(Mode::Total, 100.0).with_continuous_report(continuous));

            for reported in [50.0, 50.0, 150.0, 150.0] {
                h.source.set_stats(reported, 0, 100);
                h.checker.run_cycle().await.unwrap();
            }

            let expected_alerts = if continuous { 2 } else { 1 };
            assert_eq!(h.sink.count(ALERT), expected_alerts);
            assert_eq!(h.sink.count(RECOVERY), 1);
            assert!(!h.store.is_outstanding());
        }
    }

    #[tokio::test]
    async fn test_continuous_report_repeats() {
        let h = harness(ThresholdSet::new(Mode::Total, 100.0).with_continuous_report(true));
        h.source.set_stats(10.0, 0, 100);
        for _ in 0..3 {
            h.checker.run_cycle().await.unwrap();
        }
        assert_eq!(h.sink.count(ALERT), 3);

        let h = harness(ThresholdSet::new(Mode::Total, 100.0));
        h.source.set_stats(10.0, 0, 100);
        let mut decisions = Vec::new();
        for _ in 0..3 {
            decisions.push(h.checker.run_cycle().await.unwrap().decision);
        }
        assert_eq!(h.sink.count(ALERT), 1);
        assert_eq!(
            decisions,
            vec![ReportDecision::Alert, ReportDecision::Suppress, ReportDecision::Suppress]
        );
    }

    #[tokio::test]
    async fn test_stale_fires_every_cycle() {
        let h = harness(ThresholdSet::new(Mode::Total, 100.0).with_stale_check(10.0));
        h.source.set_stats(10.0, 12, 100);

        for _ in 0..3 {
            let report = h.checker.run_cycle().await.unwrap();
            assert!(report.stale_alert);
        }

        assert_eq!(h.sink.count(STALE), 3);
        assert_eq!(h.sink.count(ALERT), 1);
    }

    #[tokio::test]
    async fn test_stale_delivery_failure_does_not_block_report() {
        let h = harness(ThresholdSet::new(Mode::Total, 100.0).with_stale_check(10.0));
        h.sink.fail_stale.store(true, Ordering::SeqCst);
        h.source.set_stats(10.0, 50, 100);

        let report = h.checker.run_cycle().await.unwrap();
        assert!(report.stale_delivery_failed);
        assert_eq!(report.decision, ReportDecision::Alert);
        assert_eq!(h.sink.count(ALERT), 1);
        assert!(h.store.is_outstanding());
    }

    #[tokio::test]
    async fn test_failed_alert_delivery_stays_normal() {
        let h = harness(ThresholdSet::new(Mode::Total, 100.0));
        h.source.set_stats(10.0, 0, 100);

        h.sink.fail_reports.store(true, Ordering::SeqCst);
        let err = h.checker.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Delivery(_)));
        assert!(!h.store.is_outstanding());

        h.sink.fail_reports.store(false, Ordering::SeqCst);
        let report = h.checker.run_cycle().await.unwrap();
        assert_eq!(report.decision, ReportDecision::Alert);
        assert!(h.store.is_outstanding());
        assert_eq!(h.sink.count(ALERT), 1);
    }

    #[tokio::test]
    async fn test_failed_recovery_delivery_stays_alerted() {
        let h = harness(ThresholdSet::new(Mode::Total, 100.0));
        h.source.set_stats(10.0, 0, 100);
        h.checker.run_cycle().await.unwrap();
        assert!(h.store.is_outstanding());

        h.source.set_stats(150.0, 0, 100);
        h.sink.fail_reports.store(true, Ordering::SeqCst);
        let err = h.checker.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Delivery(_)));
        assert!(h.store.is_outstanding());

        h.sink.fail_reports.store(false, Ordering::SeqCst);
        let report = h.checker.run_cycle().await.unwrap();
        assert_eq!(report.decision, ReportDecision::Recover);
        assert!(!h.store.is_outstanding());
        assert_eq!(h.sink.count(RECOVERY), 1);
    }

    #[tokio::test]
    async fn test_dead_target_still_deduplicates() {
        use crate::alerts::config::NotifyTarget;
        use crate::alerts::notifier::Notifier;
        use std::collections::HashMap;

        let source = Arc::new(FakeSource::default());
        source.set_stats(10.0, 0, 100);
        let store = Arc::new(MemoryStateStore::new());
        let notifier = Notifier::new(vec![
            NotifyTarget::Log,
            NotifyTarget::Webhook {
                url: "http://127.0.0.1:1/hook".to_string(),
                headers: HashMap::new(),
            },
        ])
        .unwrap();
        let checker = AlertChecker::new(
            source,
            Arc::new(notifier),
            store.clone(),
            ThresholdSet::new(Mode::Total, 100.0),
        );

        let mut decisions = Vec::new();
        for _ in 0..3 {
            decisions.push(checker.run_cycle().await.unwrap().decision);
        }

        assert_eq!(
            decisions,
            vec![ReportDecision::Alert, ReportDecision::Suppress, ReportDecision::Suppress]
        );
        assert!(store.is_outstanding());
    }

    #[tokio::test]
    async fn test_mix_recovers_without_fetching_workers() {
        let h = harness(ThresholdSet::new(Mode::Mix, 100.0));
        h.source.set_workers(vec![
            WorkerSnapshot::new("rig1", None),
            WorkerSnapshot::new("rig2", Some(60.0)),
        ]);

        h.source.set_stats(60.0, 0, 100);
        let report = h.checker.run_cycle().await.unwrap();
        assert_eq!(report.decision, ReportDecision::Alert);
        assert_eq!(h.source.worker_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.sink.sent.lock()[0],
            "Reported hashrate is lower than expected for following worker(s).\n\
             rig1 is offline\n\
             rig2 @0.00MH/s"
        );

        h.source.set_stats(100.0, 0, 100);
        let report = h.checker.run_cycle().await.unwrap();
        assert_eq!(report.decision, ReportDecision::Recover);
        assert_eq!(h.source.worker_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.sink.count(RECOVERY), 1);
    }

    #[tokio::test]
    async fn test_individual_mode_skips_global_fetch() {
        let h = harness(ThresholdSet::new(Mode::Individual, 100.0));
        h.source.set_workers(vec![WorkerSnapshot::new("rig1", Some(100.0))]);

        let report = h.checker.run_cycle().await.unwrap();
        assert_eq!(report.decision, ReportDecision::Idle);
        assert_eq!(h.source.global_calls.load(Ordering::SeqCst), 0);
        assert!(h.sink.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_individual_mode_stale_check_fetches_global() {
        let h = harness(ThresholdSet::new(Mode::Individual, 100.0).with_stale_check(10.0));
        h.source.set_workers(vec![WorkerSnapshot::new("rig1", Some(100.0))]);
        h.source.set_stats(0.0, 20, 100);

        let report = h.checker.run_cycle().await.unwrap();
        assert!(report.stale_alert);
        assert_eq!(h.source.global_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_abort_cycle_without_state_change() {
        let h = harness(ThresholdSet::new(Mode::Individual, 100.0));
        let err = h.checker.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Evaluation(EvalError::NoWorkers)));

        let h = harness(ThresholdSet::new(Mode::Total, 100.0));
        let err = h.checker.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Transport(TransportError::Api(_))));

        let h = harness(ThresholdSet::new(Mode::Total, 0.0));
        h.source.set_stats(10.0, 0, 100);
        let err = h.checker.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Config(ConfigError::MissingThreshold { .. })));
        assert_eq!(h.source.global_calls.load(Ordering::SeqCst), 0);

        assert!(h.sink.sent.lock().is_empty());
        assert!(!h.store.is_outstanding());
    }
}
