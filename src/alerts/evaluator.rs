//! Threshold evaluation
//!
//! Pure functions from fetched statistics and operator thresholds to the set
//! of problem conditions. Comparisons always use raw reported units, display
//! conversion happens only in [`super::message`].

use super::config::{Mode, ThresholdSet};
use super::message::{self, Message};
use crate::config::ConfigError;
use crate::pool::{StatsSnapshot, WorkerSnapshot};

/// Label of the wallet-wide entry in a [`ProblemSet`]
pub const GLOBAL_KEY: &str = "GLOBAL";

/// Entry key; the wallet-wide entry never collides with a worker name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemKey {
    Global,
    Worker(String),
}

impl std::fmt::Display for ProblemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblemKey::Global => f.write_str(GLOBAL_KEY),
            ProblemKey::Worker(id) => f.write_str(id),
        }
    }
}

/// How far an entry is from healthy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    /// Reported nothing at all
    Offline,
    /// Observed raw hashrate strictly below the threshold
    Below(f64),
}

impl Severity {
    /// Display-layer value: `-1` for offline, otherwise MH/s
    pub fn value(&self) -> f64 {
        match self {
            Severity::Offline => -1.0,
            Severity::Below(observed) => message::to_mega_hashes(*observed),
        }
    }
}

/// Problem entries in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemSet {
    entries: Vec<(ProblemKey, Severity)>,
}

impl ProblemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update an entry; an updated key keeps its position
    fn upsert(&mut self, key: ProblemKey, severity: Severity) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = severity,
            None => self.entries.push((key, severity)),
        }
    }

    /// Insert or update a worker entry
    pub fn insert(&mut self, worker: impl Into<String>, severity: Severity) {
        self.upsert(ProblemKey::Worker(worker.into()), severity);
    }

    pub fn insert_global(&mut self, observed: f64) {
        self.upsert(ProblemKey::Global, Severity::Below(observed));
    }

    /// Severity of a worker entry
    pub fn get(&self, worker: &str) -> Option<Severity> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, ProblemKey::Worker(id) if id == worker))
            .map(|(_, s)| *s)
    }

    /// Severity of the wallet-wide entry
    pub fn global(&self) -> Option<Severity> {
        self.entries
            .iter()
            .find(|(k, _)| *k == ProblemKey::Global)
            .map(|(_, s)| *s)
    }

    /// The wallet-wide severity when it is the only entry
    pub fn global_only(&self) -> Option<Severity> {
        match self.entries.as_slice() {
            [(ProblemKey::Global, severity)] => Some(*severity),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProblemKey, &Severity)> {
        self.entries.iter().map(|(k, s)| (k, s))
    }
}

/// Result of evaluating one cycle's statistics
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub problems: ProblemSet,
    /// Informational stale-share alert, never deduplicated
    pub stale_alert: Option<Message>,
}

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No active workers")]
    NoWorkers,

    #[error("Pool-wide stats required for {0:?} mode were not provided")]
    MissingStats(Mode),
}

/// Whether the cycle needs wallet-wide stats
pub fn needs_global_stats(mode: Mode, thresholds: &ThresholdSet) -> bool {
    mode != Mode::Individual || thresholds.stale_check_enabled
}

/// Whether the cycle needs the worker list
///
/// Always for individual mode; for mix mode only when the wallet-wide
/// hashrate is already below threshold.
pub fn needs_worker_stats(
    mode: Mode,
    stats: Option<&StatsSnapshot>,
    thresholds: &ThresholdSet,
) -> Result<bool, EvalError> {
    match mode {
        Mode::Total => Ok(false),
        Mode::Individual => Ok(true),
        Mode::Mix => {
            let stats = stats.ok_or(EvalError::MissingStats(mode))?;
            Ok(stats.reported_hashrate < thresholds.global_threshold()?)
        }
    }
}

/// Evaluate fetched statistics against thresholds
pub fn evaluate(
    mode: Mode,
    stats: Option<&StatsSnapshot>,
    workers: Option<&[WorkerSnapshot]>,
    thresholds: &ThresholdSet,
) -> Result<Evaluation, EvalError> {
    let problems = match mode {
        Mode::Total => {
            let stats = stats.ok_or(EvalError::MissingStats(mode))?;
            let mut problems = ProblemSet::new();
            if let Some(observed) = global_shortfall(stats, thresholds)? {
                problems.insert_global(observed);
            }
            problems
        }
        Mode::Individual => evaluate_workers(workers.unwrap_or_default(), thresholds)?,
        Mode::Mix => {
            let stats = stats.ok_or(EvalError::MissingStats(mode))?;
            match global_shortfall(stats, thresholds)? {
                Some(observed) => {
                    let mut problems = evaluate_workers(workers.unwrap_or_default(), thresholds)?;
                    // Low in aggregate but no single worker to blame
                    if problems.is_empty() {
                        problems.insert_global(observed);
                    }
                    problems
                }
                None => ProblemSet::new(),
            }
        }
    };

    let stale_alert = if thresholds.stale_check_enabled {
        stats.and_then(|s| check_stale(s, thresholds.stale_tolerance_percent))
    } else {
        None
    };

    Ok(Evaluation {
        problems,
        stale_alert,
    })
}

/// Observed wallet-wide hashrate when strictly below threshold
fn global_shortfall(
    stats: &StatsSnapshot,
    thresholds: &ThresholdSet,
) -> Result<Option<f64>, EvalError> {
    let expected = thresholds.global_threshold()?;
    Ok((stats.reported_hashrate < expected).then_some(stats.reported_hashrate))
}

/// Per-worker problems; fails on an empty list or an unresolvable threshold
pub fn evaluate_workers(
    workers: &[WorkerSnapshot],
    thresholds: &ThresholdSet,
) -> Result<ProblemSet, EvalError> {
    if workers.is_empty() {
        return Err(EvalError::NoWorkers);
    }

    let mut problems = ProblemSet::new();
    for worker in workers {
        let expected = thresholds.worker_threshold(&worker.id)?;

        match worker.reported_hashrate {
            None => problems.insert(worker.id.clone(), Severity::Offline),
            Some(observed) if observed < expected => {
                problems.insert(worker.id.clone(), Severity::Below(observed))
            }
            Some(_) => {}
        }
    }

    Ok(problems)
}

/// Stale alert when stale shares strictly exceed the tolerated share of valid ones
pub fn check_stale(stats: &StatsSnapshot, tolerance_percent: f64) -> Option<Message> {
    let tolerated = stats.valid_shares as f64 * tolerance_percent / 100.0;
    (stats.stale_shares as f64 > tolerated).then(|| message::stale_alert(stats, tolerance_percent))
}
