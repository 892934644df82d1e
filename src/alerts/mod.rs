//! Threshold alerting for pool hashrate
//!
//! Evaluates fetched statistics against operator thresholds and reports
//! degradations and recoveries once, using a persisted alert flag.

pub mod checker;
pub mod config;
pub mod evaluator;
pub mod message;
pub mod notifier;
pub mod state;

pub use checker::{AlertChecker, CycleError, CycleReport, ReportDecision};
pub use config::{Mode, NotifyTarget, ThresholdSet};
pub use evaluator::{EvalError, Evaluation, ProblemKey, ProblemSet, Severity, GLOBAL_KEY};
pub use message::Message;
pub use notifier::{AlertSink, DeliveryError, Notifier};
pub use state::{AlertStateStore, FileStateStore, MemoryStateStore, StateError};
