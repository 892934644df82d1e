//! Operator-facing alert texts

use super::evaluator::{ProblemSet, Severity};
use crate::pool::StatsSnapshot;

/// Display unit for hashrates
pub const HASHRATE_UNIT: &str = "MH/s";

/// Convert raw H/s to MH/s rounded to two decimals, for display only
pub fn to_mega_hashes(raw: f64) -> f64 {
    (raw / 1_000_000.0 * 100.0).round() / 100.0
}

/// A multi-line message, rendered with the line break of each target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    lines: Vec<String>,
}

impl Message {
    pub fn new(first_line: impl Into<String>) -> Self {
        Self {
            lines: vec![first_line.into()],
        }
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self, line_break: &str) -> String {
        self.lines.join(line_break)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render("\n"))
    }
}

/// Digest for a non-empty problem set
///
/// A set holding only the wallet-wide entry yields a single-condition message,
/// anything else lists one line per worker in insertion order.
pub fn problem_digest(problems: &ProblemSet) -> Message {
    if let Some(Severity::Below(observed)) = problems.global_only() {
        return Message::new(format!(
            "Reported hashrate is lower than expected @{:.2}{}.",
            to_mega_hashes(observed),
            HASHRATE_UNIT
        ));
    }

    problems.iter().fold(
        Message::new("Reported hashrate is lower than expected for following worker(s)."),
        |message, (id, severity)| match severity {
            Severity::Offline => message.with_line(format!("{} is offline", id)),
            Severity::Below(observed) => message.with_line(format!(
                "{} @{:.2}{}",
                id,
                to_mega_hashes(*observed),
                HASHRATE_UNIT
            )),
        },
    )
}

pub fn recovery() -> Message {
    Message::new("Previously failed workers are back to normal.")
}

pub fn stale_alert(stats: &StatsSnapshot, tolerance_percent: f64) -> Message {
    Message::new(format!(
        "Stale shares are too high @ {}/{}. Check your workers.",
        stats.stale_shares, stats.valid_shares
    ))
    .with_line("")
    .with_line(format!("Stale tolerance is set to {}%", tolerance_percent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mega_hashes() {
        assert_eq!(to_mega_hashes(125_000_000.0), 125.0);
        assert_eq!(to_mega_hashes(59_876_543.0), 59.88);
        assert_eq!(to_mega_hashes(0.0), 0.0);
    }

    #[test]
    fn test_worker_digest() {
        let mut problems = ProblemSet::new();
        problems.insert("rig2", Severity::Offline);
        problems.insert("rig1", Severity::Below(42_500_000.0));

        let message = problem_digest(&problems);
        assert_eq!(
            message.render("\n"),
            "Reported hashrate is lower than expected for following worker(s).\n\
             rig2 is offline\n\
             rig1 @42.50MH/s"
        );
    }

    #[test]
    fn test_global_digest_is_single_line() {
        let mut problems = ProblemSet::new();
        problems.insert_global(180_000_000.0);

        let message = problem_digest(&problems);
        assert_eq!(message.lines().len(), 1);
        assert_eq!(
            message.to_string(),
            "Reported hashrate is lower than expected @180.00MH/s."
        );
    }

    #[test]
    fn test_worker_named_global_keeps_its_line() {
        let mut problems = ProblemSet::new();
        problems.insert("GLOBAL", Severity::Below(42_000_000.0));

        assert_eq!(
            problem_digest(&problems).render("\n"),
            "Reported hashrate is lower than expected for following worker(s).\n\
             GLOBAL @42.00MH/s"
        );
    }

    #[test]
    fn test_stale_alert_uses_target_line_break() {
        let stats = StatsSnapshot {
            reported_hashrate: 1.0,
            stale_shares: 12,
            valid_shares: 100,
        };

        let rendered = stale_alert(&stats, 10.0).render("<br>");
        assert_eq!(
            rendered,
            "Stale shares are too high @ 12/100. Check your workers.<br><br>Stale tolerance is set to 10%"
        );
    }
}
