//! Outcome reporting

use std::io::Write;

use crate::orchestrator::{BatchResult, Outcome};

pub fn status_line(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success { uuid } => format!("{}: updated", uuid),
        Outcome::Failure { uuid, error } => format!("{}: failed: {}", uuid, error),
    }
}

pub fn tally_line(result: &BatchResult) -> String {
    let mut line = format!(
        "{} monitor(s) processed: {} succeeded, {} failed",
        result.len(),
        result.successes(),
        result.failures()
    );
    if result.cancelled {
        line.push_str(" (cancelled before completion)");
    }
    line
}

/// One line per monitor, then the tally
pub fn write_report(out: &mut impl Write, result: &BatchResult) -> std::io::Result<()> {
    for outcome in &result.outcomes {
        writeln!(out, "{}", status_line(outcome))?;
    }
    writeln!(out, "{}", tally_line(result))
}
