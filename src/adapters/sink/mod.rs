//! Result sinks
//!
//! A [`ResultSink`] persists what a batch produced: one table per succeeded
//! report and one error entry per failed or cancelled report. Sinks own file
//! naming and format; the engine never touches the filesystem.

pub mod csv;

pub use self::csv::CsvSink;

use crate::core::engine::{BatchOutcome, ReportOutcome};
use crate::domain::{ExportError, ReportName, Result, Table};

/// Destination for report results
pub trait ResultSink: Send + Sync {
    /// Persists the table of a succeeded report
    fn deliver(&self, report: &ReportName, table: &Table) -> Result<()>;

    /// Records a report that did not produce a table
    fn deliver_error(&self, report: &ReportName, error_kind: &str, message: &str) -> Result<()>;
}

/// Delivers every result of `outcome` in submission order
///
/// A failed delivery does not stop the remaining ones.
///
/// # Errors
///
/// Returns [`ExportError::Output`] naming every report whose delivery failed
pub fn deliver_outcome(sink: &dyn ResultSink, outcome: &BatchOutcome) -> Result<()> {
    let mut failures: Vec<String> = Vec::new();

    for result in &outcome.results {
        let delivered = match &result.outcome {
            ReportOutcome::Succeeded { table, .. } => sink.deliver(&result.name, table),
            ReportOutcome::Failed { kind, message, .. } => {
                sink.deliver_error(&result.name, kind.as_str(), message)
            }
            ReportOutcome::Cancelled => sink.deliver_error(
                &result.name,
                result.outcome.kind_str(),
                "Report was cancelled before it started",
            ),
        };

        if let Err(e) = delivered {
            tracing::error!(report = %result.name, error = %e, "Failed to deliver report result");
            failures.push(format!("{}: {e}", result.name));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ExportError::Output(format!(
            "{} result(s) could not be delivered: {}",
            failures.len(),
            failures.join("; ")
        )))
    }
}
