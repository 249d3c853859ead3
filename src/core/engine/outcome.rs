//! Report and batch outcomes
//!
//! A [`BatchOutcome`] holds exactly one [`ReportResult`] per submitted
//! descriptor, in submission order.

use super::execution::{ExecutionStage, ExecutionState};
use crate::domain::{ErrorKind, ReportName, Table};
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Terminal result of one report execution
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// The report produced a table
    Succeeded {
        table: Table,
        /// Data requests issued across all of the report's queries
        attempts: u32,
    },

    /// Fetch, transform, timeout or task failure
    Failed {
        kind: ErrorKind,
        stage: ExecutionStage,
        message: String,
    },

    /// The report was never admitted
    Cancelled,
}

impl ReportOutcome {
    pub fn failed(kind: ErrorKind, stage: ExecutionStage, message: impl Into<String>) -> Self {
        ReportOutcome::Failed {
            kind,
            stage,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ReportOutcome::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReportOutcome::Failed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReportOutcome::Cancelled)
    }

    /// Final state of the execution that produced this outcome
    pub fn state(&self) -> ExecutionState {
        match self {
            ReportOutcome::Succeeded { .. } => ExecutionState::Succeeded,
            ReportOutcome::Failed { stage, .. } => ExecutionState::Failed(*stage),
            ReportOutcome::Cancelled => ExecutionState::Cancelled,
        }
    }

    /// Classification as delivered to a result sink
    pub fn kind_str(&self) -> &'static str {
        match self {
            ReportOutcome::Succeeded { .. } => "Succeeded",
            ReportOutcome::Failed { kind, .. } => kind.as_str(),
            ReportOutcome::Cancelled => "Cancelled",
        }
    }
}

/// Outcome of one submitted descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ReportResult {
    pub name: ReportName,
    pub outcome: ReportOutcome,
    /// Wall time from admission to completion; zero when never admitted
    pub duration: Duration,
}

impl ReportResult {
    pub fn new(name: ReportName, outcome: ReportOutcome, duration: Duration) -> Self {
        Self {
            name,
            outcome,
            duration,
        }
    }

    pub fn cancelled(name: ReportName) -> Self {
        Self::new(name, ReportOutcome::Cancelled, Duration::ZERO)
    }

    /// Output table, when the report succeeded
    pub fn table(&self) -> Option<&Table> {
        match &self.outcome {
            ReportOutcome::Succeeded { table, .. } => Some(table),
            _ => None,
        }
    }
}

/// Aggregate of all report results of one batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Unique id of the batch, included in every log line of the run
    pub batch_id: Uuid,

    /// Results in submission order
    pub results: Vec<ReportResult>,

    /// When the batch started
    pub started_at: DateTime<Utc>,

    /// Total duration of the batch
    pub duration: Duration,
}

impl BatchOutcome {
    pub fn new(
        batch_id: Uuid,
        results: Vec<ReportResult>,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            batch_id,
            results,
            started_at,
            duration,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn cancelled(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.is_cancelled())
            .count()
    }

    /// Check if every report succeeded
    pub fn is_successful(&self) -> bool {
        self.succeeded() == self.total()
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            return 100.0;
        }
        (self.succeeded() as f64 / self.total() as f64) * 100.0
    }

    /// Result of the report named `name`, first match in submission order
    pub fn result(&self, name: &str) -> Option<&ReportResult> {
        self.results.iter().find(|r| r.name.as_str() == name)
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            batch_id = %self.batch_id,
            total = self.total(),
            succeeded = self.succeeded(),
            failed = self.failed(),
            cancelled = self.cancelled(),
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Batch completed"
        );

        for result in &self.results {
            match &result.outcome {
                ReportOutcome::Succeeded { table, attempts } => tracing::debug!(
                    report = %result.name,
                    rows = table.len(),
                    attempts,
                    duration_ms = result.duration.as_millis() as u64,
                    "Report succeeded"
                ),
                ReportOutcome::Failed {
                    kind,
                    stage,
                    message,
                } => tracing::warn!(
                    report = %result.name,
                    error_kind = %kind,
                    stage = %stage,
                    message = %message,
                    "Report failed"
                ),
                ReportOutcome::Cancelled => {
                    tracing::warn!(report = %result.name, "Report cancelled")
                }
            }
        }
    }
}
