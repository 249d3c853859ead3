//! Concurrent report execution engine
//!
//! [`ReportScheduler::run_batch`] takes report descriptors, executes each
//! through a bounded worker pool and returns a [`BatchOutcome`] with one
//! [`ReportResult`] per descriptor in submission order.

pub mod execution;
pub mod outcome;
pub mod scheduler;

pub use execution::{ExecutionStage, ExecutionState, ExecutionTracker};
pub use outcome::{BatchOutcome, ReportOutcome, ReportResult};
pub use scheduler::{ReportScheduler, SchedulerConfig, MAX_QUERIES_PER_REPORT};
