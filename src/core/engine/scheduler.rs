//! Bounded-concurrency report scheduler
//!
//! Descriptors are admitted in submission order, each once a permit of the
//! worker semaphore is free. Every admitted report runs as its own task from
//! first fetch through transform, so a failure or panic stays inside that
//! task. Admission stops when shutdown is requested or the batch deadline
//! passes; whatever has not been admitted by then is reported as cancelled,
//! while reports already running are awaited.

use super::execution::{ExecutionStage, ExecutionState, ExecutionTracker};
use super::outcome::{BatchOutcome, ReportOutcome, ReportResult};
use crate::adapters::odata::RecordFetcher;
use crate::config::EngineConfig;
use crate::core::reports::{primary_request, FetchedData, ReportRegistry, ReportUnit};
use crate::domain::{ErrorKind, ExportError, FetchError, ReportDescriptor, ReportName, Result};
use chrono::Utc;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

/// Upper bound on queries one report may issue, follow-ups included
pub const MAX_QUERIES_PER_REPORT: usize = 64;

/// Stage recorded when a report task dies without returning
///
/// Transform panics are caught inside the task and reported as
/// `Transforming`, so a task that panics or is aborted was still fetching.
const TASK_FAILURE_STAGE: ExecutionStage = ExecutionStage::Fetching;

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum reports in flight at once
    pub worker_limit: usize,

    /// Limit on a single report's fetch phase
    pub report_timeout: Option<Duration>,

    /// Deadline after which no further report is admitted
    pub batch_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_limit: 5,
            report_timeout: None,
            batch_timeout: None,
        }
    }
}

impl From<&EngineConfig> for SchedulerConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            worker_limit: config.worker_limit,
            report_timeout: config.report_timeout_secs.map(Duration::from_secs),
            batch_timeout: config.batch_timeout_secs.map(Duration::from_secs),
        }
    }
}

enum Slot {
    Running {
        name: ReportName,
        admitted: Instant,
        handle: JoinHandle<(ReportOutcome, Duration)>,
    },
    Cancelled(ReportName),
}

enum Admission {
    Admitted(OwnedSemaphorePermit),
    Stopped(&'static str),
}

/// Runs batches of reports against a shared fetcher
pub struct ReportScheduler {
    config: SchedulerConfig,
    registry: Arc<ReportRegistry>,
    fetcher: Arc<dyn RecordFetcher>,
}

impl ReportScheduler {
    pub fn new(
        config: SchedulerConfig,
        registry: Arc<ReportRegistry>,
        fetcher: Arc<dyn RecordFetcher>,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs every descriptor to exactly one result
    ///
    /// Results are returned in submission order. Report failures never fail
    /// the batch; they are recorded in the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Precondition`] before any work starts when the
    /// descriptor list is empty, the worker limit is zero, or a descriptor
    /// names an unregistered report
    pub async fn run_batch(
        &self,
        descriptors: Vec<ReportDescriptor>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<BatchOutcome> {
        let jobs = self.prepare(descriptors)?;

        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.worker_limit));
        let deadline = self
            .config
            .batch_timeout
            .map(|limit| tokio::time::Instant::now() + limit);

        tracing::info!(
            batch_id = %batch_id,
            reports = jobs.len(),
            worker_limit = self.config.worker_limit,
            "Starting report batch"
        );

        let mut slots = Vec::with_capacity(jobs.len());
        let mut stopped = false;

        for (descriptor, unit) in jobs {
            if stopped {
                slots.push(Slot::Cancelled(descriptor.name));
                continue;
            }

            let admission = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => Admission::Stopped("shutdown requested"),
                _ = deadline_reached(deadline) => Admission::Stopped("batch timeout reached"),
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => Admission::Admitted(permit),
                    Err(_) => Admission::Stopped("worker pool closed"),
                },
            };

            match admission {
                Admission::Admitted(permit) => slots.push(self.spawn(batch_id, descriptor, unit, permit)),
                Admission::Stopped(reason) => {
                    tracing::warn!(
                        batch_id = %batch_id,
                        reason,
                        "Admission stopped, remaining reports will be cancelled"
                    );
                    stopped = true;
                    slots.push(Slot::Cancelled(descriptor.name));
                }
            }
        }

        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            let result = match slot {
                Slot::Cancelled(name) => ReportResult::cancelled(name),
                Slot::Running {
                    name,
                    admitted,
                    handle,
                } => match handle.await {
                    Ok((outcome, duration)) => ReportResult::new(name, outcome, duration),
                    Err(e) => {
                        let message = if e.is_panic() {
                            format!("Report task panicked: {}", panic_message(e.into_panic()))
                        } else {
                            format!("Report task aborted: {e}")
                        };
                        tracing::error!(report = %name, message = %message, "Report task failed");
                        ReportResult::new(
                            name,
                            ReportOutcome::failed(
                                ErrorKind::Internal,
                                TASK_FAILURE_STAGE,
                                message,
                            ),
                            admitted.elapsed(),
                        )
                    }
                },
            };
            results.push(result);
        }

        let outcome = BatchOutcome::new(batch_id, results, started_at, clock.elapsed());
        outcome.log_summary();
        Ok(outcome)
    }

    fn prepare(
        &self,
        descriptors: Vec<ReportDescriptor>,
    ) -> Result<Vec<(ReportDescriptor, Arc<dyn ReportUnit>)>> {
        if descriptors.is_empty() {
            return Err(ExportError::Precondition(
                "No reports were submitted".to_string(),
            ));
        }
        if self.config.worker_limit == 0 {
            return Err(ExportError::Precondition(
                "Worker limit must be at least 1".to_string(),
            ));
        }

        descriptors
            .into_iter()
            .map(|descriptor| {
                let unit = self.registry.get(&descriptor.name).ok_or_else(|| {
                    ExportError::Precondition(format!(
                        "Report '{}' is not registered",
                        descriptor.name
                    ))
                })?;
                Ok((descriptor, unit))
            })
            .collect()
    }

    fn spawn(
        &self,
        batch_id: Uuid,
        descriptor: ReportDescriptor,
        unit: Arc<dyn ReportUnit>,
        permit: OwnedSemaphorePermit,
    ) -> Slot {
        let name = descriptor.name.clone();
        let fetcher = self.fetcher.clone();
        let timeout = self.config.report_timeout;
        let span = tracing::info_span!("report", batch_id = %batch_id, report = %name);

        let handle = tokio::spawn(
            async move {
                let _permit = permit;
                let started = Instant::now();
                let outcome =
                    execute_report(unit.as_ref(), &descriptor, fetcher.as_ref(), timeout).await;
                (outcome, started.elapsed())
            }
            .instrument(span),
        );

        Slot::Running {
            name,
            admitted: Instant::now(),
            handle,
        }
    }
}

/// Resolves once the shutdown flag is set; never if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn deadline_reached(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn fail(tracker: &mut ExecutionTracker, kind: ErrorKind, message: String) -> ReportOutcome {
    let stage = match tracker.fail() {
        Ok(stage) => stage,
        Err(e) => {
            tracing::error!(error = %e, "Execution state out of sync");
            tracker.state().stage().unwrap_or(ExecutionStage::Fetching)
        }
    };
    tracing::warn!(error_kind = %kind, stage = %stage, message = %message, "Report failed");
    ReportOutcome::failed(kind, stage, message)
}

/// Issues the report's primary query and every follow-up it asks for
async fn fetch_datasets(
    unit: &dyn ReportUnit,
    descriptor: &ReportDescriptor,
    fetcher: &dyn RecordFetcher,
) -> std::result::Result<(FetchedData, u32), FetchError> {
    let mut data = FetchedData::new();
    let mut attempts = 0u32;
    let mut issued = 0usize;
    let mut next = Some(primary_request(unit, descriptor));

    while let Some(request) = next {
        issued += 1;
        if issued > MAX_QUERIES_PER_REPORT {
            return Err(FetchError::Query(format!(
                "Report issued more than {MAX_QUERIES_PER_REPORT} queries"
            )));
        }

        tracing::debug!(key = %request.key, entity = %request.entity, "Fetching dataset");
        let fetched = fetcher.fetch_all(&request).await?;
        attempts += fetched.attempts;
        tracing::debug!(
            key = %request.key,
            records = fetched.records.len(),
            pages = fetched.pages,
            "Dataset fetched"
        );

        data.insert(request.key, fetched.records);
        next = unit.next_request(descriptor, &data);
    }

    Ok((data, attempts))
}

/// Drives one report from `Pending` to a terminal state
async fn execute_report(
    unit: &dyn ReportUnit,
    descriptor: &ReportDescriptor,
    fetcher: &dyn RecordFetcher,
    timeout: Option<Duration>,
) -> ReportOutcome {
    let mut tracker = ExecutionTracker::new();
    if let Err(e) = tracker.advance(ExecutionState::Fetching) {
        return ReportOutcome::failed(ErrorKind::Internal, ExecutionStage::Fetching, e);
    }
    tracing::info!("Report started");

    let fetch = fetch_datasets(unit, descriptor, fetcher);
    let fetched = match timeout {
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
            Ok(result) => result,
            Err(_) => {
                return fail(
                    &mut tracker,
                    ErrorKind::Timeout,
                    format!("Report exceeded its timeout of {limit:?}"),
                )
            }
        },
        None => fetch.await,
    };

    let (data, attempts) = match fetched {
        Ok(fetched) => fetched,
        Err(e) => return fail(&mut tracker, ErrorKind::from(&e), e.to_string()),
    };

    if let Err(e) = tracker.advance(ExecutionState::Transforming) {
        return fail(&mut tracker, ErrorKind::Internal, e);
    }

    match panic::catch_unwind(AssertUnwindSafe(|| unit.transform(descriptor, &data))) {
        Ok(Ok(table)) => {
            if let Err(e) = tracker.advance(ExecutionState::Succeeded) {
                return fail(&mut tracker, ErrorKind::Internal, e);
            }
            tracing::info!(rows = table.len(), attempts, "Report succeeded");
            ReportOutcome::Succeeded { table, attempts }
        }
        Ok(Err(e)) => fail(&mut tracker, ErrorKind::Transform, e.to_string()),
        Err(payload) => fail(
            &mut tracker,
            ErrorKind::Internal,
            format!("Transform panicked: {}", panic_message(payload)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::odata::{FetchRequest, FetchedRecords};
    use crate::domain::{Record, Table, TransformError};
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticFetcher;

    #[async_trait]
    impl RecordFetcher for StaticFetcher {
        async fn fetch_all(
            &self,
            request: &FetchRequest,
        ) -> std::result::Result<FetchedRecords, FetchError> {
            match request.entity.as_str() {
                "broken_view" => Err(FetchError::Query("400 Bad Request".to_string())),
                "exploding_view" => panic!("connection pool poisoned"),
                "slow_view" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(FetchedRecords::default())
                }
                _ => {
                    let record: Record = json!({"n": 1}).as_object().cloned().unwrap();
                    Ok(FetchedRecords::single_page(vec![record]))
                }
            }
        }
    }

    struct StubUnit {
        name: &'static str,
        view: &'static str,
        panic: bool,
    }

    impl ReportUnit for StubUnit {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "stub"
        }

        fn build_request(&self, _descriptor: &ReportDescriptor) -> FetchRequest {
            FetchRequest::new("rows", self.view)
        }

        fn transform(
            &self,
            _descriptor: &ReportDescriptor,
            fetched: &FetchedData,
        ) -> std::result::Result<Table, TransformError> {
            if self.panic {
                panic!("boom");
            }
            Ok(Table::from_records(fetched.require("rows")?, &["n"]))
        }
    }

    fn scheduler(config: SchedulerConfig) -> ReportScheduler {
        let mut registry = ReportRegistry::new();
        for (name, view, panic) in [
            ("ok", "good_view", false),
            ("broken", "broken_view", false),
            ("slow", "slow_view", false),
            ("panics", "good_view", true),
            ("fetch_panics", "exploding_view", false),
        ] {
            registry
                .register(Arc::new(StubUnit { name, view, panic }))
                .unwrap();
        }
        ReportScheduler::new(config, Arc::new(registry), Arc::new(StaticFetcher))
    }

    fn descriptor(name: &str) -> ReportDescriptor {
        ReportDescriptor::new(ReportName::new(name).unwrap())
    }

    #[tokio::test]
    async fn test_preconditions() {
        let (_tx, rx) = watch::channel(false);

        let err = scheduler(SchedulerConfig::default())
            .run_batch(Vec::new(), rx.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Precondition(_)));

        let zero = SchedulerConfig {
            worker_limit: 0,
            ..SchedulerConfig::default()
        };
        let err = scheduler(zero)
            .run_batch(vec![descriptor("ok")], rx.clone())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Worker limit"));

        let err = scheduler(SchedulerConfig::default())
            .run_batch(vec![descriptor("unknown")], rx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let (_tx, rx) = watch::channel(false);
        let outcome = scheduler(SchedulerConfig::default())
            .run_batch(
                vec![descriptor("broken"), descriptor("panics"), descriptor("ok")],
                rx,
            )
            .await
            .unwrap();

        assert_eq!(outcome.total(), 3);
        assert!(matches!(
            &outcome.results[0].outcome,
            ReportOutcome::Failed { kind: ErrorKind::Query, stage: ExecutionStage::Fetching, .. }
        ));
        assert!(matches!(
            &outcome.results[1].outcome,
            ReportOutcome::Failed { kind: ErrorKind::Internal, stage: ExecutionStage::Transforming, message }
                if message.contains("boom")
        ));
        assert!(matches!(
            &outcome.results[2].outcome,
            ReportOutcome::Succeeded { attempts: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_panic_is_reported_at_fetch_stage() {
        let (_tx, rx) = watch::channel(false);
        let outcome = scheduler(SchedulerConfig::default())
            .run_batch(vec![descriptor("fetch_panics"), descriptor("ok")], rx)
            .await
            .unwrap();

        assert!(matches!(
            &outcome.results[0].outcome,
            ReportOutcome::Failed { kind: ErrorKind::Internal, stage: ExecutionStage::Fetching, message }
                if message.contains("connection pool poisoned")
        ));
        assert!(outcome.results[1].outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_timeout() {
        let (_tx, rx) = watch::channel(false);
        let config = SchedulerConfig {
            report_timeout: Some(Duration::from_secs(5)),
            ..SchedulerConfig::default()
        };
        let outcome = scheduler(config)
            .run_batch(vec![descriptor("slow"), descriptor("ok")], rx)
            .await
            .unwrap();

        assert!(matches!(
            &outcome.results[0].outcome,
            ReportOutcome::Failed { kind: ErrorKind::Timeout, stage: ExecutionStage::Fetching, .. }
        ));
        assert!(outcome.results[1].outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_timeout_cancels_unadmitted() {
        let (_tx, rx) = watch::channel(false);
        let config = SchedulerConfig {
            worker_limit: 1,
            report_timeout: None,
            batch_timeout: Some(Duration::from_secs(10)),
        };
        let outcome = scheduler(config)
            .run_batch(vec![descriptor("slow"), descriptor("ok"), descriptor("ok")], rx)
            .await
            .unwrap();

        assert!(outcome.results[0].outcome.is_success());
        assert!(outcome.results[1].outcome.is_cancelled());
        assert!(outcome.results[2].outcome.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_before_start_cancels_everything() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let outcome = scheduler(SchedulerConfig::default())
            .run_batch(vec![descriptor("ok"), descriptor("ok")], rx)
            .await
            .unwrap();

        assert_eq!(outcome.cancelled(), 2);
        assert_eq!(outcome.results[0].duration, Duration::ZERO);
    }
}
