//! Run command implementation
//!
//! Resolves the selected reports, runs them as one batch against the OData
//! service and writes the results through a [`CsvSink`].

use super::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_INTERRUPTED, EXIT_OK, EXIT_PARTIAL};
use crate::adapters::odata::ODataClient;
use crate::adapters::sink::{deliver_outcome, CsvSink};
use crate::config::{load_config, P21Config, ReportsConfig};
use crate::core::engine::{BatchOutcome, ReportOutcome, ReportScheduler, SchedulerConfig};
use crate::core::reports::ReportRegistry;
use crate::domain::report::start_of_month;
use crate::domain::{ReportDescriptor, ReportName};
use crate::log_error_with_context;
use chrono::{Local, NaiveDate};
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Report groups to run (comma-separated), replaces `reports.groups`
    #[arg(short, long, value_delimiter = ',')]
    pub groups: Vec<String>,

    /// Individual reports to run (comma-separated), replaces `reports.names`
    #[arg(short, long, value_delimiter = ',')]
    pub reports: Vec<String>,

    /// First day of the reporting window (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last day of the reporting window (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Output directory for the CSV files
    #[arg(short, long)]
    pub output: Option<String>,

    /// Maximum reports running at once
    #[arg(short, long)]
    pub workers: Option<usize>,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                log_error_with_context!(&e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }

        let registry = Arc::new(ReportRegistry::standard());
        let names = match registry.resolve(&config.reports.groups, &config.reports.names) {
            Ok(names) => names,
            Err(e) => {
                log_error_with_context!(&e, "Failed to resolve reports");
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let today = Local::now().date_naive();
        let descriptors = build_descriptors(&names, &config.reports, today);
        let file_date = descriptors
            .first()
            .and_then(|d| d.start_date)
            .unwrap_or(today);

        let sink = CsvSink::new(&config.reports.output_folder, file_date);
        if let Err(e) = sink.ensure_output_dir() {
            log_error_with_context!(&e, "Failed to prepare output directory");
            eprintln!("Failed to prepare output directory: {e}");
            return Ok(EXIT_CONFIG);
        }

        let client = match ODataClient::new(&config.connection) {
            Ok(c) => c,
            Err(e) => {
                log_error_with_context!(&e, "Failed to create OData client");
                eprintln!("Failed to initialize OData client: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };
        if let Err(e) = client.authenticate().await {
            tracing::error!(error = %e, "Authentication failed");
            eprintln!("Failed to authenticate against {}: {e}", client.base_url());
            return Ok(EXIT_CONNECTION);
        }

        let scheduler = ReportScheduler::new(
            SchedulerConfig::from(&config.engine),
            registry,
            Arc::new(client),
        );

        println!(
            "Running {} report(s) with {} worker(s)...",
            descriptors.len(),
            scheduler.config().worker_limit
        );
        println!();

        let outcome = scheduler
            .run_batch(descriptors, shutdown_signal.clone())
            .await?;

        let delivered = match deliver_outcome(&sink, &outcome) {
            Ok(()) => true,
            Err(e) => {
                log_error_with_context!(&e, "Failed to write report output");
                eprintln!("{e}");
                false
            }
        };

        print_summary(&outcome, &sink);

        let interrupted = *shutdown_signal.borrow();
        Ok(exit_code(&outcome, delivered, interrupted))
    }

    fn apply_overrides(&self, config: &mut P21Config) {
        if !self.groups.is_empty() {
            tracing::info!(groups = ?self.groups, "Overriding report groups from CLI");
            config.reports.groups = self.groups.clone();
            if self.reports.is_empty() {
                config.reports.names.clear();
            }
        }

        if !self.reports.is_empty() {
            tracing::info!(reports = ?self.reports, "Overriding report names from CLI");
            config.reports.names = self.reports.clone();
            if self.groups.is_empty() {
                config.reports.groups.clear();
            }
        }

        if let Some(start) = self.start_date {
            tracing::info!(start_date = %start, "Overriding start date from CLI");
            config.reports.start_date = Some(start);
        }

        if let Some(end) = self.end_date {
            tracing::info!(end_date = %end, "Overriding end date from CLI");
            config.reports.end_date = Some(end);
        }

        if let Some(output) = &self.output {
            tracing::info!(output = %output, "Overriding output folder from CLI");
            config.reports.output_folder = output.clone();
        }

        if let Some(workers) = self.workers {
            tracing::info!(workers, "Overriding worker limit from CLI");
            config.engine.worker_limit = workers;
        }
    }
}

/// One descriptor per report, all sharing the configured date window
///
/// The start date falls back to the first day of `today`'s month.
pub fn build_descriptors(
    names: &[ReportName],
    reports: &ReportsConfig,
    today: NaiveDate,
) -> Vec<ReportDescriptor> {
    let start = reports.start_date.unwrap_or_else(|| start_of_month(today));

    names
        .iter()
        .map(|name| {
            let mut descriptor = ReportDescriptor::new(name.clone());
            descriptor.start_date = Some(start);
            descriptor.end_date = reports.end_date;
            descriptor
        })
        .collect()
}

/// Maps a finished batch to the process exit code
pub fn exit_code(outcome: &BatchOutcome, delivered: bool, interrupted: bool) -> i32 {
    if interrupted && outcome.cancelled() > 0 {
        EXIT_INTERRUPTED
    } else if outcome.is_successful() && delivered {
        EXIT_OK
    } else {
        EXIT_PARTIAL
    }
}

fn print_summary(outcome: &BatchOutcome, sink: &CsvSink) {
    println!("📊 Batch Summary:");
    println!("  Batch ID: {}", outcome.batch_id);
    println!("  Total Reports: {}", outcome.total());
    println!("  Succeeded: {}", outcome.succeeded());
    println!("  Failed: {}", outcome.failed());
    println!("  Cancelled: {}", outcome.cancelled());
    println!("  Duration: {:.2}s", outcome.duration.as_secs_f64());
    println!("  Success Rate: {:.2}%", outcome.success_rate());
    println!("  Output: {}", sink.output_dir().display());
    println!();

    for result in &outcome.results {
        match &result.outcome {
            ReportOutcome::Succeeded { table, .. } => {
                println!("  ✅ {} ({} rows)", result.name, table.len());
            }
            ReportOutcome::Failed { kind, message, .. } => {
                println!("  ❌ {} [{kind}]: {message}", result.name);
            }
            ReportOutcome::Cancelled => println!("  ⏹️  {} cancelled", result.name),
        }
    }
    println!();

    if outcome.is_successful() {
        println!("✅ All reports completed successfully!");
    } else if outcome.cancelled() > 0 {
        println!("⚠️  Run interrupted, cancelled reports were not started.");
    } else {
        println!("⚠️  Run completed with failures, see {}", sink.failures_path().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::{ExecutionStage, ReportResult};
    use crate::domain::{ErrorKind, Table};
    use chrono::Utc;
    use std::time::Duration;
    use uuid::Uuid;

    fn name(s: &str) -> ReportName {
        ReportName::new(s).unwrap()
    }

    fn batch(results: Vec<ReportResult>) -> BatchOutcome {
        BatchOutcome::new(Uuid::new_v4(), results, Utc::now(), Duration::from_secs(1))
    }

    fn succeeded(report: &str) -> ReportResult {
        ReportResult::new(
            name(report),
            ReportOutcome::Succeeded {
                table: Table::new(vec!["a".to_string()]),
                attempts: 1,
            },
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_build_descriptors_defaults_to_start_of_month() {
        let reports = ReportsConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();

        let descriptors = build_descriptors(&[name("daily_sales"), name("jarp")], &reports, today);

        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[1].name.as_str(), "jarp");
        for descriptor in &descriptors {
            assert_eq!(descriptor.start_date, NaiveDate::from_ymd_opt(2024, 3, 1));
            assert_eq!(descriptor.end_date, None);
            assert_eq!(descriptor.effective_end_date(), NaiveDate::from_ymd_opt(2024, 3, 31));
        }
    }

    #[test]
    fn test_build_descriptors_uses_configured_window() {
        let reports = ReportsConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            ..ReportsConfig::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();

        let descriptors = build_descriptors(&[name("open_po")], &reports, today);
        assert_eq!(
            descriptors[0].date_range(),
            Some((
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
            ))
        );
    }

    #[test]
    fn test_exit_codes() {
        let all_ok = batch(vec![succeeded("daily_sales")]);
        assert_eq!(exit_code(&all_ok, true, false), EXIT_OK);
        assert_eq!(exit_code(&all_ok, false, false), EXIT_PARTIAL);

        let partial = batch(vec![
            succeeded("daily_sales"),
            ReportResult::new(
                name("jarp"),
                ReportOutcome::failed(ErrorKind::Query, ExecutionStage::Fetching, "400"),
                Duration::from_millis(5),
            ),
        ]);
        assert_eq!(exit_code(&partial, true, false), EXIT_PARTIAL);

        let interrupted = batch(vec![succeeded("daily_sales"), ReportResult::cancelled(name("jarp"))]);
        assert_eq!(exit_code(&interrupted, true, true), EXIT_INTERRUPTED);
        assert_eq!(exit_code(&partial, true, true), EXIT_PARTIAL);
    }

    #[test]
    fn test_overrides_replace_selection() {
        let mut config = crate::config::parse_config(
            r#"
            [connection]
            base_url = "https://p21.example.com"
            username = "api"
            password = "secret"

            [reports]
            groups = ["monthly"]
            names = ["open_po"]
            "#,
        )
        .unwrap();

        let args = RunArgs {
            groups: vec!["inventory".to_string()],
            workers: Some(2),
            output: Some("/tmp/reports".to_string()),
            ..RunArgs::default()
        };
        args.apply_overrides(&mut config);

        assert_eq!(config.reports.groups, vec!["inventory".to_string()]);
        assert!(config.reports.names.is_empty());
        assert_eq!(config.engine.worker_limit, 2);
        assert_eq!(config.reports.output_folder, "/tmp/reports");
    }
}
