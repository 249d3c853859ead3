//! CSV file sink
//!
//! Report tables go to `{output_dir}/{report}_{date}.csv` with a header row.
//! Errors are appended to `{output_dir}/failed_reports_{date}.csv`, which is
//! created with its own header on first use. The date is the start of the
//! reporting window. A report submitted twice overwrites its own file.

use super::ResultSink;
use crate::domain::context::ResultExt;
use crate::domain::{ExportError, ReportName, Result, Table};
use chrono::{NaiveDate, Utc};
use csv::{Writer, WriterBuilder};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const DEFAULT_BUFFER_SIZE: usize = 8192;

const FAILURE_HEADER: [&str; 4] = ["report", "error_kind", "message", "recorded_at"];

/// Renders a cell the way spreadsheet users expect: strings unquoted, null empty
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Writes report tables as CSV files into one directory
#[derive(Debug)]
pub struct CsvSink {
    output_dir: PathBuf,
    file_date: NaiveDate,
    failures: Mutex<()>,
}

impl CsvSink {
    /// Creates a sink; the directory is not touched until [`CsvSink::ensure_output_dir`]
    pub fn new(output_dir: impl Into<PathBuf>, file_date: NaiveDate) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_date,
            failures: Mutex::new(()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Creates the output directory and its parents if missing
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Output`] if the directory cannot be created
    pub fn ensure_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            ExportError::Output(format!(
                "Failed to create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;
        tracing::debug!(path = %self.output_dir.display(), "Output directory ready");
        Ok(())
    }

    /// File a report's table is written to
    pub fn report_path(&self, report: &ReportName) -> PathBuf {
        self.output_dir
            .join(format!("{report}_{}.csv", self.file_date.format("%Y-%m-%d")))
    }

    /// File failed and cancelled reports are appended to
    pub fn failures_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "failed_reports_{}.csv",
            self.file_date.format("%Y-%m-%d")
        ))
    }
}

impl ResultSink for CsvSink {
    fn deliver(&self, report: &ReportName, table: &Table) -> Result<()> {
        let path = self.report_path(report);
        let file = File::create(&path).map_err(|e| {
            ExportError::Output(format!("Failed to create {}: {e}", path.display()))
        })?;

        let mut writer = Writer::from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file));
        let context = || format!("Failed to write {}", path.display());
        writer.write_record(table.columns()).with_context(context)?;
        for row in table.rows() {
            writer
                .write_record(row.values().iter().map(render_cell))
                .with_context(context)?;
        }
        writer.flush().with_context(context)?;

        tracing::info!(
            report = %report,
            path = %path.display(),
            rows = table.len(),
            "Report written"
        );
        Ok(())
    }

    fn deliver_error(&self, report: &ReportName, error_kind: &str, message: &str) -> Result<()> {
        let path = self.failures_path();
        let _guard = self
            .failures
            .lock()
            .map_err(|_| ExportError::Output("Failure log lock poisoned".to_string()))?;

        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ExportError::Output(format!("Failed to open {}: {e}", path.display())))?;

        let context = || format!("Failed to append to {}", path.display());
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(FAILURE_HEADER).with_context(context)?;
        }
        let recorded_at = Utc::now().to_rfc3339();
        writer
            .write_record([report.as_str(), error_kind, message, recorded_at.as_str()])
            .with_context(context)?;
        writer.flush().with_context(context)?;

        tracing::warn!(
            report = %report,
            error_kind,
            path = %path.display(),
            "Report failure recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sink(dir: &TempDir) -> CsvSink {
        CsvSink::new(dir.path(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    #[test]
    fn test_paths() {
        let dir = TempDir::new().unwrap();
        let sink = sink(&dir);
        let name = ReportName::new("daily_sales").unwrap();
        assert_eq!(
            sink.report_path(&name),
            dir.path().join("daily_sales_2024-01-01.csv")
        );
        assert_eq!(
            sink.failures_path(),
            dir.path().join("failed_reports_2024-01-01.csv")
        );
    }

    #[test]
    fn test_render_cell() {
        assert_eq!(render_cell(&Value::Null), "");
        assert_eq!(render_cell(&json!("Acme, Inc.")), "Acme, Inc.");
        assert_eq!(render_cell(&json!(12.5)), "12.5");
        assert_eq!(render_cell(&json!(true)), "true");
    }

    #[test]
    fn test_deliver_requires_directory() {
        let dir = TempDir::new().unwrap();
        let sink = CsvSink::new(
            dir.path().join("missing"),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let err = sink
            .deliver(&ReportName::new("jarp").unwrap(), &Table::new(["a"]))
            .unwrap_err();
        assert!(matches!(err, ExportError::Output(_)));

        sink.ensure_output_dir().unwrap();
        sink.deliver(&ReportName::new("jarp").unwrap(), &Table::new(["a"]))
            .unwrap();
    }
}
