//! Configuration schema types
//!
//! Maps `p21.toml` onto typed sections. Every section validates itself and
//! reports the first problem as a plain message.

use crate::config::SecretString;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Main p21-export configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P21Config {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// OData service connection
    pub connection: ConnectionConfig,

    /// Which reports to run and where to put them
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Scheduler settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl P21Config {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.connection.validate()?;
        self.reports.validate()?;
        self.engine.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Forces `debug` logging regardless of `log_level`
    #[serde(default)]
    pub debug: bool,
}

impl ApplicationConfig {
    /// Level handed to the logging setup
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }

    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debug: false,
        }
    }
}

/// Retry configuration for page requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per page, first request included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay before attempt `attempt + 1`, given `attempt` failures so far
    pub fn delay_for(&self, attempt: u32) -> std::time::Duration {
        let factor = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let delay_ms = (self.initial_delay_ms as f64 * factor) as u64;
        std::time::Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    fn validate(&self) -> Result<(), String> {
        if !(1..=10).contains(&self.max_attempts) {
            return Err(format!(
                "connection.retry.max_attempts must be between 1 and 10, got {}",
                self.max_attempts
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "connection.retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(
                "connection.retry.max_delay_ms must be >= connection.retry.initial_delay_ms"
                    .to_string(),
            );
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// OData service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the P21 middleware, e.g. `https://p21.example.com`
    pub base_url: String,

    /// API user
    pub username: String,

    /// API password
    /// Stored securely in memory and automatically zeroized on drop
    pub password: SecretString,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Records requested per page (`$top`)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

impl ConnectionConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.base_url.is_empty() {
            return Err("connection.base_url cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("connection.base_url must start with http:// or https://".to_string());
        }

        if self.username.trim().is_empty() {
            return Err("connection.username cannot be empty".to_string());
        }

        if self.password.expose_secret().is_empty() {
            return Err("connection.password cannot be empty".to_string());
        }

        if self.timeout_seconds == 0 {
            return Err("connection.timeout_seconds must be > 0".to_string());
        }

        if !(1..=10_000).contains(&self.page_size) {
            return Err(format!(
                "connection.page_size must be between 1 and 10000, got {}",
                self.page_size
            ));
        }

        self.retry.validate()
    }
}

/// Report selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Report groups to run
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,

    /// Individual reports to run in addition to the groups
    #[serde(default)]
    pub names: Vec<String>,

    /// First day of the reporting window (defaults to the first of the current month)
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Last day of the reporting window (defaults to the end of the start month)
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Directory the CSV files are written to
    #[serde(default = "default_output_folder")]
    pub output_folder: String,
}

impl ReportsConfig {
    fn validate(&self) -> Result<(), String> {
        if self.groups.is_empty() && self.names.is_empty() {
            return Err("reports.groups and reports.names cannot both be empty".to_string());
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(format!(
                    "reports.end_date {end} is before reports.start_date {start}"
                ));
            }
        }

        if self.output_folder.trim().is_empty() {
            return Err("reports.output_folder cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            groups: default_groups(),
            names: Vec::new(),
            start_date: None,
            end_date: None,
            output_folder: default_output_folder(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum reports executing at once
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,

    /// Per-report timeout in seconds
    #[serde(default)]
    pub report_timeout_secs: Option<u64>,

    /// Whole-batch admission deadline in seconds
    #[serde(default)]
    pub batch_timeout_secs: Option<u64>,
}

impl EngineConfig {
    fn validate(&self) -> Result<(), String> {
        if !(1..=20).contains(&self.worker_limit) {
            return Err(format!(
                "engine.worker_limit must be between 1 and 20, got {}",
                self.worker_limit
            ));
        }
        if self.report_timeout_secs == Some(0) {
            return Err("engine.report_timeout_secs must be > 0 when set".to_string());
        }
        if self.batch_timeout_secs == Some(0) {
            return Err("engine.batch_timeout_secs must be > 0 when set".to_string());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_limit: default_worker_limit(),
            report_timeout_secs: None,
            batch_timeout_secs: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write JSON logs to a rolling file
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Rotation (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_page_size() -> usize {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_groups() -> Vec<String> {
    vec!["monthly".to_string()]
}

fn default_output_folder() -> String {
    "./output/".to_string()
}

fn default_worker_limit() -> usize {
    5
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
