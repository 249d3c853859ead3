//! Validate config command implementation

use super::{EXIT_CONFIG, EXIT_OK};
use crate::config::load_config;
use crate::core::reports::ReportRegistry;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates the sections as part of loading
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let registry = ReportRegistry::standard();
        let reports = match registry.resolve(&config.reports.groups, &config.reports.names) {
            Ok(reports) => reports,
            Err(e) => {
                println!("❌ Report selection is invalid");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.effective_log_level());
        println!("  OData Service: {}", config.connection.base_url);
        println!("  Username: {}", config.connection.username);
        println!("  Page Size: {}", config.connection.page_size);
        println!("  Retry Attempts: {}", config.connection.retry.max_attempts);
        println!("  Groups: {:?}", config.reports.groups);
        println!(
            "  Reports: {}",
            reports
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "  Date Range: {} to {}",
            config
                .reports
                .start_date
                .map_or_else(|| "start of current month".to_string(), |d| d.to_string()),
            config
                .reports
                .end_date
                .map_or_else(|| "end of start month".to_string(), |d| d.to_string())
        );
        println!("  Output Folder: {}", config.reports.output_folder);
        println!("  Worker Limit: {}", config.engine.worker_limit);
        println!();

        Ok(EXIT_OK)
    }
}
