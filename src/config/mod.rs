//! Configuration management for p21-export.
//!
//! # Overview
//!
//! p21-export reads a TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `P21_*` environment overrides (a `.env` file is loaded at startup)
//! - Default values for optional settings
//! - Validation on load
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [connection]
//! base_url = "https://p21.example.com"
//! username = "api_user"
//! password = "${P21_PASSWORD}"
//! page_size = 1000
//!
//! [connection.retry]
//! max_attempts = 3
//!
//! [reports]
//! groups = ["monthly", "po"]
//! start_date = "2024-01-01"
//! output_folder = "./output/"
//!
//! [engine]
//! worker_limit = 5
//! report_timeout_secs = 600
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use p21_export::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("p21.toml")?;
//! println!("OData service: {}", config.connection.base_url);
//! println!("Groups: {}", config.reports.groups.join(", "));
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, ConnectionConfig, EngineConfig, LoggingConfig, P21Config, ReportsConfig,
    RetryConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
