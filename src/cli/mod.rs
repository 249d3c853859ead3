//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};

/// p21-export - Prophet 21 OData report exporter
#[derive(Parser, Debug)]
#[command(name = "p21-export")]
#[command(version, about, long_about = None)]
#[command(author = "p21-export Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "p21.toml", env = "P21_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "P21_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run report groups and write one CSV per report
    Run(commands::run::RunArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// List registered reports and groups
    ListReports(commands::list::ListArgs),
}
