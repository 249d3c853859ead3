// p21-export - Prophet 21 OData report exporter
// Copyright (c) 2025 p21-export Contributors
// Licensed under the MIT License

//! # p21-export
//!
//! Runs named groups of reports against the Prophet 21 OData view service and
//! writes one CSV file per report.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Report units, the registry and the concurrent scheduler
//! - [`adapters`] - OData client and result sinks
//! - [`domain`] - Tables, descriptors, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! A batch is a list of [`domain::ReportDescriptor`]s. The scheduler admits
//! them in order, at most `worker_limit` at a time, and every descriptor ends
//! in exactly one result: succeeded with a table, failed with an
//! [`domain::ErrorKind`], or cancelled when shutdown or the batch deadline
//! stopped admission first.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use p21_export::adapters::odata::ODataClient;
//! use p21_export::adapters::sink::{deliver_outcome, CsvSink};
//! use p21_export::config::load_config;
//! use p21_export::core::engine::{ReportScheduler, SchedulerConfig};
//! use p21_export::core::reports::ReportRegistry;
//! use p21_export::domain::ReportDescriptor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("p21.toml")?;
//!     let registry = Arc::new(ReportRegistry::standard());
//!
//!     let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!     let descriptors: Vec<ReportDescriptor> = registry
//!         .resolve(&["monthly".to_string()], &[])?
//!         .into_iter()
//!         .map(|name| ReportDescriptor::builder().name(name).start_date(start).build())
//!         .collect::<Result<_, _>>()?;
//!
//!     let client = ODataClient::new(&config.connection)?;
//!     let scheduler = ReportScheduler::new(
//!         SchedulerConfig::from(&config.engine),
//!         registry,
//!         Arc::new(client),
//!     );
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let outcome = scheduler.run_batch(descriptors, shutdown_rx).await?;
//!
//!     let sink = CsvSink::new(&config.reports.output_folder, start);
//!     sink.ensure_output_dir()?;
//!     deliver_outcome(&sink, &outcome)?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
