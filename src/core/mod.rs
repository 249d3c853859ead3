//! Report execution core
//!
//! # Modules
//!
//! - [`reports`] - The [`reports::ReportUnit`] trait, the built-in reports and
//!   the registry mapping names and groups to them
//! - [`engine`] - Bounded-concurrency scheduler producing a
//!   [`engine::BatchOutcome`]
//! - [`transform`] - Table helpers shared by report transforms
//!
//! # Example
//!
//! ```rust,no_run
//! use p21_export::adapters::odata::ODataClient;
//! use p21_export::config::load_config;
//! use p21_export::core::engine::{ReportScheduler, SchedulerConfig};
//! use p21_export::core::reports::ReportRegistry;
//! use p21_export::domain::{ReportDescriptor, ReportName};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("p21.toml")?;
//! let client = ODataClient::new(&config.connection)?;
//! let scheduler = ReportScheduler::new(
//!     SchedulerConfig::from(&config.engine),
//!     Arc::new(ReportRegistry::standard()),
//!     Arc::new(client),
//! );
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let descriptors = vec![ReportDescriptor::new(ReportName::new("open_po")?)];
//! let outcome = scheduler.run_batch(descriptors, shutdown_rx).await?;
//!
//! println!("Succeeded: {}", outcome.succeeded());
//! println!("Failed: {}", outcome.failed());
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod reports;
pub mod transform;
