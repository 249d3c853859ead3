//! Domain models and types for p21-export.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ReportName`], [`GroupName`])
//! - **Report requests** ([`ReportDescriptor`])
//! - **Tabular data** ([`Table`], [`Record`])
//! - **Error types** ([`ExportError`], [`FetchError`], [`TransformError`], [`ErrorKind`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! Fallible library operations return [`Result<T, ExportError>`]:
//!
//! ```rust,no_run
//! use p21_export::domain::Result;
//!
//! fn example() -> Result<()> {
//!     let config = p21_export::config::load_config("p21.toml")?;
//!     println!("{} worker(s)", config.engine.worker_limit);
//!     Ok(())
//! }
//! ```
//!
//! Report-level failures are not errors of the batch; they are recorded per
//! report with an [`ErrorKind`].

pub mod context;
pub mod errors;
pub mod ids;
pub mod report;
pub mod result;
pub mod table;

pub use errors::{ErrorKind, ExportError, FetchError, TransformError};
pub use ids::{GroupName, ReportName};
pub use report::{ReportDescriptor, ReportDescriptorBuilder};
pub use result::Result;
pub use table::{Record, Row, Table};
