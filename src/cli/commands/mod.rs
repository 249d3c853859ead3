//! CLI command implementations
//!
//! Each command returns the process exit code.

pub mod list;
pub mod run;
pub mod validate;

/// Every report succeeded, or the command completed
pub const EXIT_OK: i32 = 0;

/// At least one report failed or was cancelled
pub const EXIT_PARTIAL: i32 = 1;

/// Configuration could not be loaded or is invalid
pub const EXIT_CONFIG: i32 = 2;

/// The OData client could not be set up or authenticated
pub const EXIT_CONNECTION: i32 = 4;

/// The run was interrupted by a shutdown signal
pub const EXIT_INTERRUPTED: i32 = 130;

/// Unexpected failure outside the report batch
pub const EXIT_FATAL: i32 = 5;
