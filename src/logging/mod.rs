//! Logging and observability
//!
//! Console plus optional JSON file logging, see [`init_logging`]. The macros
//! macro below keeps error field names consistent across commands.

pub mod structured;

pub use structured::{init_logging, LoggingGuard, LOG_FILE_NAME};

/// Log an error with context
///
/// ```no_run
/// use p21_export::log_error_with_context;
/// use p21_export::domain::ExportError;
///
/// let error = ExportError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
