//! Domain error types
//!
//! This module defines the error hierarchy for p21-export. Fetch and transform
//! failures have their own enums so the engine can classify them per report;
//! everything else funnels into [`ExportError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type
///
/// Used by configuration loading, the result sink, and precondition checks of the
/// scheduler. Report-level failures never surface as `ExportError` from a batch;
/// they are recorded in the batch outcome instead.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Errors raised by the OData fetch client
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Errors raised by a report transform
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A batch could not be started (empty batch, zero workers, unknown report)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Result sink errors
    #[error("Output error: {0}")]
    Output(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// OData fetch errors
///
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Credentials rejected, either at token issue or after one re-authentication
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network failure, 5xx, or rate limiting that persisted through every retry
    #[error("Transient failure persisted after {attempts} attempt(s): {message}")]
    Transient { attempts: u32, message: String },

    /// Malformed request or other non-retryable rejection
    #[error("Query rejected: {0}")]
    Query(String),
}

/// Errors raised by report-specific transform logic on otherwise valid data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
    /// A column the transform relies on is absent from the input
    #[error("Missing column '{column}' in dataset '{dataset}'")]
    MissingColumn { dataset: String, column: String },

    /// A dataset the transform relies on was never fetched
    #[error("Missing dataset '{0}'")]
    MissingDataset(String),

    /// A value could not be interpreted
    #[error("Invalid value in column '{column}': {message}")]
    InvalidValue { column: String, message: String },

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Classification of a failed report
///
/// The string forms are what the result sink receives as `error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Credentials invalid or expired
    Auth,
    /// Network/5xx failure after retries
    TransientFetch,
    /// Non-retryable request failure
    Query,
    /// Report logic failure on valid data
    Transform,
    /// Per-report timeout expired
    Timeout,
    /// The report task panicked
    Internal,
}

impl ErrorKind {
    /// Returns the wire name of the error kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "AuthError",
            ErrorKind::TransientFetch => "TransientFetchError",
            ErrorKind::Query => "QueryError",
            ErrorKind::Transform => "TransformError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&FetchError> for ErrorKind {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Auth(_) => ErrorKind::Auth,
            FetchError::Transient { .. } => ErrorKind::TransientFetch,
            FetchError::Query(_) => ErrorKind::Query,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ExportError {
    fn from(err: toml::de::Error) -> Self {
        ExportError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from csv writer errors
impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Output(err.to_string())
    }
}
