//! Error context extension trait
//!
//! Adds `.context()` / `.with_context()` to any `Result` whose error converts
//! into [`ExportError`]. Unlike `anyhow::Context` the variant is kept, so an
//! output failure with context is still an [`ExportError::Output`].
//!
//! # Examples
//!
//! ```rust
//! use p21_export::domain::Result;
//! use p21_export::domain::context::ResultExt;
//!
//! fn read_file(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
//! }
//! ```

use crate::domain::errors::ExportError;
use crate::domain::result::Result;
use std::fmt::Display;

/// Extension trait for adding context to `Result` types
pub trait ResultExt<T> {
    /// Prefix the error message with `context`
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Like [`ResultExt::context`], but the context is only built on error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

fn wrap(err: ExportError, context: impl Display) -> ExportError {
    match err {
        ExportError::Configuration(msg) => ExportError::Configuration(format!("{context}: {msg}")),
        ExportError::Validation(msg) => ExportError::Validation(format!("{context}: {msg}")),
        ExportError::Precondition(msg) => ExportError::Precondition(format!("{context}: {msg}")),
        ExportError::Output(msg) => ExportError::Output(format!("{context}: {msg}")),
        ExportError::Io(msg) => ExportError::Io(format!("{context}: {msg}")),
        ExportError::Serialization(msg) => {
            ExportError::Serialization(format!("{context}: {msg}"))
        }
        other => ExportError::Other(format!("{context}: {other}")),
    }
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ExportError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| wrap(e.into(), context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| wrap(e.into(), f()))
    }
}
