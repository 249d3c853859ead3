//! Result type alias
//!
//! Convenience alias that uses [`ExportError`] as the error type.

use super::errors::ExportError;

/// Result type alias for p21-export operations
///
/// # Examples
///
/// ```
/// use p21_export::domain::result::Result;
/// use p21_export::domain::errors::ExportError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(ExportError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ExportError;

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(ExportError::Validation("test error".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
