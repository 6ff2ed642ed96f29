//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while parsing an expression
///
/// Evaluation never fails with a Rust error; its failures are in-band
/// [`ErrorCode`](calcsheet_core::ErrorCode)s.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    /// Malformed expression text
    #[error("Parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    /// Expression nested deeper than the parser allows
    #[error("Expression nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

impl FormulaError {
    pub(crate) fn parse(message: impl Into<String>, position: usize) -> Self {
        FormulaError::Parse {
            message: message.into(),
            position,
        }
    }
}
