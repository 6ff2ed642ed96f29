//! Error types for calcsheet-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling sheet templates
///
/// These describe problems with the template itself. Problems found while
/// computing values are reported in-band as [`ErrorCode`](crate::ErrorCode)s.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Two fields declare the same reference name
    #[error("Duplicate reference name: {0}")]
    DuplicateReference(String),

    /// A text field carries a pattern that does not compile
    #[error("Invalid pattern '{pattern}' on field {field}: {message}")]
    InvalidPattern {
        field: String,
        pattern: String,
        message: String,
    },
}
