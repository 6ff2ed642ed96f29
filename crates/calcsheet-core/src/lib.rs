//! # calcsheet-core
//!
//! Core data model for calcsheet calculation sheets.
//!
//! This crate provides the fundamental types used throughout calcsheet:
//! - [`FieldDefinition`] and [`FieldKind`] - Sheet template fields
//! - [`Value`] - Seed and computed values (numbers, strings, booleans, null, lists)
//! - [`ErrorCode`] - The five in-band evaluation error codes
//! - [`Context`] - Mapping from reference name to value or error code
//! - Seed validation against declared bounds and patterns
//!
//! ## Example
//!
//! ```rust
//! use calcsheet_core::{Context, ErrorCode, FieldDefinition, Value};
//!
//! let fields = vec![
//!     FieldDefinition::number("hours", Some(8.0)),
//!     FieldDefinition::formula("pay", "hours * 12.5"),
//! ];
//! assert!(calcsheet_core::validate_fields(&fields).is_ok());
//!
//! let mut ctx = Context::new();
//! ctx.set("hours", 40.0);
//! ctx.insert("pay", Err(ErrorCode::Generic));
//! assert_eq!(ctx.value("hours"), Some(&Value::Number(40.0)));
//! ```

pub mod context;
pub mod error;
pub mod field;
pub mod validation;
pub mod value;

// Re-exports for convenience
pub use context::Context;
pub use error::{Error, Result};
pub use field::{flatten_fields, validate_fields, FieldDefinition, FieldKind, Geometry};
pub use validation::{validate_context, validate_value, ValidationIssue, ValidationRule};
pub use value::{ErrorCode, EvalResult, Value};
