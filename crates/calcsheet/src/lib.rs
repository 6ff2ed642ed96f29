//! # calcsheet
//!
//! A formula engine for calculation sheets.
//!
//! A calculation sheet is a templated form whose fields hold either plain
//! values or expressions that read other named fields. This crate compiles a
//! field list into a [`Sheet`] and evaluates it, fully or incrementally after
//! a single edit.
//!
//! ## Features
//!
//! - A small expression language with arithmetic, percent and function calls
//! - Pluggable function registry with math, logical and text built-ins
//! - Dependency graph with dangling reference and cycle detection
//! - In-band error codes: a malformed sheet degrades to error markers on
//!   specific fields
//! - Seed validation against declared bounds and patterns
//!
//! ## Example
//!
//! ```rust
//! use calcsheet::prelude::*;
//!
//! let fields = vec![
//!     FieldDefinition::number("a", Some(10.0)),
//!     FieldDefinition::number("b", Some(0.0)),
//!     FieldDefinition::formula("ratio", "a / b"),
//!     FieldDefinition::formula("x", "y + 1"),
//!     FieldDefinition::formula("y", "x + 1"),
//! ];
//!
//! let calc = calcsheet::calculate(&fields, &Context::new());
//! assert_eq!(calc.context.error("ratio"), Some(ErrorCode::DivisionByZero));
//! assert_eq!(calc.context.error("x"), Some(ErrorCode::DependencyCycle));
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{
    calculate, recalculate, Calculation, CalculationOptions, CalculationStats, Sheet,
};

// Re-export core types
pub use calcsheet_core::{
    flatten_fields, validate_context, validate_fields, validate_value, Context, Error,
    ErrorCode, EvalResult, FieldDefinition, FieldKind, Geometry, Result, ValidationIssue,
    ValidationRule, Value,
};

// Re-export formula types
pub use calcsheet_formula::{
    bind_fields, build_graph, cyclic_references, detect_cycle, evaluate, parse,
    topological_order, BinaryOperator, BoundField, DependencyGraph, EvaluationContext, Expr, FormulaError, FormulaResult,
    FunctionDef, FunctionImpl, FunctionRegistry, PostfixOperator, UnaryOperator, Validator,
};

// Argument validators for custom functions
pub use calcsheet_formula::functions;
