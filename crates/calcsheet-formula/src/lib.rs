//! # calcsheet-formula
//!
//! Expression parser and evaluator for calcsheet.
//!
//! This crate provides:
//! - Expression parsing (text → AST)
//! - Expression evaluation (AST → value or error code)
//! - A pluggable function registry with the built-in functions
//! - Dependency graphs, cycle detection and evaluation order
//!
//! ## Example
//!
//! ```rust
//! use calcsheet_core::{Context, Value};
//! use calcsheet_formula::{evaluate, parse, EvaluationContext, FunctionRegistry};
//!
//! let expr = parse("=ROUND(price * (1 + rate%), 2)").unwrap();
//!
//! let mut values = Context::new();
//! values.set("price", 19.99);
//! values.set("rate", 20.0);
//!
//! let functions = FunctionRegistry::builtin();
//! let result = evaluate(&expr, &EvaluationContext::new(&values, &functions));
//! assert_eq!(result, Ok(Value::Number(23.99)));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;

pub use ast::{BinaryOperator, Expr, PostfixOperator, UnaryOperator};
pub use dependency::{
    bind_fields, build_graph, cyclic_references, detect_cycle, topological_order, BoundField,
    DependencyGraph,
};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext, DEFAULT_MAX_DEPTH};
pub use functions::{FunctionDef, FunctionImpl, FunctionRegistry, Validator};
pub use parser::{parse, MAX_NESTING_DEPTH};
