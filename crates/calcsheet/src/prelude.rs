//! Prelude module - common imports for calcsheet users
//!
//! ```rust
//! use calcsheet::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    Calculation,
    CalculationOptions,
    CalculationStats,
    Sheet,

    // Data model
    Context,
    ErrorCode,
    EvalResult,
    FieldDefinition,
    FieldKind,
    Value,

    // Functions
    FunctionDef,
    FunctionRegistry,

    // Error types
    Error,
    FormulaError,
    Result,
};
