//! Built-in functions
//!
//! The evaluator holds no function catalog of its own. Every call is
//! dispatched through a [`FunctionRegistry`] supplied by the caller, so the
//! available set can be extended, trimmed or replaced per sheet.

pub mod logical;
pub mod math;
pub mod text;

use calcsheet_core::{ErrorCode, EvalResult, Value};
use std::collections::HashMap;

/// Function implementation signature
///
/// Receives fully evaluated arguments; none of them is an error, since errors
/// short-circuit before the call.
pub type FunctionImpl = fn(&[Value]) -> EvalResult;

/// Argument type check run before the implementation
pub type Validator = fn(&[Value]) -> bool;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Argument type check
    pub validate: Validator,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Check whether `count` arguments are allowed
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

/// Function registry
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in functions
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Check if a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register a function, replacing any previous definition with the same name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Remove a function
    pub fn unregister(&mut self, name: &str) -> Option<FunctionDef> {
        self.functions.remove(&name.to_uppercase())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if no functions are registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_math_functions(&mut self) {
        let aggregate = |name: &'static str, implementation: FunctionImpl| FunctionDef {
            name,
            min_args: 1,
            max_args: None,
            validate: numbers_or_lists,
            implementation,
        };
        let unary = |name: &'static str, implementation: FunctionImpl| FunctionDef {
            name,
            min_args: 1,
            max_args: Some(1),
            validate: all_numbers,
            implementation,
        };
        let rounding = |name: &'static str, implementation: FunctionImpl| FunctionDef {
            name,
            min_args: 1,
            max_args: Some(2),
            validate: all_numbers,
            implementation,
        };

        self.register(aggregate("SUM", math::fn_sum));
        self.register(aggregate("AVERAGE", math::fn_average));
        self.register(aggregate("MIN", math::fn_min));
        self.register(aggregate("MAX", math::fn_max));

        // COUNT accepts anything and counts the numbers
        self.register(FunctionDef {
            name: "COUNT",
            min_args: 0,
            max_args: None,
            validate: any,
            implementation: math::fn_count,
        });

        self.register(unary("ABS", math::fn_abs));
        self.register(unary("INT", math::fn_int));
        self.register(unary("SQRT", math::fn_sqrt));

        self.register(rounding("ROUND", math::fn_round));
        self.register(rounding("ROUNDUP", math::fn_roundup));
        self.register(rounding("ROUNDDOWN", math::fn_rounddown));

        self.register(FunctionDef {
            name: "MOD",
            min_args: 2,
            max_args: Some(2),
            validate: all_numbers,
            implementation: math::fn_mod,
        });

        self.register(FunctionDef {
            name: "POWER",
            min_args: 2,
            max_args: Some(2),
            validate: all_numbers,
            implementation: math::fn_power,
        });
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef {
            name: "IF",
            min_args: 2,
            max_args: Some(3),
            validate: first_is_condition,
            implementation: logical::fn_if,
        });

        self.register(FunctionDef {
            name: "AND",
            min_args: 1,
            max_args: None,
            validate: conditions_or_lists,
            implementation: logical::fn_and,
        });

        self.register(FunctionDef {
            name: "OR",
            min_args: 1,
            max_args: None,
            validate: conditions_or_lists,
            implementation: logical::fn_or,
        });

        self.register(FunctionDef {
            name: "NOT",
            min_args: 1,
            max_args: Some(1),
            validate: first_is_condition,
            implementation: logical::fn_not,
        });
    }

    fn register_text_functions(&mut self) {
        let concat = |name: &'static str| FunctionDef {
            name,
            min_args: 1,
            max_args: None,
            validate: any,
            implementation: text::fn_concat,
        };
        self.register(concat("CONCAT"));
        self.register(concat("CONCATENATE"));

        self.register(FunctionDef {
            name: "LEN",
            min_args: 1,
            max_args: Some(1),
            validate: all_scalars,
            implementation: text::fn_len,
        });

        self.register(FunctionDef {
            name: "TEXT",
            min_args: 1,
            max_args: Some(1),
            validate: all_scalars,
            implementation: text::fn_text,
        });

        let string_fn = |name: &'static str, implementation: FunctionImpl| FunctionDef {
            name,
            min_args: 1,
            max_args: Some(1),
            validate: all_strings,
            implementation,
        };
        self.register(string_fn("UPPER", text::fn_upper));
        self.register(string_fn("LOWER", text::fn_lower));
        self.register(string_fn("TRIM", text::fn_trim));
    }
}

// === Validators ===

/// Accept any arguments
pub fn any(_args: &[Value]) -> bool {
    true
}

/// Every argument is a number
pub fn all_numbers(args: &[Value]) -> bool {
    args.iter().all(|a| matches!(a, Value::Number(_)))
}

/// Every argument is a number or a list
pub fn numbers_or_lists(args: &[Value]) -> bool {
    args.iter()
        .all(|a| matches!(a, Value::Number(_) | Value::List(_)))
}

/// Every argument is a string
pub fn all_strings(args: &[Value]) -> bool {
    args.iter().all(|a| matches!(a, Value::String(_)))
}

/// No argument is a list
pub fn all_scalars(args: &[Value]) -> bool {
    !args.iter().any(|a| matches!(a, Value::List(_)))
}

/// First argument is a boolean or a number
pub fn first_is_condition(args: &[Value]) -> bool {
    matches!(args.first(), Some(Value::Boolean(_) | Value::Number(_)))
}

/// Every argument is a boolean, a number, or a list
pub fn conditions_or_lists(args: &[Value]) -> bool {
    args.iter()
        .all(|a| matches!(a, Value::Boolean(_) | Value::Number(_) | Value::List(_)))
}

// === Argument helpers shared by implementations ===

/// Numeric argument at `index`
pub(crate) fn number_arg(args: &[Value], index: usize) -> Result<f64, ErrorCode> {
    args.get(index)
        .and_then(Value::as_number)
        .ok_or(ErrorCode::Generic)
}

/// Optional numeric argument at `index`
pub(crate) fn optional_number_arg(args: &[Value], index: usize) -> Result<Option<f64>, ErrorCode> {
    match args.get(index) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(*n)),
        Some(_) => Err(ErrorCode::Generic),
    }
}

/// Visit every scalar, descending into nested lists
pub(crate) fn for_each_scalar<'a>(args: &'a [Value], f: &mut dyn FnMut(&'a Value)) {
    for arg in args {
        match arg {
            Value::List(items) => for_each_scalar(items, f),
            scalar => f(scalar),
        }
    }
}
