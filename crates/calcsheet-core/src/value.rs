//! Value types

use std::fmt;

/// A value held by a field, either seeded by a collaborator or computed
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// No value
    #[default]
    Null,

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Numeric value (all numbers are f64)
    Number(f64),

    /// String value
    String(String),

    /// Ordered list of values
    List(Vec<Value>),
}

impl Value {
    /// Create a new string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::String(s.into())
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the number if this is a number.
    ///
    /// There is no coercion: booleans and numeric-looking strings return `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the boolean if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the string slice if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the items if this is a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// In-band evaluation error codes
///
/// Errors are stored in the context next to ordinary values so that a bad
/// input marks the fields that depend on it instead of aborting the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    /// #REF! - Reference to a name with no value in the context
    #[cfg_attr(feature = "serde", serde(rename = "#REF!"))]
    UnresolvedReference,
    /// #DIV/0! - Division by zero
    #[cfg_attr(feature = "serde", serde(rename = "#DIV/0!"))]
    DivisionByZero,
    /// #VALUE! - Operand of the wrong type
    #[cfg_attr(feature = "serde", serde(rename = "#VALUE!"))]
    TypeMismatch,
    /// #CYCLE! - Field takes part in a circular dependency
    #[cfg_attr(feature = "serde", serde(rename = "#CYCLE!"))]
    DependencyCycle,
    /// #ERROR! - Anything else (bad function call, parse failure, numeric domain error)
    #[cfg_attr(feature = "serde", serde(rename = "#ERROR!"))]
    Generic,
}

impl ErrorCode {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnresolvedReference => "#REF!",
            ErrorCode::DivisionByZero => "#DIV/0!",
            ErrorCode::TypeMismatch => "#VALUE!",
            ErrorCode::DependencyCycle => "#CYCLE!",
            ErrorCode::Generic => "#ERROR!",
        }
    }

    /// Parse an error string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#REF!" => Some(ErrorCode::UnresolvedReference),
            "#DIV/0!" => Some(ErrorCode::DivisionByZero),
            "#VALUE!" => Some(ErrorCode::TypeMismatch),
            "#CYCLE!" => Some(ErrorCode::DependencyCycle),
            "#ERROR!" => Some(ErrorCode::Generic),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of evaluating one field: a value or an in-band error code
pub type EvalResult = std::result::Result<Value, ErrorCode>;
