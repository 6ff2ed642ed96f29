//! Seed value validation
//!
//! Number fields may declare bounds, text fields a pattern and a maximum
//! length. These checks are advisory: they report [`ValidationIssue`]s to the
//! caller and never change what the calculation computes.
//!
//! ## Example
//!
//! ```rust
//! use calcsheet_core::{validate_value, FieldDefinition, FieldKind, Value};
//!
//! let field = FieldDefinition::new(
//!     "hours",
//!     FieldKind::Number { default: None, min: Some(0.0), max: Some(24.0) },
//! );
//!
//! assert!(validate_value(&field, &Value::Number(8.0)).is_empty());
//! assert_eq!(validate_value(&field, &Value::Number(30.0)).len(), 1);
//! ```

use crate::context::Context;
use crate::error::Error;
use crate::field::{flatten_fields, FieldDefinition, FieldKind};
use crate::value::Value;
use regex::Regex;
use std::fmt;

/// What a validation check found wrong
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationRule {
    /// Value has the wrong type for the field kind
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },
    /// Number below the declared minimum
    BelowMinimum { min: f64, actual: f64 },
    /// Number above the declared maximum
    AboveMaximum { max: f64, actual: f64 },
    /// Text longer than the declared maximum length
    TooLong { max_length: usize, actual: usize },
    /// Text does not match the declared pattern
    PatternMismatch { pattern: String },
    /// The declared pattern does not compile
    InvalidPattern(Error),
}

/// A validation failure for one field
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Field id
    pub field: String,
    /// Reference name, if the field has one
    pub reference: Option<String>,
    pub rule: ValidationRule,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.reference.as_deref().unwrap_or(&self.field);
        match &self.rule {
            ValidationRule::WrongType { expected, actual } => {
                write!(f, "{}: expected {}, got {}", name, expected, actual)
            }
            ValidationRule::BelowMinimum { min, actual } => {
                write!(f, "{}: {} is below minimum {}", name, actual, min)
            }
            ValidationRule::AboveMaximum { max, actual } => {
                write!(f, "{}: {} is above maximum {}", name, actual, max)
            }
            ValidationRule::TooLong { max_length, actual } => {
                write!(f, "{}: length {} exceeds {}", name, actual, max_length)
            }
            ValidationRule::PatternMismatch { pattern } => {
                write!(f, "{}: value does not match pattern '{}'", name, pattern)
            }
            ValidationRule::InvalidPattern(e) => write!(f, "{}: {}", name, e),
        }
    }
}

/// Validate one value against its field's declared constraints
pub fn validate_value(field: &FieldDefinition, value: &Value) -> Vec<ValidationIssue> {
    let issue = |rule| ValidationIssue {
        field: field.id.clone(),
        reference: field.reference.clone(),
        rule,
    };

    if value.is_null() {
        return Vec::new();
    }

    let mut issues = Vec::new();

    match &field.kind {
        FieldKind::Number { min, max, .. } => {
            let Some(n) = value.as_number() else {
                issues.push(issue(ValidationRule::WrongType {
                    expected: "number",
                    actual: value.type_name(),
                }));
                return issues;
            };
            if let Some(min) = min {
                if n < *min {
                    issues.push(issue(ValidationRule::BelowMinimum { min: *min, actual: n }));
                }
            }
            if let Some(max) = max {
                if n > *max {
                    issues.push(issue(ValidationRule::AboveMaximum { max: *max, actual: n }));
                }
            }
        }
        FieldKind::Text {
            pattern,
            max_length,
            ..
        } => {
            let Some(s) = value.as_str() else {
                issues.push(issue(ValidationRule::WrongType {
                    expected: "string",
                    actual: value.type_name(),
                }));
                return issues;
            };
            check_length(s, *max_length, &mut issues, &issue);
            if let Some(pattern) = pattern {
                match compile_pattern(&field.id, pattern) {
                    Ok(re) if !re.is_match(s) => {
                        issues.push(issue(ValidationRule::PatternMismatch {
                            pattern: pattern.clone(),
                        }));
                    }
                    Ok(_) => {}
                    Err(e) => issues.push(issue(ValidationRule::InvalidPattern(e))),
                }
            }
        }
        FieldKind::MultilineText { max_length, .. } => match value.as_str() {
            Some(s) => check_length(s, *max_length, &mut issues, &issue),
            None => issues.push(issue(ValidationRule::WrongType {
                expected: "string",
                actual: value.type_name(),
            })),
        },
        FieldKind::Label { .. }
        | FieldKind::Formula { .. }
        | FieldKind::Frame { .. }
        | FieldKind::File { .. }
        | FieldKind::Link { .. } => {}
    }

    issues
}

/// Validate every non-formula field that has an entry in `context`
///
/// Formula fields are skipped; their entries are computed, not entered.
pub fn validate_context(fields: &[FieldDefinition], context: &Context) -> Vec<ValidationIssue> {
    flatten_fields(fields)
        .into_iter()
        .filter(|f| !f.is_formula())
        .filter_map(|f| {
            let reference = f.reference.as_deref()?;
            let value = context.value(reference)?;
            Some(validate_value(f, value))
        })
        .flatten()
        .collect()
}

fn check_length<F>(s: &str, max_length: Option<usize>, issues: &mut Vec<ValidationIssue>, issue: &F)
where
    F: Fn(ValidationRule) -> ValidationIssue,
{
    if let Some(max_length) = max_length {
        let actual = s.chars().count();
        if actual > max_length {
            issues.push(issue(ValidationRule::TooLong { max_length, actual }));
        }
    }
}

/// Compile a field pattern anchored to the whole value
fn compile_pattern(field: &str, pattern: &str) -> Result<Regex, Error> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
        log::warn!("Invalid pattern on field {}: {}", field, e);
        Error::InvalidPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number_field(min: Option<f64>, max: Option<f64>) -> FieldDefinition {
        FieldDefinition::new("n", FieldKind::Number { default: None, min, max })
            .with_reference("n")
    }

    fn text_field(pattern: Option<&str>, max_length: Option<usize>) -> FieldDefinition {
        FieldDefinition::new(
            "t",
            FieldKind::Text {
                default: None,
                pattern: pattern.map(str::to_string),
                max_length,
            },
        )
        .with_reference("t")
    }

    #[test]
    fn test_number_bounds() {
        let field = number_field(Some(0.0), Some(10.0));
        assert!(validate_value(&field, &Value::Number(5.0)).is_empty());
        assert!(validate_value(&field, &Value::Null).is_empty());

        let issues = validate_value(&field, &Value::Number(-1.0));
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0].rule, ValidationRule::BelowMinimum { .. }));

        let issues = validate_value(&field, &Value::Number(11.0));
        assert!(matches!(issues[0].rule, ValidationRule::AboveMaximum { .. }));
    }

    #[test]
    fn test_number_wrong_type() {
        let field = number_field(None, None);
        let issues = validate_value(&field, &Value::string("5"));
        assert_eq!(
            issues[0].rule,
            ValidationRule::WrongType {
                expected: "number",
                actual: "string"
            }
        );
    }

    #[test]
    fn test_text_pattern_is_anchored() {
        let field = text_field(Some("[0-9]{3}"), None);
        assert!(validate_value(&field, &Value::string("123")).is_empty());

        let issues = validate_value(&field, &Value::string("1234"));
        assert!(matches!(issues[0].rule, ValidationRule::PatternMismatch { .. }));
    }

    #[test]
    fn test_text_max_length() {
        let field = text_field(None, Some(3));
        let issues = validate_value(&field, &Value::string("abcd"));
        assert_eq!(
            issues[0].rule,
            ValidationRule::TooLong {
                max_length: 3,
                actual: 4
            }
        );
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let field = text_field(Some("(unclosed"), None);
        let issues = validate_value(&field, &Value::string("x"));
        assert!(matches!(issues[0].rule, ValidationRule::InvalidPattern(_)));
    }

    #[test]
    fn test_validate_context_skips_formulas() {
        let fields = vec![
            number_field(Some(0.0), None),
            FieldDefinition::formula("f", "n*2"),
        ];
        let mut ctx = Context::new();
        ctx.set("n", -5.0);
        ctx.set("f", -10.0);

        let issues = validate_context(&fields, &ctx);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].reference.as_deref(), Some("n"));
    }
}
