//! Text functions

use super::for_each_scalar;
use calcsheet_core::{ErrorCode, EvalResult, Value};

fn string_arg(args: &[Value]) -> Result<&str, ErrorCode> {
    args.first()
        .and_then(Value::as_str)
        .ok_or(ErrorCode::Generic)
}

/// CONCAT(text1, [text2], ...)
///
/// Also used for legacy CONCATENATE. Lists are joined item by item.
pub fn fn_concat(args: &[Value]) -> EvalResult {
    let mut out = String::new();
    for_each_scalar(args, &mut |v| out.push_str(&v.to_string()));
    Ok(Value::String(out))
}

/// LEN(value) - character count of the displayed value
pub fn fn_len(args: &[Value]) -> EvalResult {
    let text = args.first().ok_or(ErrorCode::Generic)?.to_string();
    Ok(Value::Number(text.chars().count() as f64))
}

/// TEXT(value) - displayed form of a value
pub fn fn_text(args: &[Value]) -> EvalResult {
    let value = args.first().ok_or(ErrorCode::Generic)?;
    Ok(Value::String(value.to_string()))
}

/// UPPER(text)
pub fn fn_upper(args: &[Value]) -> EvalResult {
    Ok(Value::String(string_arg(args)?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[Value]) -> EvalResult {
    Ok(Value::String(string_arg(args)?.to_lowercase()))
}

/// TRIM(text) - strips the ends and collapses inner whitespace runs
pub fn fn_trim(args: &[Value]) -> EvalResult {
    let trimmed = string_arg(args)?
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Value::String(trimmed))
}
