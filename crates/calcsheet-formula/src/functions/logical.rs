//! Logical functions

use super::for_each_scalar;
use calcsheet_core::{ErrorCode, EvalResult, Value};

/// Truth value of a condition argument
fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::Number(n) => Some(*n != 0.0),
        _ => None,
    }
}

/// IF(condition, if_true, [if_false])
///
/// A missing `if_false` yields FALSE.
pub fn fn_if(args: &[Value]) -> EvalResult {
    let condition = args.first().and_then(truthy).ok_or(ErrorCode::Generic)?;

    if condition {
        args.get(1).cloned().ok_or(ErrorCode::Generic)
    } else {
        Ok(args.get(2).cloned().unwrap_or(Value::Boolean(false)))
    }
}

/// AND function
pub fn fn_and(args: &[Value]) -> EvalResult {
    let mut result = true;
    for_each_scalar(args, &mut |v| {
        if truthy(v) == Some(false) {
            result = false;
        }
    });
    Ok(Value::Boolean(result))
}

/// OR function
pub fn fn_or(args: &[Value]) -> EvalResult {
    let mut result = false;
    for_each_scalar(args, &mut |v| {
        if truthy(v) == Some(true) {
            result = true;
        }
    });
    Ok(Value::Boolean(result))
}

/// NOT function
pub fn fn_not(args: &[Value]) -> EvalResult {
    let value = args.first().and_then(truthy).ok_or(ErrorCode::Generic)?;
    Ok(Value::Boolean(!value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if() {
        let yes = Value::string("yes");
        let no = Value::string("no");
        assert_eq!(
            fn_if(&[Value::Boolean(true), yes.clone(), no.clone()]),
            Ok(yes.clone())
        );
        assert_eq!(fn_if(&[Value::Number(0.0), yes.clone(), no.clone()]), Ok(no));
        assert_eq!(fn_if(&[Value::Number(2.0), yes.clone()]), Ok(yes.clone()));
        assert_eq!(fn_if(&[Value::Boolean(false), yes]), Ok(Value::Boolean(false)));
    }

    #[test]
    fn test_if_rejects_non_condition() {
        assert_eq!(
            fn_if(&[Value::string("x"), Value::Null]),
            Err(ErrorCode::Generic)
        );
    }

    #[test]
    fn test_and_or_with_lists() {
        let list = Value::List(vec![Value::Boolean(true), Value::Number(1.0)]);
        assert_eq!(fn_and(&[list.clone(), Value::Boolean(true)]), Ok(Value::Boolean(true)));
        assert_eq!(fn_and(&[list.clone(), Value::Number(0.0)]), Ok(Value::Boolean(false)));
        assert_eq!(fn_or(&[Value::Boolean(false), list]), Ok(Value::Boolean(true)));
        assert_eq!(
            fn_or(&[Value::Boolean(false), Value::Number(0.0)]),
            Ok(Value::Boolean(false))
        );
    }

    #[test]
    fn test_not() {
        assert_eq!(fn_not(&[Value::Boolean(true)]), Ok(Value::Boolean(false)));
        assert_eq!(fn_not(&[Value::Number(0.0)]), Ok(Value::Boolean(true)));
    }
}
