//! Math functions

use super::{for_each_scalar, number_arg, optional_number_arg};
use calcsheet_core::{ErrorCode, EvalResult, Value};

/// Every number among the arguments, descending into lists
///
/// Non-numeric list items are skipped.
fn numbers(args: &[Value]) -> Vec<f64> {
    let mut out = Vec::new();
    for_each_scalar(args, &mut |v| {
        if let Value::Number(n) = v {
            out.push(*n);
        }
    });
    out
}

fn finite(n: f64) -> EvalResult {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(ErrorCode::Generic)
    }
}

/// SUM function
pub fn fn_sum(args: &[Value]) -> EvalResult {
    finite(numbers(args).into_iter().sum())
}

/// AVERAGE function
pub fn fn_average(args: &[Value]) -> EvalResult {
    let nums = numbers(args);
    if nums.is_empty() {
        return Err(ErrorCode::DivisionByZero);
    }
    finite(nums.iter().sum::<f64>() / nums.len() as f64)
}

/// MIN function; 0 when there are no numbers
pub fn fn_min(args: &[Value]) -> EvalResult {
    let min = numbers(args).into_iter().reduce(f64::min).unwrap_or(0.0);
    Ok(Value::Number(min))
}

/// MAX function; 0 when there are no numbers
pub fn fn_max(args: &[Value]) -> EvalResult {
    let max = numbers(args).into_iter().reduce(f64::max).unwrap_or(0.0);
    Ok(Value::Number(max))
}

/// COUNT function - counts numbers, including those inside lists
pub fn fn_count(args: &[Value]) -> EvalResult {
    Ok(Value::Number(numbers(args).len() as f64))
}

/// ABS function
pub fn fn_abs(args: &[Value]) -> EvalResult {
    Ok(Value::Number(number_arg(args, 0)?.abs()))
}

/// INT function - rounds down to the nearest integer
pub fn fn_int(args: &[Value]) -> EvalResult {
    Ok(Value::Number(number_arg(args, 0)?.floor()))
}

/// SQRT function
pub fn fn_sqrt(args: &[Value]) -> EvalResult {
    let n = number_arg(args, 0)?;
    if n < 0.0 {
        return Err(ErrorCode::Generic);
    }
    Ok(Value::Number(n.sqrt()))
}

/// Number and digit count shared by the rounding family
fn rounding_args(args: &[Value]) -> Result<(f64, f64), ErrorCode> {
    let number = number_arg(args, 0)?;
    let digits = optional_number_arg(args, 1)?.unwrap_or(0.0).trunc();
    Ok((number, 10_f64.powi(digits as i32)))
}

/// ROUND(number, [digits]) - round half away from zero
pub fn fn_round(args: &[Value]) -> EvalResult {
    let (number, multiplier) = rounding_args(args)?;

    // For negative digits, we round to the left of the decimal point
    let result = if number >= 0.0 {
        (number * multiplier + 0.5).floor() / multiplier
    } else {
        (number * multiplier - 0.5).ceil() / multiplier
    };

    finite(result)
}

/// ROUNDUP(number, [digits]) - round away from zero
pub fn fn_roundup(args: &[Value]) -> EvalResult {
    let (number, multiplier) = rounding_args(args)?;
    let scaled = number * multiplier;
    let result = if number >= 0.0 {
        scaled.ceil()
    } else {
        scaled.floor()
    };
    finite(result / multiplier)
}

/// ROUNDDOWN(number, [digits]) - round toward zero
pub fn fn_rounddown(args: &[Value]) -> EvalResult {
    let (number, multiplier) = rounding_args(args)?;
    finite((number * multiplier).trunc() / multiplier)
}

/// MOD(number, divisor) - remainder with the sign of the divisor
pub fn fn_mod(args: &[Value]) -> EvalResult {
    let number = number_arg(args, 0)?;
    let divisor = number_arg(args, 1)?;

    if divisor == 0.0 {
        return Err(ErrorCode::DivisionByZero);
    }

    finite(number - divisor * (number / divisor).floor())
}

/// POWER(base, exponent)
pub fn fn_power(args: &[Value]) -> EvalResult {
    let base = number_arg(args, 0)?;
    let exponent = number_arg(args, 1)?;
    finite(base.powf(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    fn assert_approx(result: EvalResult, expected: f64) {
        match result {
            Ok(Value::Number(v)) => assert!(
                (v - expected).abs() < 1e-9,
                "expected {}, got {}",
                expected,
                v
            ),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_sum_flattens_lists() {
        let args = vec![n(1.0), Value::List(vec![n(2.0), Value::string("x"), n(3.0)])];
        assert_eq!(fn_sum(&args), Ok(n(6.0)));
    }

    #[test]
    fn test_average() {
        assert_eq!(fn_average(&[n(2.0), n(4.0), n(6.0)]), Ok(n(4.0)));
        assert_eq!(
            fn_average(&[Value::List(vec![])]),
            Err(ErrorCode::DivisionByZero)
        );
    }

    #[test]
    fn test_min_max() {
        assert_eq!(fn_min(&[n(5.0), n(2.0), n(8.0)]), Ok(n(2.0)));
        assert_eq!(fn_max(&[n(5.0), Value::from(vec![9, 1])]), Ok(n(9.0)));
        assert_eq!(fn_max(&[Value::List(vec![])]), Ok(n(0.0)));
    }

    #[test]
    fn test_count() {
        let args = vec![n(1.0), Value::string("a"), Value::from(vec![2, 3]), Value::Null];
        assert_eq!(fn_count(&args), Ok(n(3.0)));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(fn_round(&[n(2.5)]), Ok(n(3.0)));
        assert_eq!(fn_round(&[n(-2.5)]), Ok(n(-3.0)));
        assert_approx(fn_round(&[n(3.14159), n(2.0)]), 3.14);
        assert_approx(fn_round(&[n(1234.0), n(-2.0)]), 1200.0);
        assert_approx(fn_roundup(&[n(3.141), n(2.0)]), 3.15);
        assert_eq!(fn_roundup(&[n(-2.1)]), Ok(n(-3.0)));
        assert_approx(fn_rounddown(&[n(3.149), n(2.0)]), 3.14);
        assert_eq!(fn_rounddown(&[n(-2.9)]), Ok(n(-2.0)));
    }

    #[test]
    fn test_int_abs_sqrt() {
        assert_eq!(fn_int(&[n(-1.5)]), Ok(n(-2.0)));
        assert_eq!(fn_abs(&[n(-4.0)]), Ok(n(4.0)));
        assert_eq!(fn_sqrt(&[n(16.0)]), Ok(n(4.0)));
        assert_eq!(fn_sqrt(&[n(-1.0)]), Err(ErrorCode::Generic));
    }

    #[test]
    fn test_mod() {
        assert_eq!(fn_mod(&[n(10.0), n(3.0)]), Ok(n(1.0)));
        assert_eq!(fn_mod(&[n(-10.0), n(3.0)]), Ok(n(2.0)));
        assert_eq!(fn_mod(&[n(10.0), n(-3.0)]), Ok(n(-2.0)));
        assert_eq!(fn_mod(&[n(1.0), n(0.0)]), Err(ErrorCode::DivisionByZero));
    }

    #[test]
    fn test_power() {
        assert_eq!(fn_power(&[n(2.0), n(8.0)]), Ok(n(256.0)));
        assert_eq!(fn_power(&[n(0.0), n(-1.0)]), Err(ErrorCode::Generic));
    }
}
