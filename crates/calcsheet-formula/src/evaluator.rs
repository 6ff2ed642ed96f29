//! Expression evaluator
//!
//! Evaluates expression ASTs against a [`Context`] to produce values.
//!
//! Evaluation never fails with a Rust error. Every failure is one of the
//! in-band [`ErrorCode`]s, and an error met in an operand or argument is
//! returned unchanged without evaluating anything to its right.

use crate::ast::{BinaryOperator, Expr, PostfixOperator, UnaryOperator};
use crate::functions::FunctionRegistry;
use calcsheet_core::{Context, ErrorCode, EvalResult, Value};

/// Default bound on AST nesting depth during evaluation
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Inputs for evaluating one expression
///
/// Bundles the value context with the function registry. Neither is
/// modified, so one `EvaluationContext` can be shared by any number of
/// evaluations.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Values of the references the expression may read
    pub values: &'a Context,
    /// Functions callable from the expression
    pub functions: &'a FunctionRegistry,
    /// Deepest AST nesting evaluated before giving up with the generic error
    pub max_depth: usize,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(values: &'a Context, functions: &'a FunctionRegistry) -> Self {
        Self {
            values,
            functions,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the nesting bound
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve a reference name
    pub fn resolve(&self, name: &str) -> EvalResult {
        match self.values.get(name) {
            Some(entry) => entry.clone(),
            None => Err(ErrorCode::UnresolvedReference),
        }
    }
}

/// Evaluate an expression
///
/// Pure: the same AST and context always produce the same result.
pub fn evaluate(expr: &Expr, ctx: &EvaluationContext) -> EvalResult {
    evaluate_at(expr, ctx, 0)
}

fn evaluate_at(expr: &Expr, ctx: &EvaluationContext, depth: usize) -> EvalResult {
    if depth > ctx.max_depth {
        log::debug!("Expression nesting exceeds {} levels", ctx.max_depth);
        return Err(ErrorCode::Generic);
    }

    match expr {
        // === Literals ===
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),

        // === References ===
        Expr::Reference(name) => ctx.resolve(name),

        // === Operators ===
        Expr::Binary { op, left, right } => evaluate_binary_op(*op, left, right, ctx, depth),
        Expr::Unary { op, operand } => evaluate_unary_op(*op, operand, ctx, depth),
        Expr::Postfix { op, operand } => evaluate_postfix_op(*op, operand, ctx, depth),

        // === Functions ===
        Expr::Function { name, args } => evaluate_function(name, args, ctx, depth),
    }
}

/// Require a numeric operand
fn number(value: &Value) -> Result<f64, ErrorCode> {
    value.as_number().ok_or(ErrorCode::TypeMismatch)
}

/// Reject NaN and infinities produced by arithmetic
fn finite(n: f64) -> EvalResult {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(ErrorCode::Generic)
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    ctx: &EvaluationContext,
    depth: usize,
) -> EvalResult {
    // Left to right; an error on the left short-circuits
    let left_val = evaluate_at(left, ctx, depth + 1)?;
    let right_val = evaluate_at(right, ctx, depth + 1)?;

    let l = number(&left_val)?;
    let r = number(&right_val)?;

    match op {
        BinaryOperator::Add => finite(l + r),
        BinaryOperator::Subtract => finite(l - r),
        BinaryOperator::Multiply => finite(l * r),
        BinaryOperator::Divide => {
            if r == 0.0 {
                Err(ErrorCode::DivisionByZero)
            } else {
                finite(l / r)
            }
        }
        BinaryOperator::Power => finite(l.powf(r)),
    }
}

/// Evaluate a prefix unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &Expr,
    ctx: &EvaluationContext,
    depth: usize,
) -> EvalResult {
    let n = number(&evaluate_at(operand, ctx, depth + 1)?)?;

    match op {
        UnaryOperator::Plus => Ok(Value::Number(n)),
        UnaryOperator::Negate => Ok(Value::Number(-n)),
    }
}

/// Evaluate a postfix operation
fn evaluate_postfix_op(
    op: PostfixOperator,
    operand: &Expr,
    ctx: &EvaluationContext,
    depth: usize,
) -> EvalResult {
    let n = number(&evaluate_at(operand, ctx, depth + 1)?)?;

    match op {
        PostfixOperator::Percent => Ok(Value::Number(n / 100.0)),
    }
}

/// Evaluate a function call
///
/// Unknown names and arity or type mismatches yield the generic error.
fn evaluate_function(
    name: &str,
    args: &[Expr],
    ctx: &EvaluationContext,
    depth: usize,
) -> EvalResult {
    let Some(func) = ctx.functions.get(name) else {
        log::debug!("Unknown function: {}", name);
        return Err(ErrorCode::Generic);
    };

    if !func.accepts_arity(args.len()) {
        log::debug!(
            "Wrong number of arguments for {}: got {}",
            func.name,
            args.len()
        );
        return Err(ErrorCode::Generic);
    }

    // Evaluate arguments; the first error wins
    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate_at(arg, ctx, depth + 1)?);
    }

    if !(func.validate)(&evaluated_args) {
        log::debug!("Argument types rejected by {}", func.name);
        return Err(ErrorCode::Generic);
    }

    // Call the function
    (func.implementation)(&evaluated_args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn eval_in(expr: &str, values: &Context) -> EvalResult {
        let ast = parse(expr).unwrap();
        let functions = FunctionRegistry::builtin();
        let ctx = EvaluationContext::new(values, &functions);
        evaluate(&ast, &ctx)
    }

    fn eval(expr: &str) -> EvalResult {
        eval_in(expr, &Context::new())
    }

    fn context(pairs: &[(&str, Value)]) -> Context {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(eval("42"), Ok(Value::Number(42.0)));
        assert_eq!(eval("\"Hello\""), Ok(Value::string("Hello")));
        assert_eq!(eval("TRUE"), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("1+2"), Ok(Value::Number(3.0)));
        assert_eq!(eval("10-3"), Ok(Value::Number(7.0)));
        assert_eq!(eval("4*5"), Ok(Value::Number(20.0)));
        assert_eq!(eval("20/4"), Ok(Value::Number(5.0)));
        assert_eq!(eval("2^10"), Ok(Value::Number(1024.0)));
    }

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(eval("2+3*4"), Ok(Value::Number(14.0)));
        assert_eq!(eval("(2+3)*4"), Ok(Value::Number(20.0)));
        assert_eq!(eval("2^3^2"), Ok(Value::Number(64.0)));
        assert_eq!(eval("-2^2"), Ok(Value::Number(4.0)));
    }

    #[test]
    fn test_evaluate_unary_and_percent() {
        assert_eq!(eval("-5"), Ok(Value::Number(-5.0)));
        assert_eq!(eval("+5"), Ok(Value::Number(5.0)));
        assert_eq!(eval("--5"), Ok(Value::Number(5.0)));
        assert_eq!(eval("50%"), Ok(Value::Number(0.5)));
        assert_eq!(eval("200 * 15%"), Ok(Value::Number(30.0)));
    }

    #[test]
    fn test_references() {
        let values = context(&[("A", Value::Number(10.0)), ("B", Value::Number(4.0))]);
        assert_eq!(eval_in("A-B", &values), Ok(Value::Number(6.0)));
    }

    #[test]
    fn test_unresolved_reference() {
        let values = context(&[("A", Value::Number(5.0))]);
        assert_eq!(eval_in("A+B", &values), Err(ErrorCode::UnresolvedReference));
    }

    #[test]
    fn test_division_by_zero() {
        let values = context(&[("A", Value::Number(10.0)), ("B", Value::Number(0.0))]);
        assert_eq!(eval_in("A/B", &values), Err(ErrorCode::DivisionByZero));
        assert_eq!(eval("1/0"), Err(ErrorCode::DivisionByZero));
    }

    #[test]
    fn test_type_mismatch() {
        assert_eq!(eval("\"a\" + 1"), Err(ErrorCode::TypeMismatch));
        assert_eq!(eval("TRUE * 2"), Err(ErrorCode::TypeMismatch));
        assert_eq!(eval("-\"x\""), Err(ErrorCode::TypeMismatch));
        assert_eq!(eval("+TRUE"), Err(ErrorCode::TypeMismatch));
        assert_eq!(eval("\"5\"%"), Err(ErrorCode::TypeMismatch));

        let values = context(&[("n", Value::Null), ("l", Value::from(vec![1, 2]))]);
        assert_eq!(eval_in("n + 1", &values), Err(ErrorCode::TypeMismatch));
        assert_eq!(eval_in("l * 2", &values), Err(ErrorCode::TypeMismatch));
    }

    #[test]
    fn test_non_finite_is_generic_error() {
        assert_eq!(eval("0^-1"), Err(ErrorCode::Generic));
        assert_eq!(eval("(-8)^0.5"), Err(ErrorCode::Generic));
    }

    #[test]
    fn test_error_propagates_unchanged() {
        let mut values = Context::new();
        values.insert("bad", Err(ErrorCode::DivisionByZero));
        values.set("s", "text");

        assert_eq!(eval_in("bad + 1", &values), Err(ErrorCode::DivisionByZero));
        assert_eq!(eval_in("-bad%", &values), Err(ErrorCode::DivisionByZero));
        assert_eq!(eval_in("SUM(1, bad)", &values), Err(ErrorCode::DivisionByZero));
        // First error from the left wins
        assert_eq!(eval_in("bad + missing", &values), Err(ErrorCode::DivisionByZero));
        assert_eq!(eval_in("missing + bad", &values), Err(ErrorCode::UnresolvedReference));
        assert_eq!(eval_in("s * bad", &values), Err(ErrorCode::DivisionByZero));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(eval("FOO(1,2)"), Err(ErrorCode::Generic));
    }

    #[test]
    fn test_function_arity_and_types() {
        assert_eq!(eval("ABS()"), Err(ErrorCode::Generic));
        assert_eq!(eval("ABS(1, 2)"), Err(ErrorCode::Generic));
        assert_eq!(eval("ABS(\"x\")"), Err(ErrorCode::Generic));
        assert_eq!(eval("ABS(-3)"), Ok(Value::Number(3.0)));
    }

    #[test]
    fn test_empty_registry_knows_nothing() {
        let ast = parse("SUM(1)").unwrap();
        let values = Context::new();
        let functions = FunctionRegistry::new();
        let ctx = EvaluationContext::new(&values, &functions);
        assert_eq!(evaluate(&ast, &ctx), Err(ErrorCode::Generic));
    }

    #[test]
    fn test_nested_functions() {
        assert_eq!(eval("SUM(1, IF(TRUE, 10, 20), 3)"), Ok(Value::Number(14.0)));
        assert_eq!(eval("ROUND(AVERAGE(1, 2) * 3, 0)"), Ok(Value::Number(5.0)));
    }

    #[test]
    fn test_depth_limit() {
        // Build a chain deeper than the limit without going through the parser
        let mut expr = Expr::Number(1.0);
        for _ in 0..20 {
            expr = Expr::Unary {
                op: UnaryOperator::Negate,
                operand: Box::new(expr),
            };
        }
        let values = Context::new();
        let functions = FunctionRegistry::builtin();
        let ctx = EvaluationContext::new(&values, &functions).with_max_depth(10);
        assert_eq!(evaluate(&expr, &ctx), Err(ErrorCode::Generic));

        let ctx = ctx.with_max_depth(DEFAULT_MAX_DEPTH);
        assert_eq!(evaluate(&expr, &ctx), Ok(Value::Number(1.0)));
    }

    #[test]
    fn test_tallest_parsed_expression_evaluates() {
        let sum = format!("{}1", "1+".repeat(crate::parser::MAX_NESTING_DEPTH - 1));
        assert_eq!(eval(&sum), Ok(Value::Number(256.0)));

        let negations = format!("{}1", "-".repeat(crate::parser::MAX_NESTING_DEPTH - 2));
        assert_eq!(eval(&negations), Ok(Value::Number(1.0)));
    }

    #[test]
    fn test_determinism() {
        let values = context(&[("x", Value::Number(3.0))]);
        let first = eval_in("x^2 + SUM(x, 1)/4", &values);
        for _ in 0..5 {
            assert_eq!(eval_in("x^2 + SUM(x, 1)/4", &values), first);
        }
    }
}
