//! Expression Abstract Syntax Tree types

use std::fmt;

/// Expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),

    // === References ===
    /// Reference to another field by name
    Reference(String),

    // === Operators ===
    /// Binary operation
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Prefix unary operation
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// Postfix operation
    Postfix {
        op: PostfixOperator,
        operand: Box<Expr>,
    },

    // === Function call ===
    /// Function call; `name` is uppercased by the parser
    Function { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Build a binary node
    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build a reference node
    pub fn reference(name: impl Into<String>) -> Self {
        Expr::Reference(name.into())
    }

    /// Every reference name read by this expression
    ///
    /// Includes names nested in operands and function arguments. Each name
    /// appears once, in order of first appearance (left to right).
    pub fn references(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let mut stack = vec![self];

        while let Some(expr) = stack.pop() {
            match expr {
                Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) => {}
                Expr::Reference(name) => {
                    if !out.contains(&name.as_str()) {
                        out.push(name);
                    }
                }
                Expr::Binary { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
                Expr::Unary { operand, .. } | Expr::Postfix { operand, .. } => {
                    stack.push(operand);
                }
                Expr::Function { args, .. } => {
                    stack.extend(args.iter().rev());
                }
            }
        }

        out
    }
}

impl fmt::Display for Expr {
    /// Fully parenthesized rendering, mostly useful for debugging precedence
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Expr::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Expr::Reference(name) => write!(f, "{}", name),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Unary { op, operand } => write!(f, "({}{})", op, operand),
            Expr::Postfix { op, operand } => write!(f, "({}{})", operand, op),
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Prefix unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Negate,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Plus => f.write_str("+"),
            UnaryOperator::Negate => f.write_str("-"),
        }
    }
}

/// Postfix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOperator {
    Percent,
}

impl fmt::Display for PostfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostfixOperator::Percent => f.write_str("%"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_dedup_in_order() {
        // SUM(b, a * -b) + c%
        let expr = Expr::binary(
            BinaryOperator::Add,
            Expr::Function {
                name: "SUM".into(),
                args: vec![
                    Expr::reference("b"),
                    Expr::binary(
                        BinaryOperator::Multiply,
                        Expr::reference("a"),
                        Expr::Unary {
                            op: UnaryOperator::Negate,
                            operand: Box::new(Expr::reference("b")),
                        },
                    ),
                ],
            },
            Expr::Postfix {
                op: PostfixOperator::Percent,
                operand: Box::new(Expr::reference("c")),
            },
        );

        assert_eq!(expr.references(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_literals_have_no_references() {
        assert!(Expr::Number(1.0).references().is_empty());
        assert!(Expr::String("a".into()).references().is_empty());
    }
}
