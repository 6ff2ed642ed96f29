//! Expression parser
//!
//! A recursive descent parser for sheet expressions with proper operator precedence.

use crate::ast::{BinaryOperator, Expr, PostfixOperator, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};

/// Deepest nesting accepted
///
/// Bounds both the nesting of parentheses, prefix operators and function
/// calls in the text and the height of the resulting tree, so a long
/// operator chain counts one level per operator.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Parse an expression string into an AST
///
/// A single leading `=` is accepted and ignored.
///
/// # Example
/// ```rust
/// use calcsheet_formula::parse;
///
/// let ast = parse("1+2").unwrap();
/// let ast = parse("=SUM(hours, overtime) * rate").unwrap();
/// assert!(parse("(1+2").is_err());
/// ```
pub fn parse(expression: &str) -> FormulaResult<Expr> {
    let trimmed = expression.trim_start();
    let offset = expression.len() - trimmed.len();
    let (body, offset) = match trimmed.strip_prefix('=') {
        Some(rest) => (rest, offset + 1),
        None => (trimmed, offset),
    };

    let mut parser = ExprParser::new(body, offset)?;

    if matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::parse("Empty expression", offset));
    }

    let parsed = parser.parse_expression()?;

    // Make sure we consumed all input
    if !matches!(parser.current_token(), Token::Eof) {
        return Err(parser.unexpected("after expression"));
    }

    Ok(parsed.expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),

    // Function name, reference name, or TRUE/FALSE
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Comma,
    /// `=`, `<>`, `<`, `<=`, `>`, `>=`: recognized so they can be rejected cleanly
    Comparison(&'static str),

    // Delimiters
    LeftParen,
    RightParen,

    // End of input
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Caret => "'^'".into(),
            Token::Percent => "'%'".into(),
            Token::Comma => "','".into(),
            Token::Comparison(op) => format!("'{}'", op),
            Token::LeftParen => "'('".into(),
            Token::RightParen => "')'".into(),
            Token::Eof => "end of expression".into(),
        }
    }
}

/// Expression parser
struct ExprParser<'a> {
    input: &'a str,
    /// Byte offset of `input` inside the original expression text
    offset: usize,
    pos: usize,
    current_token: Token,
    /// Byte position where the current token starts
    token_start: usize,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str, offset: usize) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            offset,
            pos: 0,
            current_token: Token::Eof,
            token_start: 0,
            depth: 0,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.skip_whitespace();
        self.token_start = self.pos;
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        let Some(c) = self.peek_char() else {
            return Ok(Token::Eof);
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '=' => Some(Token::Comparison("=")),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(Token::Comparison("<="));
            } else if self.peek_char() == Some('>') {
                self.advance();
                return Ok(Token::Comparison("<>"));
            }
            return Ok(Token::Comparison("<"));
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(Token::Comparison(">="));
            }
            return Ok(Token::Comparison(">"));
        }

        // String literal
        if c == '"' {
            return self.scan_string();
        }

        // Number
        if c.is_ascii_digit() || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        // Identifier
        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }

        Err(self.error_here(format!("Unexpected character '{}'", c)))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(FormulaError::parse(
                        "Unterminated string literal",
                        self.offset + start,
                    ))
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                // Backslash escapes the next character, including a quote
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some(escaped) => {
                            s.push(escaped);
                            self.advance();
                        }
                        None => {
                            return Err(FormulaError::parse(
                                "Unterminated string literal",
                                self.offset + start,
                            ))
                        }
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        let mut seen_dot = false;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' {
                if seen_dot {
                    return Err(self.error_here("Malformed number: more than one decimal point"));
                }
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| FormulaError::parse(format!("Malformed number '{}'", num_str), self.offset + start))
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;

        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }

        Token::Identifier(self.input[start..self.pos].to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token, context: &str) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(self.unexpected(context))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> FormulaError {
        FormulaError::parse(message, self.offset + self.pos)
    }

    /// Error describing the current token
    fn unexpected(&self, context: &str) -> FormulaError {
        let message = match self.current_token() {
            Token::Comparison(op) => format!("Comparison operator '{}' is not supported", op),
            token => format!("Unexpected {} {}", token.describe(), context),
        };
        FormulaError::parse(message, self.offset + self.token_start)
    }

    fn enter(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(FormulaError::TooDeep {
                limit: MAX_NESTING_DEPTH,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Addition/Subtraction: +, -
    // 2. Multiplication/Division: *, /
    // 3. Exponentiation: ^ (left associative)
    // 4. Prefix unary: -, +
    // 5. Postfix: %
    // 6. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<Parsed> {
        self.enter()?;
        let parsed = self.parse_additive();
        self.leave();
        parsed
    }

    fn parse_additive(&mut self) -> FormulaResult<Parsed> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = Parsed::binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Parsed> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_exponent()?;
            left = Parsed::binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<Parsed> {
        let mut left = self.parse_unary()?;

        while matches!(self.current_token(), Token::Caret) {
            self.consume()?;
            let right = self.parse_unary()?;
            left = Parsed::binary(BinaryOperator::Power, left, right)?;
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<Parsed> {
        let op = match self.current_token() {
            Token::Minus => Some(UnaryOperator::Negate),
            Token::Plus => Some(UnaryOperator::Plus),
            _ => None,
        };

        if let Some(op) = op {
            self.consume()?;
            self.enter()?;
            let operand = self.parse_unary();
            self.leave();
            let operand = operand?;
            return Parsed::node(
                Expr::Unary {
                    op,
                    operand: Box::new(operand.expr),
                },
                operand.height + 1,
            );
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> FormulaResult<Parsed> {
        let parsed = self.parse_primary()?;

        if matches!(self.current_token(), Token::Percent) {
            self.consume()?;
            return Parsed::node(
                Expr::Postfix {
                    op: PostfixOperator::Percent,
                    operand: Box::new(parsed.expr),
                },
                parsed.height + 1,
            );
        }

        Ok(parsed)
    }

    fn parse_primary(&mut self) -> FormulaResult<Parsed> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume()?;
                Ok(Parsed::leaf(Expr::Number(n)))
            }

            Token::String(s) => {
                self.consume()?;
                Ok(Parsed::leaf(Expr::String(s)))
            }

            Token::LeftParen => {
                self.consume()?;
                let parsed = self.parse_expression()?;
                self.expect(&Token::RightParen, "where ')' was expected")?;
                Ok(parsed)
            }

            Token::Identifier(name) => {
                self.consume()?;
                // Check if it's a function call
                if matches!(self.current_token(), Token::LeftParen) {
                    return self.parse_function_call(name);
                }

                let expr = match name.to_uppercase().as_str() {
                    "TRUE" => Expr::Boolean(true),
                    "FALSE" => Expr::Boolean(false),
                    _ => Expr::Reference(name),
                };
                Ok(Parsed::leaf(expr))
            }

            _ => Err(self.unexpected("where a value was expected")),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<Parsed> {
        self.expect(&Token::LeftParen, "after function name")?;

        let mut args = Vec::new();
        let mut height = 0;

        // Parse arguments
        if !matches!(self.current_token(), Token::RightParen) {
            loop {
                if matches!(self.current_token(), Token::Comma | Token::RightParen) {
                    return Err(self.unexpected("in argument list of function"));
                }
                let arg = self.parse_expression()?;
                height = height.max(arg.height);
                args.push(arg.expr);

                match self.current_token() {
                    Token::Comma => {
                        self.consume()?;
                    }
                    Token::RightParen => break,
                    Token::Eof => {
                        return Err(self.error_here(format!("Missing ')' after arguments to {}", name)))
                    }
                    _ => return Err(self.unexpected("in argument list, expected ',' or ')'")),
                }
            }
        }

        self.expect(&Token::RightParen, "at end of argument list")?;

        Parsed::node(
            Expr::Function {
                name: name.to_uppercase(),
                args,
            },
            height + 1,
        )
    }
}

/// A parsed subtree and its height
///
/// Operator chains are built in loops rather than by recursion, so the
/// height of the tree is checked here instead of through `enter`.
struct Parsed {
    expr: Expr,
    height: usize,
}

impl Parsed {
    fn leaf(expr: Expr) -> Self {
        Self { expr, height: 1 }
    }

    fn node(expr: Expr, height: usize) -> FormulaResult<Self> {
        if height > MAX_NESTING_DEPTH {
            return Err(FormulaError::TooDeep {
                limit: MAX_NESTING_DEPTH,
            });
        }
        Ok(Self { expr, height })
    }

    fn binary(op: BinaryOperator, left: Parsed, right: Parsed) -> FormulaResult<Self> {
        let height = left.height.max(right.height) + 1;
        Parsed::node(Expr::binary(op, left.expr, right.expr), height)
    }
}
