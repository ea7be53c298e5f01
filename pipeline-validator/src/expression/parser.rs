// Expression Parser
// Recursive descent over lexer tokens, producing the shared expression AST

use crate::expression::lexer::{LexError, Lexer, Token};
use crate::expression::value::Value;

use std::fmt;

/// Expression AST shared by compile-time and runtime evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Null, boolean, number or string literal
    Literal(Value),

    /// Context reference: variables.foo, parameters['key'], dependencies.A.result
    Reference(Reference),

    /// Function call: eq(a, b), succeeded()
    FunctionCall { name: String, args: Vec<Expr> },

    /// Index or member access on a computed value: split(a, ',')[0]
    Index { object: Box<Expr>, index: Box<Expr> },

    /// Unary operation: !expr
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// Binary operation: a == b, a && b
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Array literal: ['a', 'b']
    Array(Vec<Expr>),
}

/// Reference to a context value rooted at a named context
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub root: String,
    pub parts: Vec<ReferencePart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReferencePart {
    /// `.name`
    Property(String),
    /// `[expr]`
    Index(Box<Expr>),
}

impl Reference {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            parts: Vec::new(),
        }
    }

    /// The first path component after the root when it is statically known,
    /// e.g. `foo` for both `variables.foo` and `variables['foo']`
    pub fn first_key(&self) -> Option<&str> {
        match self.parts.first()? {
            ReferencePart::Property(name) => Some(name),
            ReferencePart::Index(index) => match index.as_ref() {
                Expr::Literal(Value::String(key)) => Some(key),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for part in &self.parts {
            match part {
                ReferencePart::Property(name) => write!(f, ".{}", name)?,
                ReferencePart::Index(index) => match index.as_ref() {
                    Expr::Literal(Value::String(key)) => write!(f, "['{}']", key)?,
                    _ => write!(f, "[...]")?,
                },
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(symbol)
    }
}

/// Parser error
#[derive(Debug, Clone, PartialEq)]
pub struct ParseExprError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for ParseExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseExprError {}

impl From<LexError> for ParseExprError {
    fn from(err: LexError) -> Self {
        Self {
            message: err.message,
            position: err.position,
        }
    }
}

/// Recursive descent parser
pub struct ExprParser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
}

impl ExprParser {
    pub fn new(tokens: Vec<(Token, usize)>) -> Self {
        Self { tokens, cursor: 0 }
    }

    /// Parse an expression body from text
    pub fn parse_str(input: &str) -> Result<Expr, ParseExprError> {
        let tokens = Lexer::new(input).tokenize()?;
        Self::new(tokens).parse()
    }

    pub fn parse(&mut self) -> Result<Expr, ParseExprError> {
        if self.check(&Token::Eof) {
            return Err(self.error("empty expression"));
        }

        let expr = self.parse_or()?;
        if !self.check(&Token::Eof) {
            return Err(self.error(&format!("unexpected token '{}'", self.peek())));
        }
        Ok(expr)
    }

    // Precedence (lowest to highest): || && (== !=) (< <= > >=) ! postfix

    fn parse_or(&mut self) -> Result<Expr, ParseExprError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseExprError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseExprError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinaryOp::Eq,
                Token::Ne => BinaryOp::Ne,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseExprError> {
        if self.eat(&Token::Not) {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseExprError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.eat(&Token::Dot) {
                let name = self.identifier("expected property name after '.'")?;
                expr = match expr {
                    Expr::Reference(mut reference) => {
                        reference.parts.push(ReferencePart::Property(name));
                        Expr::Reference(reference)
                    }
                    other => Expr::Index {
                        object: Box::new(other),
                        index: Box::new(Expr::Literal(Value::String(name))),
                    },
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_or()?;
                self.expect(&Token::RBracket, "expected ']'")?;
                expr = match expr {
                    Expr::Reference(mut reference) => {
                        reference.parts.push(ReferencePart::Index(Box::new(index)));
                        Expr::Reference(reference)
                    }
                    other => Expr::Index {
                        object: Box::new(other),
                        index: Box::new(index),
                    },
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseExprError> {
        let token = self.advance();
        match token {
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::String(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Identifier(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.parse_list(&Token::RParen, "expected ')'")?;
                    Ok(Expr::FunctionCall { name, args })
                } else {
                    Ok(Expr::Reference(Reference::new(name)))
                }
            }
            Token::LParen => {
                let expr = self.parse_or()?;
                self.expect(&Token::RParen, "expected ')'")?;
                Ok(expr)
            }
            Token::LBracket => {
                let items = self.parse_list(&Token::RBracket, "expected ']'")?;
                Ok(Expr::Array(items))
            }
            token => {
                self.cursor -= 1;
                Err(self.error(&format!("unexpected token '{}'", token)))
            }
        }
    }

    /// Comma-separated expressions up to `close`; the opener is already consumed
    fn parse_list(&mut self, close: &Token, msg: &str) -> Result<Vec<Expr>, ParseExprError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }

        loop {
            items.push(self.parse_or()?);
            if !self.eat(&Token::Comma) {
                break;
            }
            // trailing comma
            if self.check(close) {
                break;
            }
        }

        self.expect(close, msg)?;
        Ok(items)
    }

    fn identifier(&mut self, msg: &str) -> Result<String, ParseExprError> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            // Keywords are valid property names (e.g. variables.true is unusual but legal)
            Token::Null | Token::True | Token::False => {
                let name = self.peek().to_string();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(msg)),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.cursor)
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.cursor += 1;
        token
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, msg: &str) -> Result<(), ParseExprError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(msg))
        }
    }

    fn error(&self, message: &str) -> ParseExprError {
        let position = self
            .tokens
            .get(self.cursor)
            .or_else(|| self.tokens.last())
            .map(|(_, pos)| *pos)
            .unwrap_or(0);
        ParseExprError {
            message: message.to_string(),
            position,
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals() {
        assert_eq!(ExprParser::parse_str("null").unwrap(), Expr::Literal(Value::Null));
        assert_eq!(
            ExprParser::parse_str("true").unwrap(),
            Expr::Literal(Value::Bool(true))
        );
        assert_eq!(
            ExprParser::parse_str("42").unwrap(),
            Expr::Literal(Value::Number(42.0))
        );
        assert_eq!(
            ExprParser::parse_str("'hello'").unwrap(),
            Expr::Literal(Value::String("hello".to_string()))
        );
    }

    #[test]
    fn test_parse_reference_dot_and_index() {
        let Expr::Reference(dotted) = ExprParser::parse_str("variables.foo").unwrap() else {
            panic!("expected reference");
        };
        let Expr::Reference(indexed) = ExprParser::parse_str("variables['foo']").unwrap() else {
            panic!("expected reference");
        };

        assert_eq!(dotted.root, "variables");
        assert_eq!(dotted.first_key(), Some("foo"));
        assert_eq!(indexed.first_key(), Some("foo"));
        assert_eq!(indexed.to_string(), "variables['foo']");
    }

    #[test]
    fn test_parse_nested_function_call() {
        let expr = ExprParser::parse_str(
            "and(succeeded(), eq(variables['Build.SourceBranch'], 'refs/heads/main'))",
        )
        .unwrap();

        let Expr::FunctionCall { name, args } = expr else {
            panic!("expected function call");
        };
        assert_eq!(name, "and");
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[0], Expr::FunctionCall { name, args } if name == "succeeded" && args.is_empty()));
    }

    #[test]
    fn test_parse_operator_precedence() {
        // && binds tighter than ||
        let expr = ExprParser::parse_str("a || b && c").unwrap();

        let Expr::Binary {
            op: BinaryOp::Or,
            right,
            ..
        } = expr
        else {
            panic!("expected or expression");
        };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn test_parse_index_on_call_result() {
        let expr = ExprParser::parse_str("split('a,b', ',')[1]").unwrap();
        assert!(matches!(expr, Expr::Index { .. }));
    }

    #[test]
    fn test_parse_array_literal_with_trailing_comma() {
        let Expr::Array(items) = ExprParser::parse_str("['a', 'b',]").unwrap() else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(ExprParser::parse_str("").is_err());
        assert!(ExprParser::parse_str("eq(a, b").is_err());
        assert!(ExprParser::parse_str("a b").is_err());
        assert!(ExprParser::parse_str(")").is_err());
    }
}
