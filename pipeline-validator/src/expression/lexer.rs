// Expression Lexer
// Tokenizes pipeline expressions and splits scalars into ${{ }}, $[ ] and $( ) segments

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Null,
    True,
    False,
    Number(f64),
    String(String),

    Identifier(String),

    // Operators
    Eq,  // ==
    Ne,  // !=
    Lt,  // <
    Le,  // <=
    Gt,  // >
    Ge,  // >=
    And, // &&
    Or,  // ||
    Not, // !

    // Punctuation
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Null => "null",
            Token::True => "true",
            Token::False => "false",
            Token::Number(n) => return write!(f, "{}", n),
            Token::String(s) => return write!(f, "'{}'", s),
            Token::Identifier(s) => return write!(f, "{}", s),
            Token::Eq => "==",
            Token::Ne => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Not => "!",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Eof => "end of expression",
        };
        f.write_str(text)
    }
}

/// Lexer error
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for LexError {}

/// Lexer over a single expression body (the text inside the delimiters)
pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    /// Tokenize the entire input; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<(Token, usize)>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let (token, position) = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push((token, position));
            if done {
                return Ok(tokens);
            }
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        Some(ch)
    }

    fn next_token(&mut self) -> Result<(Token, usize), LexError> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }

        let start = self.offset;
        let Some(ch) = self.bump() else {
            return Ok((Token::Eof, start));
        };

        let token = match ch {
            '.' => Token::Dot,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '=' => self.pair('=', Token::Eq, None, start)?,
            '!' => self.pair('=', Token::Ne, Some(Token::Not), start)?,
            '<' => self.pair('=', Token::Le, Some(Token::Lt), start)?,
            '>' => self.pair('=', Token::Ge, Some(Token::Gt), start)?,
            '&' => self.pair('&', Token::And, None, start)?,
            '|' => self.pair('|', Token::Or, None, start)?,
            '\'' => self.string(start)?,
            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.number(start)?,
            c if c.is_ascii_digit() => self.number(start)?,
            c if c.is_alphabetic() || c == '_' => self.word(start),
            other => {
                return Err(LexError {
                    message: format!("unexpected character '{}'", other),
                    position: start,
                })
            }
        };

        Ok((token, start))
    }

    /// Two-character operator, or the single-character fallback when allowed
    fn pair(
        &mut self,
        second: char,
        matched: Token,
        single: Option<Token>,
        start: usize,
    ) -> Result<Token, LexError> {
        if self.peek() == Some(second) {
            self.bump();
            return Ok(matched);
        }
        single.ok_or_else(|| LexError {
            message: format!("expected '{}' operator", matched),
            position: start,
        })
    }

    fn string(&mut self, start: usize) -> Result<Token, LexError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                // '' is an escaped quote
                Some('\'') if self.peek() == Some('\'') => {
                    self.bump();
                    value.push('\'');
                }
                Some('\'') => return Ok(Token::String(value)),
                Some(ch) => value.push(ch),
                None => {
                    return Err(LexError {
                        message: "unterminated string".to_string(),
                        position: start,
                    })
                }
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<Token, LexError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }

        let text = &self.input[start..self.offset];
        text.parse::<f64>().map(Token::Number).map_err(|_| LexError {
            message: format!("invalid number '{}'", text),
            position: start,
        })
    }

    fn word(&mut self, start: usize) -> Token {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }

        let word = &self.input[start..self.offset];
        match word.to_ascii_lowercase().as_str() {
            "null" => Token::Null,
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Identifier(word.to_string()),
        }
    }
}

/// Segment of a scalar split by expression syntax
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionType {
    /// Compile-time expression: ${{ expression }}
    CompileTime(String),
    /// Runtime expression: $[ expression ]
    Runtime(String),
    /// Macro variable reference: $(variableName)
    Macro(String),
    /// Plain text
    Text(String),
}

/// Split a scalar into text and expression segments.
///
/// Unterminated delimiters are kept as plain text.
pub fn extract_expressions(input: &str) -> Vec<ExpressionType> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    while !rest.is_empty() {
        let found = if let Some(body) = rest.strip_prefix("${{") {
            body.find("}}").map(|end| {
                (
                    ExpressionType::CompileTime(body[..end].trim().to_string()),
                    3 + end + 2,
                )
            })
        } else if let Some(body) = rest.strip_prefix("$[") {
            closing_bracket(body, '[', ']')
                .map(|end| (ExpressionType::Runtime(body[..end].trim().to_string()), 2 + end + 1))
        } else if let Some(body) = rest.strip_prefix("$(") {
            closing_bracket(body, '(', ')')
                .map(|end| (ExpressionType::Macro(body[..end].trim().to_string()), 2 + end + 1))
        } else {
            None
        };

        match found {
            Some((segment, consumed)) => {
                if !text.is_empty() {
                    segments.push(ExpressionType::Text(std::mem::take(&mut text)));
                }
                segments.push(segment);
                rest = &rest[consumed..];
            }
            None => {
                let mut chars = rest.chars();
                if let Some(ch) = chars.next() {
                    text.push(ch);
                }
                rest = chars.as_str();
            }
        }
    }

    if !text.is_empty() {
        segments.push(ExpressionType::Text(text));
    }
    segments
}

/// Byte offset of the bracket closing an already-opened one, skipping quoted strings
fn closing_bracket(body: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 1usize;
    let mut in_string = false;

    for (i, ch) in body.char_indices() {
        match ch {
            '\'' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// True when the whole scalar is exactly one `${{ }}` expression
pub fn single_compile_time(input: &str) -> Option<String> {
    match extract_expressions(input.trim()).as_slice() {
        [ExpressionType::CompileTime(expr)] => Some(expr.clone()),
        _ => None,
    }
}
