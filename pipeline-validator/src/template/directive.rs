// Template directives
// Parses `${{ if }}`, `${{ elseif }}`, `${{ else }}`, `${{ each }}` and
// `${{ insert }}` mapping keys

use crate::expression::{parse_expression, single_compile_time, EvalError, Expr};

/// Directive carried by a mapping key
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `${{ if <condition> }}`
    If(Expr),
    /// `${{ elseif <condition> }}` or `${{ else if <condition> }}`
    ElseIf(Expr),
    /// `${{ else }}`
    Else,
    /// `${{ each <var> in <collection> }}`
    Each { variable: String, collection: Expr },
    /// `${{ insert }}`: merge the value mapping into the parent
    Insert,
    /// Any other expression, used as a computed key
    Key(Expr),
}

impl Directive {
    /// Parse a mapping key. Returns `None` for plain keys, including keys
    /// that only interpolate an expression into surrounding text.
    pub fn parse(key: &str) -> Option<Result<Directive, EvalError>> {
        let inner = single_compile_time(key)?;
        Some(Self::parse_body(&inner))
    }

    fn parse_body(inner: &str) -> Result<Directive, EvalError> {
        if let Some(rest) = keyword(inner, "elseif").or_else(|| else_if(inner)) {
            return Ok(Directive::ElseIf(parse_expression(rest)?));
        }
        if let Some(rest) = keyword(inner, "if") {
            return Ok(Directive::If(parse_expression(rest)?));
        }
        if inner == "else" {
            return Ok(Directive::Else);
        }
        if inner == "insert" {
            return Ok(Directive::Insert);
        }
        if let Some(rest) = keyword(inner, "each") {
            let (variable, collection) = rest.split_once(" in ").ok_or_else(|| EvalError::Syntax {
                expression: inner.to_string(),
                message: "expected 'each <name> in <collection>'".to_string(),
            })?;
            let variable = variable.trim();
            if variable.is_empty() || !variable.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(EvalError::Syntax {
                    expression: inner.to_string(),
                    message: format!("invalid loop variable '{}'", variable),
                });
            }
            return Ok(Directive::Each {
                variable: variable.to_string(),
                collection: parse_expression(collection.trim())?,
            });
        }

        Ok(Directive::Key(parse_expression(inner)?))
    }

    /// Conditional directives chain with the `if` before them
    pub fn continues_chain(&self) -> bool {
        matches!(self, Directive::ElseIf(_) | Directive::Else)
    }
}

/// Strip a leading keyword followed by whitespace or an opening parenthesis
fn keyword<'a>(inner: &'a str, word: &str) -> Option<&'a str> {
    let rest = inner.strip_prefix(word)?;
    match rest.chars().next() {
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some('(') => Some(rest),
        _ => None,
    }
}

fn else_if(inner: &str) -> Option<&str> {
    keyword(inner, "else").and_then(|rest| keyword(rest, "if"))
}
