// Expression Evaluator
// Walks the AST against a binding scope. Compile-time and runtime evaluation
// share this walker and differ only in the scope they pass in.

use crate::expression::context::{get_ignore_case, RuntimeContext, Scope, TemplateContext};
use crate::expression::error::EvalError;
use crate::expression::functions;
use crate::expression::lexer::single_compile_time;
use crate::expression::parser::{BinaryOp, Expr, ExprParser, ReferencePart, UnaryOp};
use crate::expression::value::Value;

use std::cmp::Ordering;

/// Expression evaluator bound to one scope
pub struct Evaluator<'a, S: Scope + ?Sized> {
    scope: &'a S,
}

impl<'a, S: Scope + ?Sized> Evaluator<'a, S> {
    pub fn new(scope: &'a S) -> Self {
        Self { scope }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Reference(reference) => {
                let mut current = self.scope.resolve(reference)?;
                for part in &reference.parts {
                    current = match part {
                        ReferencePart::Property(name) => member(&current, name),
                        ReferencePart::Index(index) => {
                            let key = self.eval(index)?;
                            index_value(&current, &key)?
                        }
                    };
                }
                Ok(current)
            }

            Expr::FunctionCall { name, args } => self.eval_call(name, args),

            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let key = self.eval(index)?;
                index_value(&object, &key)
            }

            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => Ok(Value::Bool(!self.eval(expr)?.is_truthy())),

            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),

            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }

    fn eval_call(&self, name: &str, args: &[Expr]) -> Result<Value, EvalError> {
        let spec = functions::check_call(name, args.len())?;

        // and/or evaluate lazily so a guard can protect the operands after it
        match spec.name {
            "and" => {
                for arg in args {
                    if !self.eval(arg)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "or" => {
                for arg in args {
                    if self.eval(arg)?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            _ => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                functions::call(spec.name, &values, self.scope)
            }
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        let lhs = self.eval(left)?;
        let symbol = op.to_string();
        let result = match op {
            BinaryOp::And => lhs.is_truthy() && self.eval(right)?.is_truthy(),
            BinaryOp::Or => lhs.is_truthy() || self.eval(right)?.is_truthy(),
            BinaryOp::Eq => functions::values_equal(&symbol, &lhs, &self.eval(right)?)?,
            BinaryOp::Ne => !functions::values_equal(&symbol, &lhs, &self.eval(right)?)?,
            BinaryOp::Lt => self.order(&symbol, &lhs, right)? == Ordering::Less,
            BinaryOp::Le => self.order(&symbol, &lhs, right)? != Ordering::Greater,
            BinaryOp::Gt => self.order(&symbol, &lhs, right)? == Ordering::Greater,
            BinaryOp::Ge => self.order(&symbol, &lhs, right)? != Ordering::Less,
        };
        Ok(Value::Bool(result))
    }

    fn order(&self, symbol: &str, lhs: &Value, right: &Expr) -> Result<Ordering, EvalError> {
        functions::compare(symbol, lhs, &self.eval(right)?)
    }
}

fn member(object: &Value, property: &str) -> Value {
    match object {
        Value::Object(map) => get_ignore_case(map, property)
            .cloned()
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn index_value(object: &Value, key: &Value) -> Result<Value, EvalError> {
    match (object, key) {
        (Value::Array(items), Value::Number(n)) if *n >= 0.0 => {
            Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
        }
        (Value::Array(_), other) => Err(EvalError::type_mismatch(
            "[]",
            format!("cannot index an array with a {}", other.type_name()),
        )),
        (Value::Object(_), key) => Ok(member(object, &key.as_string())),
        _ => Ok(Value::Null),
    }
}

/// Parse an expression body, mapping syntax failures into `EvalError::Syntax`
pub fn parse_expression(source: &str) -> Result<Expr, EvalError> {
    ExprParser::parse_str(source).map_err(|e| EvalError::Syntax {
        expression: source.to_string(),
        message: e.to_string(),
    })
}

/// Evaluate a parsed expression against any scope
pub fn evaluate<S: Scope + ?Sized>(expr: &Expr, scope: &S) -> Result<Value, EvalError> {
    Evaluator::new(scope).eval(expr)
}

/// Evaluate the body of a `${{ }}` expression against static bindings only
pub fn evaluate_template(source: &str, context: &TemplateContext) -> Result<Value, EvalError> {
    let expr = parse_expression(source)?;
    evaluate(&expr, context)
}

/// Parse a `condition:` value; an enclosing `$[ ]` is optional
pub fn parse_condition(source: &str) -> Result<Expr, EvalError> {
    let body = source.trim();
    let body = body
        .strip_prefix("$[")
        .and_then(|b| b.strip_suffix(']'))
        .unwrap_or(body);
    parse_expression(body.trim())
}

/// Evaluate a `condition:` (or `$[ ]` body) against execution results
pub fn evaluate_condition(source: &str, context: &RuntimeContext) -> Result<bool, EvalError> {
    let expr = parse_condition(source)?;
    Ok(evaluate(&expr, context)?.is_truthy())
}

/// Substitute every `${{ }}` segment of a scalar.
///
/// A scalar that is exactly one expression keeps the expression's type; any
/// other scalar is interpolated into a string. `$( )` macros and `$[ ]`
/// runtime expressions are left verbatim for the run to resolve.
pub fn substitute_template(text: &str, context: &TemplateContext) -> Result<Value, EvalError> {
    if let Some(expr) = single_compile_time(text) {
        return evaluate_template(&expr, context);
    }
    if !text.contains("${{") {
        return Ok(Value::String(text.to_string()));
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${{") {
        let body = &rest[start + 3..];
        let Some(end) = body.find("}}") else {
            break;
        };
        result.push_str(&rest[..start]);
        result.push_str(&evaluate_template(body[..end].trim(), context)?.as_string());
        rest = &body[end + 2..];
    }
    result.push_str(rest);
    Ok(Value::String(result))
}
