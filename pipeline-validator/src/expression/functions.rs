// Built-in Functions for pipeline expressions
// Signature table, static call checking, and implementations

use crate::expression::context::{EvalMode, Scope, StatusCheck};
use crate::expression::error::{Arity, EvalError};
use crate::expression::parser::Expr;
use crate::expression::value::Value;

use std::cmp::Ordering;

/// Signature of a builtin function
#[derive(Debug, Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub arity: Arity,
}

const fn spec(name: &'static str, arity: Arity) -> FunctionSpec {
    FunctionSpec { name, arity }
}

const FUNCTIONS: &[FunctionSpec] = &[
    // Comparison
    spec("eq", Arity::exactly(2)),
    spec("ne", Arity::exactly(2)),
    spec("lt", Arity::exactly(2)),
    spec("le", Arity::exactly(2)),
    spec("gt", Arity::exactly(2)),
    spec("ge", Arity::exactly(2)),
    spec("in", Arity::at_least(2)),
    spec("notIn", Arity::at_least(2)),
    // Logical
    spec("and", Arity::at_least(2)),
    spec("or", Arity::at_least(2)),
    spec("not", Arity::exactly(1)),
    spec("xor", Arity::exactly(2)),
    // Strings and collections
    spec("contains", Arity::exactly(2)),
    spec("containsValue", Arity::exactly(2)),
    spec("startsWith", Arity::exactly(2)),
    spec("endsWith", Arity::exactly(2)),
    spec("format", Arity::at_least(1)),
    spec("join", Arity::exactly(2)),
    spec("replace", Arity::exactly(3)),
    spec("split", Arity::exactly(2)),
    spec("lower", Arity::exactly(1)),
    spec("upper", Arity::exactly(1)),
    spec("trim", Arity::exactly(1)),
    spec("length", Arity::exactly(1)),
    spec("convertToJson", Arity::exactly(1)),
    spec("coalesce", Arity::at_least(1)),
    spec("iif", Arity::exactly(3)),
    // Run-scoped counter, only meaningful in `$[ ]` variable values
    spec("counter", Arity::exactly(2)),
    // Job status (runtime only)
    spec("succeeded", Arity::at_least(0)),
    spec("failed", Arity::at_least(0)),
    spec("succeededOrFailed", Arity::at_least(0)),
    spec("canceled", Arity::exactly(0)),
    spec("always", Arity::exactly(0)),
];

/// Look up a builtin by name (case-insensitive)
pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    FUNCTIONS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

/// Report unknown functions and arity errors without evaluating anything
pub fn check_functions(expr: &Expr) -> Vec<EvalError> {
    let mut errors = Vec::new();
    walk_calls(expr, &mut errors);
    errors
}

fn walk_calls(expr: &Expr, errors: &mut Vec<EvalError>) {
    match expr {
        Expr::FunctionCall { name, args } => {
            match lookup(name) {
                None => errors.push(EvalError::UnknownFunction { name: name.clone() }),
                Some(spec) if !spec.arity.accepts(args.len()) => {
                    errors.push(EvalError::ArityMismatch {
                        function: spec.name.to_string(),
                        expected: spec.arity,
                        actual: args.len(),
                    })
                }
                Some(_) => {}
            }
            for arg in args {
                walk_calls(arg, errors);
            }
        }
        Expr::Index { object, index } => {
            walk_calls(object, errors);
            walk_calls(index, errors);
        }
        Expr::Unary { expr, .. } => walk_calls(expr, errors),
        Expr::Binary { left, right, .. } => {
            walk_calls(left, errors);
            walk_calls(right, errors);
        }
        Expr::Array(items) => items.iter().for_each(|item| walk_calls(item, errors)),
        Expr::Reference(reference) => {
            for part in &reference.parts {
                if let crate::expression::parser::ReferencePart::Index(index) = part {
                    walk_calls(index, errors);
                }
            }
        }
        Expr::Literal(_) => {}
    }
}

/// Check that `name` exists and accepts `count` arguments
pub fn check_call(name: &str, count: usize) -> Result<&'static FunctionSpec, EvalError> {
    let spec = lookup(name).ok_or_else(|| EvalError::UnknownFunction {
        name: name.to_string(),
    })?;
    if !spec.arity.accepts(count) {
        return Err(EvalError::ArityMismatch {
            function: spec.name.to_string(),
            expected: spec.arity,
            actual: count,
        });
    }
    Ok(spec)
}

/// Call a builtin with already-evaluated arguments.
///
/// `and`/`or` short-circuit in the evaluator and never reach this point
/// with unevaluated operands.
pub fn call<S: Scope + ?Sized>(name: &str, args: &[Value], scope: &S) -> Result<Value, EvalError> {
    let spec = check_call(name, args.len())?;

    let result = match spec.name {
        "eq" => Value::Bool(values_equal(spec.name, &args[0], &args[1])?),
        "ne" => Value::Bool(!values_equal(spec.name, &args[0], &args[1])?),
        "lt" => Value::Bool(compare(spec.name, &args[0], &args[1])? == Ordering::Less),
        "le" => Value::Bool(compare(spec.name, &args[0], &args[1])? != Ordering::Greater),
        "gt" => Value::Bool(compare(spec.name, &args[0], &args[1])? == Ordering::Greater),
        "ge" => Value::Bool(compare(spec.name, &args[0], &args[1])? != Ordering::Less),
        "in" => Value::Bool(fn_in(&args[0], &args[1..])?),
        "notIn" => Value::Bool(!fn_in(&args[0], &args[1..])?),

        "and" => Value::Bool(args.iter().all(Value::is_truthy)),
        "or" => Value::Bool(args.iter().any(Value::is_truthy)),
        "not" => Value::Bool(!args[0].is_truthy()),
        "xor" => Value::Bool(args[0].is_truthy() ^ args[1].is_truthy()),

        "contains" => fn_contains(&args[0], &args[1])?,
        "containsValue" => fn_contains_value(&args[0], &args[1])?,
        "startsWith" => {
            let (s, prefix) = string_pair(spec.name, &args[0], &args[1])?;
            Value::Bool(s.starts_with(&prefix))
        }
        "endsWith" => {
            let (s, suffix) = string_pair(spec.name, &args[0], &args[1])?;
            Value::Bool(s.ends_with(&suffix))
        }
        "format" => fn_format(args)?,
        "join" => fn_join(&args[0], &args[1]),
        "replace" => Value::String(
            scalar_string(spec.name, &args[0])?
                .replace(&scalar_string(spec.name, &args[1])?, &scalar_string(spec.name, &args[2])?),
        ),
        "split" => {
            let s = scalar_string(spec.name, &args[0])?;
            let delimiter = scalar_string(spec.name, &args[1])?;
            Value::Array(
                s.split(delimiter.as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            )
        }
        "lower" => Value::String(scalar_string(spec.name, &args[0])?.to_lowercase()),
        "upper" => Value::String(scalar_string(spec.name, &args[0])?.to_uppercase()),
        "trim" => Value::String(scalar_string(spec.name, &args[0])?.trim().to_string()),
        "length" => fn_length(&args[0])?,
        "convertToJson" => Value::String(args[0].to_json()),
        "coalesce" => args
            .iter()
            .find(|v| !matches!(v, Value::Null) && *v != &Value::String(String::new()))
            .cloned()
            .unwrap_or(Value::Null),
        "iif" => {
            if args[0].is_truthy() {
                args[1].clone()
            } else {
                args[2].clone()
            }
        }

        "counter" => {
            if scope.mode() == EvalMode::CompileTime {
                return Err(EvalError::runtime_only("counter()"));
            }
            // Without run history every counter starts at its seed
            Value::Number(args[1].as_number().ok_or_else(|| {
                EvalError::type_mismatch(spec.name, "seed must be a number")
            })?)
        }

        "succeeded" => Value::Bool(scope.status(StatusCheck::Succeeded, &names(args))?),
        "failed" => Value::Bool(scope.status(StatusCheck::Failed, &names(args))?),
        "succeededOrFailed" => {
            Value::Bool(scope.status(StatusCheck::SucceededOrFailed, &names(args))?)
        }
        "canceled" => Value::Bool(scope.status(StatusCheck::Canceled, &[])?),
        "always" => Value::Bool(scope.status(StatusCheck::Always, &[])?),

        other => {
            return Err(EvalError::UnknownFunction {
                name: other.to_string(),
            })
        }
    };

    Ok(result)
}

fn names(args: &[Value]) -> Vec<String> {
    args.iter().map(Value::as_string).collect()
}

/// Equality with Azure coercion rules: strings ignore case, the right operand
/// is converted to the left operand's scalar type, collections only compare
/// with collections.
pub(crate) fn values_equal(function: &str, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let equal = match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, other) | (other, Value::Null) if !other.is_collection() => {
            !other.is_truthy()
        }
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
        (Value::Number(a), Value::String(s)) | (Value::String(s), Value::Number(a)) => s
            .trim()
            .parse::<f64>()
            .map(|n| n == *a)
            .unwrap_or(false),
        (Value::Bool(a), Value::String(s)) | (Value::String(s), Value::Bool(a)) => {
            s.eq_ignore_ascii_case(if *a { "true" } else { "false" })
        }
        (Value::Bool(a), Value::Number(n)) | (Value::Number(n), Value::Bool(a)) => {
            *a == (*n != 0.0)
        }
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => left == right,
        _ => {
            return Err(EvalError::type_mismatch(
                function,
                format!(
                    "cannot compare {} with {}",
                    left.type_name(),
                    right.type_name()
                ),
            ))
        }
    };
    Ok(equal)
}

/// Ordering for lt/le/gt/ge: strings compare ignoring case, everything else numerically
pub(crate) fn compare(function: &str, left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(a.to_lowercase().cmp(&b.to_lowercase()));
    }

    let mismatch = || {
        EvalError::type_mismatch(
            function,
            format!(
                "cannot order {} against {}",
                left.type_name(),
                right.type_name()
            ),
        )
    };

    if left.is_collection() || right.is_collection() {
        return Err(mismatch());
    }
    let a = left.as_number().ok_or_else(mismatch)?;
    let b = right.as_number().ok_or_else(mismatch)?;
    a.partial_cmp(&b).ok_or_else(mismatch)
}

fn fn_in(needle: &Value, candidates: &[Value]) -> Result<bool, EvalError> {
    for candidate in candidates {
        if values_equal("in", needle, candidate)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn fn_contains(haystack: &Value, needle: &Value) -> Result<Value, EvalError> {
    match haystack {
        Value::Array(items) => {
            for item in items {
                if !item.is_collection() && !needle.is_collection()
                    && values_equal("contains", item, needle)?
                {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Value::Object(_) => Err(EvalError::type_mismatch(
            "contains",
            "cannot search an object; use containsValue()",
        )),
        _ => {
            let (h, n) = string_pair("contains", haystack, needle)?;
            Ok(Value::Bool(h.contains(&n)))
        }
    }
}

fn fn_contains_value(collection: &Value, needle: &Value) -> Result<Value, EvalError> {
    let items: Vec<&Value> = match collection {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        other => {
            return Err(EvalError::type_mismatch(
                "containsValue",
                format!("expected an array or object, got {}", other.type_name()),
            ))
        }
    };

    for item in items {
        if item.is_collection() || needle.is_collection() {
            if item == needle {
                return Ok(Value::Bool(true));
            }
        } else if values_equal("containsValue", item, needle)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn fn_format(args: &[Value]) -> Result<Value, EvalError> {
    let template = scalar_string("format", &args[0])?;
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                result.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                result.push('}');
            }
            '{' => {
                let mut index = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    index.push(c);
                }
                let position: usize = index.trim().parse().map_err(|_| {
                    EvalError::type_mismatch("format", format!("invalid placeholder '{{{}}}'", index))
                })?;
                let arg = args.get(position + 1).ok_or_else(|| {
                    EvalError::type_mismatch(
                        "format",
                        format!("placeholder {{{}}} has no matching argument", position),
                    )
                })?;
                result.push_str(&arg.as_string());
            }
            c => result.push(c),
        }
    }

    Ok(Value::String(result))
}

fn fn_join(separator: &Value, collection: &Value) -> Value {
    match collection {
        Value::Array(items) => Value::String(
            items
                .iter()
                .map(Value::as_string)
                .collect::<Vec<_>>()
                .join(&separator.as_string()),
        ),
        Value::Object(map) => Value::String(
            map.keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(&separator.as_string()),
        ),
        scalar => Value::String(scalar.as_string()),
    }
}

fn fn_length(value: &Value) -> Result<Value, EvalError> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        other => {
            return Err(EvalError::type_mismatch(
                "length",
                format!("cannot take the length of a {}", other.type_name()),
            ))
        }
    };
    Ok(Value::Number(len as f64))
}

fn scalar_string(function: &str, value: &Value) -> Result<String, EvalError> {
    if value.is_collection() {
        return Err(EvalError::type_mismatch(
            function,
            format!("expected a string, got {}", value.type_name()),
        ));
    }
    Ok(value.as_string())
}

/// Lowercased string operands for case-insensitive matching
fn string_pair(function: &str, a: &Value, b: &Value) -> Result<(String, String), EvalError> {
    Ok((
        scalar_string(function, a)?.to_lowercase(),
        scalar_string(function, b)?.to_lowercase(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::context::RuntimeContext;
    use crate::expression::parser::ExprParser;

    fn call_rt(name: &str, args: &[Value]) -> Result<Value, EvalError> {
        call(name, args, &RuntimeContext::new())
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("STARTSWITH").map(|f| f.name), Some("startsWith"));
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_check_functions_reports_unknown_and_arity() {
        let expr = ExprParser::parse_str("and(succeded(), eq('a'))").unwrap();
        let errors = check_functions(&expr);

        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], EvalError::UnknownFunction { name } if name == "succeded"));
        assert!(matches!(
            &errors[1],
            EvalError::ArityMismatch { function, actual: 1, .. } if function == "eq"
        ));
    }

    #[test]
    fn test_eq_is_case_insensitive_and_coerces() {
        assert_eq!(
            call_rt("eq", &["Main".into(), "main".into()]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call_rt("eq", &[Value::Number(3.0), "3".into()]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call_rt("eq", &[Value::Bool(true), "True".into()]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_eq_on_incomparable_types() {
        let err = call_rt("eq", &[Value::Array(vec![]), "x".into()]).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            call_rt("lt", &[Value::Number(1.0), Value::Number(2.0)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call_rt("ge", &["b".into(), "A".into()]).unwrap(),
            Value::Bool(true)
        );
        assert!(call_rt("gt", &["abc".into(), Value::Number(1.0)]).is_err());
    }

    #[test]
    fn test_in_and_not_in() {
        let args: Vec<Value> = vec!["dev".into(), "prod".into(), "DEV".into()];
        assert_eq!(call_rt("in", &args).unwrap(), Value::Bool(true));
        assert_eq!(call_rt("notIn", &args).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_contains_variants() {
        assert_eq!(
            call_rt("contains", &["refs/heads/Main".into(), "main".into()]).unwrap(),
            Value::Bool(true)
        );
        let list = Value::Array(vec!["a".into(), "b".into()]);
        assert_eq!(
            call_rt("containsValue", &[list, "B".into()]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_format_and_join() {
        assert_eq!(
            call_rt("format", &["{0}-{1} {{x}}".into(), "a".into(), Value::Number(2.0)]).unwrap(),
            Value::String("a-2 {x}".to_string())
        );
        let list = Value::Array(vec!["a".into(), "b".into()]);
        assert_eq!(
            call_rt("join", &[";".into(), list]).unwrap(),
            Value::String("a;b".to_string())
        );
        assert!(call_rt("format", &["{3}".into()]).is_err());
    }

    #[test]
    fn test_coalesce_and_length() {
        assert_eq!(
            call_rt("coalesce", &[Value::Null, "".into(), "x".into()]).unwrap(),
            Value::String("x".to_string())
        );
        assert_eq!(call_rt("length", &["héllo".into()]).unwrap(), Value::Number(5.0));
        assert!(call_rt("length", &[Value::Bool(true)]).is_err());
    }

    #[test]
    fn test_arity_checked_at_call() {
        let err = call_rt("not", &[]).unwrap_err();
        assert!(matches!(err, EvalError::ArityMismatch { actual: 0, .. }));
        let err = call_rt("frobnicate", &[]).unwrap_err();
        assert!(matches!(err, EvalError::UnknownFunction { .. }));
    }
}
