// Expression errors
// Every variant is recoverable: callers report it and continue the validation pass

use std::fmt;

use thiserror::Error;

/// Accepted argument count of a builtin function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("invalid expression '{expression}': {message}")]
    Syntax { expression: String, message: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("{function}() expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        function: String,
        expected: Arity,
        actual: usize,
    },

    #[error("{function}(): {detail}")]
    TypeMismatch { function: String, detail: String },

    /// A compile-time expression touched something that only exists while the pipeline runs
    #[error("'{reference}' is only available at runtime and cannot be used in a ${{{{ }}}} template expression; use $[ ] or a condition instead")]
    RuntimeOnly { reference: String },

    #[error("parameter '{name}' is not defined")]
    UndefinedParameter { name: String },

    #[error("unrecognized value '{name}'")]
    UnrecognizedValue { name: String },
}

impl EvalError {
    pub fn type_mismatch(function: impl Into<String>, detail: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            function: function.into(),
            detail: detail.into(),
        }
    }

    pub fn runtime_only(reference: impl Into<String>) -> Self {
        EvalError::RuntimeOnly {
            reference: reference.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_display() {
        assert_eq!(Arity::exactly(2).to_string(), "2");
        assert_eq!(Arity::at_least(1).to_string(), "at least 1");
        assert_eq!(
            Arity {
                min: 0,
                max: Some(1)
            }
            .to_string(),
            "0 to 1"
        );
    }

    #[test]
    fn test_runtime_only_message_mentions_template_syntax() {
        let msg = EvalError::runtime_only("variables.buildId").to_string();
        assert!(msg.contains("${{ }}"));
        assert!(msg.contains("variables.buildId"));
    }
}
