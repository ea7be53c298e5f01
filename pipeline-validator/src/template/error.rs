// Template expansion errors

use crate::expression::EvalError;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpandError {
    /// A template was re-entered while it was still being expanded
    #[error("template cycle detected: {}", chain.join(" -> "))]
    TemplateCycle { chain: Vec<String> },

    #[error("maximum template depth ({limit}) exceeded while expanding '{template}'")]
    TemplateDepthExceeded { limit: usize, template: String },

    #[error("required parameter '{name}' of {template} has no value and no default")]
    MissingParameter { template: String, name: String },

    #[error("template '{name}' not found")]
    TemplateNotFound { name: String },

    #[error("invalid value for parameter '{name}' of {template}: {reason}")]
    InvalidParameter {
        template: String,
        name: String,
        reason: String,
    },

    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("error evaluating '{expression}': {source}")]
    Expression {
        expression: String,
        #[source]
        source: EvalError,
    },
}

impl ExpandError {
    /// Whether the failure comes from template nesting rather than content
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ExpandError::TemplateCycle { .. } | ExpandError::TemplateDepthExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_names_the_chain() {
        let err = ExpandError::TemplateCycle {
            chain: vec!["a.yml".into(), "b.yml".into(), "a.yml".into()],
        };
        assert_eq!(err.to_string(), "template cycle detected: a.yml -> b.yml -> a.yml");
        assert!(err.is_structural());
    }

    #[test]
    fn test_expression_error_keeps_source() {
        let err = ExpandError::Expression {
            expression: "succeeded()".into(),
            source: EvalError::runtime_only("succeeded()"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_structural());
    }
}
