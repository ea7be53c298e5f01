// Model construction errors

use crate::document::NodePath;
use crate::expression::EvalError;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{kind} at '{path}' has no name")]
    MissingName { kind: &'static str, path: NodePath },

    #[error("invalid value at '{path}': {message}")]
    InvalidField { path: NodePath, message: String },

    #[error("invalid condition at '{path}': {source}")]
    Condition {
        path: NodePath,
        #[source]
        source: EvalError,
    },

    #[error("template reference '{template}' at '{path}' was not expanded")]
    UnexpandedTemplate { path: NodePath, template: String },

    #[error("job '{job}' expands into {count} instances, more than the limit of {limit}")]
    TooManyInstances { job: String, count: usize, limit: usize },
}

impl ModelError {
    pub fn invalid(path: &NodePath, message: impl Into<String>) -> Self {
        ModelError::InvalidField {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// Location in the expanded document, where one is known
    pub fn path(&self) -> Option<&NodePath> {
        match self {
            ModelError::MissingName { path, .. }
            | ModelError::InvalidField { path, .. }
            | ModelError::Condition { path, .. }
            | ModelError::UnexpandedTemplate { path, .. } => Some(path),
            ModelError::TooManyInstances { .. } => None,
        }
    }
}
