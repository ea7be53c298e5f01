// Validator errors
// Top-level error wrapping the failure of any analysis phase

use crate::document::ParseError;
use crate::expression::EvalError;
use crate::graph::ResolveError;
use crate::model::ModelError;
use crate::template::ExpandError;

use thiserror::Error;

pub type ValidatorResult<T> = Result<T, ValidatorError>;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Expression(#[from] EvalError),

    #[error(transparent)]
    Expand(#[from] ExpandError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Schema validation reported errors; `first` is the earliest of them
    #[error("pipeline has {count} error(s), first: {first}")]
    Invalid { count: usize, first: String },
}
