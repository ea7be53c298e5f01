// Pipeline model
// Typed stages, jobs, steps and variables, and matrix instance expansion

pub mod builder;
pub mod error;
pub mod matrix;
pub mod pipeline;

pub use builder::ModelBuilder;
pub use error::ModelError;
pub use matrix::{JobInstance, MatrixExpander};
pub use pipeline::{
    BoolOrExpression, Condition, DependsOn, DeploymentStrategy, Job, JobKind, Lifecycle, Pipeline, Pool,
    Shell, Stage, Step, StepAction, Strategy, Variable, VariableScope, VariableSource, IMPLICIT_NAME,
};
