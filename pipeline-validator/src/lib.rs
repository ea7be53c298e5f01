// Pipeline Validator Library
// Schema validation, template expansion and dependency resolution for
// Azure DevOps pipeline definitions

pub mod analyzer;
pub mod config;
pub mod document;
pub mod error;
pub mod expression;
pub mod graph;
pub mod model;
pub mod schema;
pub mod template;

// Re-export commonly used types
pub use analyzer::{Analysis, PipelineAnalyzer};
pub use config::ValidatorConfig;
pub use error::{ValidatorError, ValidatorResult};

// Re-export document types
pub use document::{Document, Node, NodePath, ParseError, ParseResult, Scalar};

// Re-export expression types
pub use expression::{
    evaluate, evaluate_condition, evaluate_template, DependencyResult, EvalError, Expr,
    RuntimeContext, TaskResult, TemplateContext, Value,
};

// Re-export schema types
pub use schema::{Diagnostic, NodeKind, SchemaValidator, Severity, ValidationResult};

// Re-export template types
pub use template::{
    ExpandError, ExpandFailure, ExpandedDocument, ExpansionReport, TemplateExpander,
    TemplateRegistry, TemplateSource,
};

// Re-export model and graph types
pub use graph::{
    CycleError, DependencyGraph, DependencyGraphResolver, ExecutionPlan, PlannedJob,
    ResolveError, StagePlan,
};
pub use model::{Job, JobInstance, ModelBuilder, ModelError, Pipeline, Stage, Step, Strategy};
