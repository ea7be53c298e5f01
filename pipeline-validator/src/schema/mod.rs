// Schema Module
// Structural validation of pipeline documents

pub mod diagnostic;
pub mod rules;
pub mod validator;

pub use diagnostic::{Diagnostic, Severity, ValidationResult};
pub use rules::{is_directive_key, NodeKind, PARAMETER_TYPES, STEP_ACTIONS};
pub use validator::SchemaValidator;
