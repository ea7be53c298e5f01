// Template module
// Compile-time expansion of template references, parameters and directives

pub mod directive;
pub mod error;
pub mod expander;
pub mod parameters;
pub mod source;

pub use directive::Directive;
pub use error::ExpandError;
pub use expander::{
    scan_runtime_variables, set_variable_names, ExpandFailure, ExpandedDocument, ExpansionReport, TemplateExpander,
};
pub use parameters::{bind, declarations, ParameterDecl, ParameterType};
pub use source::{normalize_name, TemplateRegistry, TemplateSource};
