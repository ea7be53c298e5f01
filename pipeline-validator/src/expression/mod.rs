// Expression Engine Module
// Azure DevOps expression support: ${{ }} at expansion time, $[ ] and conditions at run time

pub mod context;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use context::{
    DependencyResult, EvalMode, RuntimeContext, Scope, StatusCheck, TaskResult, TemplateContext,
};
pub use error::{Arity, EvalError};
pub use evaluator::{
    evaluate, evaluate_condition, evaluate_template, parse_condition, parse_expression, substitute_template,
    Evaluator,
};
pub use functions::{check_functions, lookup, FunctionSpec};
pub use lexer::{extract_expressions, single_compile_time, ExpressionType, LexError, Lexer, Token};
pub use parser::{BinaryOp, Expr, ExprParser, ParseExprError, Reference, ReferencePart, UnaryOp};
pub use value::Value;
