// Evaluation scopes
// The two binding contracts: compile-time templates see only static values,
// runtime conditions see execution results

use crate::expression::error::EvalError;
use crate::expression::parser::Reference;
use crate::expression::value::Value;

use indexmap::IndexMap;
use serde::Serialize;

use std::collections::BTreeSet;
use std::fmt;

/// Which syntax an expression came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// `${{ }}` expanded before the pipeline runs
    CompileTime,
    /// `condition:` and `$[ ]`, evaluated while the pipeline runs
    Runtime,
}

/// Status functions understood by runtime conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCheck {
    Succeeded,
    Failed,
    SucceededOrFailed,
    Canceled,
    Always,
}

/// Binding context consulted by the evaluator
pub trait Scope {
    fn mode(&self) -> EvalMode;

    /// Resolve the root of a reference (`variables`, `parameters`, ...).
    /// The evaluator walks the remaining path parts itself.
    fn resolve(&self, reference: &Reference) -> Result<Value, EvalError>;

    /// Evaluate a status function against the named dependencies
    /// (all direct dependencies when `names` is empty)
    fn status(&self, check: StatusCheck, names: &[String]) -> Result<bool, EvalError>;
}

/// Case-insensitive key lookup; Azure variable and parameter names ignore case
pub(crate) fn get_ignore_case<'a, V>(map: &'a IndexMap<String, V>, key: &str) -> Option<&'a V> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Static bindings for `${{ }}` expressions
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Resolved template or pipeline parameters
    pub parameters: IndexMap<String, Value>,
    /// Variables whose values are known before the run
    pub variables: IndexMap<String, Value>,
    /// Variable names whose values only exist at run time
    pub runtime_variables: BTreeSet<String>,
    /// Loop variables introduced by `${{ each }}`
    pub locals: IndexMap<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(mut self, parameters: IndexMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_runtime_variable(mut self, name: impl Into<String>) -> Self {
        self.runtime_variables.insert(name.into().to_ascii_lowercase());
        self
    }

    /// Child scope with one more loop variable bound
    pub fn with_local(&self, name: impl Into<String>, value: Value) -> Self {
        let mut child = self.clone();
        child.locals.insert(name.into(), value);
        child
    }

    pub fn is_runtime_variable(&self, name: &str) -> bool {
        self.runtime_variables.contains(&name.to_ascii_lowercase())
    }
}

impl Scope for TemplateContext {
    fn mode(&self) -> EvalMode {
        EvalMode::CompileTime
    }

    fn resolve(&self, reference: &Reference) -> Result<Value, EvalError> {
        if let Some(local) = self.locals.get(&reference.root) {
            return Ok(local.clone());
        }

        match reference.root.to_ascii_lowercase().as_str() {
            "parameters" => {
                if let Some(name) = reference.first_key() {
                    if get_ignore_case(&self.parameters, name).is_none() {
                        return Err(EvalError::UndefinedParameter {
                            name: name.to_string(),
                        });
                    }
                }
                Ok(Value::Object(self.parameters.clone()))
            }
            "variables" => {
                if let Some(name) = reference.first_key() {
                    if self.is_runtime_variable(name) {
                        return Err(EvalError::runtime_only(reference.to_string()));
                    }
                }
                Ok(Value::Object(self.variables.clone()))
            }
            "dependencies" | "stagedependencies" | "steps" => {
                Err(EvalError::runtime_only(reference.to_string()))
            }
            _ => Err(EvalError::UnrecognizedValue {
                name: reference.root.clone(),
            }),
        }
    }

    fn status(&self, check: StatusCheck, _names: &[String]) -> Result<bool, EvalError> {
        Err(EvalError::runtime_only(format!("{}()", check.function_name())))
    }
}

impl StatusCheck {
    pub fn function_name(&self) -> &'static str {
        match self {
            StatusCheck::Succeeded => "succeeded",
            StatusCheck::Failed => "failed",
            StatusCheck::SucceededOrFailed => "succeededOrFailed",
            StatusCheck::Canceled => "canceled",
            StatusCheck::Always => "always",
        }
    }
}

/// Outcome of a finished stage or job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskResult {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Canceled,
    Skipped,
}

impl TaskResult {
    fn is_success(&self) -> bool {
        matches!(self, TaskResult::Succeeded | TaskResult::SucceededWithIssues)
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TaskResult::Succeeded => "Succeeded",
            TaskResult::SucceededWithIssues => "SucceededWithIssues",
            TaskResult::Failed => "Failed",
            TaskResult::Canceled => "Canceled",
            TaskResult::Skipped => "Skipped",
        };
        f.write_str(text)
    }
}

/// Result and output variables of one dependency
#[derive(Debug, Clone)]
pub struct DependencyResult {
    pub result: TaskResult,
    pub outputs: IndexMap<String, Value>,
}

impl DependencyResult {
    pub fn new(result: TaskResult) -> Self {
        Self {
            result,
            outputs: IndexMap::new(),
        }
    }

    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }

    fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("result".to_string(), Value::String(self.result.to_string()));
        map.insert("outputs".to_string(), Value::Object(self.outputs.clone()));
        Value::Object(map)
    }
}

/// Execution-result bindings for runtime conditions
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    /// Variables visible to the job at run time, including output variables
    pub variables: IndexMap<String, Value>,
    /// Direct dependencies of the node whose condition is evaluated
    pub dependencies: IndexMap<String, DependencyResult>,
    /// Whether the run has been canceled
    pub canceled: bool,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>, result: DependencyResult) -> Self {
        self.dependencies.insert(name.into(), result);
        self
    }

    pub fn canceled(mut self) -> Self {
        self.canceled = true;
        self
    }

    fn selected(&self, names: &[String]) -> Result<Vec<&DependencyResult>, EvalError> {
        if names.is_empty() {
            return Ok(self.dependencies.values().collect());
        }
        names
            .iter()
            .map(|name| {
                get_ignore_case(&self.dependencies, name).ok_or_else(|| {
                    EvalError::UnrecognizedValue {
                        name: format!("dependency '{}'", name),
                    }
                })
            })
            .collect()
    }
}

impl Scope for RuntimeContext {
    fn mode(&self) -> EvalMode {
        EvalMode::Runtime
    }

    fn resolve(&self, reference: &Reference) -> Result<Value, EvalError> {
        match reference.root.to_ascii_lowercase().as_str() {
            "variables" => Ok(Value::Object(self.variables.clone())),
            "dependencies" | "stagedependencies" => Ok(Value::Object(
                self.dependencies
                    .iter()
                    .map(|(name, dep)| (name.clone(), dep.to_value()))
                    .collect(),
            )),
            _ => Err(EvalError::UnrecognizedValue {
                name: reference.root.clone(),
            }),
        }
    }

    fn status(&self, check: StatusCheck, names: &[String]) -> Result<bool, EvalError> {
        let deps = self.selected(names)?;
        let outcome = match check {
            StatusCheck::Always => true,
            StatusCheck::Canceled => self.canceled,
            StatusCheck::Succeeded => !self.canceled && deps.iter().all(|d| d.result.is_success()),
            StatusCheck::Failed => {
                !self.canceled && deps.iter().any(|d| d.result == TaskResult::Failed)
            }
            StatusCheck::SucceededOrFailed => {
                !self.canceled
                    && deps
                        .iter()
                        .all(|d| d.result.is_success() || d.result == TaskResult::Failed)
            }
        };
        Ok(outcome)
    }
}
