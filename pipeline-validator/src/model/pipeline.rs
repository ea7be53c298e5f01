// Pipeline Data Model
// Typed entities built once from an expanded document

use crate::document::NodePath;
use crate::expression::{evaluate, parse_condition, EvalError, Expr, RuntimeContext, Value};
use crate::model::matrix::JobInstance;
use crate::template::ParameterDecl;

use indexmap::IndexMap;

/// Name given to the stage or job a pipeline leaves implicit
pub const IMPLICIT_NAME: &str = "__default";

/// A value that can be either a boolean literal or a runtime expression string,
/// e.g. `continueOnError: $[eq(variables.toolchain, 'nightly')]`
#[derive(Debug, Clone, PartialEq)]
pub enum BoolOrExpression {
    Bool(bool),
    Expression(String),
}

impl Default for BoolOrExpression {
    fn default() -> Self {
        BoolOrExpression::Bool(false)
    }
}

impl BoolOrExpression {
    /// The literal value; expressions count as false until evaluated at run time
    pub fn as_bool(&self) -> bool {
        match self {
            BoolOrExpression::Bool(b) => *b,
            BoolOrExpression::Expression(_) => false,
        }
    }
}

/// A parsed `condition:`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub source: String,
    pub expression: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, EvalError> {
        Ok(Self {
            source: source.to_string(),
            expression: parse_condition(source)?,
        })
    }

    /// Evaluate against the results of a run
    pub fn evaluate(&self, context: &RuntimeContext) -> Result<bool, EvalError> {
        Ok(evaluate(&self.expression, context)?.is_truthy())
    }
}

/// Agent pool selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pool {
    pub name: Option<String>,
    pub vm_image: Option<String>,
    pub demands: Vec<String>,
}

// =============================================================================
// DependsOn
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DependsOn {
    /// Not specified: the scope's default ordering applies
    #[default]
    Default,
    /// Explicitly no dependencies (`dependsOn: []`)
    None,
    /// Single dependency
    Single(String),
    /// Multiple dependencies
    Multiple(Vec<String>),
}

impl DependsOn {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            DependsOn::Default | DependsOn::None => vec![],
            DependsOn::Single(name) => vec![name.clone()],
            DependsOn::Multiple(names) => names.clone(),
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, DependsOn::Default)
    }

    pub fn is_explicit_none(&self) -> bool {
        matches!(self, DependsOn::None)
    }
}

// =============================================================================
// Variables
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    Pipeline,
    Stage,
    Job,
}

/// Where a variable's value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum VariableSource {
    Literal(Value),
    /// `- group: name`; values live outside the document
    Group(String),
    /// `$[ ... ]`, evaluated when the run starts
    Expression(String),
    /// Assigned by a `##vso[task.setvariable]` logging command
    RuntimeSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub scope: VariableScope,
    pub source: VariableSource,
    pub readonly: bool,
}

impl Variable {
    pub fn literal(name: impl Into<String>, scope: VariableScope, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            scope,
            source: VariableSource::Literal(value.into()),
            readonly: false,
        }
    }

    /// Whether the value only exists once the pipeline is running
    pub fn is_runtime(&self) -> bool {
        matches!(
            self.source,
            VariableSource::Expression(_) | VariableSource::RuntimeSet
        )
    }
}

// =============================================================================
// Pipeline, Stage, Job
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub name: Option<String>,
    pub pool: Option<Pool>,
    pub variables: Vec<Variable>,
    pub parameters: Vec<ParameterDecl>,
    /// Always at least the implicit stage when the document has jobs or steps
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self.stages.as_slice(), [only] if only.is_implicit())
    }

    pub fn jobs(&self) -> impl Iterator<Item = (&Stage, &Job)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.jobs.iter().map(move |job| (stage, job)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: String,
    pub display_name: Option<String>,
    pub depends_on: DependsOn,
    pub condition: Option<Condition>,
    pub variables: Vec<Variable>,
    pub jobs: Vec<Job>,
    pub pool: Option<Pool>,
    /// Location in the expanded document
    pub path: NodePath,
}

impl Stage {
    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.name.eq_ignore_ascii_case(name))
    }

    pub fn is_implicit(&self) -> bool {
        self.name == IMPLICIT_NAME
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    Job,
    Deployment { environment: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: String,
    pub kind: JobKind,
    pub display_name: Option<String>,
    pub depends_on: DependsOn,
    pub condition: Option<Condition>,
    pub strategy: Strategy,
    pub pool: Option<Pool>,
    pub variables: Vec<Variable>,
    /// Empty for deployment jobs, whose steps live in the strategy hooks
    pub steps: Vec<Step>,
    pub timeout_in_minutes: Option<u32>,
    pub continue_on_error: BoolOrExpression,
    /// Instances the strategy multiplies this job into; one for plain jobs
    pub instances: Vec<JobInstance>,
    pub path: NodePath,
}

impl Job {
    pub fn is_deployment(&self) -> bool {
        matches!(self.kind, JobKind::Deployment { .. })
    }

    /// Whether the strategy turns this job into several instances
    pub fn is_multiplied(&self) -> bool {
        matches!(
            self.strategy,
            Strategy::Matrix { .. } | Strategy::Parallel { .. }
        )
    }

    /// Steps of the job itself followed by those of every deployment hook
    pub fn all_steps(&self) -> impl Iterator<Item = &Step> {
        let hooks = match &self.strategy {
            Strategy::Deployment(deployment) => Some(deployment.hooks.values().flatten()),
            _ => None,
        };
        self.steps.iter().chain(hooks.into_iter().flatten())
    }
}

// =============================================================================
// Strategy
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Strategy {
    #[default]
    None,
    /// One instance per cell, each with its own variables
    Matrix {
        cells: IndexMap<String, IndexMap<String, Value>>,
        max_parallel: Option<u32>,
    },
    /// Matrix computed while the pipeline runs, e.g. from a job output
    RuntimeMatrix {
        expression: String,
        max_parallel: Option<u32>,
    },
    Parallel {
        count: u32,
    },
    Deployment(DeploymentStrategy),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lifecycle {
    RunOnce,
    Rolling { max_parallel: Option<u32> },
    Canary { increments: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentStrategy {
    pub lifecycle: Lifecycle,
    /// Hook name (`preDeploy`, `deploy`, `on.failure`, ...) to its steps
    pub hooks: IndexMap<String, Vec<Step>>,
}

// =============================================================================
// Step
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Script,
    Bash,
    Pwsh,
    PowerShell,
}

impl Shell {
    pub fn key(&self) -> &'static str {
        match self {
            Shell::Script => "script",
            Shell::Bash => "bash",
            Shell::Pwsh => "pwsh",
            Shell::PowerShell => "powershell",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "script" => Some(Shell::Script),
            "bash" => Some(Shell::Bash),
            "pwsh" => Some(Shell::Pwsh),
            "powershell" => Some(Shell::PowerShell),
            _ => None,
        }
    }
}

/// The specific action a step performs
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    Script {
        shell: Shell,
        script: String,
    },
    Task {
        task: String,
        version: Option<String>,
        inputs: IndexMap<String, String>,
    },
    /// A step template reference left for a later expansion
    Template {
        template: String,
        parameters: IndexMap<String, Value>,
    },
    Download {
        source: String,
        inputs: IndexMap<String, String>,
    },
    Checkout {
        repository: String,
        inputs: IndexMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub condition: Option<Condition>,
    pub enabled: bool,
    pub continue_on_error: BoolOrExpression,
    pub timeout_in_minutes: Option<u32>,
    pub env: IndexMap<String, String>,
    pub action: StepAction,
}

impl Step {
    pub fn script_body(&self) -> Option<&str> {
        match &self.action {
            StepAction::Script { script, .. } => Some(script),
            _ => None,
        }
    }
}
