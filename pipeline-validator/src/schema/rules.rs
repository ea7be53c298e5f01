// Schema rules
// Recognized keys for each kind of pipeline node

use std::fmt;

/// The kind of node a mapping is checked as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Pipeline,
    Stage,
    Job,
    DeploymentJob,
    Step,
    /// `- template: x.yml` reference in a stages, jobs, steps or variables list
    TemplateCall,
    Variable,
    Parameter,
    Strategy,
}

/// Keys that select a step's action; a step has exactly one
pub const STEP_ACTIONS: &[&str] = &[
    "script",
    "bash",
    "pwsh",
    "powershell",
    "task",
    "template",
    "download",
    "checkout",
];

/// Types a declared parameter may have
pub const PARAMETER_TYPES: &[&str] = &[
    "string",
    "number",
    "boolean",
    "object",
    "step",
    "stepList",
    "job",
    "jobList",
    "deployment",
    "deploymentList",
    "stage",
    "stageList",
];

const PIPELINE_KEYS: &[&str] = &[
    "name",
    "trigger",
    "pr",
    "schedules",
    "resources",
    "parameters",
    "variables",
    "pool",
    "stages",
    "jobs",
    "steps",
    "extends",
    "appendCommitMessageToRunName",
    "lockBehavior",
    "container",
    "services",
    "workspace",
    "strategy",
    "continueOnError",
    "timeoutInMinutes",
];

const STAGE_KEYS: &[&str] = &[
    "stage",
    "displayName",
    "dependsOn",
    "condition",
    "variables",
    "jobs",
    "pool",
    "lockBehavior",
    "isSkippable",
    "templateContext",
];

const JOB_KEYS: &[&str] = &[
    "job",
    "displayName",
    "dependsOn",
    "condition",
    "continueOnError",
    "timeoutInMinutes",
    "cancelTimeoutInMinutes",
    "variables",
    "strategy",
    "pool",
    "container",
    "services",
    "workspace",
    "uses",
    "steps",
    "templateContext",
];

const DEPLOYMENT_JOB_KEYS: &[&str] = &[
    "deployment",
    "displayName",
    "dependsOn",
    "condition",
    "continueOnError",
    "timeoutInMinutes",
    "cancelTimeoutInMinutes",
    "variables",
    "environment",
    "strategy",
    "pool",
    "container",
    "services",
    "workspace",
    "uses",
    "templateContext",
];

const STEP_KEYS: &[&str] = &[
    // actions
    "script",
    "bash",
    "pwsh",
    "powershell",
    "task",
    "template",
    "download",
    "checkout",
    // common
    "name",
    "displayName",
    "condition",
    "continueOnError",
    "enabled",
    "env",
    "timeoutInMinutes",
    "retryCountOnTaskFailure",
    "target",
    // script
    "workingDirectory",
    "failOnStderr",
    "errorActionPreference",
    "ignoreLASTEXITCODE",
    // task
    "inputs",
    // template
    "parameters",
    // download
    "artifact",
    "patterns",
    // checkout
    "clean",
    "fetchDepth",
    "fetchTags",
    "lfs",
    "submodules",
    "path",
    "persistCredentials",
];

const TEMPLATE_CALL_KEYS: &[&str] = &["template", "parameters"];

const VARIABLE_KEYS: &[&str] = &["name", "value", "readonly", "group", "template", "parameters"];

const PARAMETER_KEYS: &[&str] = &["name", "displayName", "type", "default", "values"];

const STRATEGY_KEYS: &[&str] = &[
    "matrix",
    "parallel",
    "maxParallel",
    "runOnce",
    "rolling",
    "canary",
];

impl NodeKind {
    /// Keys recognized for this kind
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Pipeline => PIPELINE_KEYS,
            NodeKind::Stage => STAGE_KEYS,
            NodeKind::Job => JOB_KEYS,
            NodeKind::DeploymentJob => DEPLOYMENT_JOB_KEYS,
            NodeKind::Step => STEP_KEYS,
            NodeKind::TemplateCall => TEMPLATE_CALL_KEYS,
            NodeKind::Variable => VARIABLE_KEYS,
            NodeKind::Parameter => PARAMETER_KEYS,
            NodeKind::Strategy => STRATEGY_KEYS,
        }
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.keys().contains(&key)
    }

    /// A known key spelled with different case, for "did you mean" hints
    pub fn case_insensitive_match(&self, key: &str) -> Option<&'static str> {
        self.keys()
            .iter()
            .find(|known| known.eq_ignore_ascii_case(key))
            .copied()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Pipeline => "pipeline",
            NodeKind::Stage => "stage",
            NodeKind::Job => "job",
            NodeKind::DeploymentJob => "deployment job",
            NodeKind::Step => "step",
            NodeKind::TemplateCall => "template reference",
            NodeKind::Variable => "variable",
            NodeKind::Parameter => "parameter",
            NodeKind::Strategy => "strategy",
        };
        f.write_str(name)
    }
}

/// Template directive keys (`${{ if ... }}:`) may appear in any mapping
pub fn is_directive_key(key: &str) -> bool {
    key.trim_start().starts_with("${{")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        assert_eq!(NodeKind::Stage.case_insensitive_match("dependson"), Some("dependsOn"));
        assert_eq!(NodeKind::Stage.case_insensitive_match("steps"), None);
    }

    #[test]
    fn test_every_step_action_is_a_step_key() {
        for action in STEP_ACTIONS {
            assert!(NodeKind::Step.is_known(action), "{} missing", action);
        }
    }

    #[test]
    fn test_directive_key() {
        assert!(is_directive_key("${{ if eq(parameters.a, 'b') }}"));
        assert!(!is_directive_key("displayName"));
    }
}
