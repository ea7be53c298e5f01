// Model Builder
// Builds the typed pipeline model from an expanded document tree

use crate::config::ValidatorConfig;
use crate::document::{Node, NodePath};
use crate::expression::Value;
use crate::model::error::ModelError;
use crate::model::matrix::MatrixExpander;
use crate::model::pipeline::{
    BoolOrExpression, Condition, DependsOn, DeploymentStrategy, Job, JobKind, Lifecycle, Pipeline, Pool,
    Shell, Stage, Step, StepAction, Strategy, Variable, VariableScope, VariableSource, IMPLICIT_NAME,
};
use crate::schema::STEP_ACTIONS;
use crate::template::{declarations, set_variable_names};

use indexmap::IndexMap;
use tracing::debug;

/// Step keys that are not action-specific inputs
const COMMON_STEP_KEYS: &[&str] = &[
    "name",
    "displayName",
    "condition",
    "continueOnError",
    "enabled",
    "env",
    "timeoutInMinutes",
    "retryCountOnTaskFailure",
    "target",
    "inputs",
];

/// Builds a `Pipeline` from an expanded document
pub struct ModelBuilder {
    max_matrix_instances: usize,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::with_config(&ValidatorConfig::default())
    }

    pub fn with_config(config: &ValidatorConfig) -> Self {
        Self {
            max_matrix_instances: config.max_matrix_instances,
        }
    }

    pub fn build(&self, root: &Node) -> Result<Pipeline, ModelError> {
        let path = NodePath::root();
        if root.as_mapping().is_none() {
            return Err(ModelError::invalid(
                &path,
                format!("a pipeline must be a mapping, found {}", root.kind_name()),
            ));
        }

        let parameters = declarations(root.get("parameters"), "the pipeline")
            .map_err(|e| ModelError::invalid(&path.key("parameters"), e.to_string()))?;
        let variables = variables(root.get("variables"), VariableScope::Pipeline, &path.key("variables"))?;

        // Normalize to stages: bare jobs or steps get the implicit stage and job
        let stages = if let Some(stages) = root.get("stages") {
            self.list(stages, &path.key("stages"), Self::stage)?
        } else if let Some(jobs) = root.get("jobs") {
            vec![implicit_stage(self.list(jobs, &path.key("jobs"), Self::job)?)]
        } else if root.get("steps").is_some() {
            let job = self.job_body(IMPLICIT_NAME.to_string(), JobKind::Job, root, &path, false)?;
            vec![implicit_stage(vec![job])]
        } else {
            Vec::new()
        };

        debug!(
            "Built pipeline model: {} stage(s), {} job(s)",
            stages.len(),
            stages.iter().map(|s| s.jobs.len()).sum::<usize>()
        );

        Ok(Pipeline {
            name: text(root.get("name")),
            pool: pool(root.get("pool")),
            variables,
            parameters,
            stages,
        })
    }

    fn list<T>(
        &self,
        node: &Node,
        path: &NodePath,
        build: fn(&Self, &Node, &NodePath) -> Result<T, ModelError>,
    ) -> Result<Vec<T>, ModelError> {
        match node {
            Node::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| build(self, item, &path.index(i)))
                .collect(),
            _ if node.is_null() => Ok(Vec::new()),
            other => Err(ModelError::invalid(
                path,
                format!("expected a sequence, found {}", other.kind_name()),
            )),
        }
    }

    // =========================================================================
    // Stages and jobs
    // =========================================================================

    fn stage(&self, node: &Node, path: &NodePath) -> Result<Stage, ModelError> {
        reject_template(node, path)?;
        let name = text(node.get("stage")).ok_or(ModelError::MissingName {
            kind: "stage",
            path: path.clone(),
        })?;

        let jobs = match node.get("jobs") {
            Some(jobs) => self.list(jobs, &path.key("jobs"), Self::job)?,
            None => Vec::new(),
        };

        Ok(Stage {
            name,
            display_name: text(node.get("displayName")),
            depends_on: depends_on(node.get("dependsOn"), &path.key("dependsOn"))?,
            condition: condition(node.get("condition"), &path.key("condition"))?,
            variables: variables(node.get("variables"), VariableScope::Stage, &path.key("variables"))?,
            jobs,
            pool: pool(node.get("pool")),
            path: path.clone(),
        })
    }

    fn job(&self, node: &Node, path: &NodePath) -> Result<Job, ModelError> {
        reject_template(node, path)?;
        let (name, kind) = match node.get("deployment") {
            Some(deployment) => {
                let environment = node.get("environment").and_then(|env| match env {
                    Node::Mapping(_) => text(env.get("name")),
                    _ => env.scalar_text(),
                });
                (text(Some(deployment)), JobKind::Deployment { environment })
            }
            None => (text(node.get("job")), JobKind::Job),
        };
        let name = name.ok_or(ModelError::MissingName {
            kind: "job",
            path: path.clone(),
        })?;
        self.job_body(name, kind, node, path, true)
    }

    /// Fields shared by declared jobs and the implicit job of a steps-only pipeline
    fn job_body(
        &self,
        name: String,
        kind: JobKind,
        node: &Node,
        path: &NodePath,
        own_variables: bool,
    ) -> Result<Job, ModelError> {
        let strategy = self.strategy(node.get("strategy"), &path.key("strategy"))?;
        let steps = match node.get("steps") {
            Some(steps) => self.list(steps, &path.key("steps"), Self::step)?,
            None => Vec::new(),
        };
        let mut variables = if own_variables {
            variables(node.get("variables"), VariableScope::Job, &path.key("variables"))?
        } else {
            Vec::new()
        };
        let instances = MatrixExpander::expand(&name, &strategy, self.max_matrix_instances)?;

        let mut job = Job {
            name,
            kind,
            display_name: text(node.get("displayName")),
            depends_on: depends_on(node.get("dependsOn"), &path.key("dependsOn"))?,
            condition: condition(node.get("condition"), &path.key("condition"))?,
            strategy,
            pool: pool(node.get("pool")),
            variables: Vec::new(),
            steps,
            timeout_in_minutes: number(node.get("timeoutInMinutes"), &path.key("timeoutInMinutes"))?,
            continue_on_error: flag(node.get("continueOnError")),
            instances,
            path: path.clone(),
        };

        // Variables assigned by logging commands in the job's own scripts
        let assigned: Vec<String> = job
            .all_steps()
            .filter_map(Step::script_body)
            .flat_map(set_variable_names)
            .collect();
        for name in assigned {
            if !variables.iter().any(|v| v.name.eq_ignore_ascii_case(&name)) {
                variables.push(Variable {
                    name,
                    scope: VariableScope::Job,
                    source: VariableSource::RuntimeSet,
                    readonly: false,
                });
            }
        }
        job.variables = variables;
        Ok(job)
    }

    fn strategy(&self, node: Option<&Node>, path: &NodePath) -> Result<Strategy, ModelError> {
        let Some(node) = node.filter(|n| !n.is_null()) else {
            return Ok(Strategy::None);
        };
        if node.as_mapping().is_none() {
            return Err(ModelError::invalid(path, "'strategy' must be a mapping"));
        }
        let max_parallel = number(node.get("maxParallel"), &path.key("maxParallel"))?;

        if let Some(matrix) = node.get("matrix") {
            let matrix_path = path.key("matrix");
            return match matrix {
                Node::Mapping(cells) => {
                    let cells = cells
                        .iter()
                        .map(|(cell, vars)| match vars.as_mapping() {
                            Some(vars) => Ok((
                                cell.clone(),
                                vars.iter().map(|(k, v)| (k.clone(), Value::from_node(v))).collect(),
                            )),
                            None => Err(ModelError::invalid(
                                &matrix_path.key(cell),
                                "a matrix cell must be a mapping of variables",
                            )),
                        })
                        .collect::<Result<_, _>>()?;
                    Ok(Strategy::Matrix { cells, max_parallel })
                }
                _ => match matrix.as_str() {
                    Some(expression) => Ok(Strategy::RuntimeMatrix {
                        expression: expression.to_string(),
                        max_parallel,
                    }),
                    None => Err(ModelError::invalid(&matrix_path, "'matrix' must be a mapping")),
                },
            };
        }

        if node.get("parallel").is_some() {
            return match number(node.get("parallel"), &path.key("parallel"))? {
                Some(count) if count > 0 => Ok(Strategy::Parallel { count }),
                _ => Err(ModelError::invalid(
                    &path.key("parallel"),
                    "'parallel' must be a positive whole number",
                )),
            };
        }

        for key in ["runOnce", "rolling", "canary"] {
            if let Some(body) = node.get(key) {
                return self.deployment(key, body, &path.key(key)).map(Strategy::Deployment);
            }
        }
        Ok(Strategy::None)
    }

    fn deployment(&self, key: &str, body: &Node, path: &NodePath) -> Result<DeploymentStrategy, ModelError> {
        let lifecycle = match key {
            "rolling" => Lifecycle::Rolling {
                max_parallel: number(body.get("maxParallel"), &path.key("maxParallel"))?,
            },
            "canary" => Lifecycle::Canary {
                increments: body
                    .get("increments")
                    .and_then(Node::as_sequence)
                    .unwrap_or_default()
                    .iter()
                    .enumerate()
                    .map(|(i, n)| {
                        number(Some(n), &path.key("increments").index(i))?.ok_or_else(|| {
                            ModelError::invalid(&path.key("increments").index(i), "expected a number")
                        })
                    })
                    .collect::<Result<_, _>>()?,
            },
            _ => Lifecycle::RunOnce,
        };

        let mut hooks = IndexMap::new();
        for (hook, hook_body) in body.as_mapping().into_iter().flatten() {
            let hook_path = path.key(hook);
            if hook == "on" {
                for (outcome, outcome_body) in hook_body.as_mapping().into_iter().flatten() {
                    let steps = self.hook_steps(outcome_body, &hook_path.key(outcome))?;
                    hooks.insert(format!("on.{}", outcome), steps);
                }
            } else if hook_body.get("steps").is_some() {
                hooks.insert(hook.clone(), self.hook_steps(hook_body, &hook_path)?);
            }
        }

        Ok(DeploymentStrategy { lifecycle, hooks })
    }

    fn hook_steps(&self, body: &Node, path: &NodePath) -> Result<Vec<Step>, ModelError> {
        match body.get("steps") {
            Some(steps) => self.list(steps, &path.key("steps"), Self::step),
            None => Ok(Vec::new()),
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    fn step(&self, node: &Node, path: &NodePath) -> Result<Step, ModelError> {
        let Some(map) = node.as_mapping() else {
            return Err(ModelError::invalid(
                path,
                format!("a step must be a mapping, found {}", node.kind_name()),
            ));
        };
        let Some(key) = STEP_ACTIONS.iter().copied().find(|k| map.contains_key(*k)) else {
            return Err(ModelError::invalid(path, "step has no action"));
        };
        let value = text(map.get(key)).unwrap_or_default();

        let extras = || -> IndexMap<String, String> {
            map.iter()
                .filter(|(k, _)| k.as_str() != key && !COMMON_STEP_KEYS.contains(&k.as_str()))
                .filter_map(|(k, v)| v.scalar_text().map(|v| (k.clone(), v)))
                .collect()
        };

        let action = match key {
            "task" => {
                let (task, version) = match value.split_once('@') {
                    Some((task, version)) => (task.to_string(), Some(version.to_string())),
                    None => (value, None),
                };
                StepAction::Task {
                    task,
                    version,
                    inputs: string_map(map.get("inputs"), &path.key("inputs"))?,
                }
            }
            "template" => StepAction::Template {
                template: value,
                parameters: match map.get("parameters").map(Value::from_node) {
                    Some(Value::Object(params)) => params,
                    _ => IndexMap::new(),
                },
            },
            "download" => StepAction::Download {
                source: value,
                inputs: extras(),
            },
            "checkout" => StepAction::Checkout {
                repository: value,
                inputs: extras(),
            },
            shell => StepAction::Script {
                shell: Shell::from_key(shell).unwrap_or(Shell::Script),
                script: value,
            },
        };

        Ok(Step {
            name: text(map.get("name")),
            display_name: text(map.get("displayName")),
            condition: condition(map.get("condition"), &path.key("condition"))?,
            enabled: match map.get("enabled") {
                None => true,
                Some(enabled) => !matches!(flag(Some(enabled)), BoolOrExpression::Bool(false)),
            },
            continue_on_error: flag(map.get("continueOnError")),
            timeout_in_minutes: number(map.get("timeoutInMinutes"), &path.key("timeoutInMinutes"))?,
            env: string_map(map.get("env"), &path.key("env"))?,
            action,
        })
    }
}

fn implicit_stage(jobs: Vec<Job>) -> Stage {
    Stage {
        name: IMPLICIT_NAME.to_string(),
        display_name: None,
        depends_on: DependsOn::None,
        condition: None,
        variables: Vec::new(),
        jobs,
        pool: None,
        path: NodePath::root(),
    }
}

/// Stage and job references must be gone after expansion
fn reject_template(node: &Node, path: &NodePath) -> Result<(), ModelError> {
    match node.get("template") {
        Some(template) => Err(ModelError::UnexpandedTemplate {
            path: path.clone(),
            template: template.scalar_text().unwrap_or_default(),
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Field helpers
// =============================================================================

fn text(node: Option<&Node>) -> Option<String> {
    node.and_then(Node::scalar_text)
}

fn depends_on(node: Option<&Node>, path: &NodePath) -> Result<DependsOn, ModelError> {
    let Some(node) = node else {
        return Ok(DependsOn::Default);
    };
    match node {
        Node::Sequence(items) if items.is_empty() => Ok(DependsOn::None),
        Node::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.scalar_text()
                    .ok_or_else(|| ModelError::invalid(&path.index(i), "dependsOn entries must be names"))
            })
            .collect::<Result<_, _>>()
            .map(DependsOn::Multiple),
        _ if node.is_null() => Ok(DependsOn::None),
        Node::Scalar(_) => match node.scalar_text() {
            Some(name) if name.trim().is_empty() => Ok(DependsOn::None),
            Some(name) => Ok(DependsOn::Single(name)),
            None => Ok(DependsOn::None),
        },
        Node::Mapping(_) => Err(ModelError::invalid(path, "'dependsOn' must be a name or a list of names")),
    }
}

fn condition(node: Option<&Node>, path: &NodePath) -> Result<Option<Condition>, ModelError> {
    let Some(source) = text(node) else {
        return Ok(None);
    };
    Condition::parse(&source)
        .map(Some)
        .map_err(|source| ModelError::Condition {
            path: path.clone(),
            source,
        })
}

fn number(node: Option<&Node>, path: &NodePath) -> Result<Option<u32>, ModelError> {
    let Some(node) = node.filter(|n| !n.is_null()) else {
        return Ok(None);
    };
    let value = node
        .as_number()
        .or_else(|| node.as_str().and_then(|s| s.trim().parse().ok()));
    match value {
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(Some(n as u32)),
        _ => Err(ModelError::invalid(path, "expected a non-negative whole number")),
    }
}

fn flag(node: Option<&Node>) -> BoolOrExpression {
    let Some(node) = node else {
        return BoolOrExpression::default();
    };
    if let Some(b) = node.as_bool() {
        return BoolOrExpression::Bool(b);
    }
    match node.scalar_text() {
        Some(s) if s.eq_ignore_ascii_case("true") => BoolOrExpression::Bool(true),
        Some(s) if s.eq_ignore_ascii_case("false") => BoolOrExpression::Bool(false),
        Some(s) => BoolOrExpression::Expression(s),
        None => BoolOrExpression::default(),
    }
}

fn string_map(node: Option<&Node>, path: &NodePath) -> Result<IndexMap<String, String>, ModelError> {
    let Some(node) = node.filter(|n| !n.is_null()) else {
        return Ok(IndexMap::new());
    };
    let Some(map) = node.as_mapping() else {
        return Err(ModelError::invalid(path, "expected a mapping of strings"));
    };
    map.iter()
        .map(|(k, v)| {
            v.scalar_text()
                .map(|v| (k.clone(), v))
                .ok_or_else(|| ModelError::invalid(&path.key(k), "expected a string"))
        })
        .collect()
}

fn pool(node: Option<&Node>) -> Option<Pool> {
    let node = node.filter(|n| !n.is_null())?;
    if let Some(name) = node.scalar_text() {
        return Some(Pool {
            name: Some(name),
            ..Pool::default()
        });
    }
    let demands = match node.get("demands") {
        Some(Node::Sequence(items)) => items.iter().filter_map(Node::scalar_text).collect(),
        Some(other) => other.scalar_text().into_iter().collect(),
        None => Vec::new(),
    };
    Some(Pool {
        name: text(node.get("name")),
        vm_image: text(node.get("vmImage")),
        demands,
    })
}

fn variable_source(value: &Node) -> VariableSource {
    match value.as_str() {
        Some(text) if text.trim_start().starts_with("$[") => VariableSource::Expression(text.to_string()),
        _ => VariableSource::Literal(Value::from_node(value)),
    }
}

fn variables(node: Option<&Node>, scope: VariableScope, path: &NodePath) -> Result<Vec<Variable>, ModelError> {
    match node {
        None => Ok(Vec::new()),
        Some(node) if node.is_null() => Ok(Vec::new()),
        Some(Node::Mapping(map)) => Ok(map
            .iter()
            .map(|(name, value)| Variable {
                name: name.clone(),
                scope,
                source: variable_source(value),
                readonly: false,
            })
            .collect()),
        Some(Node::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let item_path = path.index(i);
                if let Some(group) = text(item.get("group")) {
                    return Ok(Variable {
                        name: group.clone(),
                        scope,
                        source: VariableSource::Group(group),
                        readonly: false,
                    });
                }
                reject_template(item, &item_path)?;
                let name = text(item.get("name")).ok_or(ModelError::MissingName {
                    kind: "variable",
                    path: item_path.clone(),
                })?;
                Ok(Variable {
                    name,
                    scope,
                    source: item.get("value").map(variable_source).unwrap_or(VariableSource::Literal(Value::Null)),
                    readonly: matches!(flag(item.get("readonly")), BoolOrExpression::Bool(true)),
                })
            })
            .collect(),
        Some(other) => Err(ModelError::invalid(
            path,
            format!("'variables' must be a mapping or a sequence, found {}", other.kind_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn build(yaml: &str) -> Result<Pipeline, ModelError> {
        let doc = Document::from_yaml_str(yaml).unwrap();
        ModelBuilder::new().build(doc.root())
    }

    #[test]
    fn test_stages_and_jobs() {
        let pipeline = build(
            r#"
name: ci
variables:
  configuration: Release
stages:
  - stage: Build
    jobs:
      - job: Compile
        pool: { vmImage: ubuntu-latest }
        steps:
          - script: cargo build
      - job: Lint
        steps:
          - bash: cargo clippy
  - stage: Deploy
    dependsOn: Build
    condition: succeeded()
    jobs:
      - deployment: Web
        environment: production
        strategy:
          runOnce:
            deploy:
              steps:
                - script: ./deploy.sh
"#,
        )
        .unwrap();

        assert_eq!(pipeline.name.as_deref(), Some("ci"));
        assert_eq!(pipeline.variables[0].source, VariableSource::Literal(Value::from("Release")));
        assert_eq!(pipeline.stages.len(), 2);

        let build = &pipeline.stages[0];
        assert_eq!(build.depends_on, DependsOn::Default);
        assert_eq!(build.jobs[0].pool.as_ref().and_then(|p| p.vm_image.as_deref()), Some("ubuntu-latest"));
        assert!(matches!(
            build.jobs[1].steps[0].action,
            StepAction::Script { shell: Shell::Bash, .. }
        ));

        let deploy = &pipeline.stages[1];
        assert_eq!(deploy.depends_on, DependsOn::Single("Build".into()));
        assert!(deploy.condition.is_some());
        let web = &deploy.jobs[0];
        assert_eq!(
            web.kind,
            JobKind::Deployment {
                environment: Some("production".into())
            }
        );
        assert_eq!(web.all_steps().count(), 1);
        assert_eq!(web.path.to_string(), "stages[1].jobs[0]");
    }

    #[test]
    fn test_jobs_only_pipeline_gets_implicit_stage() {
        let pipeline = build("jobs:\n  - job: A\n    steps: [{script: a}]\n  - job: B\n    steps: [{script: b}]\n").unwrap();
        assert!(pipeline.is_implicit());
        assert_eq!(pipeline.stages[0].name, IMPLICIT_NAME);
        assert_eq!(pipeline.stages[0].jobs.len(), 2);
    }

    #[test]
    fn test_steps_only_pipeline_gets_implicit_job() {
        let pipeline = build("variables:\n  x: 1\nsteps:\n  - script: echo hi\n").unwrap();
        let stage = &pipeline.stages[0];
        assert_eq!(stage.name, IMPLICIT_NAME);
        assert_eq!(stage.jobs[0].name, IMPLICIT_NAME);
        assert_eq!(stage.jobs[0].steps.len(), 1);
        assert!(stage.jobs[0].variables.is_empty());
        assert_eq!(pipeline.variables.len(), 1);
    }

    #[test]
    fn test_depends_on_forms() {
        let pipeline = build(
            r#"
stages:
  - stage: A
    jobs: []
  - stage: B
    dependsOn: []
    jobs: []
  - stage: C
    dependsOn: [A, B]
    jobs: []
"#,
        )
        .unwrap();
        assert_eq!(pipeline.stages[1].depends_on, DependsOn::None);
        assert_eq!(
            pipeline.stages[2].depends_on,
            DependsOn::Multiple(vec!["A".into(), "B".into()])
        );
    }

    #[test]
    fn test_matrix_job_instances() {
        let pipeline = build(
            r#"
jobs:
  - job: Build
    strategy:
      matrix:
        linux: { image: ubuntu-latest }
        mac: { image: macos-latest }
      maxParallel: 1
    steps:
      - script: make
"#,
        )
        .unwrap();
        let job = &pipeline.stages[0].jobs[0];
        assert!(job.is_multiplied());
        let names: Vec<_> = job.instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Build_linux", "Build_mac"]);
        assert!(matches!(job.strategy, Strategy::Matrix { max_parallel: Some(1), .. }));
    }

    #[test]
    fn test_matrix_limit_from_config() {
        let doc = Document::from_yaml_str(
            "jobs:\n  - job: T\n    strategy: { parallel: 5 }\n    steps: [{script: t}]\n",
        )
        .unwrap();
        let builder = ModelBuilder::with_config(&ValidatorConfig::default().with_max_matrix_instances(2));
        assert!(matches!(
            builder.build(doc.root()),
            Err(ModelError::TooManyInstances { count: 5, limit: 2, .. })
        ));
    }

    #[test]
    fn test_step_variants() {
        let pipeline = build(
            r#"
steps:
  - checkout: self
    fetchDepth: 1
  - task: DotNetCoreCLI@2
    inputs:
      command: build
  - download: current
    artifact: drop
  - template: steps/test.yml
    parameters: { verbose: true }
  - pwsh: Write-Host hi
    enabled: false
    env: { TOKEN: $(token) }
"#,
        )
        .unwrap();
        let steps = &pipeline.stages[0].jobs[0].steps;

        match &steps[0].action {
            StepAction::Checkout { repository, inputs } => {
                assert_eq!(repository, "self");
                assert_eq!(inputs["fetchDepth"], "1");
            }
            other => panic!("expected checkout, got {:?}", other),
        }
        match &steps[1].action {
            StepAction::Task { task, version, inputs } => {
                assert_eq!(task, "DotNetCoreCLI");
                assert_eq!(version.as_deref(), Some("2"));
                assert_eq!(inputs["command"], "build");
            }
            other => panic!("expected task, got {:?}", other),
        }
        assert!(matches!(&steps[2].action, StepAction::Download { inputs, .. } if inputs["artifact"] == "drop"));
        assert!(matches!(&steps[3].action, StepAction::Template { parameters, .. } if parameters["verbose"] == Value::Bool(true)));
        assert!(!steps[4].enabled);
        assert_eq!(steps[4].env["TOKEN"], "$(token)");
        assert!(steps[0].enabled);
    }

    #[test]
    fn test_variable_sources() {
        let pipeline = build(
            r###"
variables:
  - group: shared-secrets
  - name: stamp
    value: $[ format('{0:yyyyMMdd}', pipeline.startTime) ]
  - name: fixed
    value: 1
    readonly: true
jobs:
  - job: Version
    steps:
      - bash: echo "##vso[task.setvariable variable=semVer;isOutput=true]1.2.3"
"###,
        )
        .unwrap();

        let vars = &pipeline.variables;
        assert_eq!(vars[0].source, VariableSource::Group("shared-secrets".into()));
        assert!(vars[1].is_runtime());
        assert!(vars[2].readonly);

        let job_vars = &pipeline.stages[0].jobs[0].variables;
        assert_eq!(job_vars.len(), 1);
        assert_eq!(job_vars[0].name, "semVer");
        assert_eq!(job_vars[0].source, VariableSource::RuntimeSet);
        assert_eq!(job_vars[0].scope, VariableScope::Job);
    }

    #[test]
    fn test_missing_names_and_unexpanded_templates() {
        assert!(matches!(
            build("stages:\n  - jobs: []\n"),
            Err(ModelError::MissingName { kind: "stage", .. })
        ));
        let err = build("jobs:\n  - template: jobs.yml\n").unwrap_err();
        assert_eq!(err.path().map(|p| p.to_string()), Some("jobs[0]".to_string()));
        assert!(matches!(err, ModelError::UnexpandedTemplate { .. }));
    }

    #[test]
    fn test_invalid_condition() {
        let err = build("jobs:\n  - job: A\n    condition: eq(1,\n    steps: [{script: a}]\n").unwrap_err();
        assert!(matches!(err, ModelError::Condition { .. }));
    }

    #[test]
    fn test_rolling_and_canary_hooks() {
        let pipeline = build(
            r#"
jobs:
  - deployment: Canary
    environment: { name: prod }
    strategy:
      canary:
        increments: [10, 20]
        deploy:
          steps: [{script: deploy}]
        on:
          failure:
            steps: [{script: rollback}]
"#,
        )
        .unwrap();
        let job = &pipeline.stages[0].jobs[0];
        let Strategy::Deployment(deployment) = &job.strategy else {
            panic!("expected a deployment strategy");
        };
        assert_eq!(deployment.lifecycle, Lifecycle::Canary { increments: vec![10, 20] });
        let hooks: Vec<_> = deployment.hooks.keys().cloned().collect();
        assert_eq!(hooks, vec!["deploy", "on.failure"]);
        assert_eq!(job.instances.len(), 1);
    }
}
