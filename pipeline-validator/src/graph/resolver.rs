// Dependency Graph Resolver
// Builds stage and job graphs from the pipeline model and sorts them into batches

use crate::config::ValidatorConfig;
use crate::graph::dag::DependencyGraph;
use crate::graph::error::ResolveError;
use crate::graph::plan::{ExecutionPlan, StagePlan};
use crate::model::{DependsOn, Job, Pipeline, Stage};

use tracing::debug;

/// Scope name of the stage graph
pub const STAGE_SCOPE: &str = "stages";

/// Scope name of the job graph of one stage
pub fn job_scope(stage: &Stage) -> String {
    format!("jobs of stage '{}'", stage.name)
}

/// Resolves `dependsOn` into an execution plan
#[derive(Debug, Clone, Default)]
pub struct DependencyGraphResolver {
    /// Jobs without `dependsOn` wait for the previous job, like stages do
    sequential_jobs: bool,
}

impl DependencyGraphResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &ValidatorConfig) -> Self {
        Self {
            sequential_jobs: config.sequential_jobs,
        }
    }

    pub fn with_sequential_jobs(mut self, sequential: bool) -> Self {
        self.sequential_jobs = sequential;
        self
    }

    pub fn resolve(&self, pipeline: &Pipeline) -> Result<ExecutionPlan, ResolveError> {
        self.resolve_stages(&pipeline.stages)
    }

    /// Every `dependsOn` entry, in any scope, that names nothing in that scope
    pub fn unknown_dependencies(&self, pipeline: &Pipeline) -> Vec<ResolveError> {
        let mut unknown = Vec::new();
        for stage in &pipeline.stages {
            for dependency in stage.depends_on.as_vec() {
                if pipeline.stage(&dependency).is_none() {
                    unknown.push(ResolveError::UnknownDependency {
                        scope: STAGE_SCOPE.to_string(),
                        node: stage.name.clone(),
                        dependency,
                    });
                }
            }
            for job in &stage.jobs {
                for dependency in job.depends_on.as_vec() {
                    if stage.job(&dependency).is_none() {
                        unknown.push(ResolveError::UnknownDependency {
                            scope: job_scope(stage),
                            node: job.name.clone(),
                            dependency,
                        });
                    }
                }
            }
        }
        unknown
    }

    /// Plan the given stages; the whole plan fails if any scope has a cycle
    pub fn resolve_stages(&self, stages: &[Stage]) -> Result<ExecutionPlan, ResolveError> {
        let stage_batches = self.stage_graph(stages)?.batches()?;
        debug!("Resolved {} stage(s) into {} batch(es)", stages.len(), stage_batches.len());

        let stages = stages
            .iter()
            .map(|stage| {
                let job_batches = self.job_graph(stage)?.batches()?;
                debug!(
                    "Resolved {} job(s) of stage '{}' into {} batch(es)",
                    stage.jobs.len(),
                    stage.name,
                    job_batches.len()
                );
                Ok(StagePlan {
                    name: stage.name.clone(),
                    job_batches,
                })
            })
            .collect::<Result<Vec<_>, ResolveError>>()?;

        Ok(ExecutionPlan { stage_batches, stages })
    }

    /// Stages default to waiting for the previous stage
    pub fn stage_graph(&self, stages: &[Stage]) -> Result<DependencyGraph, ResolveError> {
        let mut graph = DependencyGraph::new(STAGE_SCOPE);
        for stage in stages {
            graph.add_node(stage.name.clone())?;
        }

        for (i, stage) in stages.iter().enumerate() {
            let dependencies = match &stage.depends_on {
                DependsOn::Default => i
                    .checked_sub(1)
                    .map(|prev| vec![stages[prev].name.clone()])
                    .unwrap_or_default(),
                explicit => explicit.as_vec(),
            };
            for dependency in dependencies {
                graph.add_edge(&stage.name, &dependency)?;
            }
        }
        Ok(graph)
    }

    /// One node per job instance; an edge to a multiplied job waits for
    /// every one of its instances
    pub fn job_graph(&self, stage: &Stage) -> Result<DependencyGraph, ResolveError> {
        let scope = job_scope(stage);
        let mut graph = DependencyGraph::new(scope.clone());

        for job in &stage.jobs {
            for instance in &job.instances {
                graph.add_node(instance.name.clone())?;
            }
        }

        for (i, job) in stage.jobs.iter().enumerate() {
            let dependencies: Vec<&Job> = match &job.depends_on {
                DependsOn::Default if self.sequential_jobs => {
                    i.checked_sub(1).map(|prev| vec![&stage.jobs[prev]]).unwrap_or_default()
                }
                DependsOn::Default => Vec::new(),
                explicit => explicit
                    .as_vec()
                    .iter()
                    .map(|name| {
                        stage.job(name).ok_or_else(|| ResolveError::UnknownDependency {
                            scope: scope.clone(),
                            node: job.name.clone(),
                            dependency: name.clone(),
                        })
                    })
                    .collect::<Result<_, _>>()?,
            };

            for instance in &job.instances {
                for dependency in &dependencies {
                    for target in &dependency.instances {
                        graph.add_edge(&instance.name, &target.name)?;
                    }
                }
            }
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::graph::error::CycleError;
    use crate::model::ModelBuilder;

    fn pipeline(yaml: &str) -> Pipeline {
        let doc = Document::from_yaml_str(yaml).unwrap();
        ModelBuilder::new().build(doc.root()).unwrap()
    }

    fn resolve(yaml: &str) -> Result<ExecutionPlan, ResolveError> {
        DependencyGraphResolver::new().resolve(&pipeline(yaml))
    }

    #[test]
    fn test_stages_default_to_previous_stage() {
        let plan = resolve(
            r#"
stages:
  - stage: Build
    jobs: [{job: A, steps: [{script: a}]}]
  - stage: Test
    jobs: [{job: B, steps: [{script: b}]}]
  - stage: Deploy
    jobs: [{job: C, steps: [{script: c}]}]
"#,
        )
        .unwrap();
        assert_eq!(plan.stage_batches, vec![vec!["Build"], vec!["Test"], vec!["Deploy"]]);
    }

    #[test]
    fn test_explicit_empty_depends_on_runs_in_parallel() {
        let plan = resolve(
            r#"
stages:
  - stage: Build
    jobs: []
  - stage: Docs
    dependsOn: []
    jobs: []
  - stage: Release
    dependsOn: [Build, Docs]
    jobs: []
"#,
        )
        .unwrap();
        assert_eq!(plan.stage_batches, vec![vec!["Build", "Docs"], vec!["Release"]]);
    }

    #[test]
    fn test_jobs_without_depends_on_run_together() {
        let plan = resolve(
            r#"
jobs:
  - job: Job1
    steps: [{script: one}]
  - job: Job2
    steps: [{script: two}]
  - job: Job3
    dependsOn: [Job1, Job2]
    steps: [{script: three}]
"#,
        )
        .unwrap();
        assert_eq!(plan.stage_batches, vec![vec!["__default"]]);
        assert_eq!(
            plan.job_batches("__default").unwrap(),
            &[vec!["Job1".to_string(), "Job2".to_string()], vec!["Job3".to_string()]]
        );
    }

    #[test]
    fn test_sequential_jobs_option() {
        let model = pipeline("jobs:\n  - job: A\n    steps: [{script: a}]\n  - job: B\n    steps: [{script: b}]\n");
        let plan = DependencyGraphResolver::new()
            .with_sequential_jobs(true)
            .resolve(&model)
            .unwrap();
        assert_eq!(
            plan.job_batches("__default").unwrap(),
            &[vec!["A".to_string()], vec!["B".to_string()]]
        );
    }

    #[test]
    fn test_matrix_edges_fan_out() {
        let plan = resolve(
            r#"
jobs:
  - job: Build
    strategy:
      matrix:
        linux: { image: ubuntu-latest }
        windows: { image: windows-latest }
    steps: [{script: build}]
  - job: Publish
    dependsOn: Build
    steps: [{script: publish}]
"#,
        )
        .unwrap();
        assert_eq!(
            plan.job_batches("__default").unwrap(),
            &[
                vec!["Build_linux".to_string(), "Build_windows".to_string()],
                vec!["Publish".to_string()]
            ]
        );
    }

    #[test]
    fn test_matrix_instances_inherit_dependencies() {
        let model = pipeline(
            r#"
jobs:
  - job: Setup
    steps: [{script: setup}]
  - job: Test
    dependsOn: Setup
    strategy: { parallel: 2 }
    steps: [{script: test}]
"#,
        );
        let graph = DependencyGraphResolver::new().job_graph(&model.stages[0]).unwrap();
        assert_eq!(graph.dependencies_of("Test_1"), vec!["Setup"]);
        assert_eq!(graph.dependencies_of("Test_2"), vec!["Setup"]);
    }

    #[test]
    fn test_job_cycle() {
        let err = resolve(
            r#"
jobs:
  - job: A
    dependsOn: B
    steps: [{script: a}]
  - job: B
    dependsOn: A
    steps: [{script: b}]
"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::Cycle(CycleError {
                scope: "jobs of stage '__default'".into(),
                cycle: vec!["A".into(), "B".into()],
            })
        );
    }

    #[test]
    fn test_stage_self_reference() {
        let err = resolve("stages:\n  - stage: A\n    dependsOn: [A]\n    jobs: []\n").unwrap_err();
        match err {
            ResolveError::Cycle(cycle) => assert_eq!(cycle.cycle, vec!["A"]),
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_job_dependency() {
        let err = resolve("jobs:\n  - job: A\n    dependsOn: Ghost\n    steps: [{script: a}]\n").unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownDependency {
                scope: "jobs of stage '__default'".into(),
                node: "A".into(),
                dependency: "Ghost".into(),
            }
        );
    }

    #[test]
    fn test_unknown_dependencies_are_all_collected() {
        let model = pipeline(
            r#"
stages:
  - stage: A
    jobs:
      - job: J
        dependsOn: Ghost1
        steps: [{script: j}]
  - stage: B
    dependsOn: [A, Missing]
    jobs:
      - job: K
        dependsOn: [Ghost2]
        steps: [{script: k}]
"#,
        );
        let unknown = DependencyGraphResolver::new().unknown_dependencies(&model);
        let found: Vec<(String, String, String)> = unknown
            .into_iter()
            .map(|e| match e {
                ResolveError::UnknownDependency { scope, node, dependency } => (scope, node, dependency),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            found,
            vec![
                ("jobs of stage 'A'".to_string(), "J".to_string(), "Ghost1".to_string()),
                ("stages".to_string(), "B".to_string(), "Missing".to_string()),
                ("jobs of stage 'B'".to_string(), "K".to_string(), "Ghost2".to_string()),
            ]
        );
    }

    #[test]
    fn test_known_dependencies_pass_the_check() {
        let model = pipeline("jobs:\n  - job: A\n    steps: [{script: a}]\n  - job: b\n    dependsOn: a\n    steps: [{script: b}]\n");
        assert!(DependencyGraphResolver::new().unknown_dependencies(&model).is_empty());
    }

    #[test]
    fn test_duplicate_stage_names() {
        let err = resolve("stages:\n  - stage: Build\n    jobs: []\n  - stage: build\n    jobs: []\n").unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateName { ref name, .. } if name == "build"));
    }
}
