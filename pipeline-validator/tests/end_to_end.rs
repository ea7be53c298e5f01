// End-to-end pipeline analysis
// Validation, expansion, model building and resolution through the public API

use indexmap::IndexMap;
use pipeline_validator::{
    CycleError, DependencyGraphResolver, Document, ExpandError, ModelBuilder, PipelineAnalyzer, ResolveError,
    RuntimeContext, TemplateExpander, TemplateRegistry, Value,
};

fn no_bindings() -> IndexMap<String, Value> {
    IndexMap::new()
}

fn batches(names: &[&[&str]]) -> Vec<Vec<String>> {
    names
        .iter()
        .map(|batch| batch.iter().map(|name| name.to_string()).collect())
        .collect()
}

#[test]
fn test_build_test_deploy_runs_in_three_batches() {
    let registry = TemplateRegistry::new();
    let analysis = PipelineAnalyzer::new(&registry)
        .analyze_yaml(
            r#"
stages:
  - stage: Build
    jobs:
      - job: Compile
        steps:
          - script: cargo build
  - stage: Test
    dependsOn: Build
    jobs:
      - job: Unit
        steps:
          - script: cargo test
  - stage: Deploy
    dependsOn: Test
    jobs:
      - deployment: Ship
        environment: production
        strategy:
          runOnce:
            deploy:
              steps:
                - script: ./deploy.sh
"#,
            &no_bindings(),
        )
        .unwrap();

    assert!(analysis.is_valid(), "{:?}", analysis.result);
    let plan = analysis.plan.unwrap();
    assert_eq!(plan.stage_batches, batches(&[&["Build"], &["Test"], &["Deploy"]]));
    assert_eq!(plan.job_batches("Deploy").unwrap(), batches(&[&["Ship"]]).as_slice());
}

#[test]
fn test_jobs_fan_in() {
    let registry = TemplateRegistry::new();
    let document = Document::from_yaml_str(
        r#"
jobs:
  - job: Job1
    steps: [{script: one}]
  - job: Job2
    steps: [{script: two}]
  - job: Job3
    dependsOn:
      - Job1
      - Job2
    steps: [{script: three}]
"#,
    )
    .unwrap();

    let plan = PipelineAnalyzer::new(&registry).plan(&document, &no_bindings()).unwrap();
    assert_eq!(
        plan.job_batches("__default").unwrap(),
        batches(&[&["Job1", "Job2"], &["Job3"]]).as_slice()
    );
    assert_eq!(plan.batches().len(), 2);
}

#[test]
fn test_two_stage_cycle_is_reported_minimally() {
    let registry = TemplateRegistry::new();
    let analysis = PipelineAnalyzer::new(&registry)
        .analyze_yaml(
            r#"
stages:
  - stage: A
    dependsOn: B
    jobs: []
  - stage: B
    dependsOn: A
    jobs: []
  - stage: C
    jobs: []
"#,
            &no_bindings(),
        )
        .unwrap();

    assert!(analysis.plan.is_none());
    let model = analysis.model.unwrap();
    let err = DependencyGraphResolver::new().resolve(&model).unwrap_err();
    assert_eq!(
        err,
        ResolveError::Cycle(CycleError {
            scope: "stages".into(),
            cycle: vec!["A".into(), "B".into()],
        })
    );
}

#[test]
fn test_self_reference_is_a_one_node_cycle() {
    let document = Document::from_yaml_str("jobs:\n  - job: A\n    dependsOn: A\n    steps: [{script: a}]\n").unwrap();
    let model = ModelBuilder::new().build(document.root()).unwrap();
    match DependencyGraphResolver::new().resolve(&model).unwrap_err() {
        ResolveError::Cycle(cycle) => assert_eq!(cycle.cycle, vec!["A"]),
        other => panic!("expected a cycle, got {:?}", other),
    }
}

/// Every stage depends on an arbitrary subset of the stages before it
#[test]
fn test_backward_dependencies_never_cycle() {
    const STAGES: usize = 4;
    let names: Vec<String> = (0..STAGES).map(|i| format!("S{}", i)).collect();
    // one bitmask of earlier stages per stage; stage i has 2^i choices
    let combinations: usize = (0..STAGES).map(|i| 1usize << i).product();

    for combination in 0..combinations {
        let mut rest = combination;
        let mut yaml = String::from("stages:\n");
        let mut edges = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let choices = 1usize << i;
            let mask = rest % choices;
            rest /= choices;

            let deps: Vec<&str> = (0..i).filter(|j| mask & (1 << j) != 0).map(|j| names[j].as_str()).collect();
            for dep in &deps {
                edges.push((name.clone(), dep.to_string()));
            }
            yaml.push_str(&format!("  - stage: {}\n    dependsOn: [{}]\n    jobs: []\n", name, deps.join(", ")));
        }

        let document = Document::from_yaml_str(&yaml).unwrap();
        let model = ModelBuilder::new().build(document.root()).unwrap();
        let plan = DependencyGraphResolver::new()
            .resolve(&model)
            .unwrap_or_else(|e| panic!("combination {} failed: {}\n{}", combination, e, yaml));

        let batch_of = |stage: &str| {
            plan.stage_batches
                .iter()
                .position(|batch| batch.iter().any(|s| s == stage))
                .unwrap()
        };
        for (stage, dep) in edges {
            assert!(batch_of(&dep) < batch_of(&stage), "{} must run after {}", stage, dep);
        }
        let planned: usize = plan.stage_batches.iter().map(Vec::len).sum();
        assert_eq!(planned, STAGES);
    }
}

#[test]
fn test_independent_jobs_share_a_batch_in_any_order() {
    let orders: [[&str; 3]; 6] = [
        ["A", "B", "C"],
        ["A", "C", "B"],
        ["B", "A", "C"],
        ["B", "C", "A"],
        ["C", "A", "B"],
        ["C", "B", "A"],
    ];
    for order in orders {
        let yaml: String = std::iter::once("jobs:\n".to_string())
            .chain(
                order
                    .iter()
                    .map(|name| format!("  - job: {}\n    steps: [{{script: run}}]\n", name)),
            )
            .collect();
        let document = Document::from_yaml_str(&yaml).unwrap();
        let model = ModelBuilder::new().build(document.root()).unwrap();
        let plan = DependencyGraphResolver::new().resolve(&model).unwrap();

        let job_batches = plan.job_batches("__default").unwrap();
        assert_eq!(job_batches.len(), 1);
        assert_eq!(job_batches[0], order.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }
}

#[test]
fn test_expanding_an_expanded_document_changes_nothing() {
    let registry = TemplateRegistry::new()
        .with_yaml(
            "steps/build.yml",
            r#"
parameters:
  - name: targets
    type: object
    default: [linux, windows]
steps:
  - ${{ each target in parameters.targets }}:
    - script: cargo build --target ${{ target }}
"#,
        )
        .unwrap();
    let document = Document::from_yaml_str("steps:\n  - template: steps/build.yml\n  - script: echo $(Build.BuildId)\n").unwrap();

    let expander = TemplateExpander::new(&registry);
    let once = expander.expand(&document, &no_bindings()).unwrap();
    let twice = expander.expand(&once.document, &no_bindings()).unwrap();
    assert_eq!(once.document, twice.document);
    assert!(twice.templates.is_empty());
}

#[test]
fn test_missing_parameter_and_default() {
    let registry = TemplateRegistry::new()
        .with_yaml(
            "deploy.yml",
            r#"
parameters:
  - name: environment
    type: string
  - name: region
    type: string
    default: westeurope
steps:
  - script: deploy ${{ parameters.environment }} ${{ parameters.region }}
"#,
        )
        .unwrap();
    let expander = TemplateExpander::new(&registry);

    let missing = Document::from_yaml_str("steps:\n  - template: deploy.yml\n").unwrap();
    match expander.expand(&missing, &no_bindings()).unwrap_err() {
        ExpandError::MissingParameter { name, .. } => assert_eq!(name, "environment"),
        other => panic!("expected a missing parameter, got {:?}", other),
    }

    let given = Document::from_yaml_str("steps:\n  - template: deploy.yml\n    parameters:\n      environment: prod\n").unwrap();
    let expanded = expander.expand(&given, &no_bindings()).unwrap();
    let steps = expanded.root().get("steps").and_then(|s| s.as_sequence()).unwrap();
    assert_eq!(
        steps[0].get("script").and_then(|s| s.scalar_text()).as_deref(),
        Some("deploy prod westeurope")
    );
}

#[test]
fn test_pipeline_parameters_are_bound_by_the_caller() {
    let registry = TemplateRegistry::new();
    let mut bindings = IndexMap::new();
    bindings.insert("runTests".to_string(), Value::from(false));

    let analysis = PipelineAnalyzer::new(&registry)
        .analyze_yaml(
            r#"
parameters:
  - name: runTests
    type: boolean
    default: true
jobs:
  - job: Build
    steps: [{script: build}]
  - ${{ if parameters.runTests }}:
    - job: Test
      dependsOn: Build
      steps: [{script: test}]
"#,
            &bindings,
        )
        .unwrap();

    assert!(analysis.is_valid(), "{:?}", analysis.result);
    assert_eq!(analysis.expanded.parameters.get("runTests"), Some(&Value::Bool(false)));
    assert_eq!(
        analysis.plan.unwrap().job_batches("__default").unwrap(),
        batches(&[&["Build"]]).as_slice()
    );
}

#[test]
fn test_extends_template_wraps_the_pipeline() {
    let registry = TemplateRegistry::new()
        .with_yaml(
            "pipelines/base.yml",
            r#"
parameters:
  - name: buildSteps
    type: stepList
    default: []
stages:
  - stage: Build
    jobs:
      - job: Build
        steps:
          - script: echo setup
          - ${{ parameters.buildSteps }}
  - stage: Publish
    jobs:
      - job: Publish
        steps:
          - script: echo publish
"#,
        )
        .unwrap();

    let analysis = PipelineAnalyzer::new(&registry)
        .analyze_yaml(
            r#"
trigger: [main]
extends:
  template: pipelines/base.yml
  parameters:
    buildSteps:
      - script: cargo build
"#,
            &no_bindings(),
        )
        .unwrap();

    assert!(analysis.is_valid(), "{:?}", analysis.result);
    assert!(analysis.expanded.root().get("trigger").is_some());
    assert!(analysis.expanded.root().get("extends").is_none());

    let model = analysis.model.unwrap();
    let build = model.stage("Build").and_then(|s| s.job("Build")).unwrap();
    let scripts: Vec<_> = build.steps.iter().filter_map(|s| s.script_body()).collect();
    assert_eq!(scripts, vec!["echo setup", "cargo build"]);
    assert_eq!(
        analysis.plan.unwrap().stage_batches,
        batches(&[&["Build"], &["Publish"]])
    );
}

#[test]
fn test_lenient_analysis_reports_every_broken_reference() {
    let registry = TemplateRegistry::new()
        .with_yaml("ok.yml", "steps:\n  - script: fine\n")
        .unwrap();
    let analysis = PipelineAnalyzer::new(&registry)
        .analyze_yaml(
            r#"
jobs:
  - job: A
    steps:
      - template: gone.yml
      - template: ok.yml
  - job: B
    steps:
      - template: also-gone.yml
"#,
            &no_bindings(),
        )
        .unwrap();

    assert!(!analysis.is_valid());
    let paths: Vec<String> = analysis.result.errors().map(|d| d.path.to_string()).collect();
    assert_eq!(
        paths,
        vec!["jobs[0].steps[0].template", "jobs[1].steps[0].template"]
    );
    assert_eq!(analysis.expanded.templates, vec!["ok.yml"]);
}

#[test]
fn test_runtime_values_are_rejected_at_expansion_time() {
    let registry = TemplateRegistry::new();
    let analysis = PipelineAnalyzer::new(&registry)
        .analyze_yaml(
            r###"
steps:
  - bash: echo "##vso[task.setvariable variable=version]1.0"
  - script: echo ${{ variables.version }}
"###,
            &no_bindings(),
        )
        .unwrap();

    assert!(analysis.plan.is_none());
    let error = analysis.result.errors().next().unwrap();
    assert_eq!(error.path.to_string(), "steps[1].script");
    assert!(error.message.contains("only available at runtime"));
}

#[test]
fn test_conditions_evaluate_against_run_state() {
    let registry = TemplateRegistry::new();
    let analysis = PipelineAnalyzer::new(&registry)
        .analyze_yaml(
            r#"
stages:
  - stage: Build
    jobs: [{job: Compile, steps: [{script: make}]}]
  - stage: Release
    condition: and(succeeded(), eq(variables['Build.SourceBranch'], 'refs/heads/main'))
    jobs: [{job: Ship, steps: [{script: ship}]}]
"#,
            &no_bindings(),
        )
        .unwrap();
    assert!(analysis.is_valid(), "{:?}", analysis.result);

    let model = analysis.model.unwrap();
    let condition = model.stage("Release").and_then(|s| s.condition.as_ref()).unwrap();
    let main = RuntimeContext::new().with_variable("Build.SourceBranch", "refs/heads/main");
    let topic = RuntimeContext::new().with_variable("Build.SourceBranch", "refs/heads/topic");
    assert!(condition.evaluate(&main).unwrap());
    assert!(!condition.evaluate(&topic).unwrap());
}

#[test]
fn test_matrix_jobs_fan_out_in_the_plan() {
    let registry = TemplateRegistry::new();
    let analysis = PipelineAnalyzer::new(&registry)
        .analyze_yaml(
            r#"
jobs:
  - job: Test
    strategy:
      matrix:
        stable: { toolchain: stable }
        nightly: { toolchain: nightly }
    steps:
      - script: rustup run $(toolchain) cargo test
  - job: Report
    dependsOn: Test
    steps: [{script: report}]
"#,
            &no_bindings(),
        )
        .unwrap();

    assert!(analysis.is_valid(), "{:?}", analysis.result);
    let job = analysis.model.as_ref().and_then(|m| m.stages[0].job("Test")).unwrap();
    assert!(job.is_multiplied());
    assert_eq!(job.instances[1].variables.get("toolchain"), Some(&Value::from("nightly")));
    assert_eq!(
        analysis.plan.unwrap().job_batches("__default").unwrap(),
        batches(&[&["Test_stable", "Test_nightly"], &["Report"]]).as_slice()
    );
}
