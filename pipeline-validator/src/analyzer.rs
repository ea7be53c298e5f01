// Pipeline Analyzer
// Runs validation, template expansion, model building and dependency
// resolution over one document, collecting every finding

use crate::config::ValidatorConfig;
use crate::document::{Document, NodePath};
use crate::error::{ValidatorError, ValidatorResult};
use crate::expression::Value;
use crate::graph::{job_scope, DependencyGraphResolver, ExecutionPlan, ResolveError, STAGE_SCOPE};
use crate::model::{ModelBuilder, ModelError, Pipeline};
use crate::schema::{Diagnostic, NodeKind, SchemaValidator, ValidationResult};
use crate::template::{ExpandError, ExpandFailure, ExpandedDocument, TemplateExpander, TemplateSource};

use indexmap::IndexMap;
use serde_json::json;
use tracing::{debug, warn};

/// Outcome of analyzing one pipeline document
#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: ValidationResult,
    pub expanded: ExpandedDocument,
    /// Present once validation and expansion produced no errors
    pub model: Option<Pipeline>,
    /// Present only when the whole pipeline resolved without a cycle
    pub plan: Option<ExecutionPlan>,
}

impl Analysis {
    pub fn is_valid(&self) -> bool {
        !self.result.has_errors() && self.plan.is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&json!({
            "valid": self.is_valid(),
            "diagnostics": self.result.diagnostics,
            "plan": self.plan,
        }))
    }
}

pub struct PipelineAnalyzer<'s> {
    source: &'s dyn TemplateSource,
    config: ValidatorConfig,
}

impl<'s> PipelineAnalyzer<'s> {
    pub fn new(source: &'s dyn TemplateSource) -> Self {
        Self::with_config(source, ValidatorConfig::default())
    }

    pub fn with_config(source: &'s dyn TemplateSource, config: ValidatorConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Parse YAML text and analyze it
    pub fn analyze_yaml(&self, content: &str, bindings: &IndexMap<String, Value>) -> ValidatorResult<Analysis> {
        let document = Document::from_yaml_str(content)?;
        Ok(self.analyze(&document, bindings))
    }

    /// Validate, expand, validate the expansion, build the model and resolve it.
    /// Each phase runs only when the previous one produced no errors.
    pub fn analyze(&self, document: &Document, bindings: &IndexMap<String, Value>) -> Analysis {
        let validator = SchemaValidator::with_config(&self.config);
        let mut result = validator.validate(document.root(), NodeKind::Pipeline);
        debug!(
            "Schema validation found {} diagnostic(s) before expansion",
            result.diagnostics.len()
        );

        let report = TemplateExpander::with_config(self.source, &self.config).expand_lenient(document, bindings);
        for failure in &report.failures {
            result.push(expansion_diagnostic(failure));
        }

        let expanded = report.expanded;
        if expanded.document != *document {
            // Findings in text the expansion left untouched are already reported
            for diagnostic in validator.validate(expanded.root(), NodeKind::Pipeline).diagnostics {
                if !result.diagnostics.contains(&diagnostic) {
                    result.push(diagnostic);
                }
            }
        }

        let mut analysis = Analysis {
            result,
            expanded,
            model: None,
            plan: None,
        };
        if analysis.result.has_errors() {
            warn!(
                "Pipeline has {} error(s); skipping dependency resolution",
                analysis.result.errors().count()
            );
            return analysis;
        }

        let model = match ModelBuilder::with_config(&self.config).build(analysis.expanded.root()) {
            Ok(model) => model,
            Err(e) => {
                analysis.result.push(model_diagnostic(&e));
                return analysis;
            }
        };

        let resolver = DependencyGraphResolver::with_config(&self.config);
        let unknown = resolver.unknown_dependencies(&model);
        if !unknown.is_empty() {
            warn!("Pipeline has {} unknown dependsOn reference(s)", unknown.len());
            for error in &unknown {
                analysis.result.push(resolve_diagnostic(&model, error));
            }
            analysis.model = Some(model);
            return analysis;
        }

        match resolver.resolve(&model) {
            Ok(plan) => {
                debug!("Resolved execution plan with {} stage batch(es)", plan.stage_batches.len());
                analysis.plan = Some(plan);
            }
            Err(e) => analysis.result.push(resolve_diagnostic(&model, &e)),
        }
        analysis.model = Some(model);
        analysis
    }

    /// Analyze and return the plan, failing on the first error found
    pub fn plan(&self, document: &Document, bindings: &IndexMap<String, Value>) -> ValidatorResult<ExecutionPlan> {
        let analysis = self.analyze(document, bindings);
        match analysis.plan {
            Some(plan) if !analysis.result.has_errors() => Ok(plan),
            _ => {
                let count = analysis.result.errors().count();
                let first = analysis
                    .result
                    .errors()
                    .next()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                Err(ValidatorError::Invalid { count, first })
            }
        }
    }
}

fn expansion_diagnostic(failure: &ExpandFailure) -> Diagnostic {
    let message = match &failure.template {
        Some(template) => format!("in template '{}': {}", template, failure.error),
        None => failure.error.to_string(),
    };
    let diagnostic = Diagnostic::error(message, failure.path.clone());

    match &failure.error {
        ExpandError::MissingParameter { name, .. } => {
            diagnostic.with_suggestion(format!("pass a value for '{}' or give it a default", name))
        }
        ExpandError::TemplateNotFound { .. } => {
            diagnostic.with_suggestion("check the template path and that the template is registered")
        }
        ExpandError::TemplateCycle { .. } => diagnostic.with_suggestion("remove one of the references in the cycle"),
        ExpandError::TemplateDepthExceeded { .. } => {
            diagnostic.with_suggestion("flatten the template nesting or raise maxTemplateDepth")
        }
        _ => diagnostic,
    }
}

fn model_diagnostic(error: &ModelError) -> Diagnostic {
    let path = error.path().cloned().unwrap_or_else(NodePath::root);
    let diagnostic = Diagnostic::error(error.to_string(), path);
    match error {
        ModelError::TooManyInstances { .. } => diagnostic.with_suggestion("reduce the matrix or raise maxMatrixInstances"),
        _ => diagnostic,
    }
}

fn resolve_diagnostic(model: &Pipeline, error: &ResolveError) -> Diagnostic {
    let (scope, named) = match error {
        ResolveError::Cycle(cycle) => (&cycle.scope, cycle.cycle.first()),
        ResolveError::UnknownDependency { scope, node, .. } => (scope, Some(node)),
        ResolveError::DuplicateName { scope, name } => (scope, Some(name)),
    };
    let path = named
        .and_then(|name| locate(model, scope, name))
        .map(|path| match error {
            ResolveError::DuplicateName { .. } => path,
            _ => path.key("dependsOn"),
        })
        .unwrap_or_else(NodePath::root);

    let diagnostic = Diagnostic::error(error.to_string(), path);
    match error {
        ResolveError::Cycle(_) => diagnostic.with_suggestion("remove one of the dependsOn entries in the cycle"),
        ResolveError::UnknownDependency { .. } => {
            diagnostic.with_suggestion("dependsOn may only name stages, or jobs of the same stage")
        }
        ResolveError::DuplicateName { .. } => diagnostic,
    }
}

/// Document location of a stage, job or job instance named within `scope`
fn locate(model: &Pipeline, scope: &str, name: &str) -> Option<NodePath> {
    if scope == STAGE_SCOPE {
        return model
            .stage(name)
            .filter(|stage| !stage.is_implicit())
            .map(|stage| stage.path.clone());
    }
    model
        .stages
        .iter()
        .find(|stage| job_scope(stage) == scope)?
        .jobs
        .iter()
        .find(|job| {
            job.name.eq_ignore_ascii_case(name)
                || job.instances.iter().any(|i| i.name.eq_ignore_ascii_case(name))
        })
        .map(|job| job.path.clone())
}
