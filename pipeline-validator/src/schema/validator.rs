// Schema Validator
// Checks a document tree against the recognized pipeline shape and collects
// every finding instead of stopping at the first one

use crate::config::ValidatorConfig;
use crate::document::{Node, NodePath};
use crate::expression::{check_functions, parse_expression};
use crate::schema::diagnostic::{Diagnostic, ValidationResult};
use crate::schema::rules::{is_directive_key, NodeKind, PARAMETER_TYPES, STEP_ACTIONS};
use crate::template::directive::Directive;

use indexmap::IndexMap;

use std::collections::HashSet;

type Mapping = IndexMap<String, Node>;

/// Validator for raw and expanded pipeline documents
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    warn_unknown_keys: bool,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            warn_unknown_keys: true,
        }
    }

    pub fn with_config(config: &ValidatorConfig) -> Self {
        Self {
            warn_unknown_keys: config.warn_unknown_keys,
        }
    }

    /// Validate `node` as the given kind, reporting paths relative to it
    pub fn validate(&self, node: &Node, kind: NodeKind) -> ValidationResult {
        self.validate_at(node, kind, &NodePath::root())
    }

    /// Validate a subtree, reporting paths below `path`
    pub fn validate_at(&self, node: &Node, kind: NodeKind, path: &NodePath) -> ValidationResult {
        let mut out = ValidationResult::new();
        match kind {
            NodeKind::Pipeline => self.check_pipeline(node, path, &mut out),
            NodeKind::Stage => self.check_stage(node, path, &mut out),
            NodeKind::Job => self.check_job(node, path, &mut out),
            NodeKind::DeploymentJob => self.check_job(node, path, &mut out),
            NodeKind::Step => self.check_step(node, path, &mut out),
            NodeKind::TemplateCall => {
                if let Some(map) = self.mapping(node, kind, path, &mut out) {
                    self.check_template_call(map, path, &mut out);
                }
            }
            NodeKind::Variable => self.check_variable_item(node, path, &mut out),
            NodeKind::Parameter => self.check_parameter(node, path, &mut out),
            NodeKind::Strategy => self.check_strategy(node, path, false, &mut out),
        }
        out
    }

    // =========================================================================
    // Pipeline / Stage / Job
    // =========================================================================

    fn check_pipeline(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        let Some(map) = self.mapping(node, NodeKind::Pipeline, path, out) else {
            return;
        };
        self.check_keys(map, NodeKind::Pipeline, path, out);

        let bodies: Vec<&str> = ["stages", "jobs", "steps"]
            .into_iter()
            .filter(|k| map.contains_key(*k))
            .collect();
        if bodies.len() > 1 {
            out.push(
                Diagnostic::error(
                    format!("pipeline defines both {}", bodies.join(" and ")),
                    path.clone(),
                )
                .with_suggestion("use exactly one of 'stages:', 'jobs:' or 'steps:'"),
            );
        }
        if bodies.is_empty() && !map.contains_key("extends") && !has_directive(map) {
            out.push(
                Diagnostic::error("pipeline must have stages, jobs, steps, or extends", path.clone())
                    .with_suggestion("add 'steps:' with at least one script or task"),
            );
        }

        if let Some(extends) = map.get("extends") {
            let extends_path = path.key("extends");
            if let Some(ext) = self.mapping(extends, NodeKind::TemplateCall, &extends_path, out) {
                self.check_template_call(ext, &extends_path, out);
            }
        }
        if let Some(stages) = map.get("stages") {
            self.check_stages(stages, &path.key("stages"), out);
        }
        if let Some(jobs) = map.get("jobs") {
            self.check_jobs(jobs, &path.key("jobs"), out);
        }
        if let Some(steps) = map.get("steps") {
            self.check_list(steps, "steps", &path.key("steps"), out, Self::check_step);
        }
        if let Some(strategy) = map.get("strategy") {
            self.check_strategy(strategy, &path.key("strategy"), false, out);
        }
        self.check_common(map, path, out);
        if let Some(parameters) = map.get("parameters") {
            self.check_parameters(parameters, &path.key("parameters"), out);
        }
    }

    fn check_stages(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        self.check_list(node, "stages", path, out, Self::check_stage);
        check_unique(node, &["stage"], "stage", "the pipeline", path, out);
    }

    fn check_jobs(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        self.check_list(node, "jobs", path, out, Self::check_job);
        check_unique(node, &["job", "deployment"], "job", "the stage", path, out);
    }

    fn check_stage(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        let Some(map) = self.mapping(node, NodeKind::Stage, path, out) else {
            return;
        };
        if map.contains_key("template") {
            self.check_template_call(map, path, out);
            return;
        }

        self.check_keys(map, NodeKind::Stage, path, out);
        match map.get("stage") {
            Some(name) => check_name(name, "stage", &path.key("stage"), out),
            None => out.push(
                Diagnostic::error("stage must have 'stage:' or 'template:'", path.clone())
                    .with_suggestion("add 'stage: MyStageName' to identify this stage"),
            ),
        }

        match map.get("jobs") {
            Some(jobs) => self.check_jobs(jobs, &path.key("jobs"), out),
            None if !has_directive(map) => out.push(
                Diagnostic::error("stage must have jobs or reference a template", path.clone())
                    .with_suggestion("add 'jobs:' or 'template:' to the stage"),
            ),
            None => {}
        }
        self.check_common(map, path, out);
    }

    fn check_job(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        let Some(map) = self.mapping(node, NodeKind::Job, path, out) else {
            return;
        };
        if map.contains_key("template") {
            self.check_template_call(map, path, out);
            return;
        }

        let deployment = map.contains_key("deployment");
        let kind = if deployment {
            NodeKind::DeploymentJob
        } else {
            NodeKind::Job
        };
        self.check_keys(map, kind, path, out);

        match map.get("deployment").or_else(|| map.get("job")) {
            Some(name) => check_name(name, "job", &path.key(if deployment { "deployment" } else { "job" }), out),
            None => out.push(
                Diagnostic::error("job must have 'job:', 'deployment:', or 'template:'", path.clone())
                    .with_suggestion("add 'job: MyJobName' to identify this job"),
            ),
        }

        match map.get("steps") {
            Some(steps) if !deployment => {
                self.check_list(steps, "steps", &path.key("steps"), out, Self::check_step)
            }
            None if !deployment && !has_directive(map) => out.push(
                Diagnostic::error("job must have steps", path.clone())
                    .with_suggestion("add 'steps:' to define what the job should do"),
            ),
            _ => {}
        }

        match map.get("strategy") {
            Some(strategy) => self.check_strategy(strategy, &path.key("strategy"), deployment, out),
            None if deployment && !has_directive(map) => out.push(
                Diagnostic::error("deployment job must have a strategy", path.clone())
                    .with_suggestion("add 'strategy: { runOnce: { deploy: { steps: [...] } } }'"),
            ),
            None => {}
        }

        if let Some(value) = map.get("continueOnError") {
            check_boolean(value, &path.key("continueOnError"), out);
        }
        self.check_common(map, path, out);
    }

    /// Keys shared by pipelines, stages and jobs
    fn check_common(&self, map: &Mapping, path: &NodePath, out: &mut ValidationResult) {
        if let Some(depends_on) = map.get("dependsOn") {
            check_depends_on(depends_on, &path.key("dependsOn"), out);
        }
        if let Some(condition) = map.get("condition") {
            check_condition(condition, &path.key("condition"), out);
        }
        if let Some(timeout) = map.get("timeoutInMinutes") {
            check_number(timeout, &path.key("timeoutInMinutes"), out);
        }
        if let Some(variables) = map.get("variables") {
            self.check_variables(variables, &path.key("variables"), out);
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    fn check_step(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        let Some(map) = self.mapping(node, NodeKind::Step, path, out) else {
            return;
        };

        let actions: Vec<&str> = STEP_ACTIONS
            .iter()
            .copied()
            .filter(|a| map.contains_key(*a))
            .collect();

        match actions.as_slice() {
            [] if has_directive(map) => {}
            [] => out.push(
                Diagnostic::error(
                    format!("step must have exactly one of {}", STEP_ACTIONS.join(", ")),
                    path.clone(),
                )
                .with_suggestion("add 'script:' or 'task:' to the step"),
            ),
            ["template"] => {
                self.check_template_call(map, path, out);
                return;
            }
            [_] => {}
            many => out.push(
                Diagnostic::error(
                    format!("step defines multiple actions: {}", many.join(", ")),
                    path.clone(),
                )
                .with_suggestion("split it into one step per action"),
            ),
        }

        self.check_keys(map, NodeKind::Step, path, out);

        for action in ["script", "bash", "pwsh", "powershell"] {
            if let Some(body) = map.get(action) {
                if body.scalar_text().is_none() {
                    out.error(format!("'{}' must be a string", action), path.key(action));
                }
            }
        }

        if let Some(task) = map.get("task") {
            check_task_reference(task, &path.key("task"), out);
        }
        if let Some(name) = map.get("name") {
            check_name(name, "step", &path.key("name"), out);
        }
        if let Some(condition) = map.get("condition") {
            check_condition(condition, &path.key("condition"), out);
        }
        if let Some(timeout) = map.get("timeoutInMinutes") {
            check_number(timeout, &path.key("timeoutInMinutes"), out);
        }
        for key in ["enabled", "continueOnError"] {
            if let Some(value) = map.get(key) {
                check_boolean(value, &path.key(key), out);
            }
        }
        for key in ["inputs", "env"] {
            if let Some(value) = map.get(key) {
                check_scalar_mapping(value, key, &path.key(key), out);
            }
        }
    }

    // =========================================================================
    // Templates / Strategy / Variables / Parameters
    // =========================================================================

    fn check_template_call(&self, map: &Mapping, path: &NodePath, out: &mut ValidationResult) {
        self.check_keys(map, NodeKind::TemplateCall, path, out);

        match map.get("template").and_then(Node::as_str) {
            Some(name) if !name.trim().is_empty() => {}
            _ => out.error("'template' must name a template", path.key("template")),
        }
        if let Some(parameters) = map.get("parameters") {
            if parameters.as_mapping().is_none() && !parameters.is_null() && !is_expression(parameters) {
                out.error(
                    format!("template parameters must be a mapping, found {}", parameters.kind_name()),
                    path.key("parameters"),
                );
            }
        }
    }

    fn check_strategy(&self, node: &Node, path: &NodePath, deployment: bool, out: &mut ValidationResult) {
        let Some(map) = self.mapping(node, NodeKind::Strategy, path, out) else {
            return;
        };
        self.check_keys(map, NodeKind::Strategy, path, out);

        let lifecycles: Vec<&str> = ["runOnce", "rolling", "canary"]
            .into_iter()
            .filter(|k| map.contains_key(*k))
            .collect();

        if deployment {
            if lifecycles.len() != 1 && !has_directive(map) {
                out.error(
                    "deployment strategy must define exactly one of runOnce, rolling or canary",
                    path.clone(),
                );
            }
            for lifecycle in &lifecycles {
                self.check_lifecycle(&map[*lifecycle], &path.key(*lifecycle), out);
            }
        } else {
            for lifecycle in &lifecycles {
                out.push(
                    Diagnostic::error(
                        format!("'{}' is only valid for deployment jobs", lifecycle),
                        path.key(*lifecycle),
                    )
                    .with_suggestion("use 'deployment:' instead of 'job:'"),
                );
            }
        }

        if map.contains_key("matrix") && map.contains_key("parallel") {
            out.error("strategy cannot combine 'matrix' and 'parallel'", path.clone());
        }

        if let Some(matrix) = map.get("matrix") {
            let matrix_path = path.key("matrix");
            match matrix.as_mapping() {
                Some(cells) => {
                    for (cell, vars) in cells {
                        if is_directive_key(cell) {
                            continue;
                        }
                        if vars.as_mapping().is_none() && !is_expression(vars) {
                            out.error(
                                format!("matrix entry '{}' must be a mapping of variables", cell),
                                matrix_path.key(cell),
                            );
                        }
                    }
                }
                None if is_expression(matrix) => {}
                None => out.error("'matrix' must be a mapping", matrix_path),
            }
        }

        if let Some(parallel) = map.get("parallel") {
            match parallel.as_number() {
                Some(n) if n >= 1.0 && n.fract() == 0.0 => {}
                None if is_expression(parallel) => {}
                _ => out.error("'parallel' must be a positive whole number", path.key("parallel")),
            }
        }
        if let Some(max) = map.get("maxParallel") {
            check_number(max, &path.key("maxParallel"), out);
        }
    }

    /// Lifecycle hooks of a deployment strategy each carry their own steps
    fn check_lifecycle(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        let Some(hooks) = node.as_mapping() else {
            if !node.is_null() && !is_expression(node) {
                out.error("deployment lifecycle must be a mapping", path.clone());
            }
            return;
        };

        for (hook, body) in hooks {
            let hook_path = path.key(hook);
            let bodies: Vec<(&str, &Node)> = if hook == "on" {
                body.as_mapping()
                    .map(|m| m.iter().map(|(k, v)| (k.as_str(), v)).collect())
                    .unwrap_or_default()
            } else {
                vec![("", body)]
            };
            for (name, body) in bodies {
                let body_path = if name.is_empty() { hook_path.clone() } else { hook_path.key(name) };
                if let Some(steps) = body.get("steps") {
                    self.check_list(steps, "steps", &body_path.key("steps"), out, Self::check_step);
                }
            }
        }
    }

    fn check_variables(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        match node {
            Node::Mapping(map) => {
                for (name, value) in map {
                    if is_directive_key(name) {
                        continue;
                    }
                    if value.as_scalar().is_none() {
                        out.error(
                            format!("variable '{}' must have a scalar value", name),
                            path.key(name),
                        );
                    } else {
                        check_runtime_value(value, &path.key(name), out);
                    }
                }
            }
            Node::Sequence(_) => {
                self.check_list(node, "variables", path, out, Self::check_variable_item)
            }
            _ if node.is_null() || is_expression(node) => {}
            _ => out.error(
                format!("'variables' must be a mapping or a sequence, found {}", node.kind_name()),
                path.clone(),
            ),
        }
    }

    fn check_variable_item(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        let Some(map) = self.mapping(node, NodeKind::Variable, path, out) else {
            return;
        };
        if map.contains_key("template") {
            self.check_template_call(map, path, out);
            return;
        }
        self.check_keys(map, NodeKind::Variable, path, out);

        match (map.get("name"), map.get("group")) {
            (Some(_), Some(_)) => out.error("variable cannot have both 'name' and 'group'", path.clone()),
            (None, None) => out.push(
                Diagnostic::error("variable must have 'name', 'group' or 'template'", path.clone())
                    .with_suggestion("use '- name: MyVar' with 'value:'"),
            ),
            (Some(name), None) => match map.get("value") {
                Some(value) if value.as_scalar().is_some() => {
                    check_runtime_value(value, &path.key("value"), out)
                }
                Some(_) => out.error("variable value must be a scalar", path.key("value")),
                None => out.error(
                    format!("variable '{}' has no value", name.scalar_text().unwrap_or_default()),
                    path.clone(),
                ),
            },
            (None, Some(group)) => {
                if group.as_str().map_or(true, |g| g.trim().is_empty()) {
                    out.error("'group' must name a variable group", path.key("group"));
                }
            }
        }
        if let Some(readonly) = map.get("readonly") {
            check_boolean(readonly, &path.key("readonly"), out);
        }
    }

    fn check_parameters(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        match node {
            Node::Sequence(_) => {
                self.check_list(node, "parameters", path, out, Self::check_parameter);
                check_unique(node, &["name"], "parameter", "the declaration", path, out);
            }
            // `name: default` form, accepted in template files
            Node::Mapping(_) => {}
            _ if node.is_null() => {}
            _ => out.error(
                format!("'parameters' must be a sequence, found {}", node.kind_name()),
                path.clone(),
            ),
        }
    }

    fn check_parameter(&self, node: &Node, path: &NodePath, out: &mut ValidationResult) {
        let Some(map) = self.mapping(node, NodeKind::Parameter, path, out) else {
            return;
        };
        self.check_keys(map, NodeKind::Parameter, path, out);

        if map.get("name").and_then(Node::scalar_text).is_none() {
            out.error("parameter must have a 'name'", path.clone());
        }
        if let Some(ty) = map.get("type") {
            let ty_text = ty.as_str().unwrap_or_default();
            if !PARAMETER_TYPES.contains(&ty_text) {
                let mut diag = Diagnostic::error(
                    format!("unknown parameter type '{}'", ty.scalar_text().unwrap_or_default()),
                    path.key("type"),
                );
                if let Some(known) = PARAMETER_TYPES.iter().find(|t| t.eq_ignore_ascii_case(ty_text)) {
                    diag = diag.with_suggestion(format!("did you mean '{}'?", known));
                }
                out.push(diag);
            }
        }
        if let Some(values) = map.get("values") {
            if values.as_sequence().is_none() {
                out.error("'values' must be a sequence", path.key("values"));
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// The node as a mapping, or an error when it is some other shape.
    /// Expression scalars are left for expansion to resolve.
    fn mapping<'n>(
        &self,
        node: &'n Node,
        kind: NodeKind,
        path: &NodePath,
        out: &mut ValidationResult,
    ) -> Option<&'n Mapping> {
        match node {
            Node::Mapping(map) => Some(map),
            _ if is_expression(node) => None,
            other => {
                out.error(
                    format!("expected a mapping for {}, found {}", kind, other.kind_name()),
                    path.clone(),
                );
                None
            }
        }
    }

    /// Compare keys against the recognized set for `kind`
    fn check_keys(&self, map: &Mapping, kind: NodeKind, path: &NodePath, out: &mut ValidationResult) {
        for (key, value) in map {
            if is_directive_key(key) {
                let key_path = path.key(key);
                if let Some(Err(e)) = Directive::parse(key) {
                    out.error(e.to_string(), key_path.clone());
                }
                // Conditional keys hold more keys of the same node
                if let Some(inner) = value.as_mapping() {
                    self.check_keys(inner, kind, &key_path, out);
                }
                continue;
            }

            if !self.warn_unknown_keys || kind.is_known(key) {
                continue;
            }
            let mut diag = Diagnostic::warning(format!("unknown key '{}' for {}", key, kind), path.key(key));
            if let Some(known) = kind.case_insensitive_match(key) {
                diag = diag.with_suggestion(format!("did you mean '{}'?", known));
            }
            out.push(diag);
        }
    }

    /// Check each item of a list, descending into directive entries
    fn check_list(
        &self,
        node: &Node,
        field: &str,
        path: &NodePath,
        out: &mut ValidationResult,
        check_item: fn(&Self, &Node, &NodePath, &mut ValidationResult),
    ) {
        let items = match node {
            Node::Sequence(items) => items,
            _ if node.is_null() || is_expression(node) => return,
            other => {
                out.error(
                    format!("'{}' must be a sequence, found {}", field, other.kind_name()),
                    path.clone(),
                );
                return;
            }
        };

        for (i, item) in items.iter().enumerate() {
            let item_path = path.index(i);
            match directive_entries(item) {
                Some(entries) => {
                    for (key, body) in entries {
                        let body_path = item_path.key(key);
                        if let Some(Err(e)) = Directive::parse(key) {
                            out.error(e.to_string(), body_path.clone());
                        }
                        match body {
                            Node::Sequence(_) => self.check_list(body, field, &body_path, out, check_item),
                            Node::Mapping(_) => check_item(self, body, &body_path, out),
                            _ => {}
                        }
                    }
                }
                None => check_item(self, item, &item_path, out),
            }
        }
    }
}

/// A list item made only of directive keys
fn directive_entries(item: &Node) -> Option<Vec<(&String, &Node)>> {
    let map = item.as_mapping()?;
    if map.is_empty() || !map.keys().all(|k| is_directive_key(k)) {
        return None;
    }
    Some(map.iter().collect())
}

fn has_directive(map: &Mapping) -> bool {
    map.keys().any(|k| is_directive_key(k))
}

/// A scalar still waiting for `${{ }}` substitution
fn is_expression(node: &Node) -> bool {
    node.as_str().map_or(false, |s| s.contains("${{"))
}

fn check_unique(
    node: &Node,
    name_keys: &[&str],
    what: &str,
    scope: &str,
    path: &NodePath,
    out: &mut ValidationResult,
) {
    let Some(items) = node.as_sequence() else {
        return;
    };

    let mut seen = HashSet::new();
    for (i, item) in items.iter().enumerate() {
        let Some(name) = name_keys
            .iter()
            .find_map(|k| item.get(k))
            .and_then(Node::scalar_text)
        else {
            continue;
        };
        if name.contains("${{") {
            continue;
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            out.push(
                Diagnostic::error(format!("duplicate {} name '{}'", what, name), path.index(i))
                    .with_suggestion(format!("{} names must be unique within {}", what, scope)),
            );
        }
    }
}

/// Stage, job and step names are identifiers
fn check_name(node: &Node, what: &str, path: &NodePath, out: &mut ValidationResult) {
    let Some(name) = node.scalar_text() else {
        out.error(format!("{} name must be a string", what), path.clone());
        return;
    };
    if name.contains("${{") {
        return;
    }
    let valid = name
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        out.push(
            Diagnostic::error(format!("invalid {} name '{}'", what, name), path.clone())
                .with_suggestion("names may only contain letters, digits and '_', and cannot start with a digit"),
        );
    }
}

fn check_depends_on(node: &Node, path: &NodePath, out: &mut ValidationResult) {
    match node {
        Node::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                if item.as_str().is_none() && directive_entries(item).is_none() {
                    out.error(
                        format!("dependsOn entries must be names, found {}", item.kind_name()),
                        path.index(i),
                    );
                }
            }
        }
        _ if node.as_str().is_some() => {}
        other => out.error(
            format!("'dependsOn' must be a name or a list of names, found {}", other.kind_name()),
            path.clone(),
        ),
    }
}

fn check_condition(node: &Node, path: &NodePath, out: &mut ValidationResult) {
    let Some(text) = node.scalar_text() else {
        out.error("'condition' must be an expression string", path.clone());
        return;
    };
    // Rechecked once template expressions have been substituted
    if text.contains("${{") {
        return;
    }
    let body = text.trim();
    let body = body
        .strip_prefix("$[")
        .and_then(|b| b.strip_suffix(']'))
        .unwrap_or(body);

    match parse_expression(body) {
        Ok(expr) => {
            for err in check_functions(&expr) {
                out.error(err.to_string(), path.clone());
            }
        }
        Err(e) => out.error(e.to_string(), path.clone()),
    }
}

/// A `$[ ]` value is parsed up front so syntax errors surface before the run
fn check_runtime_value(node: &Node, path: &NodePath, out: &mut ValidationResult) {
    let Some(text) = node.as_str() else {
        return;
    };
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("$[").and_then(|b| b.strip_suffix(']')) else {
        return;
    };
    if body.contains("${{") {
        return;
    }
    match parse_expression(body) {
        Ok(expr) => {
            for err in check_functions(&expr) {
                out.error(err.to_string(), path.clone());
            }
        }
        Err(e) => out.error(e.to_string(), path.clone()),
    }
}

fn check_number(node: &Node, path: &NodePath, out: &mut ValidationResult) {
    if node.as_number().is_some() || is_expression(node) {
        return;
    }
    if node.as_str().map_or(false, |s| s.trim().parse::<f64>().is_ok()) {
        return;
    }
    out.error(format!("expected a number, found {}", node.kind_name()), path.clone());
}

fn check_boolean(node: &Node, path: &NodePath, out: &mut ValidationResult) {
    if node.as_bool().is_some() || is_expression(node) {
        return;
    }
    let literal = node
        .as_str()
        .map_or(false, |s| s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false"));
    if !literal {
        out.error(format!("expected a boolean, found {}", node.kind_name()), path.clone());
    }
}

fn check_scalar_mapping(node: &Node, field: &str, path: &NodePath, out: &mut ValidationResult) {
    let Some(map) = node.as_mapping() else {
        if !node.is_null() && !is_expression(node) {
            out.error(format!("'{}' must be a mapping", field), path.clone());
        }
        return;
    };
    for (key, value) in map {
        if !is_directive_key(key) && value.as_scalar().is_none() {
            out.error(format!("'{}.{}' must be a scalar", field, key), path.key(key));
        }
    }
}

fn check_task_reference(node: &Node, path: &NodePath, out: &mut ValidationResult) {
    let Some(task) = node.as_str() else {
        out.error("'task' must be a string", path.clone());
        return;
    };
    if task.contains("${{") {
        return;
    }
    match task.split_once('@') {
        Some((name, version)) if !name.trim().is_empty() && !version.trim().is_empty() => {}
        _ => out.push(
            Diagnostic::error(format!("task reference '{}' has no version", task), path.clone())
                .with_suggestion(format!("use '{}@<major version>'", task.trim_end_matches('@'))),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn validate(yaml: &str) -> ValidationResult {
        let doc = Document::from_yaml_str(yaml).unwrap();
        SchemaValidator::new().validate(doc.root(), NodeKind::Pipeline)
    }

    fn messages(result: &ValidationResult) -> Vec<String> {
        result.diagnostics.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_valid_pipeline_is_clean() {
        let result = validate(
            r#"
stages:
  - stage: Build
    jobs:
      - job: Compile
        steps:
          - script: cargo build
          - task: PublishBuildArtifacts@1
            inputs:
              pathToPublish: target
  - stage: Deploy
    dependsOn: Build
    condition: and(succeeded(), eq(variables['Build.SourceBranch'], 'refs/heads/main'))
    jobs:
      - deployment: Ship
        environment: prod
        strategy:
          runOnce:
            deploy:
              steps:
                - script: ./deploy.sh
"#,
        );
        assert!(result.is_clean(), "{:?}", messages(&result));
    }

    #[test]
    fn test_unknown_key_is_a_warning_with_suggestion() {
        let result = validate(
            r#"
stages:
  - stage: Build
    dependson: []
    jobs:
      - job: A
        steps:
          - script: echo
"#,
        );
        assert!(!result.has_errors());
        let warning = result.warnings().next().unwrap();
        assert_eq!(warning.path.to_string(), "stages[0].dependson");
        assert_eq!(warning.suggestion.as_deref(), Some("did you mean 'dependsOn'?"));
    }

    #[test]
    fn test_unknown_keys_can_be_silenced() {
        let doc = Document::from_yaml_str("steps:\n  - script: echo\n    colour: red").unwrap();
        let validator = SchemaValidator::with_config(&ValidatorConfig::default().with_warn_unknown_keys(false));
        assert!(validator.validate(doc.root(), NodeKind::Pipeline).is_clean());
    }

    #[test]
    fn test_step_requires_exactly_one_action() {
        let result = validate(
            r#"
steps:
  - displayName: nothing to do
  - script: echo hi
    task: Bash@3
"#,
        );
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path.to_string(), "steps[0]");
        assert!(errors[0].message.contains("exactly one of"));
        assert_eq!(errors[1].path.to_string(), "steps[1]");
        assert!(errors[1].message.contains("script, task"));
    }

    #[test]
    fn test_stage_and_job_identity() {
        let result = validate(
            r#"
stages:
  - displayName: nameless
    jobs:
      - displayName: also nameless
        steps:
          - script: echo
"#,
        );
        let errors: Vec<_> = result.errors().map(|d| d.message.clone()).collect();
        assert!(errors.iter().any(|m| m.contains("'stage:' or 'template:'")));
        assert!(errors.iter().any(|m| m.contains("'job:', 'deployment:', or 'template:'")));
    }

    #[test]
    fn test_duplicate_names() {
        let result = validate(
            r#"
stages:
  - stage: Build
    jobs:
      - job: A
        steps: [{ script: echo }]
      - job: A
        steps: [{ script: echo }]
  - stage: Build
    jobs:
      - job: A
        steps: [{ script: echo }]
"#,
        );
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "duplicate job name 'A'");
        assert_eq!(errors[0].path.to_string(), "stages[0].jobs[1]");
        assert_eq!(errors[1].message, "duplicate stage name 'Build'");
    }

    #[test]
    fn test_condition_function_checks() {
        let result = validate(
            r#"
jobs:
  - job: A
    condition: and(succeeded(), frobnicate())
    steps:
      - script: echo
        condition: eq(variables.x)
  - job: B
    condition: eq(1,
    steps:
      - script: echo
"#,
        );
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].message.contains("eq() expects 2 argument(s), got 1"));
        assert_eq!(errors[0].path.to_string(), "jobs[0].steps[0].condition");
        assert!(errors[1].message.contains("unknown function 'frobnicate'"));
        assert_eq!(errors[1].path.to_string(), "jobs[0].condition");
        assert!(errors[2].message.contains("invalid expression"));
    }

    #[test]
    fn test_type_checks() {
        let result = validate(
            r#"
stages:
  - stage: A
    dependsOn: { Build: true }
    jobs: not-a-list
"#,
        );
        let errors: Vec<_> = result.errors().map(|d| d.path.to_string()).collect();
        assert_eq!(errors, vec!["stages[0].jobs", "stages[0].dependsOn"]);
    }

    #[test]
    fn test_directives_are_accepted() {
        let result = validate(
            r#"
parameters:
  - name: runTests
    type: boolean
    default: true
steps:
  - script: build
  - ${{ if parameters.runTests }}:
    - script: test
  - ${{ each t in parameters.targets }}:
    - script: echo ${{ t }}
"#,
        );
        assert!(result.is_clean(), "{:?}", messages(&result));
    }

    #[test]
    fn test_malformed_directive_is_reported() {
        let result = validate("steps:\n  - ${{ if eq(1, }}:\n    - script: x\n");
        assert!(result.has_errors());
    }

    #[test]
    fn test_strategy_rules() {
        let result = validate(
            r#"
jobs:
  - job: A
    strategy:
      runOnce: {}
      matrix:
        linux: { os: linux }
        broken: 3
    steps: [{ script: echo }]
  - deployment: D
    strategy:
      parallel: 2
"#,
        );
        let errors: Vec<_> = result.errors().map(|d| d.message.clone()).collect();
        assert!(errors.iter().any(|m| m.contains("only valid for deployment jobs")));
        assert!(errors.iter().any(|m| m.contains("matrix entry 'broken'")));
        assert!(errors.iter().any(|m| m.contains("exactly one of runOnce, rolling or canary")));
    }

    #[test]
    fn test_variable_forms() {
        let result = validate(
            r#"
variables:
  - name: a
    value: one
  - group: shared
  - name: b
  - template: vars.yml
  - name: c
    value: $[ coutner(variables.a, 0) ]
steps:
  - script: echo
"#,
        );
        let errors: Vec<_> = result.errors().map(|d| d.message.clone()).collect();
        assert_eq!(errors.len(), 2, "{:?}", errors);
        assert!(errors[0].contains("variable 'b' has no value"));
        assert!(errors[1].contains("unknown function 'coutner'"));
    }

    #[test]
    fn test_task_needs_version() {
        let result = validate("steps:\n  - task: Bash\n");
        let error = result.errors().next().unwrap();
        assert_eq!(error.path.to_string(), "steps[0].task");
        assert_eq!(error.suggestion.as_deref(), Some("use 'Bash@<major version>'"));
    }

    #[test]
    fn test_empty_pipeline() {
        let result = validate("name: nothing");
        assert!(result.errors().any(|d| d.path.is_root()));
    }
}
