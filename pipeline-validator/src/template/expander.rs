// Template Expansion Engine
// Resolves `template:` references and `extends:`, binds parameters, and
// evaluates `${{ }}` expressions and directives against static values only

use crate::config::ValidatorConfig;
use crate::document::{Document, Node, NodePath};
use crate::expression::{evaluate, substitute_template, EvalError, Expr, TemplateContext, Value};
use crate::template::directive::Directive;
use crate::template::error::ExpandError;
use crate::template::parameters::{bind, declarations};
use crate::template::source::{normalize_name, TemplateSource};

use indexmap::IndexMap;
use tracing::{debug, warn};

use std::collections::BTreeSet;
use std::fmt;

/// List keys whose items may be `- template:` references
const TEMPLATE_LIST_KEYS: &[&str] = &["stages", "jobs", "steps", "variables"];

const PIPELINE_OWNER: &str = "the pipeline";

/// A document with every template reference and `${{ }}` expression resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedDocument {
    pub document: Document,
    /// Pipeline parameters after defaults were applied
    pub parameters: IndexMap<String, Value>,
    /// Variables whose values only exist while the pipeline runs
    pub runtime_variables: BTreeSet<String>,
    /// Templates that were included, in first-use order
    pub templates: Vec<String>,
}

impl ExpandedDocument {
    pub fn root(&self) -> &Node {
        self.document.root()
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        self.document.to_yaml_string()
    }
}

/// A reference or expression that could not be expanded
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandFailure {
    /// Template the failure is located in; `None` for the root document
    pub template: Option<String>,
    pub path: NodePath,
    pub error: ExpandError,
}

impl fmt::Display for ExpandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.template {
            Some(template) => write!(f, "in template '{}' at '{}': {}", template, self.path, self.error),
            None => write!(f, "at '{}': {}", self.path, self.error),
        }
    }
}

/// Result of a lenient expansion: everything that could be expanded, plus what could not
#[derive(Debug, Clone)]
pub struct ExpansionReport {
    pub expanded: ExpandedDocument,
    pub failures: Vec<ExpandFailure>,
}

impl ExpansionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Template resolution engine
pub struct TemplateExpander<'s> {
    source: &'s dyn TemplateSource,
    max_depth: usize,
}

impl<'s> TemplateExpander<'s> {
    pub fn new(source: &'s dyn TemplateSource) -> Self {
        Self {
            source,
            max_depth: ValidatorConfig::default().max_template_depth,
        }
    }

    pub fn with_config(source: &'s dyn TemplateSource, config: &ValidatorConfig) -> Self {
        Self {
            source,
            max_depth: config.max_template_depth,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Expand a document, failing on the first error
    pub fn expand(
        &self,
        document: &Document,
        bindings: &IndexMap<String, Value>,
    ) -> Result<ExpandedDocument, ExpandError> {
        let mut run = Expansion::new(self, false);
        run.expand_document(document, bindings).map_err(|failure| {
            debug!("Template expansion failed: {}", failure);
            failure.error
        })
    }

    /// Expand a document, skipping each failing subtree and recording why
    pub fn expand_lenient(
        &self,
        document: &Document,
        bindings: &IndexMap<String, Value>,
    ) -> ExpansionReport {
        let mut run = Expansion::new(self, true);
        match run.expand_document(document, bindings) {
            Ok(expanded) => ExpansionReport {
                expanded,
                failures: run.failures,
            },
            Err(failure) => {
                warn!("Template expansion aborted: {}", failure);
                let mut failures = run.failures;
                failures.push(failure);
                ExpansionReport {
                    expanded: ExpandedDocument {
                        document: document.clone(),
                        parameters: IndexMap::new(),
                        runtime_variables: run.runtime_variables,
                        templates: run.templates,
                    },
                    failures,
                }
            }
        }
    }
}

type Outcome<T> = Result<T, ExpandFailure>;

/// State of an if/elseif/else chain across sibling entries
#[derive(Debug, Default)]
struct Chain {
    active: bool,
    taken: bool,
}

impl Chain {
    fn start(&mut self) {
        self.active = true;
        self.taken = false;
    }

    fn reset(&mut self) {
        *self = Chain::default();
    }

    /// Whether a continuing branch may still be taken
    fn open(&mut self) -> bool {
        if !self.active {
            self.start();
        }
        !self.taken
    }
}

/// One expansion run
struct Expansion<'x> {
    source: &'x dyn TemplateSource,
    max_depth: usize,
    lenient: bool,
    /// Include stack of normalized template names
    stack: Vec<String>,
    failures: Vec<ExpandFailure>,
    runtime_variables: BTreeSet<String>,
    static_variables: IndexMap<String, Value>,
    templates: Vec<String>,
}

impl<'x> Expansion<'x> {
    fn new(expander: &TemplateExpander<'x>, lenient: bool) -> Self {
        Self {
            source: expander.source,
            max_depth: expander.max_depth,
            lenient,
            stack: Vec::new(),
            failures: Vec::new(),
            runtime_variables: BTreeSet::new(),
            static_variables: IndexMap::new(),
            templates: Vec::new(),
        }
    }

    fn expand_document(
        &mut self,
        document: &Document,
        bindings: &IndexMap<String, Value>,
    ) -> Outcome<ExpandedDocument> {
        let root = document.root();
        let root_path = NodePath::root();

        self.scan_reachable(root, &mut BTreeSet::new());
        self.static_variables = static_variables(root.get("variables"));

        let declared = declarations(root.get("parameters"), PIPELINE_OWNER)
            .map_err(|e| self.fail(&root_path.key("parameters"), e))?;
        let parameters = bind(&declared, bindings, PIPELINE_OWNER).map_err(|e| self.fail(&root_path, e))?;

        let context = self.context(parameters.clone());
        let expanded = self.expand_pipeline(root, &context, &root_path)?;
        let document = Document::new(expanded).map_err(|e| {
            self.fail(
                &root_path,
                ExpandError::InvalidTemplate {
                    template: PIPELINE_OWNER.to_string(),
                    reason: e.message,
                },
            )
        })?;

        Ok(ExpandedDocument {
            document,
            parameters,
            runtime_variables: self.runtime_variables.clone(),
            templates: self.templates.clone(),
        })
    }

    // =========================================================================
    // Pipeline roots and extends
    // =========================================================================

    fn expand_pipeline(&mut self, root: &Node, ctx: &TemplateContext, path: &NodePath) -> Outcome<Node> {
        let Some(map) = root.as_mapping() else {
            return self.expand_value(root, ctx, path);
        };
        let Some(extends) = map.get("extends") else {
            return self.expand_root_mapping(map, ctx, path);
        };

        let extends_path = path.key("extends");
        let extends = self.expand_value(extends, ctx, &extends_path)?;
        let name = extends
            .get("template")
            .and_then(Node::scalar_text)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                self.fail(
                    &extends_path,
                    ExpandError::InvalidTemplate {
                        template: self.owner(),
                        reason: "'extends' must name a template".to_string(),
                    },
                )
            })?;
        let provided = object_of(extends.get("parameters"));

        let (name, template) = self.load(&name, &extends_path.key("template"))?;
        let owner = format!("template '{}'", name);
        let declared = declarations(template.root().get("parameters"), &owner)
            .map_err(|e| self.fail(&extends_path, e))?;
        let bound = bind(&declared, &provided, &owner).map_err(|e| self.fail(&extends_path, e))?;

        debug!("Extending template '{}'", name);
        self.enter(&name);
        let child = self.context(bound);
        let parent = self.expand_pipeline(template.root(), &child, &NodePath::root());
        self.leave();
        let parent = parent?;

        // Keys of the extending document the template leaves undefined are kept
        let mut merged = parent.as_mapping().cloned().unwrap_or_default();
        for (key, value) in map {
            if key == "extends" || key == "parameters" || merged.contains_key(key) {
                continue;
            }
            let value = self.expand_entry(key, value, ctx, &path.key(key))?;
            merged.insert(key.clone(), value);
        }
        Ok(Node::Mapping(merged))
    }

    fn expand_root_mapping(
        &mut self,
        map: &IndexMap<String, Node>,
        ctx: &TemplateContext,
        path: &NodePath,
    ) -> Outcome<Node> {
        // Declarations are consumed by binding; only the outermost document keeps them
        let mut rest = map.clone();
        let declarations = rest.shift_remove("parameters").filter(|_| self.stack.is_empty());
        let Node::Mapping(mut expanded) = self.expand_mapping(&rest, ctx, path)? else {
            return Ok(Node::mapping());
        };
        if let Some(declarations) = declarations {
            expanded.shift_insert(0, "parameters".to_string(), declarations);
        }
        Ok(Node::Mapping(expanded))
    }

    // =========================================================================
    // Template references
    // =========================================================================

    /// Replace a `- template:` list item with the template's items for `list_key`
    fn include(
        &mut self,
        reference: &IndexMap<String, Node>,
        list_key: &str,
        ctx: &TemplateContext,
        path: &NodePath,
    ) -> Outcome<Vec<Node>> {
        let template_path = path.key("template");
        let name = match reference.get("template") {
            Some(Node::Scalar(scalar)) => {
                let text = scalar.as_string();
                self.substitute(&text, ctx, &template_path)?.as_string()
            }
            _ => String::new(),
        };
        if name.trim().is_empty() {
            return Err(self.fail(
                &template_path,
                ExpandError::InvalidTemplate {
                    template: self.owner(),
                    reason: "'template' must name a template".to_string(),
                },
            ));
        }

        let provided = match reference.get("parameters") {
            Some(params) => object_of(Some(&self.expand_value(params, ctx, &path.key("parameters"))?)),
            None => IndexMap::new(),
        };

        let (name, template) = self.load(&name, &template_path)?;
        let owner = format!("template '{}'", name);
        let declared = declarations(template.root().get("parameters"), &owner)
            .map_err(|e| self.fail(path, e))?;
        let bound = bind(&declared, &provided, &owner).map_err(|e| self.fail(path, e))?;

        let body = match template.root().get(list_key) {
            Some(body) if list_key == "variables" => variables_as_list(body),
            Some(body) => body.clone(),
            None => {
                return Err(self.fail(
                    path,
                    ExpandError::InvalidTemplate {
                        template: name,
                        reason: format!("a template referenced from '{}' must define '{}'", list_key, list_key),
                    },
                ))
            }
        };

        debug!(
            "Expanding {} template '{}' at depth {}",
            list_key,
            name,
            self.stack.len() + 1
        );
        self.enter(&name);
        let child = self.context(bound);
        let items = self.expand_list(&body, &child, &NodePath::root().key(list_key), Some(list_key));
        self.leave();
        items
    }

    /// Resolve a template name, checking the include stack first
    fn load(&mut self, name: &str, path: &NodePath) -> Outcome<(String, Document)> {
        let normalized = normalize_name(name);

        if let Some(pos) = self.stack.iter().position(|entry| *entry == normalized) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(normalized);
            return Err(self.fail(path, ExpandError::TemplateCycle { chain }));
        }
        if self.stack.len() >= self.max_depth {
            return Err(self.fail(
                path,
                ExpandError::TemplateDepthExceeded {
                    limit: self.max_depth,
                    template: normalized,
                },
            ));
        }

        let Some(document) = self.source.load(&normalized) else {
            return Err(self.fail(path, ExpandError::TemplateNotFound { name: normalized }));
        };
        scan_runtime_variables(document.root(), &mut self.runtime_variables);
        if !self.templates.contains(&normalized) {
            self.templates.push(normalized.clone());
        }
        Ok((normalized, document))
    }

    /// Collect runtime-only variables from the document and every template it
    /// reaches through a literal name, before any expression is evaluated
    fn scan_reachable(&mut self, node: &Node, visited: &mut BTreeSet<String>) {
        scan_runtime_variables(node, &mut self.runtime_variables);

        let mut references = Vec::new();
        template_references(node, &mut references);
        for name in references {
            let normalized = normalize_name(&name);
            if !visited.insert(normalized.clone()) {
                continue;
            }
            if let Some(document) = self.source.load(&normalized) {
                self.scan_reachable(document.root(), visited);
            }
        }
    }

    fn enter(&mut self, name: &str) {
        self.stack.push(name.to_string());
    }

    fn leave(&mut self) {
        self.stack.pop();
    }

    // =========================================================================
    // Tree walking
    // =========================================================================

    fn expand_value(&mut self, node: &Node, ctx: &TemplateContext, path: &NodePath) -> Outcome<Node> {
        match node {
            Node::Mapping(map) => self.expand_mapping(map, ctx, path),
            Node::Sequence(_) => Ok(Node::Sequence(self.expand_list(node, ctx, path, None)?)),
            Node::Scalar(_) => match node.as_str() {
                Some(text) if text.contains("${{") => Ok(self.substitute(text, ctx, path)?.to_node()),
                _ => Ok(node.clone()),
            },
        }
    }

    /// Expand the value of a mapping entry; list keys enable template references
    fn expand_entry(&mut self, key: &str, value: &Node, ctx: &TemplateContext, path: &NodePath) -> Outcome<Node> {
        let list_key = TEMPLATE_LIST_KEYS.iter().copied().find(|k| *k == key);
        match (value, list_key) {
            (Node::Sequence(_), _) => Ok(Node::Sequence(self.expand_list(value, ctx, path, list_key)?)),
            (Node::Scalar(_), Some(list_key)) => {
                let expanded = self.expand_value(value, ctx, path)?;
                // A whole list passed in as a parameter may itself hold references
                match expanded {
                    Node::Sequence(_) => Ok(Node::Sequence(self.expand_list(&expanded, ctx, path, Some(list_key))?)),
                    other => Ok(other),
                }
            }
            _ => self.expand_value(value, ctx, path),
        }
    }

    fn expand_mapping(
        &mut self,
        map: &IndexMap<String, Node>,
        ctx: &TemplateContext,
        path: &NodePath,
    ) -> Outcome<Node> {
        let mut out = IndexMap::new();
        let mut chain = Chain::default();

        for (key, value) in map {
            let key_path = path.key(key);
            match Directive::parse(key) {
                Some(Err(e)) => return Err(self.fail(&key_path, expression_error(key, e))),
                Some(Ok(Directive::Key(expr))) => {
                    chain.reset();
                    let name = self.eval(&expr, key, ctx, &key_path)?.as_string();
                    let value = self.expand_entry(&name, value, ctx, &key_path)?;
                    out.insert(name, value);
                }
                Some(Ok(directive)) => {
                    for branch in self.branches(&directive, key, &mut chain, ctx, &key_path)? {
                        let entries = self.expand_mapping_body(value, &branch, &key_path)?;
                        out.extend(entries);
                    }
                }
                None => {
                    chain.reset();
                    let name = if key.contains("${{") {
                        self.substitute(key, ctx, &key_path)?.as_string()
                    } else {
                        key.clone()
                    };
                    let value = self.expand_entry(&name, value, ctx, &key_path)?;
                    out.insert(name, value);
                }
            }
        }
        Ok(Node::Mapping(out))
    }

    fn expand_mapping_body(
        &mut self,
        body: &Node,
        ctx: &TemplateContext,
        path: &NodePath,
    ) -> Outcome<IndexMap<String, Node>> {
        match body {
            Node::Mapping(map) => match self.expand_mapping(map, ctx, path)? {
                Node::Mapping(expanded) => Ok(expanded),
                _ => Ok(IndexMap::new()),
            },
            _ if body.is_null() => Ok(IndexMap::new()),
            other => Err(self.fail(
                path,
                ExpandError::InvalidTemplate {
                    template: self.owner(),
                    reason: format!(
                        "a directive inside a mapping must hold a mapping, found {}",
                        other.kind_name()
                    ),
                },
            )),
        }
    }

    /// Expand sequence items, splicing directive bodies and template references.
    /// In lenient mode a failing item is recorded and dropped.
    fn expand_list(
        &mut self,
        node: &Node,
        ctx: &TemplateContext,
        path: &NodePath,
        list_key: Option<&str>,
    ) -> Outcome<Vec<Node>> {
        let Some(items) = node.as_sequence() else {
            return Ok(vec![self.expand_value(node, ctx, path)?]);
        };

        let mut result = Vec::with_capacity(items.len());
        let mut chain = Chain::default();
        for (i, item) in items.iter().enumerate() {
            let item_path = path.index(i);
            match self.expand_item(item, ctx, &item_path, list_key, &mut chain) {
                Ok(nodes) => result.extend(nodes),
                Err(failure) if self.lenient => {
                    warn!("Skipping {}", failure);
                    self.failures.push(failure);
                }
                Err(failure) => return Err(failure),
            }
        }
        Ok(result)
    }

    fn expand_item(
        &mut self,
        item: &Node,
        ctx: &TemplateContext,
        path: &NodePath,
        list_key: Option<&str>,
        chain: &mut Chain,
    ) -> Outcome<Vec<Node>> {
        if let Some((key, body)) = single_entry(item) {
            match Directive::parse(key) {
                Some(Err(e)) => return Err(self.fail(&path.key(key), expression_error(key, e))),
                Some(Ok(Directive::Key(_))) | None => {}
                Some(Ok(directive)) => {
                    let body_path = path.key(key);
                    let mut nodes = Vec::new();
                    for branch in self.branches(&directive, key, chain, ctx, &body_path)? {
                        nodes.extend(self.expand_body(body, &branch, &body_path, list_key)?);
                    }
                    return Ok(nodes);
                }
            }
        }
        chain.reset();

        match (item, list_key) {
            (Node::Mapping(map), Some(list_key)) if map.contains_key("template") => {
                self.include(map, list_key, ctx, path)
            }
            (Node::Scalar(_), _) => match item.as_str() {
                Some(text) if text.contains("${{") => {
                    let value = self.substitute(text, ctx, path)?;
                    self.splice(value, ctx, path, list_key)
                }
                _ => Ok(vec![item.clone()]),
            },
            _ => Ok(vec![self.expand_value(item, ctx, path)?]),
        }
    }

    /// Expand the value under a directive key inside a list
    fn expand_body(
        &mut self,
        body: &Node,
        ctx: &TemplateContext,
        path: &NodePath,
        list_key: Option<&str>,
    ) -> Outcome<Vec<Node>> {
        match body {
            Node::Sequence(_) => self.expand_list(body, ctx, path, list_key),
            _ if body.is_null() => Ok(Vec::new()),
            _ => self.expand_item(body, ctx, path, list_key, &mut Chain::default()),
        }
    }

    /// An item that evaluated to a list contributes each element
    fn splice(
        &mut self,
        value: Value,
        ctx: &TemplateContext,
        path: &NodePath,
        list_key: Option<&str>,
    ) -> Outcome<Vec<Node>> {
        match value {
            Value::Array(items) => {
                let spliced = Node::Sequence(items.iter().map(Value::to_node).collect());
                self.expand_list(&spliced, ctx, path, list_key)
            }
            other => Ok(vec![other.to_node()]),
        }
    }

    /// Contexts a directive's body is expanded with: none when the branch is
    /// not taken, one per element for `each`
    fn branches(
        &mut self,
        directive: &Directive,
        key: &str,
        chain: &mut Chain,
        ctx: &TemplateContext,
        path: &NodePath,
    ) -> Outcome<Vec<TemplateContext>> {
        let taken = match directive {
            Directive::If(condition) => {
                chain.start();
                self.eval(condition, key, ctx, path)?.is_truthy()
            }
            Directive::ElseIf(condition) => chain.open() && self.eval(condition, key, ctx, path)?.is_truthy(),
            Directive::Else => chain.open(),
            Directive::Each { variable, collection } => {
                chain.reset();
                let collection = self.eval(collection, key, ctx, path)?;
                return self.iterations(variable, collection, key, ctx, path);
            }
            Directive::Insert | Directive::Key(_) => {
                chain.reset();
                true
            }
        };

        if taken {
            chain.taken = true;
            Ok(vec![ctx.clone()])
        } else {
            Ok(Vec::new())
        }
    }

    fn iterations(
        &self,
        variable: &str,
        collection: Value,
        key: &str,
        ctx: &TemplateContext,
        path: &NodePath,
    ) -> Outcome<Vec<TemplateContext>> {
        match collection {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items
                .into_iter()
                .map(|item| ctx.with_local(variable, item))
                .collect()),
            // Mapping entries are exposed as `{ key, value }` pairs
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| {
                    let mut pair = IndexMap::new();
                    pair.insert("key".to_string(), Value::String(k));
                    pair.insert("value".to_string(), v);
                    ctx.with_local(variable, Value::Object(pair))
                })
                .collect()),
            other => Err(self.fail(
                path,
                expression_error(
                    key,
                    EvalError::type_mismatch(
                        "each",
                        format!("cannot iterate over a {}", other.type_name()),
                    ),
                ),
            )),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn eval(&self, expr: &Expr, text: &str, ctx: &TemplateContext, path: &NodePath) -> Outcome<Value> {
        evaluate(expr, ctx).map_err(|e| self.fail(path, self.eval_error(text, e)))
    }

    fn substitute(&self, text: &str, ctx: &TemplateContext, path: &NodePath) -> Outcome<Value> {
        substitute_template(text, ctx).map_err(|e| self.fail(path, self.eval_error(text, e)))
    }

    /// Unbound parameters surface as missing parameters of the current document
    fn eval_error(&self, text: &str, error: EvalError) -> ExpandError {
        match error {
            EvalError::UndefinedParameter { name } => ExpandError::MissingParameter {
                template: self.owner(),
                name,
            },
            other => expression_error(text, other),
        }
    }

    fn context(&self, parameters: IndexMap<String, Value>) -> TemplateContext {
        TemplateContext {
            parameters,
            variables: self.static_variables.clone(),
            runtime_variables: self.runtime_variables.clone(),
            locals: IndexMap::new(),
        }
    }

    fn owner(&self) -> String {
        match self.stack.last() {
            Some(template) => format!("template '{}'", template),
            None => PIPELINE_OWNER.to_string(),
        }
    }

    fn fail(&self, path: &NodePath, error: ExpandError) -> ExpandFailure {
        ExpandFailure {
            template: self.stack.last().cloned(),
            path: path.clone(),
            error,
        }
    }
}

fn expression_error(text: &str, source: EvalError) -> ExpandError {
    ExpandError::Expression {
        expression: text.trim().to_string(),
        source,
    }
}

fn single_entry(node: &Node) -> Option<(&String, &Node)> {
    let map = node.as_mapping()?;
    if map.len() != 1 {
        return None;
    }
    map.iter().next()
}

fn object_of(node: Option<&Node>) -> IndexMap<String, Value> {
    match node.map(Value::from_node) {
        Some(Value::Object(map)) => map,
        _ => IndexMap::new(),
    }
}

/// Variables templates may use the `name: value` form; list references need items
fn variables_as_list(node: &Node) -> Node {
    match node.as_mapping() {
        Some(map) => Node::Sequence(
            map.iter()
                .map(|(name, value)| {
                    let mut item = IndexMap::new();
                    item.insert("name".to_string(), Node::string(name.clone()));
                    item.insert("value".to_string(), value.clone());
                    Node::Mapping(item)
                })
                .collect(),
        ),
        None => node.clone(),
    }
}

/// Variables with a literal value, visible to `${{ variables.x }}`
fn static_variables(node: Option<&Node>) -> IndexMap<String, Value> {
    let mut variables = IndexMap::new();
    let mut add = |name: &str, value: &Node| {
        if let Some(text) = value.scalar_text() {
            if !is_runtime_value(&text) && !text.contains("${{") {
                variables.insert(name.to_string(), Value::from_node(value));
            }
        }
    };

    match node {
        Some(Node::Mapping(map)) => {
            for (name, value) in map {
                add(name, value);
            }
        }
        Some(Node::Sequence(items)) => {
            for item in items {
                if let (Some(name), Some(value)) = (item.get("name").and_then(Node::as_str), item.get("value")) {
                    add(name, value);
                }
            }
        }
        _ => {}
    }
    variables
}

fn is_runtime_value(text: &str) -> bool {
    text.trim_start().starts_with("$[")
}

const SET_VARIABLE: &str = "##vso[task.setvariable variable=";

/// Collect variables that are only assigned while the pipeline runs:
/// `$[ ]` values and `##vso[task.setvariable]` logging commands
pub fn scan_runtime_variables(node: &Node, found: &mut BTreeSet<String>) {
    match node {
        Node::Mapping(map) => {
            if let Some(variables) = map.get("variables") {
                collect_runtime_definitions(variables, found);
            }
            for value in map.values() {
                scan_runtime_variables(value, found);
            }
        }
        Node::Sequence(items) => {
            for item in items {
                scan_runtime_variables(item, found);
            }
        }
        Node::Scalar(_) => {
            if let Some(text) = node.as_str() {
                found.extend(set_variable_names(text).iter().map(|n| n.to_ascii_lowercase()));
            }
        }
    }
}

fn collect_runtime_definitions(variables: &Node, found: &mut BTreeSet<String>) {
    match variables {
        Node::Mapping(map) => {
            for (name, value) in map {
                if value.as_str().map_or(false, is_runtime_value) {
                    found.insert(name.to_ascii_lowercase());
                }
            }
        }
        Node::Sequence(items) => {
            for item in items {
                let name = item.get("name").and_then(Node::as_str);
                let value = item.get("value").and_then(Node::as_str);
                if let (Some(name), Some(value)) = (name, value) {
                    if is_runtime_value(value) {
                        found.insert(name.to_ascii_lowercase());
                    }
                }
            }
        }
        _ => {}
    }
}

/// Template names referenced without an expression, in document order
fn template_references(node: &Node, found: &mut Vec<String>) {
    match node {
        Node::Mapping(map) => {
            if let Some(name) = map.get("template").and_then(Node::as_str) {
                if !name.contains("${{") {
                    found.push(name.to_string());
                }
            }
            for value in map.values() {
                template_references(value, found);
            }
        }
        Node::Sequence(items) => {
            for item in items {
                template_references(item, found);
            }
        }
        Node::Scalar(_) => {}
    }
}

/// Variable names assigned by `##vso[task.setvariable]` commands in a script
pub fn set_variable_names(text: &str) -> Vec<String> {
    let lower = text.to_ascii_lowercase();
    let mut names = Vec::new();
    let mut offset = 0;
    while let Some(pos) = lower[offset..].find(SET_VARIABLE) {
        let start = offset + pos + SET_VARIABLE.len();
        let name: String = text[start..]
            .chars()
            .take_while(|c| !matches!(c, ';' | ']') && !c.is_whitespace())
            .collect();
        if !name.is_empty() {
            names.push(name);
        }
        offset = start;
    }
    names
}
