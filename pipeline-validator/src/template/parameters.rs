// Template parameters
// Declarations in list or `name: default` form, and binding of provided values

use crate::document::Node;
use crate::expression::context::get_ignore_case;
use crate::expression::functions::values_equal;
use crate::expression::Value;
use crate::template::error::ExpandError;

use indexmap::IndexMap;
use tracing::debug;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
    Step,
    StepList,
    Job,
    JobList,
    Deployment,
    DeploymentList,
    Stage,
    StageList,
}

impl ParameterType {
    pub fn parse(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "string" => ParameterType::String,
            "number" => ParameterType::Number,
            "boolean" => ParameterType::Boolean,
            "object" => ParameterType::Object,
            "step" => ParameterType::Step,
            "steplist" => ParameterType::StepList,
            "job" => ParameterType::Job,
            "joblist" => ParameterType::JobList,
            "deployment" => ParameterType::Deployment,
            "deploymentlist" => ParameterType::DeploymentList,
            "stage" => ParameterType::Stage,
            "stagelist" => ParameterType::StageList,
            _ => return None,
        };
        Some(ty)
    }

    /// Check a value against the type, converting string forms of numbers and booleans
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        let mismatch = || format!("expected {}, got {}", self, value.type_name());
        match self {
            ParameterType::String => match value {
                Value::Array(_) | Value::Object(_) => Err(mismatch()),
                Value::Null => Ok(Value::String(String::new())),
                other => Ok(other.clone()),
            },
            ParameterType::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s.trim().parse().map(Value::Number).map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            ParameterType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
            ParameterType::Object => Ok(value.clone()),
            ParameterType::Step
            | ParameterType::Job
            | ParameterType::Deployment
            | ParameterType::Stage => match value {
                Value::Object(_) => Ok(value.clone()),
                _ => Err(mismatch()),
            },
            ParameterType::StepList
            | ParameterType::JobList
            | ParameterType::DeploymentList
            | ParameterType::StageList => match value {
                Value::Array(_) => Ok(value.clone()),
                Value::Null => Ok(Value::Array(Vec::new())),
                _ => Err(mismatch()),
            },
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::Step => "step",
            ParameterType::StepList => "stepList",
            ParameterType::Job => "job",
            ParameterType::JobList => "jobList",
            ParameterType::Deployment => "deployment",
            ParameterType::DeploymentList => "deploymentList",
            ParameterType::Stage => "stage",
            ParameterType::StageList => "stageList",
        };
        f.write_str(name)
    }
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    pub name: String,
    pub param_type: ParameterType,
    pub default: Option<Value>,
    pub values: Option<Vec<Value>>,
}

impl ParameterDecl {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
            values: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = Some(values);
        self
    }
}

/// Read the `parameters:` declaration of a pipeline or template.
/// `owner` names the declaring document in error messages.
pub fn declarations(node: Option<&Node>, owner: &str) -> Result<Vec<ParameterDecl>, ExpandError> {
    let invalid = |reason: String| ExpandError::InvalidTemplate {
        template: owner.to_string(),
        reason,
    };

    match node {
        None => Ok(Vec::new()),
        Some(node) if node.is_null() => Ok(Vec::new()),
        Some(Node::Sequence(items)) => items
            .iter()
            .map(|item| {
                let name = item
                    .get("name")
                    .and_then(Node::scalar_text)
                    .ok_or_else(|| invalid("parameter declaration has no name".to_string()))?;

                let param_type = match item.get("type").and_then(Node::as_str) {
                    None => ParameterType::String,
                    Some(ty) => ParameterType::parse(ty).ok_or_else(|| {
                        invalid(format!("parameter '{}' has unknown type '{}'", name, ty))
                    })?,
                };

                let default = item.get("default").map(Value::from_node);
                let values = item
                    .get("values")
                    .and_then(Node::as_sequence)
                    .map(|vs| vs.iter().map(Value::from_node).collect());

                Ok(ParameterDecl {
                    name,
                    param_type,
                    default,
                    values,
                })
            })
            .collect(),
        // Shorthand `name: default`; the type follows the default
        Some(Node::Mapping(map)) => Ok(map
            .iter()
            .map(|(name, default)| {
                let value = Value::from_node(default);
                let param_type = match &value {
                    Value::Bool(_) => ParameterType::Boolean,
                    Value::Number(_) => ParameterType::Number,
                    Value::Array(_) | Value::Object(_) => ParameterType::Object,
                    _ => ParameterType::String,
                };
                ParameterDecl::new(name.clone(), param_type).with_default(value)
            })
            .collect()),
        Some(other) => Err(invalid(format!(
            "'parameters' must be a sequence or a mapping, found {}",
            other.kind_name()
        ))),
    }
}

/// Bind provided values to declarations: type-check, apply defaults and
/// report parameters that end up without a value
pub fn bind(
    declared: &[ParameterDecl],
    provided: &IndexMap<String, Value>,
    owner: &str,
) -> Result<IndexMap<String, Value>, ExpandError> {
    let mut bound = IndexMap::new();

    for decl in declared {
        let value = match get_ignore_case(provided, &decl.name) {
            Some(value) => {
                let value = decl.param_type.coerce(value).map_err(|reason| ExpandError::InvalidParameter {
                    template: owner.to_string(),
                    name: decl.name.clone(),
                    reason,
                })?;
                check_allowed(decl, &value, owner)?;
                value
            }
            None => match &decl.default {
                Some(default) => decl
                    .param_type
                    .coerce(default)
                    .unwrap_or_else(|_| default.clone()),
                None => {
                    return Err(ExpandError::MissingParameter {
                        template: owner.to_string(),
                        name: decl.name.clone(),
                    })
                }
            },
        };
        bound.insert(decl.name.clone(), value);
    }

    // Undeclared values are passed through
    for (name, value) in provided {
        if get_ignore_case(&bound, name).is_none() {
            debug!("Passing undeclared parameter '{}' to {}", name, owner);
            bound.insert(name.clone(), value.clone());
        }
    }

    Ok(bound)
}

fn check_allowed(decl: &ParameterDecl, value: &Value, owner: &str) -> Result<(), ExpandError> {
    let Some(allowed) = &decl.values else {
        return Ok(());
    };
    let permitted = allowed
        .iter()
        .any(|candidate| values_equal("values", value, candidate).unwrap_or(false));
    if permitted {
        return Ok(());
    }

    Err(ExpandError::InvalidParameter {
        template: owner.to_string(),
        name: decl.name.clone(),
        reason: format!(
            "'{}' is not one of the allowed values: {}",
            value.as_string(),
            allowed
                .iter()
                .map(Value::as_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn decls(yaml: &str) -> Vec<ParameterDecl> {
        let doc = Document::from_yaml_str(yaml).unwrap();
        declarations(doc.root().get("parameters"), "template 't.yml'").unwrap()
    }

    fn provided(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_list_declarations() {
        let declared = decls(
            r#"
parameters:
  - name: environment
    type: string
    values: [dev, prod]
  - name: runTests
    type: boolean
    default: true
  - name: extraSteps
    type: stepList
    default: []
"#,
        );
        assert_eq!(declared.len(), 3);
        assert_eq!(declared[0].values.as_ref().map(Vec::len), Some(2));
        assert_eq!(declared[1].param_type, ParameterType::Boolean);
        assert_eq!(declared[2].default, Some(Value::Array(vec![])));
    }

    #[test]
    fn test_mapping_declarations_infer_type() {
        let declared = decls("parameters:\n  name: app\n  retries: 3\n  verbose: false\n");
        assert_eq!(declared[0].param_type, ParameterType::String);
        assert_eq!(declared[1].param_type, ParameterType::Number);
        assert_eq!(declared[2].param_type, ParameterType::Boolean);
    }

    #[test]
    fn test_unknown_type_is_invalid_template() {
        let doc = Document::from_yaml_str("parameters:\n  - name: x\n    type: strin\n").unwrap();
        let err = declarations(doc.root().get("parameters"), "template 't.yml'").unwrap_err();
        assert!(matches!(err, ExpandError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_bind_applies_defaults_and_coerces() {
        let declared = vec![
            ParameterDecl::new("runTests", ParameterType::Boolean).with_default(true),
            ParameterDecl::new("retries", ParameterType::Number),
        ];
        let bound = bind(
            &declared,
            &provided(&[("Retries", Value::from("2"))]),
            "the pipeline",
        )
        .unwrap();

        assert_eq!(bound["runTests"], Value::Bool(true));
        assert_eq!(bound["retries"], Value::Number(2.0));
    }

    #[test]
    fn test_bind_missing_parameter() {
        let declared = vec![ParameterDecl::new("environment", ParameterType::String)];
        let err = bind(&declared, &IndexMap::new(), "template 'deploy.yml'").unwrap_err();
        assert_eq!(
            err,
            ExpandError::MissingParameter {
                template: "template 'deploy.yml'".to_string(),
                name: "environment".to_string(),
            }
        );
    }

    #[test]
    fn test_bind_rejects_wrong_type_and_disallowed_value() {
        let declared = vec![ParameterDecl::new("steps", ParameterType::StepList)];
        let err = bind(&declared, &provided(&[("steps", Value::from("oops"))]), "t").unwrap_err();
        assert!(matches!(err, ExpandError::InvalidParameter { .. }));

        let declared = vec![ParameterDecl::new("env", ParameterType::String)
            .with_values(vec![Value::from("dev"), Value::from("prod")])];
        assert!(bind(&declared, &provided(&[("env", Value::from("PROD"))]), "t").is_ok());
        let err = bind(&declared, &provided(&[("env", Value::from("qa"))]), "t").unwrap_err();
        assert!(err.to_string().contains("not one of the allowed values: dev, prod"));
    }

    #[test]
    fn test_bind_passes_undeclared_values_through() {
        let bound = bind(&[], &provided(&[("extra", Value::from("x"))]), "t").unwrap();
        assert_eq!(bound["extra"], Value::from("x"));
    }
}
