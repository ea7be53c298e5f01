// Expression values
// Runtime representation of everything an expression can produce

use crate::document::node::format_number;
use crate::document::{Node, Scalar};

use indexmap::IndexMap;
use serde::Serialize;

/// Value produced by evaluating an expression
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null => Some(0.0),
            _ => None,
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => self.to_json(),
        }
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }

    /// Convert a document node into a value
    pub fn from_node(node: &Node) -> Value {
        match node {
            Node::Scalar(Scalar::Null) => Value::Null,
            Node::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Node::Scalar(Scalar::Number(n)) => Value::Number(*n),
            Node::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            Node::Sequence(seq) => Value::Array(seq.iter().map(Value::from_node).collect()),
            Node::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_node(v)))
                    .collect(),
            ),
        }
    }

    /// Convert a value back into a document node
    pub fn to_node(&self) -> Node {
        match self {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => Node::Scalar(Scalar::Number(*n)),
            Value::String(s) => Node::string(s.clone()),
            Value::Array(items) => Node::Sequence(items.iter().map(Value::to_node).collect()),
            Value::Object(map) => {
                Node::Mapping(map.iter().map(|(k, v)| (k.clone(), v.to_node())).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::String("false".into()).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_as_string_formats_numbers_and_bools() {
        assert_eq!(Value::Number(42.0).as_string(), "42");
        assert_eq!(Value::Number(1.5).as_string(), "1.5");
        assert_eq!(Value::Bool(true).as_string(), "True");
    }

    #[test]
    fn test_to_json_keeps_object_order() {
        let mut map = IndexMap::new();
        map.insert("b".to_string(), Value::Number(1.0));
        map.insert("a".to_string(), Value::String("x".into()));
        assert_eq!(Value::Object(map).to_json(), r#"{"b":1.0,"a":"x"}"#);
    }

    #[test]
    fn test_node_conversion_preserves_structure() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("a: [1, 'two', true]").unwrap();
        let node = Node::from_yaml(&yaml);
        assert_eq!(Value::from_node(&node).to_node(), node);
    }
}
