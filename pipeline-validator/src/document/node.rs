// Document Tree
// Closed representation of a parsed pipeline document: mappings, sequences, scalars

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use std::fmt;

/// Leaf value of the document tree
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Scalar {
    /// Render the scalar the way it would appear inside a string
    pub fn as_string(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Number(n) => format_number(*n),
            Scalar::String(s) => s.clone(),
        }
    }
}

/// Format a number without a trailing `.0` for integral values
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

/// A node in the parsed document tree.
///
/// Mapping keys keep their document order, so every walk over the tree is
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(IndexMap<String, Node>),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

impl Default for Node {
    fn default() -> Self {
        Node::Scalar(Scalar::Null)
    }
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(Scalar::String(value.into()))
    }

    pub fn mapping() -> Self {
        Node::Mapping(IndexMap::new())
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// String content of a string scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Node::Scalar(Scalar::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    /// Look up a key when this node is a mapping
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Scalar text for any scalar kind (numbers and booleans are stringified)
    pub fn scalar_text(&self) -> Option<String> {
        self.as_scalar().map(Scalar::as_string)
    }

    /// Short type name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Mapping(_) => "mapping",
            Node::Sequence(_) => "sequence",
            Node::Scalar(Scalar::Null) => "null",
            Node::Scalar(Scalar::Bool(_)) => "boolean",
            Node::Scalar(Scalar::Number(_)) => "number",
            Node::Scalar(Scalar::String(_)) => "string",
        }
    }

    /// Adapt a value produced by the YAML parser
    pub fn from_yaml(yaml: &serde_yaml::Value) -> Self {
        match yaml {
            serde_yaml::Value::Null => Node::null(),
            serde_yaml::Value::Bool(b) => Node::Scalar(Scalar::Bool(*b)),
            serde_yaml::Value::Number(n) => {
                let number = n
                    .as_f64()
                    .or_else(|| n.as_i64().map(|i| i as f64))
                    .unwrap_or_default();
                Node::Scalar(Scalar::Number(number))
            }
            serde_yaml::Value::String(s) => Node::string(s.clone()),
            serde_yaml::Value::Sequence(seq) => {
                Node::Sequence(seq.iter().map(Node::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => Node::Mapping(
                map.iter()
                    .map(|(k, v)| (yaml_key(k), Node::from_yaml(v)))
                    .collect(),
            ),
            // Custom tags carry no meaning in pipeline documents
            serde_yaml::Value::Tagged(tagged) => Node::from_yaml(&tagged.value),
        }
    }

    /// Convert back into a YAML value (used to render expanded documents)
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Node::Scalar(Scalar::Null) => serde_yaml::Value::Null,
            Node::Scalar(Scalar::Bool(b)) => serde_yaml::Value::Bool(*b),
            Node::Scalar(Scalar::Number(n)) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serde_yaml::Value::Number((*n as i64).into())
                } else {
                    serde_yaml::Value::Number((*n).into())
                }
            }
            Node::Scalar(Scalar::String(s)) => serde_yaml::Value::String(s.clone()),
            Node::Sequence(seq) => {
                serde_yaml::Value::Sequence(seq.iter().map(Node::to_yaml).collect())
            }
            Node::Mapping(map) => {
                let mut mapping = serde_yaml::Mapping::new();
                for (k, v) in map {
                    mapping.insert(serde_yaml::Value::String(k.clone()), v.to_yaml());
                }
                serde_yaml::Value::Mapping(mapping)
            }
        }
    }

    /// Render the node as YAML text
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_yaml())
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::string(s)
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::string(s)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Scalar(Scalar::Bool(b))
    }
}

impl From<f64> for Node {
    fn from(n: f64) -> Self {
        Node::Scalar(Scalar::Number(n))
    }
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// One step in a path from the document root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a node, rendered as `stages[0].jobs[1].steps[2]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath {
    segments: Vec<PathSegment>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of a mapping entry below this node
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        Self { segments }
    }

    /// Path of a sequence item below this node
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<root>");
        }

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
