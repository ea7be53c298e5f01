// Document module
// Generic parsed document tree handed over by the YAML parsing collaborator

pub mod error;
pub mod node;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use node::{Node, NodePath, PathSegment, Scalar};

/// An immutable pipeline document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Node,
}

impl Document {
    /// Wrap an already-built tree. The root must be a mapping.
    pub fn new(root: Node) -> ParseResult<Self> {
        match root {
            Node::Mapping(_) => Ok(Self { root }),
            // An empty file parses as null; treat it as an empty pipeline
            Node::Scalar(Scalar::Null) => Ok(Self {
                root: Node::mapping(),
            }),
            other => Err(ParseError::new(
                format!("document root must be a mapping, found {}", other.kind_name()),
                1,
                1,
            )
            .with_suggestion("start the document with 'stages:', 'jobs:' or 'steps:'")),
        }
    }

    /// Adapt a value produced by serde_yaml
    pub fn from_yaml(value: &serde_yaml::Value) -> ParseResult<Self> {
        Self::new(Node::from_yaml(value))
    }

    /// Parse YAML text through serde_yaml and adapt the result
    pub fn from_yaml_str(content: &str) -> ParseResult<Self> {
        if content.trim().is_empty() {
            return Self::new(Node::mapping());
        }
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ParseError::from_yaml_error(&e, content))?;
        Self::from_yaml(&value)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Render the document as YAML text
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        self.root.to_yaml_string()
    }
}
