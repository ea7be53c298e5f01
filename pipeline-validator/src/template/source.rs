// Template sources
// Where referenced templates come from. The expander never touches the filesystem.

use crate::document::{Document, ParseResult};

use indexmap::IndexMap;

/// Lookup of template documents by the name used in `template:`
pub trait TemplateSource {
    fn load(&self, name: &str) -> Option<Document>;
}

/// Canonical form of a template reference: trimmed, forward slashes, no leading `./`
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.trim().replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized.trim_start_matches('/').to_string()
}

/// In-memory template store
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, Document>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, document: Document) {
        self.templates.insert(normalize_name(name.as_ref()), document);
    }

    pub fn with_template(mut self, name: impl AsRef<str>, document: Document) -> Self {
        self.insert(name, document);
        self
    }

    /// Parse YAML text and register it
    pub fn insert_yaml(&mut self, name: impl AsRef<str>, content: &str) -> ParseResult<()> {
        let document = Document::from_yaml_str(content)?;
        self.insert(name, document);
        Ok(())
    }

    pub fn with_yaml(mut self, name: impl AsRef<str>, content: &str) -> ParseResult<Self> {
        self.insert_yaml(name, content)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(&normalize_name(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateSource for TemplateRegistry {
    fn load(&self, name: &str) -> Option<Document> {
        self.templates.get(&normalize_name(name)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name(" ./templates/build.yml "), "templates/build.yml");
        assert_eq!(normalize_name("templates\\build.yml"), "templates/build.yml");
        assert_eq!(normalize_name("/build.yml"), "build.yml");
    }

    #[test]
    fn test_registry_lookup_uses_normalized_names() {
        let registry = TemplateRegistry::new()
            .with_yaml("./steps/test.yml", "steps:\n  - script: cargo test")
            .unwrap();

        assert!(registry.contains("steps/test.yml"));
        assert!(registry.load("steps/test.yml").is_some());
        assert!(registry.load("steps/other.yml").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let mut registry = TemplateRegistry::new();
        assert!(registry.insert_yaml("bad.yml", "steps: [unclosed").is_err());
        assert!(registry.is_empty());
    }
}
