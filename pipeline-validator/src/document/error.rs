// Document parse errors with helpful messages
// Carries line/column info, surrounding source, and suggestions for common YAML mistakes

use std::fmt;

/// Error raised while adapting YAML text into a document tree
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown)
    pub column: usize,
    /// Surrounding context (a few lines around the error)
    pub context: String,
    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// YAML syntax error reported by the parser
    YamlSyntax,
    /// Well-formed YAML that is not a pipeline document (e.g. a bare scalar)
    InvalidDocument,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            context: String::new(),
            suggestion: None,
            kind: ParseErrorKind::InvalidDocument,
        }
    }

    pub fn yaml_error(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(message, line, column).with_kind(ParseErrorKind::YamlSyntax)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attach the source lines around `line`, marking the failing one
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        let first = self.line.saturating_sub(context_lines).max(1);
        let last = self.line + context_lines;

        self.context = source
            .lines()
            .enumerate()
            .map(|(i, text)| (i + 1, text))
            .filter(|(number, _)| (first..=last).contains(number))
            .map(|(number, text)| {
                let marker = if number == self.line { '>' } else { ' ' };
                let mut rendered = format!("{} {:>4} | {}\n", marker, number, text);
                if number == self.line && self.column > 0 {
                    rendered.push_str(&format!("       | {:>width$}\n", "^", width = self.column));
                }
                rendered
            })
            .collect();
        self
    }

    /// Locate a serde_yaml failure in the source text
    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err.location().map_or((1, 1), |at| (at.line(), at.column()));
        let error = ParseError::yaml_error(err.to_string(), line, column).with_source_context(source, 2);
        match suggest_yaml_fix(source, line) {
            Some(suggestion) => error.with_suggestion(suggestion),
            None => error,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.line, self.column)?;
        if !self.context.is_empty() {
            write!(f, "\n\n{}", self.context)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nhelp: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Suggest fixes for common YAML errors
fn suggest_yaml_fix(source: &str, line: usize) -> Option<String> {
    let error_line = source.lines().nth(line.saturating_sub(1)).unwrap_or("");

    if error_line.starts_with('\t') {
        return Some(
            "YAML prefers spaces over tabs for indentation. Replace tabs with spaces.".to_string(),
        );
    }

    if error_line.contains("${{") && !error_line.trim_start().starts_with('-') {
        let trimmed = error_line.trim();
        if !trimmed.starts_with('\'') && !trimmed.starts_with('"') && trimmed.starts_with('$') {
            return Some(
                "template expressions used as values should be quoted, e.g. '${{ parameters.x }}'"
                    .to_string(),
            );
        }
    }

    None
}

/// Result type for document parsing
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("document root must be a mapping", 1, 1)
            .with_suggestion("start the file with 'stages:', 'jobs:' or 'steps:'");

        let output = format!("{}", err);
        assert!(output.contains("document root must be a mapping"));
        assert!(output.contains("(line 1, column 1)"));
        assert!(output.contains("help:"));
    }

    #[test]
    fn test_parse_error_with_source_context() {
        let source = r#"trigger:
  - main

jobs:
  - job: Build
    displayName: Build Job"#;

        let err = ParseError::new("bad job", 5, 5).with_source_context(source, 2);

        assert!(err.context.contains(">    5 |   - job: Build"));
        assert!(err.context.contains("       |     ^"));
        assert!(!err.context.contains("trigger"));
    }

    #[test]
    fn test_tab_indentation_suggestion() {
        let source = "jobs:\n\t- job: Build";
        assert!(suggest_yaml_fix(source, 2).unwrap().contains("tabs"));
    }
}
