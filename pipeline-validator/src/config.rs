// Validator configuration
// Limits and defaults shared by every analysis phase

use serde::Deserialize;

/// Default cap on nested template references
pub const DEFAULT_MAX_TEMPLATE_DEPTH: usize = 64;

/// Default cap on instances produced by one matrix or parallel strategy
pub const DEFAULT_MAX_MATRIX_INSTANCES: usize = 256;

/// Configuration for a validation run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Maximum template nesting before expansion fails
    pub max_template_depth: usize,

    /// Jobs without `dependsOn` wait for the previous job in the stage
    pub sequential_jobs: bool,

    /// Report unrecognized keys as warnings
    pub warn_unknown_keys: bool,

    /// Maximum job instances a single strategy may expand into
    pub max_matrix_instances: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_template_depth: DEFAULT_MAX_TEMPLATE_DEPTH,
            sequential_jobs: false,
            warn_unknown_keys: true,
            max_matrix_instances: DEFAULT_MAX_MATRIX_INSTANCES,
        }
    }
}

impl ValidatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from YAML; missing keys keep their defaults
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn with_max_template_depth(mut self, depth: usize) -> Self {
        self.max_template_depth = depth;
        self
    }

    pub fn with_sequential_jobs(mut self, sequential: bool) -> Self {
        self.sequential_jobs = sequential;
        self
    }

    pub fn with_warn_unknown_keys(mut self, warn: bool) -> Self {
        self.warn_unknown_keys = warn;
        self
    }

    pub fn with_max_matrix_instances(mut self, max: usize) -> Self {
        self.max_matrix_instances = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert_eq!(config.max_template_depth, 64);
        assert!(!config.sequential_jobs);
        assert!(config.warn_unknown_keys);
        assert_eq!(config.max_matrix_instances, 256);
    }

    #[test]
    fn test_from_yaml_keeps_defaults_for_missing_keys() {
        let config = ValidatorConfig::from_yaml_str("maxTemplateDepth: 8\nsequentialJobs: true").unwrap();
        assert_eq!(config.max_template_depth, 8);
        assert!(config.sequential_jobs);
        assert!(config.warn_unknown_keys);

        assert_eq!(ValidatorConfig::from_yaml_str("").unwrap(), ValidatorConfig::default());
    }

    #[test]
    fn test_from_yaml_rejects_unknown_keys() {
        assert!(ValidatorConfig::from_yaml_str("maxDepth: 3").is_err());
    }

    #[test]
    fn test_builders() {
        let config = ValidatorConfig::new()
            .with_max_template_depth(2)
            .with_warn_unknown_keys(false)
            .with_max_matrix_instances(4);
        assert_eq!(config.max_template_depth, 2);
        assert!(!config.warn_unknown_keys);
        assert_eq!(config.max_matrix_instances, 4);
    }
}
