//! Checker configuration, loaded from TOML.

use std::path::Path;

use serde::Deserialize;

/// What the pass driver does when a declaration fails to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stop at the first error.
    FailFast,
    /// Record the error, drop the declaration, continue with the next one.
    #[default]
    PerDeclaration,
}

/// Tunables for a checking run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CheckerConfig {
    pub error_policy: ErrorPolicy,
    /// Maximum nesting of instantiations triggered while instantiating.
    pub max_instantiation_depth: usize,
    /// The trait-bound completion loop runs at most
    /// `type_params * trait_completion_rounds_per_param` rounds.
    pub trait_completion_rounds_per_param: usize,
    /// Bind temporaries for `self ref` receivers instead of rejecting the call.
    pub materialize_rvalue_receivers: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            error_policy: ErrorPolicy::PerDeclaration,
            max_instantiation_depth: 64,
            trait_completion_rounds_per_param: 2,
            materialize_rvalue_receivers: false,
        }
    }
}

impl CheckerConfig {
    pub fn fail_fast() -> Self {
        CheckerConfig { error_policy: ErrorPolicy::FailFast, ..CheckerConfig::default() }
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<CheckerConfig, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml(content: &str) -> Result<CheckerConfig, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse checker config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = CheckerConfig::from_toml("").unwrap();
        assert_eq!(config.error_policy, ErrorPolicy::PerDeclaration);
        assert_eq!(config.max_instantiation_depth, 64);
        assert_eq!(config.trait_completion_rounds_per_param, 2);
        assert!(!config.materialize_rvalue_receivers);
    }

    #[test]
    fn parse_full_config() {
        let config = CheckerConfig::from_toml(
            r#"
error-policy = "fail-fast"
max-instantiation-depth = 8
trait-completion-rounds-per-param = 3
materialize-rvalue-receivers = true
"#,
        )
        .unwrap();
        assert_eq!(config.error_policy, ErrorPolicy::FailFast);
        assert_eq!(config.max_instantiation_depth, 8);
        assert_eq!(config.trait_completion_rounds_per_param, 3);
        assert!(config.materialize_rvalue_receivers);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = CheckerConfig::from_toml("error-policy = \"sometimes\"").unwrap_err();
        assert!(err.contains("Failed to parse checker config"), "got: {}", err);
    }
}
