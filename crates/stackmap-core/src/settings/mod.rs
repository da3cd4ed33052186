use std::path::Path;
use std::time::Duration;

use kit::constants::{DEFAULT_RESERVED_LOCAL_NAMES, DEFAULT_SENSITIVE_ATTRIBUTE_PATTERNS};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unable to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings: {0}")]
    Format(#[from] serde_yml::Error),
    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Limits and heuristics honored by the analyzer.
///
/// Loaded from YAML, every missing key falling back to its default:
///
/// ```yaml
/// max_dependency_depth: 8
/// module_source_cache_ttl_secs: 600
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Longest chain of local values that may be resolved in one pass.
    pub max_dependency_depth: usize,
    /// Deepest nesting accepted in a type constraint; a primitive has depth 1.
    pub max_type_depth: usize,
    pub module_source_cache_ttl_secs: u64,
    pub provider_source_cache_ttl_secs: u64,
    /// Module positions must lie within `[-position_bound, position_bound]` on both axes.
    pub position_bound: f64,
    pub reserved_local_names: Vec<String>,
    /// Case-insensitive substrings marking a provider attribute as sensitive.
    pub sensitive_attribute_patterns: Vec<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        AnalyzerSettings {
            max_dependency_depth: 5,
            max_type_depth: 5,
            module_source_cache_ttl_secs: 3600,
            provider_source_cache_ttl_secs: 300,
            position_bound: 10_000.0,
            reserved_local_names: DEFAULT_RESERVED_LOCAL_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sensitive_attribute_patterns: DEFAULT_SENSITIVE_ATTRIBUTE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AnalyzerSettings {
    pub fn from_yaml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: AnalyzerSettings = serde_yml::from_slice(content.as_bytes())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| SettingsError::Io { path: path.display().to_string(), source })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_dependency_depth == 0 {
            return Err(SettingsError::Invalid {
                key: "max_dependency_depth",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_type_depth == 0 {
            return Err(SettingsError::Invalid {
                key: "max_type_depth",
                reason: "must be at least 1".into(),
            });
        }
        if !self.position_bound.is_finite() || self.position_bound <= 0.0 {
            return Err(SettingsError::Invalid {
                key: "position_bound",
                reason: format!("expected a positive finite number, got {}", self.position_bound),
            });
        }
        Ok(())
    }

    pub fn module_source_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.module_source_cache_ttl_secs)
    }

    pub fn provider_source_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.provider_source_cache_ttl_secs)
    }

    pub fn is_reserved_local_name(&self, name: &str) -> bool {
        self.reserved_local_names.iter().any(|reserved| reserved == name)
    }

    pub fn is_sensitive_attribute(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_attribute_patterns
            .iter()
            .any(|pattern| key.contains(&pattern.to_lowercase()))
    }
}
