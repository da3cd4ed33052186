use std::sync::Arc;

use kit::constants::{ALIAS, SOURCE, VERSION};
use kit::types::{BlockDeclaration, BlockKind, RawAttributes, Value};

use crate::analysis::entities::{ProviderConfiguration, Validated};
use crate::analysis::errors::AnalysisError;
use crate::analysis::rule_id::RuleId;
use crate::analysis::sources::ProviderSourceResolver;
use crate::context::Context;
use crate::settings::AnalyzerSettings;

use super::{
    is_valid_version_constraint, optional_str_attribute, require_name, validation_error,
    BlockValidator,
};

#[derive(Debug, Clone)]
pub struct ProviderValidator {
    sensitive_patterns: Vec<String>,
    sources: Arc<ProviderSourceResolver>,
    ctx: Context,
}

impl ProviderValidator {
    pub fn new(settings: &AnalyzerSettings, sources: Arc<ProviderSourceResolver>) -> Self {
        ProviderValidator {
            sensitive_patterns: settings
                .sensitive_attribute_patterns
                .iter()
                .map(|pattern| pattern.to_lowercase())
                .collect(),
            sources,
            ctx: Context::empty(),
        }
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    fn looks_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_patterns.iter().any(|pattern| key.contains(pattern.as_str()))
    }

    /// Dotted paths of every key, nested ones included, that looks sensitive.
    fn sensitive_paths(&self, value: &Value, prefix: &str, found: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, nested) in map.iter() {
                    let path =
                        if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                    if self.looks_sensitive(key) {
                        found.push(path.clone());
                    }
                    self.sensitive_paths(nested, &path, found);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.sensitive_paths(item, &format!("{prefix}.{index}"), found);
                }
            }
            _ => {}
        }
    }
}

impl Default for ProviderValidator {
    fn default() -> Self {
        Self::new(&AnalyzerSettings::default(), Arc::new(ProviderSourceResolver::default()))
    }
}

impl BlockValidator for ProviderValidator {
    type Entity = ProviderConfiguration;
    const KIND: BlockKind = BlockKind::Provider;

    fn validate(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<ProviderConfiguration>, AnalysisError> {
        require_name(declaration)?;
        let alias = optional_str_attribute(declaration, ALIAS)?;
        let version = optional_str_attribute(declaration, VERSION)?;
        if let Some(constraint) = version.as_deref() {
            if !is_valid_version_constraint(constraint) {
                return Err(validation_error(
                    declaration,
                    RuleId::InvalidVersionConstraint,
                    format!("'{constraint}' is not a valid version constraint"),
                )
                .with_field_path(VERSION)
                .into());
            }
        }

        let address = optional_str_attribute(declaration, SOURCE)?
            .unwrap_or_else(|| declaration.name.clone());
        let source = self.sources.resolve(&address).map_err(|e| {
            validation_error(declaration, RuleId::InvalidProviderSource, e.to_string())
                .with_field_path(SOURCE)
        })?;

        let configuration: RawAttributes = declaration
            .raw_attributes
            .iter()
            .filter(|(key, _)| ![ALIAS, VERSION, SOURCE].contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut sensitive_attributes = vec![];
        self.sensitive_paths(&Value::Object(configuration.clone()), "", &mut sensitive_attributes);
        if !sensitive_attributes.is_empty() {
            self.ctx.try_log(|logger| {
                debug!(logger, "provider '{}' carries sensitive attributes", declaration.name;
                    "attributes" => sensitive_attributes.join(", "))
            });
        }

        Ok(Validated::new(ProviderConfiguration {
            name: declaration.name.clone(),
            alias,
            version,
            source,
            configuration,
            has_sensitive_attributes: !sensitive_attributes.is_empty(),
            sensitive_attributes,
        }))
    }
}
