//! Typed entities produced by the block validators.
//!
//! They are read-only once returned and serialize with the field names the
//! persistence layer expects.

use kit::constants::REDACTED_VALUE_MARKER;
use kit::indexmap::IndexSet;
use kit::types::diagnostics::Diagnostic;
use kit::types::{RawAttributes, Value};
use serde::ser::{SerializeStruct, Serializer};

use super::sources::{ProviderSource, SourceKind};
use super::type_descriptor::TypeDescriptor;

/// An entity, together with the non-fatal findings raised while validating it.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    pub entity: T,
    pub warnings: Vec<Diagnostic>,
}

impl<T> Validated<T> {
    pub fn new(entity: T) -> Self {
        Validated { entity, warnings: vec![] }
    }

    pub fn with_warning(mut self, warning: Diagnostic) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn into_entity(self) -> T {
        self.entity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub condition: String,
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub variable_type: TypeDescriptor,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub validation_rules: Vec<ValidationRule>,
    pub sensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputDeclaration {
    pub name: String,
    pub value: Value,
    pub dependencies: IndexSet<String>,
    pub sensitive: bool,
    pub description: Option<String>,
}

impl OutputDeclaration {
    /// The value as exposed outside of the engine.
    pub fn exposed_value(&self) -> Value {
        if self.sensitive {
            Value::String(REDACTED_VALUE_MARKER.to_string())
        } else {
            self.value.clone()
        }
    }
}

impl serde::Serialize for OutputDeclaration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("OutputDeclaration", 5)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("value", &self.exposed_value())?;
        state.serialize_field("dependencies", &self.dependencies)?;
        state.serialize_field("sensitive", &self.sensitive)?;
        state.serialize_field("description", &self.description)?;
        state.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleReference {
    pub name: String,
    /// Source path, without its `?ref=` query.
    pub source: String,
    pub resolved_version: Option<String>,
    pub source_kind: SourceKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfiguration {
    pub name: String,
    pub alias: Option<String>,
    pub version: Option<String>,
    pub source: ProviderSource,
    pub configuration: RawAttributes,
    pub has_sensitive_attributes: bool,
    /// Dotted paths of the attributes that look sensitive.
    pub sensitive_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub provider: String,
    pub configuration: RawAttributes,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_sensitive_output_is_redacted() {
        let output = OutputDeclaration {
            name: "db_password".into(),
            value: json!("secret-value"),
            dependencies: ["local.password".to_string()].into_iter().collect(),
            sensitive: true,
            description: None,
        };
        let exposed = serde_json::to_value(&output).unwrap();
        assert_eq!(exposed["value"], json!(REDACTED_VALUE_MARKER));
        assert_eq!(exposed["dependencies"], json!(["local.password"]));
        assert!(!exposed.to_string().contains("secret-value"));
        assert_eq!(output.value, json!("secret-value"));
    }

    #[test]
    fn test_module_field_names() {
        let module = ModuleReference {
            name: "vpc".into(),
            source: "terraform-aws-modules/vpc/aws".into(),
            resolved_version: Some("5.0.0".into()),
            source_kind: SourceKind::Registry,
            position: Position { x: 1.0, y: -2.5 },
        };
        assert_eq!(
            serde_json::to_value(&module).unwrap(),
            json!({
                "name": "vpc",
                "source": "terraform-aws-modules/vpc/aws",
                "resolvedVersion": "5.0.0",
                "sourceKind": "registry",
                "position": { "x": 1.0, "y": -2.5 }
            })
        );
    }
}
