use std::sync::Arc;

use kit::constants::{POSITION, SOURCE, VERSION};
use kit::types::{BlockDeclaration, BlockKind, Value};

use crate::analysis::entities::{ModuleReference, Position, Validated};
use crate::analysis::errors::AnalysisError;
use crate::analysis::rule_id::RuleId;
use crate::analysis::sources::SourceResolver;
use crate::context::Context;
use crate::settings::AnalyzerSettings;

use super::{
    optional_str_attribute, require_name, required_str_attribute, validation_error, BlockValidator,
};

#[derive(Debug, Clone)]
pub struct ModuleValidator {
    position_bound: f64,
    sources: Arc<SourceResolver>,
    ctx: Context,
}

impl ModuleValidator {
    pub fn new(settings: &AnalyzerSettings, sources: Arc<SourceResolver>) -> Self {
        ModuleValidator { position_bound: settings.position_bound, sources, ctx: Context::empty() }
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    fn position(&self, declaration: &BlockDeclaration) -> Result<Position, AnalysisError> {
        let invalid = || {
            validation_error(
                declaration,
                RuleId::InvalidPosition,
                "position must be two finite numbers, as { x, y } or [x, y]",
            )
            .with_field_path(POSITION)
        };
        let (x, y) = match declaration.get_non_null_attribute(POSITION) {
            None => return Ok(Position::default()),
            Some(Value::Object(coordinates)) => (coordinates.get("x"), coordinates.get("y")),
            Some(Value::Array(coordinates)) if coordinates.len() == 2 => {
                (coordinates.first(), coordinates.get(1))
            }
            Some(_) => return Err(invalid().into()),
        };
        let (Some(x), Some(y)) = (x.and_then(Value::as_f64), y.and_then(Value::as_f64)) else {
            return Err(invalid().into());
        };
        if !x.is_finite() || !y.is_finite() {
            return Err(invalid().into());
        }
        let bound = self.position_bound;
        if x.abs() > bound || y.abs() > bound {
            return Err(validation_error(
                declaration,
                RuleId::PositionOutOfBounds,
                format!("position ({x}, {y}) lies outside [-{bound}, {bound}]"),
            )
            .with_field_path(POSITION)
            .into());
        }
        Ok(Position { x, y })
    }
}

impl Default for ModuleValidator {
    fn default() -> Self {
        Self::new(&AnalyzerSettings::default(), Arc::new(SourceResolver::default()))
    }
}

impl BlockValidator for ModuleValidator {
    type Entity = ModuleReference;
    const KIND: BlockKind = BlockKind::Module;

    fn validate(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<ModuleReference>, AnalysisError> {
        require_name(declaration)?;
        let source = required_str_attribute(declaration, SOURCE)?;
        let position = self.position(declaration)?;
        let classified = self.sources.resolve(source);
        let resolved_version = match classified.version {
            Some(version) => Some(version),
            None => optional_str_attribute(declaration, VERSION)?,
        };
        self.ctx.try_log(|logger| {
            debug!(logger, "module '{}' sourced from {}", declaration.name, classified.path;
                "kind" => classified.kind.as_ref())
        });
        Ok(Validated::new(ModuleReference {
            name: declaration.name.clone(),
            source: classified.path,
            resolved_version,
            source_kind: classified.kind,
            position,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::analysis::sources::SourceKind;

    fn module(source: &str) -> BlockDeclaration {
        BlockDeclaration::new(BlockKind::Module, "network").with_attribute("source", json!(source))
    }

    fn validate(declaration: BlockDeclaration) -> Result<ModuleReference, AnalysisError> {
        ModuleValidator::default().validate(&declaration).map(Validated::into_entity)
    }

    #[test]
    fn test_git_source_with_ref() {
        let reference = validate(module("git::https://example.com/mod.git?ref=v1.2.3")).unwrap();
        assert_eq!(reference.source, "git::https://example.com/mod.git");
        assert_eq!(reference.resolved_version.as_deref(), Some("v1.2.3"));
        assert_eq!(reference.source_kind, SourceKind::Git);
        assert_eq!(reference.position, Position { x: 0.0, y: 0.0 });
    }

    #[test]
    fn test_registry_version_attribute() {
        let reference = validate(
            module("terraform-aws-modules/vpc/aws").with_attribute("version", json!("5.1.0")),
        )
        .unwrap();
        assert_eq!(reference.source_kind, SourceKind::Registry);
        assert_eq!(reference.resolved_version.as_deref(), Some("5.1.0"));
    }

    #[test_case(json!({"x": 10, "y": -20.5}), 10.0, -20.5 ; "object")]
    #[test_case(json!([10000, -10000]), 10000.0, -10000.0 ; "array at bounds")]
    fn test_positions(position: Value, x: f64, y: f64) {
        let reference = validate(module("./net").with_attribute("position", position)).unwrap();
        assert_eq!(reference.position, Position { x, y });
    }

    #[test_case(json!({"x": 1}), RuleId::InvalidPosition ; "missing y")]
    #[test_case(json!(["1", 2]), RuleId::InvalidPosition ; "string coordinate")]
    #[test_case(json!([1, 2, 3]), RuleId::InvalidPosition ; "three coordinates")]
    #[test_case(json!("here"), RuleId::InvalidPosition ; "not coordinates")]
    #[test_case(json!({"x": 10000.5, "y": 0}), RuleId::PositionOutOfBounds ; "out of bounds")]
    fn test_invalid_positions(position: Value, rule: RuleId) {
        let err = validate(module("./net").with_attribute("position", position)).unwrap_err();
        assert_eq!(err.rule(), rule);
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_requires_source() {
        let err = validate(BlockDeclaration::new(BlockKind::Module, "network")).unwrap_err();
        assert_eq!(err.rule(), RuleId::MissingAttribute);
        let err = validate(module("")).unwrap_err();
        assert_eq!(err.rule(), RuleId::MissingAttribute);
        let err = validate(
            BlockDeclaration::new(BlockKind::Module, "network").with_attribute("source", json!(3)),
        )
        .unwrap_err();
        assert_eq!(err.rule(), RuleId::InvalidAttribute);
    }

    #[test]
    fn test_shares_the_source_cache() {
        let sources = Arc::new(SourceResolver::default());
        let validator = ModuleValidator::new(&AnalyzerSettings::default(), sources.clone());
        let declaration = module("./net");
        validator.validate(&declaration).unwrap();
        validator.validate(&declaration).unwrap();
        assert_eq!(sources.classification_count(), 1);
    }
}
