//! One validator per block kind.
//!
//! A validator borrows a declaration and either returns the typed entity or a
//! typed error attributed to the block. [`BlockValidation`] drives a validator
//! through `Unparsed -> Validating -> Valid | Invalid`.

use kit::types::{BlockDeclaration, BlockKind, Value};
use regex::Regex;

use crate::context::Context;

use super::entities::Validated;
use super::errors::{AnalysisError, ParseError, ValidationError};
use super::rule_id::RuleId;

mod data;
mod local;
mod module;
mod output;
mod provider;
mod variable;

pub use data::DataValidator;
pub use local::LocalValidator;
pub use module::ModuleValidator;
pub use output::OutputValidator;
pub use provider::ProviderValidator;
pub use variable::VariableValidator;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap();
    static ref VERSION_CONSTRAINT: Regex =
        Regex::new(r"^\s*(>=|<=|~>|=|>|<)?\s*\d+\.\d+(\.\d+)?(-\w+)?\s*$").unwrap();
}

pub trait BlockValidator {
    type Entity;
    const KIND: BlockKind;

    fn validate(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<Self::Entity>, AnalysisError>;
}

#[derive(Debug)]
pub enum ValidationState<T> {
    Unparsed,
    Validating,
    Valid(Validated<T>),
    Invalid(AnalysisError),
}

impl<T> ValidationState<T> {
    pub fn name(&self) -> &'static str {
        match self {
            ValidationState::Unparsed => "unparsed",
            ValidationState::Validating => "validating",
            ValidationState::Valid(_) => "valid",
            ValidationState::Invalid(_) => "invalid",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationState::Valid(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationState::Invalid(_))
    }
}

/// One run of a validator over one declaration.
pub struct BlockValidation<'a, V: BlockValidator> {
    validator: &'a V,
    declaration: &'a BlockDeclaration,
    state: ValidationState<V::Entity>,
    ctx: Context,
}

impl<'a, V: BlockValidator> BlockValidation<'a, V> {
    pub fn new(validator: &'a V, declaration: &'a BlockDeclaration, ctx: &Context) -> Self {
        BlockValidation {
            validator,
            declaration,
            state: ValidationState::Unparsed,
            ctx: ctx.for_block(declaration.kind.as_ref(), &declaration.name),
        }
    }

    pub fn state(&self) -> &ValidationState<V::Entity> {
        &self.state
    }

    /// Validates the declaration once; later calls return the settled state.
    pub fn run(&mut self) -> &ValidationState<V::Entity> {
        if let ValidationState::Unparsed = self.state {
            self.state = ValidationState::Validating;
            let outcome = if self.declaration.kind != V::KIND {
                Err(ParseError::new(
                    self.declaration.kind,
                    &self.declaration.name,
                    RuleId::InvalidAttribute,
                    format!("expected a {} block", V::KIND),
                )
                .into())
            } else {
                self.validator.validate(self.declaration)
            };
            self.state = match outcome {
                Ok(validated) => ValidationState::Valid(validated),
                Err(error) => {
                    self.ctx.try_log(|logger| debug!(logger, "block rejected: {}", error));
                    ValidationState::Invalid(error)
                }
            };
        }
        &self.state
    }

    pub fn finish(mut self) -> Result<Validated<V::Entity>, AnalysisError> {
        self.run();
        match self.state {
            ValidationState::Valid(validated) => Ok(validated),
            ValidationState::Invalid(error) => Err(error),
            ValidationState::Unparsed | ValidationState::Validating => Err(ParseError::new(
                self.declaration.kind,
                &self.declaration.name,
                RuleId::InvalidAttribute,
                "validation did not complete",
            )
            .into()),
        }
    }
}

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Accepts comma separated constraints such as `>= 1.2.0, < 2.0`.
pub fn is_valid_version_constraint(constraint: &str) -> bool {
    !constraint.trim().is_empty() && constraint.split(',').all(|part| VERSION_CONSTRAINT.is_match(part))
}

pub(crate) fn parse_error(
    declaration: &BlockDeclaration,
    rule: RuleId,
    message: impl Into<String>,
) -> AnalysisError {
    ParseError::new(declaration.kind, &declaration.name, rule, message).into()
}

pub(crate) fn validation_error(
    declaration: &BlockDeclaration,
    rule: RuleId,
    message: impl Into<String>,
) -> ValidationError {
    ValidationError::new(declaration.kind, &declaration.name, rule, message)
}

pub(crate) fn require_name(declaration: &BlockDeclaration) -> Result<(), AnalysisError> {
    if declaration.name.trim().is_empty() {
        return Err(parse_error(
            declaration,
            RuleId::MissingName,
            format!("{} blocks require a name", declaration.kind),
        ));
    }
    Ok(())
}

pub(crate) fn require_identifier(declaration: &BlockDeclaration) -> Result<(), AnalysisError> {
    require_name(declaration)?;
    if !is_valid_identifier(&declaration.name) {
        return Err(parse_error(
            declaration,
            RuleId::InvalidIdentifier,
            format!("'{}' is not a valid identifier", declaration.name),
        ));
    }
    Ok(())
}

pub(crate) fn required_attribute<'a>(
    declaration: &'a BlockDeclaration,
    key: &str,
) -> Result<&'a Value, AnalysisError> {
    declaration.get_non_null_attribute(key).ok_or_else(|| {
        parse_error(declaration, RuleId::MissingAttribute, format!("attribute '{key}' is required"))
    })
}

pub(crate) fn required_str_attribute<'a>(
    declaration: &'a BlockDeclaration,
    key: &str,
) -> Result<&'a str, AnalysisError> {
    match required_attribute(declaration, key)? {
        Value::String(value) if !value.trim().is_empty() => Ok(value),
        Value::String(_) => Err(parse_error(
            declaration,
            RuleId::MissingAttribute,
            format!("attribute '{key}' cannot be empty"),
        )),
        other => Err(parse_error(
            declaration,
            RuleId::InvalidAttribute,
            format!("attribute '{key}' must be a string, found {}", super::type_descriptor::value_kind(other)),
        )),
    }
}

pub(crate) fn optional_str_attribute(
    declaration: &BlockDeclaration,
    key: &str,
) -> Result<Option<String>, AnalysisError> {
    match declaration.get_non_null_attribute(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(parse_error(
            declaration,
            RuleId::InvalidAttribute,
            format!("attribute '{key}' must be a string, found {}", super::type_descriptor::value_kind(other)),
        )),
    }
}

/// Reads a flag, absent meaning `false`. `"true"`/`"false"` strings are accepted.
pub(crate) fn bool_attribute(
    declaration: &BlockDeclaration,
    key: &str,
) -> Result<bool, AnalysisError> {
    match declaration.get_non_null_attribute(key) {
        None => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(flag)) if flag == "true" || flag == "false" => Ok(flag == "true"),
        Some(other) => Err(parse_error(
            declaration,
            RuleId::InvalidAttribute,
            format!("attribute '{key}' must be a bool, found {}", super::type_descriptor::value_kind(other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case("region", true ; "simple")]
    #[test_case("instance-type_2", true ; "dashes and underscores")]
    #[test_case("2fast", false ; "leading digit")]
    #[test_case("_private", false ; "leading underscore")]
    #[test_case("has space", false ; "space")]
    #[test_case("", false ; "empty")]
    fn test_identifier(name: &str, expected: bool) {
        assert_eq!(is_valid_identifier(name), expected);
    }

    #[test_case("1.2", true ; "bare")]
    #[test_case("~> 4.0", true ; "pessimistic")]
    #[test_case(">= 1.2.3", true ; "minimum")]
    #[test_case("= 1.0.0-beta", true ; "prerelease")]
    #[test_case(">= 1.2.0, < 2.0.0", true ; "range")]
    #[test_case("latest", false ; "word")]
    #[test_case("1", false ; "major only")]
    #[test_case("!= 1.0", false ; "unsupported operator")]
    #[test_case(">= 1.0,", false ; "trailing comma")]
    fn test_version_constraint(constraint: &str, expected: bool) {
        assert_eq!(is_valid_version_constraint(constraint), expected);
    }

    #[test]
    fn test_validation_moves_through_states() {
        let validator = DataValidator::default();
        let declaration = BlockDeclaration::new(BlockKind::Data, "ubuntu")
            .with_attribute("type", json!("aws_ami"));
        let ctx = Context::empty();
        let mut validation = BlockValidation::new(&validator, &declaration, &ctx);
        assert_eq!(validation.state().name(), "unparsed");
        assert!(validation.run().is_valid());
        assert!(validation.run().is_valid());
        assert_eq!(validation.finish().unwrap().entity.provider, "aws");
    }

    #[test]
    fn test_validation_rejects_other_kinds() {
        let validator = DataValidator::default();
        let declaration = BlockDeclaration::new(BlockKind::Output, "ubuntu");
        let ctx = Context::empty();
        let mut validation = BlockValidation::new(&validator, &declaration, &ctx);
        assert!(validation.run().is_invalid());
        assert_eq!(validation.finish().unwrap_err().rule(), RuleId::InvalidAttribute);
    }
}
