use kit::constants::{CONDITION, DEFAULT, DESCRIPTION, ERROR_MESSAGE, SENSITIVE, TYPE, VALIDATION};
use kit::hcl::parser::parse_expr;
use kit::types::{BlockDeclaration, BlockKind, Value};

use crate::analysis::entities::{Validated, ValidationRule, VariableDefinition};
use crate::analysis::errors::AnalysisError;
use crate::analysis::references::interpolation_spans;
use crate::analysis::rule_id::RuleId;
use crate::analysis::type_descriptor::{build_validator, parse_type, DEFAULT_MAX_TYPE_DEPTH};
use crate::context::Context;
use crate::settings::AnalyzerSettings;

use super::{
    bool_attribute, optional_str_attribute, parse_error, require_identifier, validation_error,
    BlockValidator,
};

#[derive(Debug, Clone)]
pub struct VariableValidator {
    max_type_depth: usize,
    ctx: Context,
}

impl VariableValidator {
    pub fn new(settings: &AnalyzerSettings) -> Self {
        VariableValidator { max_type_depth: settings.max_type_depth, ctx: Context::empty() }
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    fn validation_rules(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Vec<ValidationRule>, AnalysisError> {
        let raw_rules = match declaration.get_non_null_attribute(VALIDATION) {
            None => return Ok(vec![]),
            Some(Value::Array(rules)) => rules.iter().collect::<Vec<_>>(),
            Some(rule @ Value::Object(_)) => vec![rule],
            Some(_) => {
                return Err(parse_error(
                    declaration,
                    RuleId::InvalidAttribute,
                    "validation must be a block or a list of blocks",
                ))
            }
        };

        let mut rules = vec![];
        for (index, raw_rule) in raw_rules.into_iter().enumerate() {
            let condition = match raw_rule.get(CONDITION) {
                Some(Value::String(condition)) => condition.clone(),
                Some(Value::Bool(flag)) => flag.to_string(),
                _ => {
                    return Err(parse_error(
                        declaration,
                        RuleId::MissingAttribute,
                        format!("validation rule {index} requires a condition"),
                    ))
                }
            };
            let Some(error_message) = raw_rule.get(ERROR_MESSAGE).and_then(Value::as_str) else {
                return Err(parse_error(
                    declaration,
                    RuleId::MissingAttribute,
                    format!("validation rule {index} requires an error_message"),
                ));
            };
            if let Err(e) = parse_expr(condition_expression(&condition)) {
                return Err(validation_error(
                    declaration,
                    RuleId::InvalidCondition,
                    format!("condition '{condition}' is not a valid expression: {e}"),
                )
                .with_field_path(format!("{}.{index}.{}", VALIDATION, CONDITION))
                .into());
            }
            rules.push(ValidationRule { condition, error_message: error_message.to_string() });
        }
        Ok(rules)
    }
}

impl Default for VariableValidator {
    fn default() -> Self {
        VariableValidator { max_type_depth: DEFAULT_MAX_TYPE_DEPTH, ctx: Context::empty() }
    }
}

/// Conditions are written either bare or wrapped in a single `${...}` span.
fn condition_expression(condition: &str) -> &str {
    let trimmed = condition.trim();
    match interpolation_spans(trimmed).as_slice() {
        [span] if span.start == 0 && span.end == trimmed.len() => span.inner(),
        _ => trimmed,
    }
}

impl BlockValidator for VariableValidator {
    type Entity = VariableDefinition;
    const KIND: BlockKind = BlockKind::Variable;

    fn validate(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<VariableDefinition>, AnalysisError> {
        require_identifier(declaration)?;

        let raw_type = declaration.get_attribute(TYPE).cloned().unwrap_or(Value::Null);
        let variable_type = parse_type(&raw_type, self.max_type_depth).map_err(|e| {
            validation_error(declaration, RuleId::TypeTooDeep, e.to_string())
                .with_field_path(TYPE)
        })?;

        let default = declaration.get_non_null_attribute(DEFAULT).cloned();
        if let Some(value) = default.as_ref() {
            build_validator(&variable_type).validate(value).map_err(|mismatch| {
                let field_path = match mismatch.path() {
                    path if path.is_empty() => declaration.name.clone(),
                    path => format!("{}.{}", declaration.name, path),
                };
                validation_error(
                    declaration,
                    RuleId::TypeMismatch,
                    format!("default value does not match type {}: {}", variable_type, mismatch),
                )
                .with_field_path(field_path)
                .with_kinds(mismatch.expected.clone(), mismatch.actual.clone())
            })?;
        }

        let validation_rules = self.validation_rules(declaration)?;
        self.ctx.try_log(|logger| {
            debug!(logger, "variable '{}' typed as {}", declaration.name, variable_type)
        });

        Ok(Validated::new(VariableDefinition {
            name: declaration.name.clone(),
            variable_type,
            default,
            description: optional_str_attribute(declaration, DESCRIPTION)?,
            validation_rules,
            sensitive: bool_attribute(declaration, SENSITIVE)?,
        }))
    }
}
