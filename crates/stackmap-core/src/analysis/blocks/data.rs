use kit::constants::TYPE;
use kit::types::{BlockDeclaration, BlockKind, RawAttributes};
use regex::Regex;

use crate::analysis::entities::{DataSource, Validated};
use crate::analysis::errors::AnalysisError;
use crate::analysis::rule_id::RuleId;

use super::{require_name, required_str_attribute, validation_error, BlockValidator};

lazy_static! {
    static ref DATA_SOURCE_TYPE: Regex = Regex::new(r"^[A-Za-z0-9_]+_[A-Za-z0-9_]+$").unwrap();
}

#[derive(Debug, Clone, Default)]
pub struct DataValidator;

impl BlockValidator for DataValidator {
    type Entity = DataSource;
    const KIND: BlockKind = BlockKind::Data;

    fn validate(&self, declaration: &BlockDeclaration) -> Result<Validated<DataSource>, AnalysisError> {
        require_name(declaration)?;
        let data_type = required_str_attribute(declaration, TYPE)?;
        let provider = data_type.split('_').next().unwrap_or_default();
        if !DATA_SOURCE_TYPE.is_match(data_type) || provider.is_empty() {
            return Err(validation_error(
                declaration,
                RuleId::InvalidDataSourceType,
                format!("'{data_type}' is not of the form provider_type"),
            )
            .with_field_path(TYPE)
            .into());
        }
        let configuration: RawAttributes = declaration
            .raw_attributes
            .iter()
            .filter(|(key, _)| key.as_str() != TYPE)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Validated::new(DataSource {
            name: declaration.name.clone(),
            data_type: data_type.to_string(),
            provider: provider.to_string(),
            configuration,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn data(data_type: &str, name: &str) -> BlockDeclaration {
        BlockDeclaration::new(BlockKind::Data, name).with_attribute("type", json!(data_type))
    }

    #[test_case("aws_ami", "aws" ; "simple")]
    #[test_case("google_compute_image", "google" ; "several underscores")]
    #[test_case("azurerm_resource_group", "azurerm" ; "azure")]
    fn test_derives_provider(data_type: &str, provider: &str) {
        let source = DataValidator.validate(&data(data_type, "this")).unwrap().entity;
        assert_eq!(source.provider, provider);
        assert_eq!(source.data_type, data_type);
    }

    #[test_case("ami" ; "no underscore")]
    #[test_case("_ami" ; "empty provider")]
    #[test_case("aws_" ; "empty type")]
    #[test_case("aws-ami" ; "dash")]
    fn test_rejects_bad_types(data_type: &str) {
        let err = DataValidator.validate(&data(data_type, "this")).unwrap_err();
        assert_eq!(err.rule(), RuleId::InvalidDataSourceType);
    }

    #[test]
    fn test_requires_type_and_name() {
        let err = DataValidator.validate(&BlockDeclaration::new(BlockKind::Data, "x")).unwrap_err();
        assert_eq!(err.rule(), RuleId::MissingAttribute);
        let err = DataValidator.validate(&data("aws_ami", "")).unwrap_err();
        assert_eq!(err.rule(), RuleId::MissingName);
    }

    #[test]
    fn test_keeps_configuration() {
        let source = DataValidator
            .validate(&data("aws_ami", "ubuntu").with_attribute("most_recent", json!(true)))
            .unwrap()
            .entity;
        assert_eq!(source.configuration.get("most_recent"), Some(&json!(true)));
        assert!(!source.configuration.contains_key("type"));
    }
}
