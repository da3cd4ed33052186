use serde_json::json;
use stackmap_core::analysis::RuleId;
use stackmap_core::AnalyzerSettings;
use stackmap_test_utils::{
    assert_analysis_error, assert_success, test_context, ConfigurationBuilder,
};
use test_case::test_case;

const NETWORK: &str = r#"
    locals {
        project = "atlas"
        env     = "staging"
        prefix  = "${local.project}-${local.env}"
        cidrs   = { public = "10.0.0.0/24", private = "10.0.1.0/24" }
        public  = local.cidrs.public
    }

    variable "azs" {
        type        = list(string)
        default     = ["eu-west-1a", "eu-west-1b"]
        description = "Availability zones"

        validation {
            condition     = length(var.azs) > 0
            error_message = "At least one zone is required."
        }
    }

    provider "aws" {
        region = "eu-west-1"
        assume_role {
            role_arn = "arn:aws:iam::123456789012:role/deploy"
        }
    }

    module "vpc" {
        source  = "terraform-aws-modules/vpc/aws"
        version = "5.1.0"
        name    = local.prefix
    }

    data "aws_availability_zones" "available" {
        state = "available"
    }

    output "vpc_id" {
        value       = module.vpc.vpc_id
        description = "VPC identifier"
    }
"#;

#[test]
fn it_analyzes_a_network_configuration() {
    let result = ConfigurationBuilder::new().with_context(test_context()).with_hcl(NETWORK).analyze();
    assert_success!(result);
    assert!(result.warnings.is_empty());

    let analysis = &result.report.analysis;
    let locals = analysis.locals.as_ref().unwrap();
    assert_eq!(locals.get("prefix"), Some(&json!("atlas-staging")));
    assert_eq!(locals.get("public"), Some(&json!("10.0.0.0/24")));

    let azs = &analysis.variables[0];
    assert_eq!(azs.variable_type.to_string(), "list(string)");
    assert_eq!(azs.validation_rules[0].condition, "${length(var.azs) > 0}");

    assert!(!analysis.providers[0].has_sensitive_attributes);
    assert_eq!(analysis.modules[0].resolved_version.as_deref(), Some("5.1.0"));
    assert_eq!(analysis.data_sources[0].provider, "aws");
    assert_eq!(analysis.outputs[0].dependencies.iter().collect::<Vec<_>>(), vec!["module.vpc.vpc_id"]);
}

#[test_case(r#"locals {
    a = "${local.b}"
    b = local.c
    c = "${local.a}-c"
}"#, "a -> b -> c -> a" ; "three node cycle")]
#[test_case(r#"locals {
    a = upper(local.missing)
}"#, "unknown local value 'missing' referenced by 'a'" ; "unknown reference")]
#[test_case(r#"locals {
    count = 1
}"#, "reserved identifier" ; "reserved name")]
#[test_case(r#"variable "port" {
    type    = number
    default = "eighty"
}"#, "field 'port'" ; "type mismatch")]
#[test_case(r#"provider "aws" {
    version = "latest"
}"#, "invalid_version_constraint" ; "bad provider version")]
#[test_case(r#"module "far" {
    source   = "./far"
    position = { x = 20000, y = 0 }
}"#, "position_out_of_bounds" ; "module out of bounds")]
#[test_case(r#"data "ami" "ubuntu" {}"#, "invalid_data_source_type" ; "bad data type")]
#[test_case(r#"output "x" {
    description = "no value"
}"#, "attribute 'value' is required" ; "output without value")]
fn it_reports_invalid_configurations(content: &str, pattern: &str) {
    let result = ConfigurationBuilder::new().with_hcl(content).analyze();
    assert_analysis_error!(result, pattern);
}

#[test]
fn it_honors_settings() {
    let settings = AnalyzerSettings::from_yaml_str("max_dependency_depth: 1\n").unwrap();
    let result = ConfigurationBuilder::new()
        .with_settings(settings)
        .local("a", json!("${local.b}"))
        .local("b", json!("${local.c}"))
        .local("c", json!("c"))
        .analyze();
    assert!(!result.success);
    assert_eq!(result.report.errors[0].rule(), RuleId::DependencyTooDeep);
}

#[test]
fn it_reports_malformed_hcl() {
    let result = ConfigurationBuilder::new().with_hcl("locals {").analyze();
    assert_analysis_error!(result, "parsing error");
}
