use std::sync::Arc;
use std::time::Duration;

use kit::types::{BlockDeclaration, BlockKind};
use serde_json::json;

use crate::analysis::RuleId;
use crate::cache::ManualClock;
use crate::{AnalysisError, Analyzer, AnalyzerSettings, Context};

fn logging_context() -> Context {
    Context::new(slog::Logger::root(slog::Discard, o!()))
}

fn analyzer() -> Analyzer {
    Analyzer::builder(AnalyzerSettings::default()).context(logging_context()).build()
}

#[test]
fn it_analyzes_a_configuration_unit() {
    let input = r#"
        locals {
            env    = "prod"
            name   = "app-${local.env}"
            zones  = ["a", "b"]
        }

        variable "instance_types" {
            type    = list(string)
            default = ["t3.micro"]
        }

        provider "aws" {
            region  = "eu-west-1"
            version = "~> 5.0"
        }

        module "vpc" {
            source = "git::https://example.com/vpc.git?ref=v1.2.3"
        }

        data "aws_ami" "ubuntu" {
            most_recent = true
        }

        output "name" {
            value = local.name
        }

        resource "aws_instance" "web" {
            ami = data.aws_ami.ubuntu.id
        }
    "#;

    let report = analyzer().analyze_hcl(input).unwrap();
    assert!(!report.has_errors(), "{:?}", report.diagnostics());

    let analysis = &report.analysis;
    let locals = analysis.locals.as_ref().unwrap();
    assert_eq!(locals.get("name"), Some(&json!("app-prod")));
    assert_eq!(locals.get("zones"), Some(&json!(["a", "b"])));
    assert_eq!(analysis.variables[0].name, "instance_types");
    assert_eq!(analysis.providers[0].version.as_deref(), Some("~> 5.0"));
    assert_eq!(analysis.modules[0].resolved_version.as_deref(), Some("v1.2.3"));
    assert_eq!(analysis.data_sources[0].provider, "aws");
    assert_eq!(
        analysis.outputs[0].dependencies.iter().collect::<Vec<_>>(),
        vec!["local.name"]
    );
}

#[test]
fn it_collects_every_error() {
    let declarations = vec![
        BlockDeclaration::local("a", json!("${local.b}")),
        BlockDeclaration::local("b", json!("${local.a}")),
        BlockDeclaration::new(BlockKind::Variable, "port")
            .with_attribute("type", json!("number"))
            .with_attribute("default", json!("80")),
        BlockDeclaration::new(BlockKind::Module, "net"),
        BlockDeclaration::new(BlockKind::Output, "creds")
            .with_attribute("value", json!({ "a": 1 }))
            .with_attribute("sensitive", json!(true)),
        BlockDeclaration::new(BlockKind::Output, "creds").with_attribute("value", json!(1)),
    ];

    let report = analyzer().analyze(&declarations);
    let rules: Vec<RuleId> = report.errors.iter().map(AnalysisError::rule).collect();
    assert_eq!(
        rules,
        vec![
            RuleId::CircularDependency,
            RuleId::TypeMismatch,
            RuleId::MissingAttribute,
            RuleId::DuplicateBlock,
        ]
    );
    assert!(report.analysis.locals.is_none());
    assert_eq!(report.warning_count(), 1);

    let diagnostics = report.diagnostics();
    assert_eq!(diagnostics.len(), 5);
    assert_eq!(diagnostics[0].message, "circular dependency detected: a -> b -> a");
    assert!(diagnostics[4].is_warning());
}

#[test]
fn it_allows_aliased_providers() {
    let declarations = vec![
        BlockDeclaration::new(BlockKind::Provider, "aws"),
        BlockDeclaration::new(BlockKind::Provider, "aws").with_attribute("alias", json!("west")),
        BlockDeclaration::new(BlockKind::Data, "this").with_attribute("type", json!("aws_ami")),
        BlockDeclaration::new(BlockKind::Data, "this").with_attribute("type", json!("aws_vpc")),
    ];
    let report = analyzer().analyze(&declarations);
    assert!(!report.has_errors());
    assert_eq!(report.analysis.providers.len(), 2);
    assert_eq!(report.analysis.data_sources.len(), 2);
}

#[test]
fn it_expires_module_sources_on_the_injected_clock() {
    let clock = Arc::new(ManualClock::new());
    let analyzer = Analyzer::new(AnalyzerSettings::default()).with_clock(clock.clone());
    let module = BlockDeclaration::new(BlockKind::Module, "vpc")
        .with_attribute("source", json!("terraform-aws-modules/vpc/aws"));

    analyzer.validate_module(&module).unwrap();
    analyzer.validate_module(&module).unwrap();
    assert_eq!(analyzer.module_sources().classification_count(), 1);

    clock.advance(Duration::from_secs(3600));
    analyzer.validate_module(&module).unwrap();
    assert_eq!(analyzer.module_sources().classification_count(), 2);
}

#[test]
fn it_shares_caches_across_workers() {
    let analyzer = Arc::new(analyzer());
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let analyzer = analyzer.clone();
            std::thread::spawn(move || {
                let declarations = vec![
                    BlockDeclaration::local("id", json!(worker)),
                    BlockDeclaration::new(BlockKind::Module, "shared")
                        .with_attribute("source", json!("./modules/shared")),
                ];
                analyzer.analyze(&declarations)
            })
        })
        .collect();
    for handle in handles {
        assert!(!handle.join().unwrap().has_errors());
    }
    assert_eq!(analyzer.module_sources().classification_count(), 1);
}

#[test]
fn it_reports_front_end_errors() {
    let err = analyzer().analyze_hcl("variable {").unwrap_err();
    assert!(err.is_error());
}

#[test]
fn it_serializes_the_analysis() {
    let declarations = vec![
        BlockDeclaration::local("password", json!("hunter2")),
        BlockDeclaration::new(BlockKind::Output, "password")
            .with_attribute("value", json!("${local.password}"))
            .with_attribute("sensitive", json!(true)),
    ];
    let report = analyzer().analyze(&declarations);
    let exposed = serde_json::to_value(&report.analysis).unwrap();
    assert_eq!(exposed["outputs"][0]["value"], json!("<sensitive>"));
    assert_eq!(exposed["outputs"][0]["dependencies"], json!(["local.password"]));
    assert_eq!(exposed["locals"]["evaluationOrder"], json!(["password"]));
    assert_eq!(exposed["dataSources"], json!([]));
}
