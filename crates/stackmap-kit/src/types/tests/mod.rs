use serde_json::json;
use std::str::FromStr;
use test_case::test_case;

use super::diagnostics::Diagnostic;
use super::{BlockDeclaration, BlockKind};

#[test_case("locals", Some(BlockKind::Local))]
#[test_case("variable", Some(BlockKind::Variable))]
#[test_case("output", Some(BlockKind::Output))]
#[test_case("provider", Some(BlockKind::Provider))]
#[test_case("module", Some(BlockKind::Module))]
#[test_case("data", Some(BlockKind::Data))]
#[test_case("resource", None)]
#[test_case("terraform", None)]
fn it_maps_block_idents(ident: &str, expected: Option<BlockKind>) {
    assert_eq!(BlockKind::from_block_ident(ident), expected);
}

#[test]
fn it_displays_block_kinds_in_lowercase() {
    assert_eq!(BlockKind::Provider.to_string(), "provider");
    assert_eq!(BlockKind::from_str("module").unwrap(), BlockKind::Module);
}

#[test]
fn it_deserializes_declarations_with_camel_case_attributes() {
    let declaration: BlockDeclaration = serde_json::from_value(json!({
        "kind": "variable",
        "name": "region",
        "rawAttributes": { "type": "string", "default": "eu-west-1" }
    }))
    .unwrap();

    assert_eq!(declaration.kind, BlockKind::Variable);
    assert_eq!(declaration.get_str_attribute("default"), Some("eu-west-1"));
    assert_eq!(declaration.get_str_attribute("missing"), None);
}

#[test]
fn it_ignores_null_attributes() {
    let declaration = BlockDeclaration::new(BlockKind::Variable, "region")
        .with_attribute("default", serde_json::Value::Null);
    assert!(declaration.get_attribute("default").is_some());
    assert!(declaration.get_non_null_attribute("default").is_none());
}

#[test]
fn it_renders_diagnostics_with_code_and_block() {
    let diagnostic = Diagnostic::error("expected string, found number")
        .with_code("type_mismatch")
        .with_block("variable", "region")
        .with_field_path("0");
    assert_eq!(
        diagnostic.to_string(),
        "error[type_mismatch] (variable 'region', field '0'): expected string, found number"
    );

    let warning = Diagnostic::warning("composite sensitive value").with_block("output", "creds");
    assert_eq!(warning.to_string(), "warning (output 'creds'): composite sensitive value");
}
