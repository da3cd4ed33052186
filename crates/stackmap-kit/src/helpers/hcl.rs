use std::collections::VecDeque;

use indexmap::IndexMap;
use serde_json::{Map, Number as JsonNumber, Value as JsonValue};

use crate::constants::{LOCALS, TYPE, VARIABLE};
use crate::hcl::{
    expr::{Expression, ObjectKey},
    structure::{Block, BlockLabel, Body},
    template::{Element, Template},
    Number,
};
use crate::types::{diagnostics::Diagnostic, BlockDeclaration, BlockKind, RawAttributes};

#[derive(Debug)]
pub enum VisitorError {
    MissingLabel { block: String, label: &'static str },
    TypeMismatch { block: String, label: &'static str },
}

impl From<VisitorError> for Diagnostic {
    fn from(err: VisitorError) -> Self {
        match err {
            VisitorError::MissingLabel { block, label } => {
                Diagnostic::error_from_string(format!("{block} block is missing its {label} label"))
            }
            VisitorError::TypeMismatch { block, label } => Diagnostic::error_from_string(format!(
                "{block} block {label} label must be a quoted string"
            )),
        }
    }
}

pub fn visit_label(index: usize, name: &'static str, block: &Block) -> Result<String, VisitorError> {
    let label = block.labels.get(index).ok_or(VisitorError::MissingLabel {
        block: block.ident.as_str().to_string(),
        label: name,
    })?;
    match label {
        BlockLabel::String(literal) => Ok(literal.value().to_string()),
        BlockLabel::Ident(_) => Err(VisitorError::TypeMismatch {
            block: block.ident.as_str().to_string(),
            label: name,
        }),
    }
}

/// Lowers an HCL expression into the untyped value shape consumed by the analysis engine.
///
/// Literals map onto their JSON counterparts and string templates keep their
/// `${...}` spans verbatim. Every other expression (traversals, function calls,
/// operators, conditionals, `for` expressions) is wrapped into a single
/// interpolation span, so that `local.a` becomes `"${local.a}"`.
pub fn expression_to_value(expr: &Expression) -> JsonValue {
    match expr {
        Expression::Null(_) => JsonValue::Null,
        Expression::Bool(value) => JsonValue::Bool(*value.value()),
        Expression::Number(number) => number_to_value(number.value()),
        Expression::String(value) => JsonValue::String(value.value().to_string()),
        Expression::Array(elements) => {
            JsonValue::Array(elements.iter().map(expression_to_value).collect())
        }
        Expression::Object(object) => {
            let mut map = Map::new();
            for (key, value) in object.iter() {
                map.insert(object_key_to_string(key), expression_to_value(value.expr()));
            }
            JsonValue::Object(map)
        }
        Expression::StringTemplate(template) => JsonValue::String(template_to_string(template)),
        Expression::HeredocTemplate(heredoc) => {
            JsonValue::String(template_to_string(&heredoc.template))
        }
        Expression::Parenthesis(parenthesis) => expression_to_value(parenthesis.inner()),
        other => JsonValue::String(format!("${{{}}}", expression_source(other))),
    }
}

/// Source text of an expression, without its surrounding whitespace or comments.
pub fn expression_source(expr: &Expression) -> String {
    expr.to_string().trim().to_string()
}

fn object_key_to_string(key: &ObjectKey) -> String {
    match key {
        ObjectKey::Ident(ident) => ident.as_str().to_string(),
        ObjectKey::Expression(Expression::String(value)) => value.value().to_string(),
        ObjectKey::Expression(expr) => expression_source(expr),
    }
}

fn number_to_value(number: &Number) -> JsonValue {
    if let Some(value) = number.as_u64() {
        return JsonValue::Number(JsonNumber::from(value));
    }
    if let Some(value) = number.as_i64() {
        return JsonValue::Number(JsonNumber::from(value));
    }
    number
        .as_f64()
        .and_then(JsonNumber::from_f64)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn template_to_string(template: &Template) -> String {
    let mut rendered = String::new();
    for element in template.iter() {
        match element {
            Element::Literal(literal) => rendered.push_str(literal.as_str()),
            Element::Interpolation(interpolation) => {
                rendered.push_str("${");
                rendered.push_str(&expression_source(&interpolation.expr));
                rendered.push('}');
            }
            Element::Directive(_) => {
                rendered.push_str(&Template::from(vec![element.clone()]).to_string())
            }
        }
    }
    rendered
}

/// Collects the attributes of a body, nested blocks being grouped by identifier
/// into arrays of objects (`validation { ... }` becomes `validation = [{ ... }]`).
pub fn body_to_attributes(body: &Body) -> RawAttributes {
    let mut attributes = RawAttributes::new();
    for attribute in body.attributes() {
        attributes.insert(attribute.key.as_str().to_string(), expression_to_value(&attribute.value));
    }
    for block in body.blocks() {
        let nested = JsonValue::Object(body_to_attributes(&block.body));
        match attributes
            .entry(block.ident.as_str().to_string())
            .or_insert_with(|| JsonValue::Array(vec![]))
        {
            JsonValue::Array(entries) => entries.push(nested),
            existing => *existing = JsonValue::Array(vec![existing.take(), nested]),
        }
    }
    attributes
}

/// Converts one top-level block into the declarations it carries.
///
/// A `locals` block yields one declaration per attribute; unsupported block
/// identifiers (`resource`, `terraform`, ...) yield nothing.
pub fn block_to_declarations(block: &Block) -> Result<Vec<BlockDeclaration>, Diagnostic> {
    let ident = block.ident.as_str();
    let Some(kind) = BlockKind::from_block_ident(ident) else {
        return Ok(vec![]);
    };

    let declarations = match kind {
        BlockKind::Local => block
            .body
            .attributes()
            .map(|attribute| {
                BlockDeclaration::local(
                    attribute.key.as_str(),
                    expression_to_value(&attribute.value),
                )
            })
            .collect(),
        BlockKind::Data => {
            let data_type = visit_label(0, "type", block)?;
            let name = visit_label(1, "name", block)?;
            let mut declaration = BlockDeclaration::new(kind, name);
            declaration.raw_attributes = body_to_attributes(&block.body);
            declaration.raw_attributes.insert(TYPE.to_string(), JsonValue::String(data_type));
            vec![declaration]
        }
        _ => {
            let name = visit_label(0, "name", block)?;
            let mut declaration = BlockDeclaration::new(kind, name);
            declaration.raw_attributes = body_to_attributes(&block.body);
            if ident == VARIABLE {
                // type constraints are kept as written: `list(string)`, not `${list(string)}`
                if let Some(attribute) = block.body.get_attribute(TYPE) {
                    let raw_type = match &attribute.value {
                        Expression::String(value) => value.value().to_string(),
                        expr => expression_source(expr),
                    };
                    declaration.raw_attributes.insert(TYPE.to_string(), JsonValue::String(raw_type));
                }
            }
            vec![declaration]
        }
    };
    Ok(declarations)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHclContent(String);

impl RawHclContent {
    pub fn from_string(s: String) -> Self {
        RawHclContent(s)
    }

    pub fn into_blocks(&self) -> Result<VecDeque<Block>, Diagnostic> {
        let content = crate::hcl::parser::parse_body(&self.0).map_err(|e| {
            Diagnostic::error_from_string(format!("parsing error: {}", e.to_string()))
        })?;
        Ok(content.into_blocks().into_iter().collect::<VecDeque<Block>>())
    }

    /// Parses the content and converts every supported block into declarations,
    /// preserving source order.
    pub fn into_declarations(&self) -> Result<Vec<BlockDeclaration>, Diagnostic> {
        let mut declarations = vec![];
        for block in self.into_blocks()?.iter() {
            declarations.append(&mut block_to_declarations(block)?);
        }
        Ok(declarations)
    }

    /// Gathers the local values of every `locals` block of this configuration unit.
    pub fn into_local_values(&self) -> Result<IndexMap<String, JsonValue>, Diagnostic> {
        let mut locals = IndexMap::new();
        for block in self.into_blocks()?.iter().filter(|b| b.ident.as_str() == LOCALS) {
            for attribute in block.body.attributes() {
                let name = attribute.key.as_str().to_string();
                if locals.contains_key(&name) {
                    return Err(Diagnostic::error_from_string(format!(
                        "local value '{name}' is declared more than once"
                    )));
                }
                locals.insert(name, expression_to_value(&attribute.value));
            }
        }
        Ok(locals)
    }

    pub fn to_string(&self) -> String {
        self.0.clone()
    }
}
