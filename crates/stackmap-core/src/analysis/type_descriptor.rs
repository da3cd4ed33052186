//! Type constraints of variables and the structural validators built from them.
//!
//! A constraint is either an HCL type expression (`list(object({ name = string }))`)
//! or its object form (`{"type": "list", "items": "string"}`). Unknown types
//! degrade to [`TypeDescriptor::Any`] rather than failing.

use std::fmt;

use kit::constants::{FIELDS, ITEMS, OPTIONAL, TYPE};
use kit::indexmap::IndexMap;
use kit::types::Value;
use serde::ser::{Serialize, Serializer};
use strum::{AsRefStr, Display, EnumString};

pub const DEFAULT_MAX_TYPE_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Number,
    Bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    List(Box<TypeDescriptor>),
    Set(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>),
    /// A map with declared keys: each declared key present is checked against
    /// its own type, any other key against `items`.
    KeyedMap { fields: IndexMap<String, TypeDescriptor>, items: Box<TypeDescriptor> },
    Object(IndexMap<String, ObjectField>),
    Any,
}

/// An attribute of an object type; optional attributes may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    pub descriptor: TypeDescriptor,
    pub optional: bool,
}

impl ObjectField {
    fn to_object_form(&self) -> Value {
        let form = self.descriptor.to_object_form();
        if !self.optional {
            return form;
        }
        let mut map = match form {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert(TYPE.to_string(), other);
                map
            }
        };
        map.insert(OPTIONAL.to_string(), Value::Bool(true));
        Value::Object(map)
    }
}

impl fmt::Display for ObjectField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "optional({})", self.descriptor)
        } else {
            write!(f, "{}", self.descriptor)
        }
    }
}

fn fields_to_string<T: fmt::Display>(fields: &IndexMap<String, T>) -> String {
    let fields: Vec<String> = fields.iter().map(|(name, ty)| format!("{} = {}", name, ty)).collect();
    format!("{{{}}}", fields.join(", "))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("type constraint is nested deeper than the maximum of {max} levels")]
pub struct TypeTooDeep {
    pub max: usize,
}

impl TypeDescriptor {
    /// Nesting depth; a primitive (or `any`) has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            TypeDescriptor::Primitive(_) | TypeDescriptor::Any => 1,
            TypeDescriptor::List(inner) | TypeDescriptor::Set(inner) | TypeDescriptor::Map(inner) => {
                1 + inner.depth()
            }
            TypeDescriptor::KeyedMap { fields, items } => {
                1 + fields.values().chain([&**items]).map(TypeDescriptor::depth).max().unwrap_or(0)
            }
            TypeDescriptor::Object(fields) => {
                1 + fields.values().map(|field| field.descriptor.depth()).max().unwrap_or(0)
            }
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, TypeDescriptor::Any)
    }

    /// The object form: primitives and `any` as bare strings, constructors as
    /// `{"type": ..., "items": ...}` or `{"type": "object", "fields": {...}}`.
    /// Optional object attributes carry `"optional": true`.
    pub fn to_object_form(&self) -> Value {
        let constructor = |name: &str, key: &str, inner: Value| {
            let mut map = serde_json::Map::new();
            map.insert(TYPE.to_string(), Value::String(name.to_string()));
            map.insert(key.to_string(), inner);
            Value::Object(map)
        };
        match self {
            TypeDescriptor::Primitive(kind) => Value::String(kind.to_string()),
            TypeDescriptor::Any => Value::String("any".into()),
            TypeDescriptor::List(inner) => constructor("list", ITEMS, inner.to_object_form()),
            TypeDescriptor::Set(inner) => constructor("set", ITEMS, inner.to_object_form()),
            TypeDescriptor::Map(inner) => constructor("map", ITEMS, inner.to_object_form()),
            TypeDescriptor::KeyedMap { fields, items } => {
                let mut form = constructor(
                    "map",
                    FIELDS,
                    Value::Object(
                        fields.iter().map(|(k, v)| (k.clone(), v.to_object_form())).collect(),
                    ),
                );
                if let (false, Value::Object(map)) = (items.is_any(), &mut form) {
                    map.insert(ITEMS.to_string(), items.to_object_form());
                }
                form
            }
            TypeDescriptor::Object(fields) => constructor(
                "object",
                FIELDS,
                Value::Object(
                    fields.iter().map(|(k, v)| (k.clone(), v.to_object_form())).collect(),
                ),
            ),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(kind) => write!(f, "{}", kind),
            TypeDescriptor::Any => write!(f, "any"),
            TypeDescriptor::List(inner) => write!(f, "list({})", inner),
            TypeDescriptor::Set(inner) => write!(f, "set({})", inner),
            TypeDescriptor::Map(inner) => write!(f, "map({})", inner),
            TypeDescriptor::KeyedMap { fields, items } if items.is_any() => {
                write!(f, "map({})", fields_to_string(fields))
            }
            TypeDescriptor::KeyedMap { fields, items } => {
                write!(f, "map({}, {})", fields_to_string(fields), items)
            }
            TypeDescriptor::Object(fields) => write!(f, "object({})", fields_to_string(fields)),
        }
    }
}

impl Serialize for TypeDescriptor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_object_form().serialize(serializer)
    }
}

/// Builds a type descriptor from a type expression string or its object form.
///
/// `null` (no declared type) yields `Any`. Nesting deeper than `max_depth` is the
/// only failure.
pub fn parse_type(raw: &Value, max_depth: usize) -> Result<TypeDescriptor, TypeTooDeep> {
    parse_value(raw, 1, max_depth)
}

fn parse_value(raw: &Value, depth: usize, max: usize) -> Result<TypeDescriptor, TypeTooDeep> {
    if depth > max {
        return Err(TypeTooDeep { max });
    }
    let map = match raw {
        Value::String(expression) => return parse_type_expression(expression, depth, max),
        Value::Object(map) => map,
        _ => return Ok(TypeDescriptor::Any),
    };
    let element = |key: &str| match map.get(key) {
        Some(inner) => parse_value(inner, depth + 1, max).map(Box::new),
        None => Ok(Box::new(TypeDescriptor::Any)),
    };
    let descriptor = match map.get(TYPE).and_then(Value::as_str) {
        Some("string") => TypeDescriptor::Primitive(PrimitiveKind::String),
        Some("number") => TypeDescriptor::Primitive(PrimitiveKind::Number),
        Some("bool") => TypeDescriptor::Primitive(PrimitiveKind::Bool),
        Some("list") => TypeDescriptor::List(element(ITEMS)?),
        Some("set") => TypeDescriptor::Set(element(ITEMS)?),
        Some("map") => match map.get(FIELDS) {
            Some(Value::Object(fields)) => TypeDescriptor::KeyedMap {
                fields: fields
                    .iter()
                    .map(|(name, field)| Ok((name.clone(), parse_value(field, depth + 1, max)?)))
                    .collect::<Result<_, TypeTooDeep>>()?,
                items: element(ITEMS)?,
            },
            _ => TypeDescriptor::Map(element(ITEMS)?),
        },
        Some("object") => match map.get(FIELDS) {
            Some(Value::Object(fields)) => TypeDescriptor::Object(
                fields
                    .iter()
                    .map(|(name, field)| {
                        let descriptor = parse_value(field, depth + 1, max)?;
                        let optional = field.get(OPTIONAL).and_then(Value::as_bool).unwrap_or(false);
                        Ok((name.clone(), ObjectField { descriptor, optional }))
                    })
                    .collect::<Result<_, TypeTooDeep>>()?,
            ),
            _ => TypeDescriptor::Any,
        },
        _ => TypeDescriptor::Any,
    };
    Ok(descriptor)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Open(char),
    Close(char),
    Assign,
    Comma,
    Unexpected,
}

fn tokenize(expression: &str) -> Vec<Token> {
    let mut tokens = vec![];
    let mut chars = expression.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' | '{' | '[' => tokens.push(Token::Open(c)),
            ')' | '}' | ']' => tokens.push(Token::Close(c)),
            '=' | ':' => tokens.push(Token::Assign),
            ',' => tokens.push(Token::Comma),
            '"' => {
                let mut ident = String::new();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    ident.push(c);
                }
                tokens.push(Token::Ident(ident));
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' => {
                let mut ident = c.to_string();
                while let Some(&next) = chars.peek() {
                    if !(next.is_alphanumeric() || next == '_' || next == '-') {
                        break;
                    }
                    ident.push(next);
                    chars.next();
                }
                tokens.push(Token::Ident(ident));
            }
            _ => tokens.push(Token::Unexpected),
        }
    }
    tokens
}

enum ExpressionFailure {
    Syntax,
    TooDeep(TypeTooDeep),
}

struct TypeExpressionParser {
    tokens: Vec<Token>,
    position: usize,
    max: usize,
}

impl TypeExpressionParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionFailure> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            _ => Err(ExpressionFailure::Syntax),
        }
    }

    /// Skips tokens up to (and including) the `)` closing the current constructor.
    fn skip_to_close(&mut self) -> Result<(), ExpressionFailure> {
        let mut nesting = 0usize;
        loop {
            match self.next() {
                Some(Token::Open(_)) => nesting += 1,
                Some(Token::Close(')')) if nesting == 0 => return Ok(()),
                Some(Token::Close(_)) => nesting = nesting.checked_sub(1).ok_or(ExpressionFailure::Syntax)?,
                Some(_) => {}
                None => return Err(ExpressionFailure::Syntax),
            }
        }
    }

    fn parse(&mut self, depth: usize) -> Result<TypeDescriptor, ExpressionFailure> {
        if depth > self.max {
            return Err(ExpressionFailure::TooDeep(TypeTooDeep { max: self.max }));
        }
        let Some(Token::Ident(name)) = self.next() else {
            return Err(ExpressionFailure::Syntax);
        };
        if self.peek() != Some(&Token::Open('(')) {
            return Ok(match name.as_str() {
                "string" => TypeDescriptor::Primitive(PrimitiveKind::String),
                "number" => TypeDescriptor::Primitive(PrimitiveKind::Number),
                "bool" => TypeDescriptor::Primitive(PrimitiveKind::Bool),
                _ => TypeDescriptor::Any,
            });
        }
        self.next();
        let descriptor = match name.as_str() {
            "list" => TypeDescriptor::List(Box::new(self.parse(depth + 1)?)),
            "set" => TypeDescriptor::Set(Box::new(self.parse(depth + 1)?)),
            "map" => TypeDescriptor::Map(Box::new(self.parse(depth + 1)?)),
            "object" => TypeDescriptor::Object(self.parse_fields(depth + 1)?),
            "optional" => {
                // optional(T) and optional(T, default) constrain values like T
                let inner = self.parse(depth)?;
                if self.peek() == Some(&Token::Comma) {
                    return self.skip_to_close().map(|_| inner);
                }
                inner
            }
            _ => {
                self.skip_to_close()?;
                return Ok(TypeDescriptor::Any);
            }
        };
        self.expect(Token::Close(')'))?;
        Ok(descriptor)
    }

    fn is_optional_field(&self) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == "optional")
            && self.tokens.get(self.position + 1) == Some(&Token::Open('('))
    }

    fn parse_fields(
        &mut self,
        depth: usize,
    ) -> Result<IndexMap<String, ObjectField>, ExpressionFailure> {
        self.expect(Token::Open('{'))?;
        let mut fields = IndexMap::new();
        loop {
            match self.next() {
                Some(Token::Close('}')) => return Ok(fields),
                Some(Token::Comma) => continue,
                Some(Token::Ident(field)) => {
                    self.expect(Token::Assign)?;
                    let optional = self.is_optional_field();
                    let descriptor = self.parse(depth)?;
                    fields.insert(field, ObjectField { descriptor, optional });
                }
                _ => return Err(ExpressionFailure::Syntax),
            }
        }
    }
}

fn parse_type_expression(
    expression: &str,
    depth: usize,
    max: usize,
) -> Result<TypeDescriptor, TypeTooDeep> {
    let mut expression = expression.trim();
    if let Some(inner) = expression.strip_prefix("${").and_then(|e| e.strip_suffix('}')) {
        expression = inner.trim();
    }
    let mut parser = TypeExpressionParser { tokens: tokenize(expression), position: 0, max };
    match parser.parse(depth) {
        Ok(descriptor) if parser.position >= parser.tokens.len() => Ok(descriptor),
        Ok(_) | Err(ExpressionFailure::Syntax) => Ok(TypeDescriptor::Any),
        Err(ExpressionFailure::TooDeep(err)) => Err(err),
    }
}

/// A value that does not conform to a type descriptor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("expected {expected}, found {actual}")]
pub struct TypeMismatch {
    /// Segments leading to the offending value; empty for the value itself.
    pub path: Vec<String>,
    pub expected: String,
    pub actual: String,
}

impl TypeMismatch {
    pub fn path(&self) -> String {
        self.path.join(".")
    }
}

/// Kind of a runtime value, named like the type that would accept it.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

type Check = Box<dyn Fn(&Value, &mut Vec<String>) -> Result<(), TypeMismatch> + Send + Sync>;

/// Structural validator compiled from a [`TypeDescriptor`].
pub struct TypeValidator {
    check: Check,
}

impl TypeValidator {
    pub fn validate(&self, value: &Value) -> Result<(), TypeMismatch> {
        let mut path = vec![];
        (self.check)(value, &mut path)
    }
}

impl fmt::Debug for TypeValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TypeValidator")
    }
}

fn mismatch(path: &[String], expected: impl ToString, actual: impl ToString) -> TypeMismatch {
    TypeMismatch { path: path.to_vec(), expected: expected.to_string(), actual: actual.to_string() }
}

fn scoped(
    check: &Check,
    value: &Value,
    path: &mut Vec<String>,
    segment: String,
) -> Result<(), TypeMismatch> {
    path.push(segment);
    let result = check(value, path);
    path.pop();
    result
}

fn boxed<F>(check: F) -> Check
where
    F: Fn(&Value, &mut Vec<String>) -> Result<(), TypeMismatch> + Send + Sync + 'static,
{
    Box::new(check)
}

pub fn build_validator(descriptor: &TypeDescriptor) -> TypeValidator {
    TypeValidator { check: compile(descriptor) }
}

fn compile(descriptor: &TypeDescriptor) -> Check {
    match descriptor {
        TypeDescriptor::Any => boxed(|_, _| Ok(())),
        TypeDescriptor::Primitive(kind) => {
            let kind = *kind;
            boxed(move |value, path| {
                let matches = match kind {
                    PrimitiveKind::String => value.is_string(),
                    PrimitiveKind::Number => value.is_number(),
                    PrimitiveKind::Bool => value.is_boolean(),
                };
                if matches {
                    Ok(())
                } else {
                    Err(mismatch(path, kind, value_kind(value)))
                }
            })
        }
        TypeDescriptor::List(inner) | TypeDescriptor::Set(inner) => {
            let expected = descriptor.to_string();
            let element = compile(inner);
            boxed(move |value, path| match value {
                Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .try_for_each(|(index, item)| scoped(&element, item, path, index.to_string())),
                other => Err(mismatch(path, &expected, value_kind(other))),
            })
        }
        TypeDescriptor::Map(inner) => {
            let expected = descriptor.to_string();
            let element = compile(inner);
            boxed(move |value, path| match value {
                Value::Object(entries) => entries
                    .iter()
                    .try_for_each(|(key, item)| scoped(&element, item, path, key.clone())),
                other => Err(mismatch(path, &expected, value_kind(other))),
            })
        }
        TypeDescriptor::KeyedMap { fields, items } => {
            let expected = descriptor.to_string();
            let element = compile(items);
            let fields: IndexMap<String, Check> =
                fields.iter().map(|(name, field)| (name.clone(), compile(field))).collect();
            boxed(move |value, path| match value {
                Value::Object(entries) => entries.iter().try_for_each(|(key, item)| {
                    let check = fields.get(key).unwrap_or(&element);
                    scoped(check, item, path, key.clone())
                }),
                other => Err(mismatch(path, &expected, value_kind(other))),
            })
        }
        TypeDescriptor::Object(fields) => {
            let expected = descriptor.to_string();
            let open = fields.values().any(|field| field.descriptor.is_any());
            let fields: Vec<(String, bool, Check)> = fields
                .iter()
                .map(|(name, field)| {
                    let may_be_absent = field.optional || field.descriptor.is_any();
                    (name.clone(), may_be_absent, compile(&field.descriptor))
                })
                .collect();
            boxed(move |value, path| {
                let Value::Object(entries) = value else {
                    return Err(mismatch(path, &expected, value_kind(value)));
                };
                for (name, may_be_absent, check) in fields.iter() {
                    match entries.get(name) {
                        Some(item) => scoped(check, item, path, name.clone())?,
                        None if *may_be_absent => {}
                        None => {
                            let mut missing = path.clone();
                            missing.push(name.clone());
                            return Err(mismatch(&missing, "an attribute", "nothing"));
                        }
                    }
                }
                if !open {
                    if let Some(extra) =
                        entries.keys().find(|key| !fields.iter().any(|(name, _, _)| name == *key))
                    {
                        let mut unexpected = path.clone();
                        unexpected.push(extra.clone());
                        return Err(mismatch(&unexpected, "no attribute", "an undeclared attribute"));
                    }
                }
                Ok(())
            })
        }
    }
}
