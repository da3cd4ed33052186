use kit::constants::VALUE;
use kit::indexmap::{IndexMap, IndexSet};
use kit::types::{BlockDeclaration, BlockKind, Value};

use crate::context::Context;

use super::errors::{AnalysisError, ValidationError};
use super::references::{
    embedded_references, extract_local_names, interpolation_spans, parse_reference, PathSegment,
    Reference,
};
use super::rule_id::RuleId;

pub const DEFAULT_MAX_DEPENDENCY_DEPTH: usize = 5;

/// One local value, as tracked by the evaluator during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEntry {
    pub name: String,
    pub raw_expression: Value,
    /// Names of the other local values referenced, in first-occurrence order.
    pub dependencies: IndexSet<String>,
    pub value: Value,
    pub evaluated: bool,
}

impl LocalEntry {
    pub fn new(name: impl Into<String>, raw_expression: Value) -> Self {
        let dependencies = extract_local_names(&raw_expression);
        LocalEntry {
            name: name.into(),
            raw_expression,
            dependencies,
            value: Value::Null,
            evaluated: false,
        }
    }

    pub fn from_declaration(declaration: &BlockDeclaration) -> Self {
        let expression = declaration.get_attribute(VALUE).cloned().unwrap_or(Value::Null);
        LocalEntry::new(declaration.name.clone(), expression)
    }
}

/// The outcome of a complete pass over one set of local values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedLocals {
    pub entries: IndexMap<String, LocalEntry>,
    /// Names in the order they were completed; dependencies always come first.
    pub evaluation_order: Vec<String>,
}

impl EvaluatedLocals {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|entry| &entry.value)
    }

    /// Final values, in declaration order.
    pub fn values(&self) -> IndexMap<String, Value> {
        self.entries.iter().map(|(name, entry)| (name.clone(), entry.value.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Depth-first evaluator of the local values of one configuration unit.
///
/// Each name is evaluated at most once. The chain of names being resolved is
/// kept as an explicit stack, so that a cycle is reported with its full path
/// (`a -> b -> a`). Dependencies are visited in first-occurrence order, which
/// keeps the reported path reproducible.
///
/// An evaluator owns its entries and must not be shared between configuration units.
#[derive(Debug)]
pub struct DependencyGraphEvaluator {
    entries: IndexMap<String, LocalEntry>,
    resolving: Vec<String>,
    evaluation_order: Vec<String>,
    /// Edges in the longest dependency chain starting at each evaluated name.
    depths: IndexMap<String, usize>,
    max_depth: usize,
    ctx: Context,
}

impl DependencyGraphEvaluator {
    pub fn new(entries: impl IntoIterator<Item = LocalEntry>) -> Self {
        DependencyGraphEvaluator {
            entries: entries.into_iter().map(|entry| (entry.name.clone(), entry)).collect(),
            resolving: vec![],
            evaluation_order: vec![],
            depths: IndexMap::new(),
            max_depth: DEFAULT_MAX_DEPENDENCY_DEPTH,
            ctx: Context::empty(),
        }
    }

    pub fn from_declarations(declarations: &[BlockDeclaration]) -> Self {
        Self::new(
            declarations
                .iter()
                .filter(|declaration| declaration.kind == BlockKind::Local)
                .map(LocalEntry::from_declaration),
        )
    }

    /// Longest chain of dependencies followed from any local value.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn entries(&self) -> &IndexMap<String, LocalEntry> {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&LocalEntry> {
        self.entries.get(name)
    }

    pub fn evaluation_order(&self) -> &[String] {
        &self.evaluation_order
    }

    /// Evaluates `name` and everything it depends on, returning its final value.
    pub fn evaluate(&mut self, name: &str) -> Result<Value, AnalysisError> {
        if !self.entries.contains_key(name) {
            return Err(AnalysisError::UnknownReference {
                name: name.to_string(),
                referenced_by: self.resolving.last().cloned(),
            });
        }

        if self.resolving.iter().any(|resolving| resolving == name) {
            let mut path = self.resolving.clone();
            path.push(name.to_string());
            self.ctx.try_log(|logger| {
                debug!(logger, "circular dependency detected: {}", path.join(" -> "))
            });
            return Err(AnalysisError::CircularDependency { path });
        }

        if let Some(entry) = self.entries.get(name).filter(|entry| entry.evaluated) {
            return Ok(entry.value.clone());
        }

        // the chain `a -> b -> ... -> name` spans `resolving.len()` dependency edges
        if self.resolving.len() > self.max_depth {
            let chain = self.resolving.join(" -> ");
            return Err(self.too_deep(
                self.resolving.first().cloned().unwrap_or_else(|| name.to_string()),
                format!("dependency chain '{chain} -> {name}'"),
            ));
        }

        self.resolving.push(name.to_string());
        let result = self.evaluate_entry(name);
        self.resolving.pop();
        result
    }

    fn evaluate_entry(&mut self, name: &str) -> Result<Value, AnalysisError> {
        let (dependencies, raw_expression) = match self.entries.get(name) {
            Some(entry) => (entry.dependencies.clone(), entry.raw_expression.clone()),
            None => {
                return Err(AnalysisError::UnknownReference {
                    name: name.to_string(),
                    referenced_by: None,
                })
            }
        };

        for dependency in dependencies.iter() {
            self.evaluate(dependency)?;
        }

        // memoized depths keep the bound independent of declaration order
        let depth = dependencies
            .iter()
            .filter_map(|dependency| self.depths.get(dependency))
            .map(|depth| depth + 1)
            .max()
            .unwrap_or(0);
        if depth > self.max_depth {
            return Err(self.too_deep(
                name.to_string(),
                format!("local value '{name}' starts a dependency chain of {depth} links, which"),
            ));
        }
        self.depths.insert(name.to_string(), depth);

        let value = substitute(&raw_expression, &self.entries, &self.ctx);
        if let Some(entry) = self.entries.get_mut(name) {
            entry.value = value.clone();
            entry.evaluated = true;
        }
        self.evaluation_order.push(name.to_string());
        Ok(value)
    }

    fn too_deep(&self, name: String, subject: String) -> AnalysisError {
        ValidationError::new(
            BlockKind::Local,
            name,
            RuleId::DependencyTooDeep,
            format!("{subject} is deeper than the maximum of {}", self.max_depth),
        )
        .into()
    }

    /// Evaluates every local value in declaration order.
    ///
    /// The first cycle or unknown reference aborts the pass: no partial result is returned.
    pub fn evaluate_all(mut self) -> Result<EvaluatedLocals, AnalysisError> {
        let names: Vec<String> = self.entries.keys().cloned().collect();
        for name in names.iter() {
            self.evaluate(name)?;
        }
        self.ctx.try_log(|logger| {
            debug!(logger, "local values evaluated"; "order" => self.evaluation_order.join(", "))
        });
        Ok(EvaluatedLocals { entries: self.entries, evaluation_order: self.evaluation_order })
    }
}

fn navigate<'a>(value: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match (segment, current) {
        (PathSegment::Attribute(key), Value::Object(map)) => map.get(key),
        (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
        _ => None,
    })
}

fn resolve_local<'a>(
    reference: &Reference,
    entries: &'a IndexMap<String, LocalEntry>,
) -> Option<&'a Value> {
    let Reference::Local { name, path } = reference else {
        return None;
    };
    let entry = entries.get(name).filter(|entry| entry.evaluated)?;
    navigate(&entry.value, path)
}

/// String form of a value interpolated into a template.
fn interpolated(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Replaces every resolvable local reference of `expr` by its evaluated value.
///
/// A string made of a single `${local.x}` span takes the value of `local.x`
/// as is, preserving its type. Spans mixed with other text receive the string
/// form of the value, and local references embedded in compound expressions
/// are replaced by literals. Other references are left untouched.
pub fn substitute(expr: &Value, entries: &IndexMap<String, LocalEntry>, ctx: &Context) -> Value {
    match expr {
        Value::String(text) => substitute_str(text, entries, ctx),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| substitute(item, entries, ctx)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter().map(|(key, value)| (key.clone(), substitute(value, entries, ctx))).collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(text: &str, entries: &IndexMap<String, LocalEntry>, ctx: &Context) -> Value {
    let spans = interpolation_spans(text);
    if let [span] = spans.as_slice() {
        if span.start == 0 && span.end == text.len() {
            if let Some(value) =
                parse_reference(span.inner()).as_ref().and_then(|r| resolve_local(r, entries))
            {
                return value.clone();
            }
        }
    }

    let mut rendered = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans.iter() {
        rendered.push_str(&text[cursor..span.start]);
        cursor = span.end;
        match parse_reference(span.inner()) {
            Some(reference) => match resolve_local(&reference, entries) {
                Some(value) => rendered.push_str(&interpolated(value)),
                None => {
                    if reference.local_name().is_none() {
                        ctx.try_log(|logger| {
                            debug!(logger, "leaving non-local reference '{}' untouched", reference)
                        });
                    }
                    rendered.push_str(&text[span.start..span.end]);
                }
            },
            None => {
                let mut inner = String::with_capacity(span.raw.len());
                let mut inner_cursor = 0;
                for found in embedded_references(span.raw) {
                    if let Some(value) = resolve_local(&found.reference, entries) {
                        inner.push_str(&span.raw[inner_cursor..found.start]);
                        inner.push_str(&value.to_string());
                        inner_cursor = found.end;
                    }
                }
                inner.push_str(&span.raw[inner_cursor..]);
                rendered.push_str("${");
                rendered.push_str(&inner);
                rendered.push('}');
            }
        }
    }
    rendered.push_str(&text[cursor..]);
    Value::String(rendered)
}
