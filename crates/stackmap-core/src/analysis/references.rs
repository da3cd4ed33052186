//! Extraction of symbolic references from interpolated expressions.
//!
//! The scanner only understands non-nested `${...}` spans: the first `}` after
//! `${` closes the span, so `"${ {a = 1} }"` is not understood. `$${` escapes a
//! literal `${` and is skipped.

use std::fmt;

use kit::constants::LOCAL_NAMESPACE;
use kit::indexmap::IndexSet;
use kit::types::Value;
use regex::Regex;

lazy_static! {
    static ref TRAVERSAL: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*(\.[A-Za-z0-9_*-]+|\[[0-9*]+\])*$").unwrap();
    static ref TRAVERSAL_TOKEN: Regex =
        Regex::new(r"[A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_*-]+|\[[0-9*]+\])+").unwrap();
    static ref SEGMENT: Regex = Regex::new(r"\.([A-Za-z0-9_*-]+)|\[([0-9*]+)\]").unwrap();
}

const KEYWORDS: &[&str] = &["true", "false", "null"];

/// One `${...}` span of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolationSpan<'a> {
    /// Byte offset of the `$`.
    pub start: usize,
    /// Byte offset just past the closing `}`.
    pub end: usize,
    /// Text between the delimiters, untrimmed.
    pub raw: &'a str,
}

impl<'a> InterpolationSpan<'a> {
    pub fn inner(&self) -> &'a str {
        self.raw.trim()
    }
}

pub fn interpolation_spans(text: &str) -> Vec<InterpolationSpan<'_>> {
    let mut spans = vec![];
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find('$') {
        let dollar = cursor + offset;
        let rest = &text[dollar..];
        if rest.starts_with("$${") {
            cursor = dollar + 3;
            continue;
        }
        if !rest.starts_with("${") {
            cursor = dollar + 1;
            continue;
        }
        let Some(close) = rest.find('}').map(|close| dollar + close) else {
            // unterminated
            break;
        };
        let span = InterpolationSpan { start: dollar, end: close + 1, raw: &text[dollar + 2..close] };
        if !span.inner().is_empty() {
            spans.push(span);
        }
        cursor = close + 1;
    }
    spans
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Attribute(String),
    Index(usize),
    Splat,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Attribute(name) => write!(f, ".{}", name),
            PathSegment::Index(index) => write!(f, "[{}]", index),
            PathSegment::Splat => write!(f, "[*]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// `local.<name>`, possibly followed by attribute or index accesses.
    Local { name: String, path: Vec<PathSegment> },
    /// Any other reference (`var.x`, `module.vpc.id`, `aws_instance.web.id`), kept as written.
    External(String),
}

impl Reference {
    /// The key a consumer records: the bare name for locals, the raw text otherwise.
    pub fn key(&self) -> &str {
        match self {
            Reference::Local { name, .. } => name,
            Reference::External(raw) => raw,
        }
    }

    pub fn local_name(&self) -> Option<&str> {
        match self {
            Reference::Local { name, .. } => Some(name),
            Reference::External(_) => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Local { name, path } => {
                write!(f, "{}.{}", LOCAL_NAMESPACE, name)?;
                path.iter().try_for_each(|segment| write!(f, "{}", segment))
            }
            Reference::External(raw) => f.write_str(raw),
        }
    }
}

fn parse_segments(text: &str) -> Vec<PathSegment> {
    SEGMENT
        .captures_iter(text)
        .map(|captures| match (captures.get(1), captures.get(2)) {
            (Some(attribute), _) if attribute.as_str() == "*" => PathSegment::Splat,
            (Some(attribute), _) => PathSegment::Attribute(attribute.as_str().to_string()),
            (None, Some(index)) => {
                index.as_str().parse().map(PathSegment::Index).unwrap_or(PathSegment::Splat)
            }
            (None, None) => PathSegment::Splat,
        })
        .collect()
}

/// Parses a whole span as a traversal, returning `None` when it is anything else
/// (a function call, an operation, a keyword).
pub fn parse_reference(text: &str) -> Option<Reference> {
    let text = text.trim();
    if KEYWORDS.contains(&text) || !TRAVERSAL.is_match(text) {
        return None;
    }
    let root_end = text.find(|c: char| c == '.' || c == '[').unwrap_or(text.len());
    let (root, rest) = text.split_at(root_end);
    if root != LOCAL_NAMESPACE {
        return Some(Reference::External(text.to_string()));
    }
    let mut segments = parse_segments(rest).into_iter();
    match segments.next() {
        Some(PathSegment::Attribute(name)) => {
            Some(Reference::Local { name, path: segments.collect() })
        }
        _ => Some(Reference::External(text.to_string())),
    }
}

/// Blanks out quoted string literals, keeping byte offsets intact.
fn mask_string_literals(text: &str) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                masked.push('"');
                continue;
            }
            masked.extend(std::iter::repeat(' ').take(c.len_utf8()));
        } else {
            if c == '"' {
                in_string = true;
            }
            masked.push(c);
        }
    }
    masked
}

/// A traversal found inside a compound expression, with its byte range in the span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedReference {
    pub start: usize,
    pub end: usize,
    pub reference: Reference,
}

/// Finds the traversals embedded in a compound expression such as
/// `upper(local.name)` or `var.enabled ? local.a : local.b`.
///
/// Only traversals with at least one attribute or index access are retained, so
/// function names and `for` iterators used bare are not reported.
pub fn embedded_references(expression: &str) -> Vec<EmbeddedReference> {
    let masked = mask_string_literals(expression);
    let bytes = masked.as_bytes();
    TRAVERSAL_TOKEN
        .find_iter(&masked)
        .filter(|m| {
            let preceded_by_access = m.start() > 0
                && matches!(bytes[m.start() - 1], b'.' | b')' | b']' | b'0'..=b'9');
            let followed_by_call = masked[m.end()..].trim_start().starts_with('(');
            !preceded_by_access && !followed_by_call
        })
        .filter_map(|m| {
            parse_reference(m.as_str()).map(|reference| EmbeddedReference {
                start: m.start(),
                end: m.end(),
                reference,
            })
        })
        .collect()
}

fn collect_references(expr: &Value, references: &mut IndexSet<Reference>) {
    match expr {
        Value::String(text) => {
            for span in interpolation_spans(text) {
                match parse_reference(span.inner()) {
                    Some(reference) => {
                        references.insert(reference);
                    }
                    None => references.extend(
                        embedded_references(span.raw).into_iter().map(|found| found.reference),
                    ),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_references(item, references)),
        Value::Object(map) => map.values().for_each(|value| collect_references(value, references)),
        _ => {}
    }
}

/// Structured references of an expression, in first-occurrence order.
pub fn extract_references(expr: &Value) -> IndexSet<Reference> {
    let mut references = IndexSet::new();
    collect_references(expr, &mut references);
    references
}

/// References of an expression, in first-occurrence order: the bare name for
/// `local.<name>`, the raw reference text for every other namespace.
pub fn extract(expr: &Value) -> IndexSet<String> {
    extract_references(expr).iter().map(|reference| reference.key().to_string()).collect()
}

/// Names of the local values an expression depends on.
pub fn extract_local_names(expr: &Value) -> IndexSet<String> {
    extract_references(expr)
        .iter()
        .filter_map(|reference| reference.local_name().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn extracted(expr: Value) -> Vec<String> {
        extract(&expr).into_iter().collect()
    }

    #[test_case(json!("${local.region}"), vec!["region"] ; "local reference")]
    #[test_case(json!("${ local.region }"), vec!["region"] ; "trimmed span")]
    #[test_case(json!("${local.tags.env}"), vec!["tags"] ; "local attribute access")]
    #[test_case(json!("${local.zones[0]}"), vec!["zones"] ; "local index access")]
    #[test_case(json!("${var.name}"), vec!["var.name"] ; "variable kept raw")]
    #[test_case(json!("${module.vpc.vpc_id}"), vec!["module.vpc.vpc_id"] ; "module kept raw")]
    #[test_case(json!("${data.aws_ami.ubuntu.id}"), vec!["data.aws_ami.ubuntu.id"] ; "data kept raw")]
    #[test_case(json!("${aws_instance.web.id}"), vec!["aws_instance.web.id"] ; "resource kept raw")]
    #[test_case(json!("app-${local.env}-${var.name}"), vec!["env", "var.name"] ; "mixed template")]
    #[test_case(json!("${upper(local.name)}"), vec!["name"] ; "function argument")]
    #[test_case(json!("${var.on ? local.a : local.b}"), vec!["var.on", "a", "b"] ; "conditional")]
    #[test_case(json!("${format(\"%s.x\", local.a)}"), vec!["a"] ; "string literal masked")]
    #[test_case(json!("$${local.escaped}"), Vec::<&str>::new() ; "escaped interpolation")]
    #[test_case(json!("${local.unterminated"), Vec::<&str>::new() ; "unterminated span")]
    #[test_case(json!("${}"), Vec::<&str>::new() ; "empty span")]
    #[test_case(json!("${true}"), Vec::<&str>::new() ; "keyword")]
    #[test_case(json!("plain text"), Vec::<&str>::new() ; "no interpolation")]
    #[test_case(json!(42), Vec::<&str>::new() ; "number")]
    #[test_case(json!(null), Vec::<&str>::new() ; "null")]
    fn test_extract(expr: Value, expected: Vec<&str>) {
        assert_eq!(extracted(expr), expected);
    }

    #[test]
    fn test_extract_searches_containers_in_order() {
        let expr = json!({
            "name": "${local.b}",
            "nested": { "list": ["${local.a}", "${local.b}", 3] },
            "other": "${var.x}"
        });
        assert_eq!(extracted(expr), vec!["b", "a", "var.x"]);
    }

    #[test]
    fn test_spans_report_offsets() {
        let text = "a-${local.x}-b";
        let spans = interpolation_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].start..spans[0].end], "${local.x}");
        assert_eq!(spans[0].inner(), "local.x");
    }

    #[test]
    fn test_parse_reference_keeps_path() {
        assert_eq!(
            parse_reference("local.tags.env[2]"),
            Some(Reference::Local {
                name: "tags".into(),
                path: vec![PathSegment::Attribute("env".into()), PathSegment::Index(2)],
            })
        );
        assert_eq!(parse_reference("upper(local.a)"), None);
        assert_eq!(parse_reference("local"), Some(Reference::External("local".into())));
        assert_eq!(
            parse_reference("local.tags.env[2]").map(|r| r.to_string()).as_deref(),
            Some("local.tags.env[2]")
        );
    }

    #[test]
    fn test_embedded_references_skip_calls_and_trailing_accesses() {
        let found = embedded_references("lookup(local.map, \"k\").attr + ns.fn(var.x)");
        let keys: Vec<_> = found.iter().map(|f| f.reference.key().to_string()).collect();
        assert_eq!(keys, vec!["map", "var.x"]);
    }
}
