use std::fmt;

use kit::types::diagnostics::Diagnostic;
use kit::types::BlockKind;

use super::rule_id::RuleId;

/// A block whose shape is malformed: a missing required field or a bad identifier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} '{name}': {message}")]
pub struct ParseError {
    pub kind: BlockKind,
    pub name: String,
    pub rule: RuleId,
    pub message: String,
}

impl ParseError {
    pub fn new(
        kind: BlockKind,
        name: impl Into<String>,
        rule: RuleId,
        message: impl Into<String>,
    ) -> Self {
        ParseError { kind, name: name.into(), rule, message: message.into() }
    }
}

/// A well-formed block holding semantically invalid content.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct ValidationError {
    pub kind: BlockKind,
    pub name: String,
    pub rule: RuleId,
    pub message: String,
    /// Dotted path to the offending value, e.g. `instance_type.0`.
    pub field_path: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl ValidationError {
    pub fn new(
        kind: BlockKind,
        name: impl Into<String>,
        rule: RuleId,
        message: impl Into<String>,
    ) -> Self {
        ValidationError {
            kind,
            name: name.into(),
            rule,
            message: message.into(),
            field_path: None,
            expected: None,
            actual: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_kinds(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)?;
        if let Some(path) = &self.field_path {
            write!(f, " at '{}'", path)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("circular dependency detected: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("unknown local value '{name}'{}", .referenced_by.as_ref().map(|r| format!(" referenced by '{r}'")).unwrap_or_default())]
    UnknownReference { name: String, referenced_by: Option<String> },
}

impl AnalysisError {
    pub fn rule(&self) -> RuleId {
        match self {
            AnalysisError::Parse(e) => e.rule,
            AnalysisError::Validation(e) => e.rule,
            AnalysisError::CircularDependency { .. } => RuleId::CircularDependency,
            AnalysisError::UnknownReference { .. } => RuleId::UnknownReference,
        }
    }

    /// The block the error is attributed to.
    ///
    /// Cycles are attributed to the local value that closes them, unknown
    /// references to the local value holding the reference.
    pub fn block(&self) -> (BlockKind, &str) {
        match self {
            AnalysisError::Parse(e) => (e.kind, e.name.as_str()),
            AnalysisError::Validation(e) => (e.kind, e.name.as_str()),
            AnalysisError::CircularDependency { path } => {
                (BlockKind::Local, path.last().map(String::as_str).unwrap_or_default())
            }
            AnalysisError::UnknownReference { name, referenced_by } => {
                (BlockKind::Local, referenced_by.as_deref().unwrap_or(name))
            }
        }
    }

    /// The cycle, rendered as `a -> b -> a`.
    pub fn cycle_path(&self) -> Option<String> {
        match self {
            AnalysisError::CircularDependency { path } => Some(path.join(" -> ")),
            _ => None,
        }
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, AnalysisError::Parse(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, AnalysisError::Validation(_))
    }
}

impl From<&AnalysisError> for Diagnostic {
    fn from(error: &AnalysisError) -> Self {
        let rule = error.rule();
        let (kind, name) = error.block();
        let message = match error {
            AnalysisError::Parse(e) => e.message.clone(),
            AnalysisError::Validation(e) => e.message.clone(),
            other => other.to_string(),
        };
        let mut diagnostic = Diagnostic::error(message).with_code(rule).with_block(kind.as_ref(), name);
        diagnostic.level = rule.level();
        if let AnalysisError::Validation(ValidationError { field_path: Some(path), .. }) = error {
            diagnostic = diagnostic.with_field_path(path.clone());
        }
        if let AnalysisError::UnknownReference { name, .. } = error {
            diagnostic = diagnostic.with_suggestion(format!("declare 'local.{name}' in a locals block"));
        }
        diagnostic
    }
}

impl From<AnalysisError> for Diagnostic {
    fn from(error: AnalysisError) -> Self {
        Diagnostic::from(&error)
    }
}
