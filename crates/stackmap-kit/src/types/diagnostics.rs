use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub use super::diagnostic_types::{BlockReference, DiagnosticLevel};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub code: Option<String>,
    pub block: Option<BlockReference>,
    pub field_path: Option<String>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    fn with_level(level: DiagnosticLevel, message: String) -> Diagnostic {
        Diagnostic {
            level,
            message,
            code: None,
            block: None,
            field_path: None,
            suggestion: None,
        }
    }

    pub fn error_from_string(message: String) -> Diagnostic {
        Diagnostic::with_level(DiagnosticLevel::Error, message)
    }

    pub fn warning_from_string(message: String) -> Diagnostic {
        Diagnostic::with_level(DiagnosticLevel::Warning, message)
    }

    // Builder methods
    pub fn error(message: impl Into<String>) -> Self {
        Self::error_from_string(message.into())
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::warning_from_string(message.into())
    }

    pub fn with_code(mut self, code: impl AsRef<str>) -> Self {
        self.code = Some(code.as_ref().to_string());
        self
    }

    pub fn with_block(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.block = Some(BlockReference::new(kind, name));
        self
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.level, DiagnosticLevel::Error)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.level, DiagnosticLevel::Warning)
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level_with_code = if let Some(code) = &self.code {
            format!("{}[{}]", self.level, code)
        } else {
            format!("{}", self.level)
        };

        let subject = match (&self.block, &self.field_path) {
            (Some(block), Some(path)) => format!(" ({}, field '{}')", block, path),
            (Some(block), None) => format!(" ({})", block),
            _ => String::new(),
        };

        write!(f, "{}{}: {}", level_with_code, subject, self.message)
    }
}

impl From<Diagnostic> for String {
    fn from(diagnostic: Diagnostic) -> Self {
        diagnostic.to_string()
    }
}

impl From<String> for Diagnostic {
    fn from(message: String) -> Self {
        Diagnostic::error_from_string(message)
    }
}

impl From<&str> for Diagnostic {
    fn from(message: &str) -> Self {
        Diagnostic::error_from_string(message.to_string())
    }
}
