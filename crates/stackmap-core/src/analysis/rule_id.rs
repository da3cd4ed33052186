//! Identifiers for every rule the analyzer enforces.

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use kit::types::diagnostic_types::DiagnosticLevel;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,      // Provides as_ref() -> &str
    Display,       // Provides to_string()
    EnumString,    // Provides from_str()
    IntoStaticStr, // Provides into() -> &'static str
    EnumIter,      // Provides iter() over all variants
)]
#[strum(serialize_all = "snake_case")]
pub enum RuleId {
    // Block shape
    MissingName,
    ReservedName,
    InvalidIdentifier,
    MissingAttribute,
    InvalidAttribute,
    DuplicateBlock,

    // Types
    TypeMismatch,
    TypeTooDeep,

    // Per block kind
    InvalidCondition,
    InvalidVersionConstraint,
    InvalidPosition,
    PositionOutOfBounds,
    InvalidDataSourceType,
    InvalidProviderSource,

    // Local values
    DependencyTooDeep,
    CircularDependency,
    UnknownReference,

    // Advisory
    SensitiveComposite,
}

impl RuleId {
    pub const fn description(&self) -> &'static str {
        use RuleId::*;
        match self {
            MissingName => "Blocks must be named",
            ReservedName => "Local values cannot use reserved identifiers",
            InvalidIdentifier => "Names must start with a letter and contain only letters, digits, '_' or '-'",
            MissingAttribute => "A required attribute is absent",
            InvalidAttribute => "An attribute holds a value of the wrong shape",
            DuplicateBlock => "Two blocks of the same kind share a name",
            TypeMismatch => "A value does not conform to its declared type",
            TypeTooDeep => "Type constraints are nested too deeply",
            InvalidCondition => "Validation conditions must be parseable expressions",
            InvalidVersionConstraint => "Version constraints must follow the operator/semver grammar",
            InvalidPosition => "Positions must be two finite numbers",
            PositionOutOfBounds => "Positions must lie within the visualization bounds",
            InvalidDataSourceType => "Data source types must be of the form provider_type",
            InvalidProviderSource => "Provider sources must be of the form [hostname/]namespace/type",
            DependencyTooDeep => "Local value dependency chains are bounded in depth",
            CircularDependency => "Local values cannot depend on themselves",
            UnknownReference => "Local values can only reference declared local values",
            SensitiveComposite => "Sensitive outputs should hold scalar values",
        }
    }

    /// Severity used when the rule is reported through a diagnostic.
    pub const fn level(&self) -> DiagnosticLevel {
        match self {
            RuleId::SensitiveComposite => DiagnosticLevel::Warning,
            _ => DiagnosticLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;
    use test_case::test_case;

    use super::*;

    #[test_case(RuleId::CircularDependency, "circular_dependency")]
    #[test_case(RuleId::TypeMismatch, "type_mismatch")]
    #[test_case(RuleId::InvalidVersionConstraint, "invalid_version_constraint")]
    fn test_rule_names(rule: RuleId, name: &str) {
        assert_eq!(rule.to_string(), name);
        assert_eq!(RuleId::from_str(name).unwrap(), rule);
    }

    #[test]
    fn test_every_rule_is_described() {
        for rule in RuleId::iter() {
            assert!(!rule.description().is_empty(), "{rule} lacks a description");
        }
    }

    #[test]
    fn test_only_advisories_are_warnings() {
        let warnings: Vec<_> =
            RuleId::iter().filter(|r| r.level() == DiagnosticLevel::Warning).collect();
        assert_eq!(warnings, vec![RuleId::SensitiveComposite]);
    }
}
