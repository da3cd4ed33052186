// Block identifiers, as written in configuration files
pub const LOCALS: &str = "locals";
pub const VARIABLE: &str = "variable";
pub const OUTPUT: &str = "output";
pub const PROVIDER: &str = "provider";
pub const MODULE: &str = "module";
pub const DATA: &str = "data";

// Attribute keys
pub const VALUE: &str = "value";
pub const TYPE: &str = "type";
pub const DEFAULT: &str = "default";
pub const DESCRIPTION: &str = "description";
pub const SENSITIVE: &str = "sensitive";
pub const VALIDATION: &str = "validation";
pub const CONDITION: &str = "condition";
pub const ERROR_MESSAGE: &str = "error_message";
pub const ALIAS: &str = "alias";
pub const VERSION: &str = "version";
pub const SOURCE: &str = "source";
pub const POSITION: &str = "position";
pub const DEPENDS_ON: &str = "depends_on";

// Type descriptor object form
pub const ITEMS: &str = "items";
pub const FIELDS: &str = "fields";
pub const OPTIONAL: &str = "optional";

/// Replaces the value of sensitive outputs in every externally exposed representation.
pub const REDACTED_VALUE_MARKER: &str = "<sensitive>";

pub const LOCAL_NAMESPACE: &str = "local";
pub const REF_QUERY_SEPARATOR: &str = "?ref=";
pub const GIT_SOURCE_PREFIX: &str = "git::";

pub const DEFAULT_PROVIDER_HOSTNAME: &str = "registry.terraform.io";
pub const DEFAULT_PROVIDER_NAMESPACE: &str = "hashicorp";

pub const DEFAULT_RESERVED_LOCAL_NAMES: &[&str] = &["count", "each", "path", "terraform"];
pub const DEFAULT_SENSITIVE_ATTRIBUTE_PATTERNS: &[&str] =
    &["password", "secret", "key", "token", "credential"];
