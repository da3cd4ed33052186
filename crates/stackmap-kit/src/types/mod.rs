use std::fmt::Display;

use serde_json::{Map, Value as JsonValue};
use strum::{AsRefStr, EnumIter, EnumString, IntoStaticStr};

use crate::constants::{DATA, LOCALS, MODULE, OUTPUT, PROVIDER, VARIABLE};

pub mod diagnostic_types;
pub mod diagnostics;

#[cfg(test)]
mod tests;

/// Untyped attribute value, as yielded by the structural front-end.
pub type Value = JsonValue;

/// Attributes of one block, in declaration order.
pub type RawAttributes = Map<String, JsonValue>;

/// Kinds of blocks understood by the analysis engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Local,
    Variable,
    Output,
    Provider,
    Module,
    Data,
}

impl BlockKind {
    /// Maps a block identifier (`variable`, `locals`, ...) to its kind.
    pub fn from_block_ident(ident: &str) -> Option<Self> {
        match ident {
            LOCALS => Some(Self::Local),
            VARIABLE => Some(Self::Variable),
            OUTPUT => Some(Self::Output),
            PROVIDER => Some(Self::Provider),
            MODULE => Some(Self::Module),
            DATA => Some(Self::Data),
            _ => None,
        }
    }
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// A named, typed unit of configuration handed over by the structural parser.
///
/// Declarations are immutable once handed to a validator: the validators only
/// ever borrow them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDeclaration {
    pub kind: BlockKind,
    pub name: String,
    #[serde(rename = "rawAttributes", default)]
    pub raw_attributes: RawAttributes,
}

impl BlockDeclaration {
    pub fn new(kind: BlockKind, name: impl Into<String>) -> Self {
        BlockDeclaration { kind, name: name.into(), raw_attributes: RawAttributes::new() }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.raw_attributes.insert(key.into(), value);
        self
    }

    pub fn local(name: impl Into<String>, expression: JsonValue) -> Self {
        BlockDeclaration::new(BlockKind::Local, name)
            .with_attribute(crate::constants::VALUE, expression)
    }

    pub fn get_attribute(&self, key: &str) -> Option<&JsonValue> {
        self.raw_attributes.get(key)
    }

    /// Returns the attribute if present and not `null`.
    pub fn get_non_null_attribute(&self, key: &str) -> Option<&JsonValue> {
        self.raw_attributes.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str_attribute(&self, key: &str) -> Option<&str> {
        self.raw_attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool_attribute(&self, key: &str) -> Option<bool> {
        self.raw_attributes.get(key).and_then(|v| v.as_bool())
    }
}
