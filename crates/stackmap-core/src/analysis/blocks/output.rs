use kit::constants::{DEPENDS_ON, DESCRIPTION, LOCAL_NAMESPACE, SENSITIVE, VALUE};
use kit::indexmap::IndexSet;
use kit::types::{BlockDeclaration, BlockKind, Value};
use regex::Regex;

use crate::analysis::entities::{OutputDeclaration, Validated};
use crate::analysis::errors::AnalysisError;
use crate::analysis::references::{extract_references, interpolation_spans, Reference};
use crate::analysis::rule_id::RuleId;
use crate::context::Context;

use super::{bool_attribute, optional_str_attribute, require_identifier, required_attribute, BlockValidator};

lazy_static! {
    static ref DEPENDENCY: Regex = Regex::new(r"^[A-Za-z0-9_.-]+\.[A-Za-z0-9_.-]+$").unwrap();
}

#[derive(Debug, Clone, Default)]
pub struct OutputValidator {
    ctx: Context,
}

impl OutputValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }
}

/// The dependency key of a reference: `local.<name>` for locals, the reference
/// up to its first index access otherwise (`module.vpc.subnets[0]` gives `module.vpc.subnets`).
fn dependency_key(reference: &Reference) -> String {
    match reference {
        Reference::Local { name, .. } => format!("{}.{}", LOCAL_NAMESPACE, name),
        Reference::External(raw) => raw.split('[').next().unwrap_or(raw).to_string(),
    }
}

/// Dependencies of an output: every reference of its value, followed by the
/// entries of `depends_on`, which may be written bare or interpolated.
fn collect_dependencies(value: &Value, depends_on: Option<&Value>) -> IndexSet<String> {
    let mut dependencies: IndexSet<String> =
        extract_references(value).iter().map(dependency_key).collect();
    if let Some(Value::Array(entries)) = depends_on {
        for entry in entries.iter() {
            match entry {
                Value::String(raw) if interpolation_spans(raw).is_empty() => {
                    dependencies.insert(raw.trim().to_string());
                }
                other => dependencies.extend(extract_references(other).iter().map(dependency_key)),
            }
        }
    }
    dependencies.retain(|dependency| DEPENDENCY.is_match(dependency));
    dependencies
}

impl BlockValidator for OutputValidator {
    type Entity = OutputDeclaration;
    const KIND: BlockKind = BlockKind::Output;

    fn validate(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<OutputDeclaration>, AnalysisError> {
        require_identifier(declaration)?;
        let value = required_attribute(declaration, VALUE)?.clone();
        let sensitive = bool_attribute(declaration, SENSITIVE)?;
        let dependencies = collect_dependencies(&value, declaration.get_attribute(DEPENDS_ON));

        let mut validated = Validated::new(OutputDeclaration {
            name: declaration.name.clone(),
            value,
            dependencies,
            sensitive,
            description: optional_str_attribute(declaration, DESCRIPTION)?,
        });

        if sensitive && (validated.entity.value.is_object() || validated.entity.value.is_array()) {
            self.ctx.try_log(|logger| {
                debug!(logger, "sensitive output '{}' holds a composite value", declaration.name)
            });
            let rule = RuleId::SensitiveComposite;
            validated = validated.with_warning(
                diagnosed_warning!(
                    "output '{}' is sensitive and holds a composite value; consider exposing scalar outputs",
                    declaration.name
                )
                .with_code(rule)
                .with_block(BlockKind::Output.as_ref(), &declaration.name),
            );
        }
        Ok(validated)
    }
}
