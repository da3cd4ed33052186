use std::collections::HashSet;

use kit::constants::VALUE;
use kit::types::{BlockDeclaration, BlockKind};

use crate::analysis::dependency_graph::{DependencyGraphEvaluator, EvaluatedLocals, LocalEntry};
use crate::analysis::entities::Validated;
use crate::analysis::errors::AnalysisError;
use crate::analysis::rule_id::RuleId;
use crate::context::Context;
use crate::settings::AnalyzerSettings;

use super::{parse_error, require_name, BlockValidation, BlockValidator};

/// Validates local value declarations and evaluates them as one unit.
#[derive(Debug, Clone)]
pub struct LocalValidator {
    reserved_names: Vec<String>,
    max_depth: usize,
    ctx: Context,
}

impl LocalValidator {
    pub fn new(settings: &AnalyzerSettings) -> Self {
        LocalValidator {
            reserved_names: settings.reserved_local_names.clone(),
            max_depth: settings.max_dependency_depth,
            ctx: Context::empty(),
        }
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// Validates every local declaration of a configuration unit, then resolves
    /// them all. Declarations of other kinds are ignored.
    pub fn evaluate(
        &self,
        declarations: &[BlockDeclaration],
    ) -> Result<EvaluatedLocals, AnalysisError> {
        let mut seen = HashSet::new();
        let mut entries = vec![];
        for declaration in declarations.iter().filter(|d| d.kind == BlockKind::Local) {
            let entry = BlockValidation::new(self, declaration, &self.ctx).finish()?.entity;
            if !seen.insert(entry.name.clone()) {
                return Err(parse_error(
                    declaration,
                    RuleId::DuplicateBlock,
                    format!("local value '{}' is declared more than once", entry.name),
                ));
            }
            entries.push(entry);
        }
        DependencyGraphEvaluator::new(entries)
            .with_max_depth(self.max_depth)
            .with_context(self.ctx.clone())
            .evaluate_all()
    }
}

impl Default for LocalValidator {
    fn default() -> Self {
        Self::new(&AnalyzerSettings::default())
    }
}

impl BlockValidator for LocalValidator {
    type Entity = LocalEntry;
    const KIND: BlockKind = BlockKind::Local;

    fn validate(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<LocalEntry>, AnalysisError> {
        require_name(declaration)?;
        if self.reserved_names.iter().any(|reserved| reserved == &declaration.name) {
            return Err(parse_error(
                declaration,
                RuleId::ReservedName,
                format!("'{}' is a reserved identifier", declaration.name),
            ));
        }
        if declaration.get_attribute(VALUE).is_none() {
            return Err(parse_error(
                declaration,
                RuleId::MissingAttribute,
                "local values require an expression",
            ));
        }
        Ok(Validated::new(LocalEntry::from_declaration(declaration)))
    }
}
