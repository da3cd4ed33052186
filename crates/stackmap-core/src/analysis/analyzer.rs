use std::collections::HashSet;
use std::sync::Arc;

use kit::constants::{ALIAS, TYPE};
use kit::helpers::hcl::{block_to_declarations, RawHclContent};
use kit::types::diagnostics::Diagnostic;
use kit::types::{BlockDeclaration, BlockKind};

use crate::cache::{Clock, SystemClock};
use crate::context::Context;
use crate::settings::AnalyzerSettings;

use super::blocks::{
    BlockValidation, BlockValidator, DataValidator, LocalValidator, ModuleValidator,
    OutputValidator, ProviderValidator, VariableValidator,
};
use super::dependency_graph::EvaluatedLocals;
use super::entities::{
    DataSource, ModuleReference, OutputDeclaration, ProviderConfiguration, Validated,
    VariableDefinition,
};
use super::errors::{AnalysisError, ParseError};
use super::rule_id::RuleId;
use super::sources::{ProviderSourceResolver, SourceResolver};

/// Entry point of the engine: validates declarations with shared, injected caches.
///
/// An analyzer can be shared between workers analyzing independent
/// configuration units; each call builds its own evaluator.
#[derive(Debug, Clone)]
pub struct Analyzer {
    settings: AnalyzerSettings,
    ctx: Context,
    clock: Arc<dyn Clock>,
    module_sources: Arc<SourceResolver>,
    provider_sources: Arc<ProviderSourceResolver>,
}

impl Analyzer {
    pub fn new(settings: AnalyzerSettings) -> Self {
        AnalyzerBuilder::new(settings).build()
    }

    pub fn builder(settings: AnalyzerSettings) -> AnalyzerBuilder {
        AnalyzerBuilder::new(settings)
    }

    /// Sets the logging context; source caches are rebuilt to log through it.
    pub fn with_context(self, ctx: Context) -> Self {
        AnalyzerBuilder::new(self.settings).context(ctx).clock(self.clock).build()
    }

    /// Sets the clock caches expire against; source caches are rebuilt on it.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        AnalyzerBuilder::new(self.settings).context(self.ctx).clock(clock).build()
    }

    pub fn with_module_sources(mut self, sources: Arc<SourceResolver>) -> Self {
        self.module_sources = sources;
        self
    }

    pub fn with_provider_sources(mut self, sources: Arc<ProviderSourceResolver>) -> Self {
        self.provider_sources = sources;
        self
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn module_sources(&self) -> &Arc<SourceResolver> {
        &self.module_sources
    }

    pub fn provider_sources(&self) -> &Arc<ProviderSourceResolver> {
        &self.provider_sources
    }

    fn run<V: BlockValidator>(
        &self,
        validator: &V,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<V::Entity>, AnalysisError> {
        BlockValidation::new(validator, declaration, &self.ctx).finish()
    }

    /// Validates and evaluates every local value of one configuration unit.
    pub fn evaluate_locals(
        &self,
        declarations: &[BlockDeclaration],
    ) -> Result<EvaluatedLocals, AnalysisError> {
        LocalValidator::new(&self.settings).with_context(self.ctx.clone()).evaluate(declarations)
    }

    pub fn validate_variable(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<VariableDefinition>, AnalysisError> {
        self.run(&VariableValidator::new(&self.settings).with_context(self.ctx.clone()), declaration)
    }

    pub fn validate_output(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<OutputDeclaration>, AnalysisError> {
        self.run(&OutputValidator::new().with_context(self.ctx.clone()), declaration)
    }

    pub fn validate_provider(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<ProviderConfiguration>, AnalysisError> {
        let validator = ProviderValidator::new(&self.settings, self.provider_sources.clone())
            .with_context(self.ctx.clone());
        self.run(&validator, declaration)
    }

    pub fn validate_module(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<ModuleReference>, AnalysisError> {
        let validator = ModuleValidator::new(&self.settings, self.module_sources.clone())
            .with_context(self.ctx.clone());
        self.run(&validator, declaration)
    }

    pub fn validate_data(
        &self,
        declaration: &BlockDeclaration,
    ) -> Result<Validated<DataSource>, AnalysisError> {
        self.run(&DataValidator, declaration)
    }

    /// Validates every declaration of a configuration unit, collecting all
    /// errors instead of stopping at the first one.
    ///
    /// Local values are evaluated together; a failure there is reported once and
    /// leaves `locals` empty. Every other block is validated on its own.
    pub fn analyze(&self, declarations: &[BlockDeclaration]) -> AnalysisReport {
        let mut report = AnalysisReport::default();

        if declarations.iter().any(|d| d.kind == BlockKind::Local) {
            match self.evaluate_locals(declarations) {
                Ok(locals) => report.analysis.locals = Some(locals),
                Err(error) => report.errors.push(error),
            }
        }

        let mut seen = HashSet::new();
        for declaration in declarations.iter().filter(|d| d.kind != BlockKind::Local) {
            if !seen.insert(identity(declaration)) {
                report.errors.push(
                    ParseError::new(
                        declaration.kind,
                        &declaration.name,
                        RuleId::DuplicateBlock,
                        format!("{} '{}' is declared more than once", declaration.kind, declaration.name),
                    )
                    .into(),
                );
                continue;
            }
            let analysis = &mut report.analysis;
            let outcome = match declaration.kind {
                BlockKind::Variable => self
                    .validate_variable(declaration)
                    .map(|v| collect(v, &mut analysis.variables)),
                BlockKind::Output => {
                    self.validate_output(declaration).map(|v| collect(v, &mut analysis.outputs))
                }
                BlockKind::Provider => self
                    .validate_provider(declaration)
                    .map(|v| collect(v, &mut analysis.providers)),
                BlockKind::Module => {
                    self.validate_module(declaration).map(|v| collect(v, &mut analysis.modules))
                }
                BlockKind::Data => self
                    .validate_data(declaration)
                    .map(|v| collect(v, &mut analysis.data_sources)),
                BlockKind::Local => Ok(vec![]),
            };
            match outcome {
                Ok(mut warnings) => report.warnings.append(&mut warnings),
                Err(error) => report.errors.push(error),
            }
        }

        self.ctx.try_log(|logger| {
            debug!(logger, "analyzed {} declarations", declarations.len();
                "errors" => report.error_count(), "warnings" => report.warning_count())
        });
        report
    }

    /// Parses HCL text and analyzes the declarations it holds.
    pub fn analyze_hcl(&self, content: &str) -> Result<AnalysisReport, Diagnostic> {
        let mut declarations = vec![];
        for block in RawHclContent::from_string(content.to_string()).into_blocks()?.iter() {
            if BlockKind::from_block_ident(block.ident.as_str()).is_none() {
                self.ctx.try_log(|logger| {
                    debug!(logger, "skipping unsupported block '{}'", block.ident.as_str())
                });
                continue;
            }
            declarations.append(&mut block_to_declarations(block)?);
        }
        Ok(self.analyze(&declarations))
    }
}

/// Key under which two declarations collide: providers may repeat under distinct
/// aliases, data sources under distinct types.
fn identity(declaration: &BlockDeclaration) -> (BlockKind, String, Option<String>) {
    let qualifier = match declaration.kind {
        BlockKind::Provider => declaration.get_str_attribute(ALIAS),
        BlockKind::Data => declaration.get_str_attribute(TYPE),
        _ => None,
    };
    (declaration.kind, declaration.name.clone(), qualifier.map(str::to_string))
}

fn collect<T>(validated: Validated<T>, into: &mut Vec<T>) -> Vec<Diagnostic> {
    into.push(validated.entity);
    validated.warnings
}

pub struct AnalyzerBuilder {
    settings: AnalyzerSettings,
    ctx: Context,
    clock: Arc<dyn Clock>,
    module_sources: Option<Arc<SourceResolver>>,
    provider_sources: Option<Arc<ProviderSourceResolver>>,
}

impl AnalyzerBuilder {
    pub fn new(settings: AnalyzerSettings) -> Self {
        AnalyzerBuilder {
            settings,
            ctx: Context::empty(),
            clock: Arc::new(SystemClock),
            module_sources: None,
            provider_sources: None,
        }
    }

    pub fn context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shares a module source cache, e.g. between analyzers of a worker pool.
    pub fn module_sources(mut self, sources: Arc<SourceResolver>) -> Self {
        self.module_sources = Some(sources);
        self
    }

    pub fn provider_sources(mut self, sources: Arc<ProviderSourceResolver>) -> Self {
        self.provider_sources = Some(sources);
        self
    }

    pub fn build(self) -> Analyzer {
        let module_sources = self.module_sources.unwrap_or_else(|| {
            Arc::new(
                SourceResolver::with_clock(self.settings.module_source_cache_ttl(), self.clock.clone())
                    .with_context(self.ctx.clone()),
            )
        });
        let provider_sources = self.provider_sources.unwrap_or_else(|| {
            Arc::new(
                ProviderSourceResolver::with_clock(
                    self.settings.provider_source_cache_ttl(),
                    self.clock.clone(),
                )
                .with_context(self.ctx.clone()),
            )
        });
        Analyzer {
            settings: self.settings,
            ctx: self.ctx,
            clock: self.clock,
            module_sources,
            provider_sources,
        }
    }
}

/// Typed entities of one configuration unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationAnalysis {
    pub locals: Option<EvaluatedLocals>,
    pub variables: Vec<VariableDefinition>,
    pub outputs: Vec<OutputDeclaration>,
    pub providers: Vec<ProviderConfiguration>,
    pub modules: Vec<ModuleReference>,
    pub data_sources: Vec<DataSource>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub analysis: ConfigurationAnalysis,
    pub errors: Vec<AnalysisError>,
    pub warnings: Vec<Diagnostic>,
}

impl AnalysisReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Errors then warnings, as diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(Diagnostic::from).chain(self.warnings.iter().cloned()).collect()
    }
}
