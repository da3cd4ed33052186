use stackmap_core::analysis::AnalysisReport;
use stackmap_core::{Analyzer, AnalyzerSettings, Context};
use stackmap_kit::helpers::hcl::RawHclContent;
use stackmap_kit::serde_json::Value;
use stackmap_kit::types::diagnostics::Diagnostic;
use stackmap_kit::types::{BlockDeclaration, BlockKind};

/// Outcome of analyzing a configuration unit
#[derive(Debug)]
pub struct AnalysisResult {
    pub success: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub report: AnalysisReport,
}

impl From<AnalysisReport> for AnalysisResult {
    fn from(report: AnalysisReport) -> Self {
        AnalysisResult {
            success: !report.has_errors(),
            errors: report.errors.iter().map(Diagnostic::from).collect(),
            warnings: report.warnings.clone(),
            report,
        }
    }
}

/// Builder for configuration units under test
///
/// Blocks are appended in order; `attr` sets an attribute on the block added last.
///
/// ```rust
/// use serde_json::json;
/// use stackmap_test_utils::ConfigurationBuilder;
///
/// let result = ConfigurationBuilder::new()
///     .local("env", json!("prod"))
///     .variable("region")
///         .attr("type", json!("string"))
///         .attr("default", json!("eu-west-1"))
///     .output("env")
///         .attr("value", json!("${local.env}"))
///     .analyze();
///
/// assert!(result.success);
/// ```
#[derive(Clone, Default)]
pub struct ConfigurationBuilder {
    declarations: Vec<BlockDeclaration>,
    hcl: Vec<String>,
    settings: AnalyzerSettings,
    ctx: Option<Context>,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: AnalyzerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Appends HCL source, parsed ahead of the declarations added through the builder.
    pub fn with_hcl(mut self, content: &str) -> Self {
        self.hcl.push(content.to_string());
        self
    }

    pub fn block(mut self, declaration: BlockDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn local(self, name: &str, expression: Value) -> Self {
        self.block(BlockDeclaration::local(name, expression))
    }

    pub fn variable(self, name: &str) -> Self {
        self.block(BlockDeclaration::new(BlockKind::Variable, name))
    }

    pub fn output(self, name: &str) -> Self {
        self.block(BlockDeclaration::new(BlockKind::Output, name))
    }

    pub fn provider(self, name: &str) -> Self {
        self.block(BlockDeclaration::new(BlockKind::Provider, name))
    }

    pub fn module(self, name: &str, source: &str) -> Self {
        self.block(BlockDeclaration::new(BlockKind::Module, name))
            .attr("source", Value::String(source.to_string()))
    }

    pub fn data(self, data_type: &str, name: &str) -> Self {
        self.block(BlockDeclaration::new(BlockKind::Data, name))
            .attr("type", Value::String(data_type.to_string()))
    }

    /// Sets an attribute on the last block added.
    pub fn attr(mut self, key: &str, value: Value) -> Self {
        if let Some(declaration) = self.declarations.last_mut() {
            declaration.raw_attributes.insert(key.to_string(), value);
        }
        self
    }

    pub fn analyzer(&self) -> Analyzer {
        let analyzer = Analyzer::new(self.settings.clone());
        match &self.ctx {
            Some(ctx) => analyzer.with_context(ctx.clone()),
            None => analyzer,
        }
    }

    /// HCL declarations first, then the ones added through the builder.
    pub fn declarations(&self) -> Result<Vec<BlockDeclaration>, Diagnostic> {
        let mut declarations = vec![];
        for content in self.hcl.iter() {
            declarations.append(&mut RawHclContent::from_string(content.clone()).into_declarations()?);
        }
        declarations.extend(self.declarations.iter().cloned());
        Ok(declarations)
    }

    /// Analyzes the configuration; front-end failures are reported as errors.
    pub fn analyze(&self) -> AnalysisResult {
        match self.declarations() {
            Ok(declarations) => self.analyzer().analyze(&declarations).into(),
            Err(diagnostic) => AnalysisResult {
                success: false,
                errors: vec![diagnostic],
                warnings: vec![],
                report: AnalysisReport::default(),
            },
        }
    }
}
