pub mod analyzer;
pub mod blocks;
pub mod dependency_graph;
pub mod entities;
pub mod errors;
pub mod references;
pub mod rule_id;
pub mod sources;
pub mod type_descriptor;

pub use analyzer::{AnalysisReport, Analyzer, AnalyzerBuilder, ConfigurationAnalysis};
pub use dependency_graph::{DependencyGraphEvaluator, EvaluatedLocals, LocalEntry};
pub use errors::{AnalysisError, ParseError, ValidationError};
pub use references::{extract, extract_references, Reference};
pub use rule_id::RuleId;
pub use sources::{classify, ClassifiedSource, SourceKind};
pub use type_descriptor::{build_validator, parse_type, ObjectField, TypeDescriptor};
