#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate slog;

#[macro_use]
pub extern crate stackmap_kit as kit;

pub mod analysis;
pub mod cache;
pub mod context;
pub mod settings;

#[cfg(test)]
mod tests;

pub use analysis::{AnalysisError, AnalysisReport, Analyzer, AnalyzerBuilder};
pub use context::Context;
pub use settings::AnalyzerSettings;
