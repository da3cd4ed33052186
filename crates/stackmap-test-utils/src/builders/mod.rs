//! Test builders for creating configuration units easily

mod configuration_builder;

pub use configuration_builder::{AnalysisResult, ConfigurationBuilder};
