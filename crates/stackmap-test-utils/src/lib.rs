pub mod assertions;
pub mod builders;
mod logging;

pub use builders::{AnalysisResult, ConfigurationBuilder};
pub use logging::test_context;
