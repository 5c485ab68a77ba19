pub mod collect;
pub mod commons;
pub mod error;
pub mod geo_core;
pub mod growth;
pub mod query;

pub use error::{AnalysisError, BackendError};
pub use growth::{AnalysisResult, GrowthAnalyzer, PlotInput, Sensor};
