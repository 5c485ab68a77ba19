//! Growth analysis: sensor selection, condition classification and summary.

pub mod analyzer;
pub mod classification;
pub mod selection;
pub mod summary;
pub mod visualization;

pub use analyzer::{AnalysisOptions, GrowthAnalyzer, PlotInput};
pub use classification::{classify, ClassMasks, ConditionClass};
pub use selection::{select_sensor, SceneCandidate, Sensor};
pub use summary::{AnalysisResult, ClassCounts, GrowthReport, PixelSummary};
