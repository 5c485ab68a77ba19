//! Error types for growth analysis.

use chrono::NaiveDate;
use thiserror::Error;

/// Failures of a single growth analysis. Nothing partial is ever returned.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Geometry missing or malformed, or unusable analysis window
    #[error("invalid input: {0}")]
    Input(String),

    /// Neither sensor produced a usable scene in the window
    #[error("no Sentinel-1 or Sentinel-2 images found between {start} and {end}")]
    NoImagery { start: NaiveDate, end: NaiveDate },

    #[error("imagery backend error: {0}")]
    Backend(#[from] BackendError),
}

impl AnalysisError {
    /// Backend failures are transient; input and imagery gaps are not
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalysisError::Backend(_))
    }
}

/// Errors raised by an imagery backend while materializing a value.
#[derive(Error, Debug)]
pub enum BackendError {
    #[cfg(feature = "earth-engine")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected backend response: {0}")]
    Decode(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Result alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
