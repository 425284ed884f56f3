//! Typed errors for the feature and aggregation pipeline.
//!
//! Only configuration problems and missing input columns abort a run.
//! Everything else is absorbed at the record or view level.

use thiserror::Error;

/// Fatal pipeline errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Required column '{column}' is missing from the input")]
    MissingColumn { column: String },

    #[error("Invalid segment scale '{name}': {reason}")]
    InvalidScale { name: String, reason: String },

    #[error("Invalid FICO scale: {0}")]
    InvalidFicoScale(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Reasons a single aggregate view is omitted from the bundle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("view '{view}' has no eligible records")]
    NoEligibleRecords { view: String },

    #[error("no numeric columns to correlate")]
    NoNumericColumns,
}
