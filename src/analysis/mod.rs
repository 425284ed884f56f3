//! Analysis over enriched applications.
//!
//! Grouped-mean views, the correlation matrix and the plain-text summary
//! that feeds the insight prompts.

pub mod aggregator;
pub mod correlation;
pub mod summary;

pub use aggregator::{
    aggregate, standard_views, AggregateView, GroupKey, PivotTable, RecordFilter, ValueColumn,
    ViewRow, ViewSpec,
};
pub use correlation::CorrelationMatrix;
pub use summary::{describe, Describe};

/// Name under which the correlation matrix is published.
pub const CORRELATION_VIEW: &str = "correlation_matrix";
