//! End-to-end analysis run: clean, derive, segment, aggregate.
//!
//! The pipeline is single-threaded and deterministic. Fatal problems are
//! returned as [`PipelineError`]; a view that cannot be computed is recorded
//! in [`AnalysisBundle::omitted`] and the run continues.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::{
    aggregate, standard_views, AggregateView, CorrelationMatrix, ViewSpec, CORRELATION_VIEW,
};
use crate::config::Config;
use crate::dataset::{clean_records, load_applications, CleaningStats, RawTable};
use crate::error::PipelineResult;
use crate::features::{
    enriched_table, DerivationStats, FeatureDeriver, Segmenter, DERIVED_COLUMNS,
};
use crate::models::{columns, EnrichedApplication};

/// A view that was not produced, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmittedView {
    pub name: String,
    pub reason: String,
}

/// Everything one run produces. Read-only once built.
#[derive(Debug, Clone)]
pub struct AnalysisBundle {
    /// The input exactly as read, before cleaning.
    pub raw: RawTable,
    pub cleaning: CleaningStats,
    pub derivation: DerivationStats,
    pub enriched: Vec<EnrichedApplication>,
    /// Cleaned raw columns plus the derived columns.
    pub enriched_table: RawTable,
    pub correlation: Option<CorrelationMatrix>,
    pub views: Vec<AggregateView>,
    pub omitted: Vec<OmittedView>,
}

impl AnalysisBundle {
    /// A mean view by name.
    pub fn view(&self, name: &str) -> Option<&AggregateView> {
        self.views.iter().find(|v| v.name == name)
    }

    /// Names of every produced view, the correlation matrix first.
    pub fn view_names(&self) -> Vec<&str> {
        self.correlation
            .as_ref()
            .map(|_| CORRELATION_VIEW)
            .into_iter()
            .chain(self.views.iter().map(|v| v.name.as_str()))
            .collect()
    }
}

/// Configured stages of one analysis run.
#[derive(Debug, Clone)]
pub struct LoanPipeline {
    deriver: FeatureDeriver,
    segmenter: Segmenter,
    views: Vec<ViewSpec>,
}

impl LoanPipeline {
    pub fn new(deriver: FeatureDeriver, segmenter: Segmenter) -> Self {
        Self {
            deriver,
            segmenter,
            views: standard_views(),
        }
    }

    /// Build the stages from configuration. Invalid tables or edges are fatal.
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        Ok(Self::new(
            FeatureDeriver::new(config.feature_tables()?),
            config.segmenter()?,
        ))
    }

    /// Run every stage over a raw table.
    pub fn run(&self, raw: RawTable) -> PipelineResult<AnalysisBundle> {
        for column in columns::REQUIRED {
            raw.require_column(column)?;
        }

        // Derived columns from an earlier run are recomputed, never cleaned
        let mut input = raw.clone();
        let stale = input.drop_columns(&DERIVED_COLUMNS);
        if stale > 0 {
            debug!("Dropped {} previously derived column(s) before cleaning", stale);
        }

        let (cleaned, cleaning) = clean_records(input);
        if cleaned.is_empty() {
            warn!("Input has no records; every view will be omitted");
        }
        let applications = load_applications(&cleaned)?;
        let (enriched, derivation) = self.deriver.derive_all(applications);
        let enriched_table = enriched_table(&cleaned, &enriched);

        let mut omitted = Vec::new();

        let correlation = match CorrelationMatrix::from_table(&enriched_table) {
            Ok(matrix) => Some(matrix),
            Err(e) => {
                warn!("Omitting {}: {}", CORRELATION_VIEW, e);
                omitted.push(OmittedView {
                    name: CORRELATION_VIEW.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        };

        let segmented = self.segmenter.segment(&enriched);
        let mut views = Vec::with_capacity(self.views.len());
        for spec in &self.views {
            match aggregate(&segmented, spec) {
                Ok(view) => views.push(view),
                Err(e) => {
                    warn!("Omitting {}: {}", spec.name, e);
                    omitted.push(OmittedView {
                        name: spec.name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Analysis complete: {} records, {} views, {} omitted",
            enriched.len(),
            views.len() + usize::from(correlation.is_some()),
            omitted.len()
        );

        Ok(AnalysisBundle {
            raw,
            cleaning,
            derivation,
            enriched,
            enriched_table,
            correlation,
            views,
            omitted,
        })
    }
}
