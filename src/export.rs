//! Artifacts written to the output directory.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::{AggregateView, CorrelationMatrix};
use crate::insights::Insights;
use crate::pipeline::{AnalysisBundle, OmittedView};

pub const PROCESSED_DATA_FILE: &str = "processed_data.csv";
pub const TEXT_SUMMARY_FILE: &str = "text_summary_output.txt";
pub const AGGREGATE_VIEWS_FILE: &str = "aggregate_views.json";
pub const EXECUTIVE_TEXT_FILE: &str = "call_3_result.txt";
pub const EXECUTIVE_JSON_FILE: &str = "output.json";

/// Chart-ready export of every view.
#[derive(Debug, Serialize)]
struct AggregateViewsExport<'a> {
    correlation_matrix: Option<&'a CorrelationMatrix>,
    views: BTreeMap<&'a str, &'a AggregateView>,
    omitted: &'a [OmittedView],
}

#[derive(Debug, Serialize)]
struct ExecutiveSummaryExport<'a> {
    executive_summary: &'a str,
}

/// Create the output directory if needed.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))
}

fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(path)
}

/// Cleaned and enriched table as CSV. Returns the CSV text.
pub fn write_processed_data(dir: &Path, bundle: &AnalysisBundle) -> Result<String> {
    let csv = bundle.enriched_table.to_csv_string()?;
    write_file(dir, PROCESSED_DATA_FILE, &csv)?;
    Ok(csv)
}

pub fn write_text_summary(dir: &Path, summary: &str) -> Result<PathBuf> {
    write_file(dir, TEXT_SUMMARY_FILE, summary)
}

pub fn write_aggregate_views(dir: &Path, bundle: &AnalysisBundle) -> Result<PathBuf> {
    let export = AggregateViewsExport {
        correlation_matrix: bundle.correlation.as_ref(),
        views: bundle
            .views
            .iter()
            .map(|view| (view.name.as_str(), view))
            .collect(),
        omitted: &bundle.omitted,
    };
    let json = serde_json::to_string_pretty(&export).context("Failed to serialize views")?;
    write_file(dir, AGGREGATE_VIEWS_FILE, &json)
}

/// Executive report as plain text and as `{"executive_summary": ...}`.
pub fn write_insights(dir: &Path, insights: &Insights) -> Result<()> {
    write_file(dir, EXECUTIVE_TEXT_FILE, &insights.executive_summary)?;

    let json = serde_json::to_string(&ExecutiveSummaryExport {
        executive_summary: &insights.executive_summary,
    })?;
    write_file(dir, EXECUTIVE_JSON_FILE, &json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dataset::RawTable;
    use crate::pipeline::LoanPipeline;
    use tempfile::TempDir;

    fn bundle() -> AnalysisBundle {
        let raw = RawTable::from_csv_reader(
            include_str!("../fixtures/loan_applications.csv").as_bytes(),
        )
        .unwrap();
        LoanPipeline::from_config(&Config::default())
            .unwrap()
            .run(raw)
            .unwrap()
    }

    #[test]
    fn test_prepare_output_dir_creates_nested() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        prepare_output_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_processed_data_round_trips() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle();
        write_processed_data(dir.path(), &bundle).unwrap();

        let reread = RawTable::from_csv_path(&dir.path().join(PROCESSED_DATA_FILE)).unwrap();
        assert_eq!(reread.columns(), bundle.enriched_table.columns());
        assert_eq!(reread.len(), 8);
    }

    #[test]
    fn test_aggregate_views_export() {
        let dir = TempDir::new().unwrap();
        let path = write_aggregate_views(dir.path(), &bundle()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(json["correlation_matrix"]["columns"].is_array());
        assert_eq!(json["views"].as_object().unwrap().len(), 6);
        assert!(json["views"]["approval_rates_by_dti"]["pivot"]["cells"].is_array());
        assert!(json["omitted"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_write_insights() {
        let dir = TempDir::new().unwrap();
        let insights = Insights {
            initial: "a".to_string(),
            deep_dive: "b".to_string(),
            executive_summary: "Summary".to_string(),
        };
        write_insights(dir.path(), &insights).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join(EXECUTIVE_TEXT_FILE)).unwrap(),
            "Summary"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(EXECUTIVE_JSON_FILE)).unwrap(),
            r#"{"executive_summary":"Summary"}"#
        );
    }
}
