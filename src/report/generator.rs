//! Markdown report generation.
//!
//! This module generates Markdown and JSON loan insight reports from
//! the analysis results.

use anyhow::Result;

use crate::analysis::{AggregateView, CorrelationMatrix, PivotTable};
use crate::dataset::CleaningStats;
use crate::features::DerivationStats;
use crate::models::{columns, Report, ReportMetadata};
use crate::pipeline::OmittedView;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Loan Insights Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));

    if let Some(ref insights) = report.insights {
        output.push_str(&generate_executive_section(&insights.executive_summary));
    }

    output.push_str(&generate_data_quality_section(
        &report.cleaning,
        &report.derivation,
    ));

    if let Some(ref matrix) = report.correlation {
        output.push_str(&generate_correlation_section(matrix));
    }

    output.push_str(&generate_views_section(&report.views));
    output.push_str(&generate_omitted_section(&report.omitted_views));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(ref model) = metadata.model_used {
        section.push_str(&format!("- **Model Used:** `{}`\n", model));
    }
    section.push_str(&format!("- **Records Read:** {}\n", metadata.records_read));
    section.push_str(&format!(
        "- **Records Analyzed:** {}\n",
        metadata.records_analyzed
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' => Some(c),
            ' ' => Some('-'),
            _ => None,
        })
        .collect()
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");

    if report.insights.is_some() {
        toc.push_str("- [Executive Summary](#executive-summary)\n");
    }

    toc.push_str("- [Data Quality](#data-quality)\n");

    if report.correlation.is_some() {
        toc.push_str("- [Correlation Matrix](#correlation-matrix)\n");
    }

    toc.push_str("- [Aggregate Views](#aggregate-views)\n");
    for view in &report.views {
        toc.push_str(&format!("  - [{}](#{})\n", view.title, anchor(&view.title)));
    }

    if !report.omitted_views.is_empty() {
        toc.push_str("- [Omitted Views](#omitted-views)\n");
    }

    toc.push('\n');

    toc
}

fn generate_executive_section(summary: &str) -> String {
    format!("## Executive Summary\n\n{}\n\n", summary.trim())
}

fn generate_data_quality_section(cleaning: &CleaningStats, derivation: &DerivationStats) -> String {
    let mut section = String::new();

    section.push_str("## Data Quality\n\n");
    section.push_str("| Check | Count |\n");
    section.push_str("|:---|---:|\n");
    section.push_str(&format!("| Rows read | {} |\n", cleaning.rows_before));
    section.push_str(&format!(
        "| Duplicate rows removed | {} |\n",
        cleaning.duplicates_removed
    ));
    section.push_str(&format!(
        "| Missing cells forward-filled | {} |\n",
        cleaning.cells_filled
    ));
    section.push_str(&format!(
        "| Undefined {} | {} |\n",
        columns::DEBT_TO_INCOME,
        derivation.undefined_debt_to_income
    ));
    section.push_str(&format!(
        "| Undefined {} | {} |\n",
        columns::INCOME_TO_LOAN_RATIO,
        derivation.undefined_income_to_loan
    ));
    section.push_str(&format!(
        "| Undefined {} | {} |\n",
        columns::REVENUE_POTENTIAL,
        derivation.undefined_revenue_potential
    ));
    section.push_str(&format!(
        "| FICO groups outside the scale | {} |\n",
        derivation.unknown_fico_groups
    ));
    section.push_str(&format!(
        "| Reasons without a purpose group | {} |\n",
        derivation.unmapped_reasons
    ));
    section.push('\n');

    if !cleaning.leading_gaps.is_empty() {
        section.push_str("Columns with leading gaps that could not be filled:\n\n");
        for (column, gap) in &cleaning.leading_gaps {
            section.push_str(&format!("- `{}`: {} row(s)\n", column, gap));
        }
        section.push('\n');
    }

    section
}

fn format_coefficient(value: Option<f64>) -> String {
    value
        .map(|r| format!("{:.2}", r))
        .unwrap_or_else(|| "-".to_string())
}

fn generate_correlation_section(matrix: &CorrelationMatrix) -> String {
    let mut section = String::new();

    section.push_str("## Correlation Matrix\n\n");

    let pairs = matrix.strongest_pairs(5);
    if !pairs.is_empty() {
        section.push_str("Strongest relationships:\n\n");
        for (a, b, r) in pairs {
            section.push_str(&format!("- `{}` ~ `{}`: {:.2}\n", a, b, r));
        }
        section.push('\n');
    }

    section.push_str("| |");
    for column in &matrix.columns {
        section.push_str(&format!(" {} |", column));
    }
    section.push('\n');
    section.push_str("|:---|");
    section.push_str(&"---:|".repeat(matrix.columns.len()));
    section.push('\n');

    for (column, row) in matrix.columns.iter().zip(&matrix.values) {
        section.push_str(&format!("| **{}** |", column));
        for value in row {
            section.push_str(&format!(" {} |", format_coefficient(*value)));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

/// Approval means read as rates; revenue means as amounts.
fn format_mean(view: &AggregateView, mean: f64) -> String {
    if view.value_column == columns::APPROVED {
        format!("{:.1}%", mean * 100.0)
    } else {
        format!("{:.2}", mean)
    }
}

fn generate_views_section(views: &[AggregateView]) -> String {
    let mut section = String::new();

    section.push_str("## Aggregate Views\n\n");

    if views.is_empty() {
        section.push_str("No aggregate view could be computed.\n\n");
        return section;
    }

    for view in views {
        section.push_str(&generate_view_block(view));
    }

    section
}

fn generate_view_block(view: &AggregateView) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}\n\n", view.title));
    block.push_str(&format!("*Mean `{}`", view.value_column));
    if let Some(ref filter) = view.filter {
        block.push_str(&format!(" where `{}`", filter));
    }
    block.push_str("*\n\n");

    match view.pivot {
        Some(ref pivot) => block.push_str(&generate_pivot_table(view, pivot)),
        None => {
            block.push_str(&format!("| {} | Mean | Count |\n", view.key_columns.join(" / ")));
            block.push_str("|:---|---:|---:|\n");
            for row in &view.rows {
                block.push_str(&format!(
                    "| {} | {} | {} |\n",
                    row.key.join(" / "),
                    format_mean(view, row.mean),
                    row.count
                ));
            }
        }
    }
    block.push('\n');

    block
}

fn generate_pivot_table(view: &AggregateView, pivot: &PivotTable) -> String {
    let mut table = String::new();

    table.push_str(&format!("| {} \\ {} |", pivot.row_key, pivot.column_key));
    for label in &pivot.column_labels {
        table.push_str(&format!(" {} |", label));
    }
    table.push('\n');
    table.push_str("|:---|");
    table.push_str(&"---:|".repeat(pivot.column_labels.len()));
    table.push('\n');

    for (label, cells) in pivot.row_labels.iter().zip(&pivot.cells) {
        table.push_str(&format!("| **{}** |", label));
        for cell in cells {
            let text = cell
                .map(|mean| format_mean(view, mean))
                .unwrap_or_else(|| "-".to_string());
            table.push_str(&format!(" {} |", text));
        }
        table.push('\n');
    }

    table
}

fn generate_omitted_section(omitted: &[OmittedView]) -> String {
    if omitted.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Omitted Views\n\n");
    for view in omitted {
        section.push_str(&format!("- `{}`: {}\n", view.name, view.reason));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by LoanLens v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
