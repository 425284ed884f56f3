//! Descriptive statistics and the plain-text analysis summary.

use serde::Serialize;
use std::fmt::Write as _;

use super::{AggregateView, CorrelationMatrix};
use crate::dataset::{parse_number, RawTable};
use crate::models::columns;
use crate::pipeline::AnalysisBundle;

/// Descriptive statistics of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined for a single value.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Statistics over the present values, `None` when there are none.
pub fn describe(values: &[f64]) -> Option<Describe> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    });

    Some(Describe {
        count,
        mean,
        std,
        min: sorted[0],
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted[count - 1],
    })
}

/// Linear-interpolation quantile of sorted, non-empty data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Present numeric values of a named column.
pub fn column_values(table: &RawTable, column: &str) -> Vec<f64> {
    table
        .column_index(column)
        .map(|index| {
            table
                .column_cells(index)
                .filter_map(|cell| cell.and_then(parse_number))
                .collect()
        })
        .unwrap_or_default()
}

fn fmt_stat(value: f64) -> String {
    format!("{:.6}", value)
}

pub fn render_describe(name: &str, stats: Option<&Describe>) -> String {
    let mut out = String::new();
    let Some(stats) = stats else {
        let _ = writeln!(out, "count    0");
        let _ = writeln!(out, "Name: {}, no defined values", name);
        return out;
    };

    let rows = [
        ("count", fmt_stat(stats.count as f64)),
        ("mean", fmt_stat(stats.mean)),
        ("std", stats.std.map(fmt_stat).unwrap_or_else(|| "NaN".to_string())),
        ("min", fmt_stat(stats.min)),
        ("25%", fmt_stat(stats.q25)),
        ("50%", fmt_stat(stats.median)),
        ("75%", fmt_stat(stats.q75)),
        ("max", fmt_stat(stats.max)),
    ];
    let width = rows.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    for (label, value) in rows {
        let _ = writeln!(out, "{:<8}{:>width$}", label, value, width = width);
    }
    let _ = writeln!(out, "Name: {}, dtype: float64", name);
    out
}

/// First `rows` rows as an aligned text grid.
pub fn render_preview(table: &RawTable, rows: usize) -> String {
    let shown = rows.min(table.len());
    let index_width = shown.saturating_sub(1).to_string().len();

    let mut widths: Vec<usize> = table.columns().iter().map(|c| c.len()).collect();
    for row in &table.rows()[..shown] {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.as_deref().unwrap_or("NaN").len();
            widths[i] = widths[i].max(len);
        }
    }

    let mut out = String::new();
    let _ = write!(out, "{:width$}", "", width = index_width);
    for (column, width) in table.columns().iter().zip(&widths) {
        let _ = write!(out, "  {:>width$}", column, width = width);
    }
    out.push('\n');

    for (n, row) in table.rows()[..shown].iter().enumerate() {
        let _ = write!(out, "{:<width$}", n, width = index_width);
        for (cell, width) in row.iter().zip(&widths) {
            let _ = write!(
                out,
                "  {:>width$}",
                cell.as_deref().unwrap_or("NaN"),
                width = width
            );
        }
        out.push('\n');
    }
    out
}

fn infer_dtype(table: &RawTable, column: usize) -> &'static str {
    let mut present = table.column_cells(column).flatten().peekable();
    if present.peek().is_none() {
        return "float64";
    }
    let cells: Vec<&str> = present.collect();
    if cells.iter().all(|c| c.parse::<i64>().is_ok()) {
        "int64"
    } else if cells.iter().all(|c| c.parse::<f64>().is_ok()) {
        "float64"
    } else {
        "object"
    }
}

/// Row count plus per-column non-null count and inferred type.
pub fn render_info(table: &RawTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RangeIndex: {} entries", table.len());
    let _ = writeln!(out, "Data columns (total {} columns):", table.columns().len());

    let name_width = table
        .columns()
        .iter()
        .map(|c| c.len())
        .max()
        .unwrap_or(0)
        .max("Column".len());
    let _ = writeln!(
        out,
        " #   {:<name_width$}  Non-Null Count  Dtype",
        "Column",
        name_width = name_width
    );

    for (index, name) in table.columns().iter().enumerate() {
        let non_null = table.column_cells(index).filter(Option::is_some).count();
        let _ = writeln!(
            out,
            " {:<3} {:<name_width$}  {:<14}  {}",
            index,
            name,
            format!("{} non-null", non_null),
            infer_dtype(table, index),
            name_width = name_width
        );
    }
    out
}

pub fn render_view(view: &AggregateView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}:", view.title);
    if let Some(filter) = &view.filter {
        let _ = writeln!(out, "(filter: {})", filter);
    }
    let header = view.key_columns.join(" / ");
    let key_width = view
        .rows
        .iter()
        .map(|r| r.key.join(" / ").len())
        .max()
        .unwrap_or(0)
        .max(header.len());
    let _ = writeln!(out, "{:<key_width$}  {}", header, view.value_column, key_width = key_width);
    for row in &view.rows {
        let _ = writeln!(
            out,
            "{:<key_width$}  {:.6}",
            row.key.join(" / "),
            row.mean,
            key_width = key_width
        );
    }
    out
}

pub fn render_correlation(matrix: &CorrelationMatrix, limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Correlation Matrix ({} numeric columns), strongest pairs:",
        matrix.columns.len()
    );
    for (a, b, r) in matrix.strongest_pairs(limit) {
        let _ = writeln!(out, "{} ~ {}: {:.2}", a, b, r);
    }
    out
}

/// The plain-text summary written next to the processed data and sent
/// with every insight prompt.
///
/// Preview and info show the input as read; the statistics and views use
/// the cleaned, enriched table.
pub fn text_summary(bundle: &AnalysisBundle, preview_rows: usize) -> String {
    let table = &bundle.enriched_table;
    let mut out = String::new();

    let _ = writeln!(out, "Data preview:");
    out.push_str(&render_preview(&bundle.raw, preview_rows));
    out.push('\n');

    let _ = writeln!(out, "Data Info:");
    out.push_str(&render_info(&bundle.raw));

    for (title, column) in [
        ("Debt-to-Income Ratio Summary", columns::DEBT_TO_INCOME),
        ("Income to Loan Ratio Summary", columns::INCOME_TO_LOAN_RATIO),
        ("Revenue Potential Summary", columns::REVENUE_POTENTIAL),
    ] {
        let _ = writeln!(out, "\n{}:", title);
        out.push_str(&render_describe(
            column,
            describe(&column_values(table, column)).as_ref(),
        ));
    }

    if let Some(matrix) = &bundle.correlation {
        out.push('\n');
        out.push_str(&render_correlation(matrix, 10));
    }

    for view in &bundle.views {
        out.push('\n');
        out.push_str(&render_view(view));
    }

    for omitted in &bundle.omitted {
        let _ = writeln!(out, "\n{} omitted: {}", omitted.name, omitted.reason);
    }

    out
}
