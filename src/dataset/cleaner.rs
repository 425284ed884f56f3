//! Record cleaning: duplicate removal and forward fill.
//!
//! Both passes work on the raw table in its load order. Duplicates are
//! removed first so that a filled value can never turn two distinct rows
//! into copies of each other.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::table::{RawTable, Row};

/// What the cleaner changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    /// Rows before cleaning.
    pub rows_before: usize,
    /// Rows after cleaning.
    pub rows_after: usize,
    /// Exact duplicates dropped.
    pub duplicates_removed: usize,
    /// Missing cells replaced by the preceding value in their column.
    pub cells_filled: usize,
    /// Columns that still start with missing cells, with the gap length.
    pub leading_gaps: Vec<(String, usize)>,
}

/// Run the full cleaning pass over a raw table.
pub fn clean_records(mut table: RawTable) -> (RawTable, CleaningStats) {
    let rows_before = table.len();

    let duplicates_removed = drop_duplicates(&mut table);
    let (cells_filled, leading_gaps) = forward_fill(&mut table);

    for (column, gap) in &leading_gaps {
        warn!(
            "Column '{}' has {} leading missing value(s) with nothing to fill from",
            column, gap
        );
    }

    let stats = CleaningStats {
        rows_before,
        rows_after: table.len(),
        duplicates_removed,
        cells_filled,
        leading_gaps,
    };

    info!(
        "Cleaned {} rows: {} duplicates removed, {} cells forward-filled",
        stats.rows_before, stats.duplicates_removed, stats.cells_filled
    );

    (table, stats)
}

/// Remove exact duplicate rows, keeping the first occurrence.
///
/// Returns the number of rows removed.
pub fn drop_duplicates(table: &mut RawTable) -> usize {
    let before = table.len();
    let mut seen: HashSet<Row> = HashSet::with_capacity(before);

    table.rows_mut().retain(|row| seen.insert(row.clone()));

    let removed = before - table.len();
    debug!("Dropped {} duplicate rows", removed);
    removed
}

/// Replace each missing cell with the last non-missing value above it in
/// the same column.
///
/// Returns the number of filled cells and, per column, the count of
/// leading cells left missing.
pub fn forward_fill(table: &mut RawTable) -> (usize, Vec<(String, usize)>) {
    let width = table.columns().len();
    let mut last_seen: Vec<Option<String>> = vec![None; width];
    let mut leading: Vec<usize> = vec![0; width];
    let mut filled = 0usize;

    for row in table.rows_mut().iter_mut() {
        for (column, cell) in row.iter_mut().enumerate() {
            match cell {
                Some(value) => last_seen[column] = Some(value.clone()),
                None => match &last_seen[column] {
                    Some(previous) => {
                        *cell = Some(previous.clone());
                        filled += 1;
                    }
                    None => leading[column] += 1,
                },
            }
        }
    }

    let gaps = table
        .columns()
        .iter()
        .zip(leading)
        .filter(|(_, gap)| *gap > 0)
        .map(|(name, gap)| (name.clone(), gap))
        .collect();

    (filled, gaps)
}
