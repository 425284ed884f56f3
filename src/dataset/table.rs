//! In-memory tabular data with explicit missing cells.
//!
//! Rows keep the order in which they were read. A missing cell is `None`;
//! the CSV reader maps the usual NA spellings to `None` so the cleaner
//! never has to guess.

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Cell spellings treated as missing when reading CSV input.
pub const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "#N/A",
    "#N/A N/A", "#NA", "<NA>", "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN",
];

/// A single row. `None` marks a missing cell.
pub type Row = Vec<Option<String>>;

/// Column-named table of optional string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RawTable {
    /// Build a table; rows are padded or truncated to the column count.
    /// Fields past the header are dropped with a warning.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, mut row)| {
                if row.len() > width {
                    warn!(
                        "Row {} has {} fields but the header has {}; dropping {} extra field(s)",
                        index + 1,
                        row.len(),
                        width,
                        row.len() - width
                    );
                }
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Read a CSV file with a header row.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;
        Self::from_csv_reader(file)
            .with_context(|| format!("Failed to parse CSV: {}", path.display()))
    }

    /// Read CSV from any reader.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(String::from)
            .collect();

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("Malformed CSV record {}", line + 1))?;
            rows.push(record.iter().map(parse_cell).collect());
        }

        debug!("Read {} rows x {} columns", rows.len(), columns.len());
        Ok(Self::new(columns, rows))
    }

    /// Write the table as CSV; missing cells become empty fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file.
    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_csv(file)
    }

    /// Render the table as CSV text.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).context("CSV output is not valid UTF-8")
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a column that the pipeline cannot run without.
    pub fn require_column(&self, name: &str) -> PipelineResult<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
            })
    }

    /// Cell text at (row, column), `None` when missing.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    /// All cells of one column in row order.
    pub fn column_cells(&self, column: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(column).and_then(|c| c.as_deref()))
    }

    /// Remove the named columns that are present. Returns how many were removed.
    pub fn drop_columns(&mut self, names: &[&str]) -> usize {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !names.contains(&c.as_str()))
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }

        let mut flags = keep.iter();
        self.columns.retain(|_| flags.next().copied().unwrap_or(true));
        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| flags.next().copied().unwrap_or(true));
        }
        removed
    }

    /// Set a column's values, replacing an existing column of the same name
    /// or appending a new one.
    pub fn upsert_column(&mut self, name: &str, values: Vec<Option<String>>) {
        let index = match self.column_index(name) {
            Some(index) => index,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(None);
                }
                self.columns.len() - 1
            }
        };

        for (row, value) in self.rows.iter_mut().zip(values) {
            row[index] = value;
        }
    }
}

fn parse_cell(raw: &str) -> Option<String> {
    if NA_TOKENS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Parse a numeric cell, rejecting non-finite values.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cells(values: &[&str]) -> Row {
        values.iter().map(|v| parse_cell(v)).collect()
    }

    #[test]
    fn test_reads_na_tokens_as_missing() {
        let csv = "Lender,bounty\nA,NaN\n,250\nB,\n";
        let table = RawTable::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.columns(), &["Lender", "bounty"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.cell(0, 1), None);
        assert_eq!(table.cell(1, 0), None);
        assert_eq!(table.cell(1, 1), Some("250"));
        assert_eq!(table.cell(2, 1), None);
    }

    #[test]
    fn test_rows_normalised_to_header_width() {
        let csv = "Lender,bounty\nA,250,extra,fields\nB\n";
        let table = RawTable::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], cells(&["A", "250"]));
        assert_eq!(table.rows()[1], cells(&["B", ""]));
    }

    #[test]
    fn test_drop_columns() {
        let csv = "Lender,bounty,Approved\nA,250,1\nB,,0\n";
        let mut table = RawTable::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.drop_columns(&["bounty", "Missing"]), 1);
        assert_eq!(table.columns(), &["Lender", "Approved"]);
        assert_eq!(table.rows()[1], cells(&["B", "0"]));
        assert_eq!(table.drop_columns(&["bounty"]), 0);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let csv = "a,b,c\n1,2\n";
        let table = RawTable::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.rows()[0].len(), 3);
        assert_eq!(table.cell(0, 2), None);
    }

    #[test]
    fn test_require_column_reports_name() {
        let table = RawTable::new(vec!["Lender".to_string()], vec![]);
        assert_eq!(table.require_column("Lender"), Ok(0));
        assert_eq!(
            table.require_column("Approved"),
            Err(PipelineError::MissingColumn {
                column: "Approved".to_string()
            })
        );
    }

    #[test]
    fn test_upsert_column_replaces_existing() {
        let mut table = RawTable::new(
            vec!["x".to_string(), "y".to_string()],
            vec![cells(&["1", "old"]), cells(&["2", "old"])],
        );

        table.upsert_column("y", vec![Some("new".to_string()), None]);
        table.upsert_column("z", vec![Some("3".to_string()), Some("4".to_string())]);

        assert_eq!(table.columns(), &["x", "y", "z"]);
        assert_eq!(table.cell(0, 1), Some("new"));
        assert_eq!(table.cell(1, 1), None);
        assert_eq!(table.cell(1, 2), Some("4"));
    }

    #[test]
    fn test_csv_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        let table = RawTable::new(
            vec!["Lender".to_string(), "note".to_string()],
            vec![cells(&["A", "has, comma"]), cells(&["B", ""])],
        );

        table.write_csv_path(&path).unwrap();
        let read_back = RawTable::from_csv_path(&path).unwrap();

        assert_eq!(read_back, table);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0.25"), Some(0.25));
        assert_eq!(parse_number("700"), Some(700.0));
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("abc"), None);
    }
}
