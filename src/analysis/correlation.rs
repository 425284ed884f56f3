//! Pairwise Pearson correlation over the numeric columns of a table.

use serde::Serialize;
use tracing::debug;

use crate::dataset::{parse_number, RawTable};
use crate::error::ViewError;

/// Symmetric correlation matrix. `None` marks an undefined coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Correlate every numeric column of `table` with every other.
    ///
    /// Each pair uses only the rows where both cells are present. The
    /// diagonal is always 1.
    pub fn from_table(table: &RawTable) -> Result<Self, ViewError> {
        let numeric = numeric_columns(table);
        if numeric.is_empty() {
            return Err(ViewError::NoNumericColumns);
        }

        let n = numeric.len();
        let mut values = vec![vec![None; n]; n];
        for i in 0..n {
            values[i][i] = Some(1.0);
            for j in (i + 1)..n {
                let r = pearson(&numeric[i].1, &numeric[j].1);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        debug!("Correlated {} numeric columns", n);
        Ok(Self {
            columns: numeric.into_iter().map(|(name, _)| name).collect(),
            values,
        })
    }

    /// Coefficient for a pair of columns.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    /// Defined off-diagonal pairs ordered by descending absolute coefficient.
    pub fn strongest_pairs(&self, limit: usize) -> Vec<(&str, &str, f64)> {
        let mut pairs: Vec<(&str, &str, f64)> = Vec::new();
        for i in 0..self.columns.len() {
            for j in (i + 1)..self.columns.len() {
                if let Some(r) = self.values[i][j] {
                    pairs.push((&self.columns[i], &self.columns[j], r));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
        pairs.truncate(limit);
        pairs
    }
}

/// Columns with at least one present cell where every present cell is a
/// number. Non-finite numbers count as missing.
pub fn numeric_columns(table: &RawTable) -> Vec<(String, Vec<Option<f64>>)> {
    table
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(index, name)| {
            let mut present = 0usize;
            let mut values = Vec::with_capacity(table.len());
            for cell in table.column_cells(index) {
                match cell {
                    Some(text) => {
                        text.parse::<f64>().ok()?;
                        present += 1;
                        values.push(parse_number(text));
                    }
                    None => values.push(None),
                }
            }
            (present > 0).then(|| (name.clone(), values))
        })
        .collect()
}

/// Pearson coefficient over pairwise-complete observations.
///
/// `None` with fewer than two complete pairs or when either side has zero
/// variance.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }

    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> RawTable {
        RawTable::from_csv_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_perfect_correlation() {
        let xs = [Some(1.0), Some(2.0), Some(3.0)];
        let ys = [Some(2.0), Some(4.0), Some(6.0)];
        let r = pearson(&xs, &ys).unwrap();
        assert!((r - 1.0).abs() < 1e-12);

        let inverse = [Some(3.0), Some(2.0), Some(1.0)];
        let r = pearson(&xs, &inverse).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pairwise_complete_observations() {
        let xs = [Some(1.0), None, Some(2.0), Some(3.0)];
        let ys = [Some(1.0), Some(100.0), Some(2.0), Some(3.0)];
        let r = pearson(&xs, &ys).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_undefined_coefficients() {
        assert_eq!(pearson(&[Some(1.0)], &[Some(2.0)]), None);
        assert_eq!(
            pearson(&[Some(1.0), Some(1.0)], &[Some(2.0), Some(3.0)]),
            None
        );
    }

    #[test]
    fn test_matrix_is_symmetric_with_unit_diagonal() {
        let matrix = CorrelationMatrix::from_table(&table(
            "Lender,a,b,c\nA,1,5,2\nB,2,3,2\nC,3,4,2\nD,4,1,2\n",
        ))
        .unwrap();

        assert_eq!(matrix.columns, vec!["a", "b", "c"]);
        for i in 0..3 {
            assert_eq!(matrix.values[i][i], Some(1.0));
            for j in 0..3 {
                assert_eq!(matrix.values[i][j], matrix.values[j][i]);
            }
        }
        // constant column
        assert_eq!(matrix.get("a", "c"), None);
        let r = matrix.get("a", "b").unwrap();
        assert!((-1.0..=1.0).contains(&r));
    }

    #[test]
    fn test_non_numeric_columns_excluded() {
        let numeric = numeric_columns(&table("id,x,empty\nu1,1,\nu2,2.5,\nu3,NaN,\n"));
        let names: Vec<&str> = numeric.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["x"]);
        assert_eq!(numeric[0].1, vec![Some(1.0), Some(2.5), None]);
    }

    #[test]
    fn test_no_numeric_columns() {
        let err = CorrelationMatrix::from_table(&table("Lender\nA\nB\n")).unwrap_err();
        assert_eq!(err, ViewError::NoNumericColumns);
    }

    #[test]
    fn test_strongest_pairs() {
        let matrix = CorrelationMatrix {
            columns: vec!["a".into(), "b".into(), "c".into()],
            values: vec![
                vec![Some(1.0), Some(0.2), Some(-0.9)],
                vec![Some(0.2), Some(1.0), None],
                vec![Some(-0.9), None, Some(1.0)],
            ],
        };
        let pairs = matrix.strongest_pairs(5);
        assert_eq!(pairs, vec![("a", "c", -0.9), ("a", "b", 0.2)]);
    }
}
