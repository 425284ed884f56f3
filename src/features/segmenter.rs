//! Fixed-edge binning of continuous ratios into ordered segments.
//!
//! Bins are `[e0,e1) < [e1,e2) < ... < [en,inf)`. Edges come from
//! configuration, never from the data distribution.

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{EnrichedApplication, Segment};

/// An ordered set of left-closed, right-open bins.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentScale {
    name: String,
    edges: Vec<f64>,
    labels: Vec<String>,
}

impl SegmentScale {
    /// Build a scale from its lower edges. Edges must be finite and
    /// strictly increasing; the last bin is open to infinity.
    pub fn new(name: &str, edges: Vec<f64>) -> PipelineResult<Self> {
        let invalid = |reason: &str| PipelineError::InvalidScale {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if edges.is_empty() {
            return Err(invalid("at least one edge is required"));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(invalid("edges must be finite"));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("edges must be strictly increasing"));
        }

        let labels = edges
            .iter()
            .enumerate()
            .map(|(i, lower)| match edges.get(i + 1) {
                Some(upper) => format!("[{},{})", format_edge(*lower), format_edge(*upper)),
                None => format!("[{},inf)", format_edge(*lower)),
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            edges,
            labels,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Segment labels in ascending order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The bin containing `value`, or `None` when it lies below the first
    /// edge or is not finite.
    pub fn assign(&self, value: f64) -> Option<Segment> {
        if !value.is_finite() {
            return None;
        }
        let above = self.edges.partition_point(|edge| *edge <= value);
        if above == 0 {
            return None;
        }
        let ordinal = above - 1;
        Some(Segment {
            ordinal,
            label: self.labels[ordinal].clone(),
        })
    }
}

fn format_edge(edge: f64) -> String {
    if edge.fract() == 0.0 {
        format!("{:.1}", edge)
    } else {
        edge.to_string()
    }
}

/// An enriched application with its segment assignments.
#[derive(Debug, Clone)]
pub struct SegmentedApplication<'a> {
    pub record: &'a EnrichedApplication,
    pub debt_to_income_segment: Option<Segment>,
    pub income_to_loan_segment: Option<Segment>,
}

/// Assigns debt-to-income and income-to-loan segments.
#[derive(Debug, Clone)]
pub struct Segmenter {
    debt_to_income: SegmentScale,
    income_to_loan: SegmentScale,
}

impl Segmenter {
    pub fn new(debt_to_income: SegmentScale, income_to_loan: SegmentScale) -> Self {
        Self {
            debt_to_income,
            income_to_loan,
        }
    }

    pub fn debt_to_income_scale(&self) -> &SegmentScale {
        &self.debt_to_income
    }

    pub fn income_to_loan_scale(&self) -> &SegmentScale {
        &self.income_to_loan
    }

    /// Annotate records with segments. Undefined ratios get no segment.
    pub fn segment<'a>(&self, records: &'a [EnrichedApplication]) -> Vec<SegmentedApplication<'a>> {
        let segmented: Vec<SegmentedApplication<'a>> = records
            .iter()
            .map(|record| SegmentedApplication {
                record,
                debt_to_income_segment: record
                    .debt_to_income
                    .value()
                    .and_then(|v| self.debt_to_income.assign(v)),
                income_to_loan_segment: record
                    .income_to_loan_ratio
                    .value()
                    .and_then(|v| self.income_to_loan.assign(v)),
            })
            .collect();

        let unassigned_dti = segmented
            .iter()
            .filter(|s| s.debt_to_income_segment.is_none())
            .count();
        let unassigned_itl = segmented
            .iter()
            .filter(|s| s.income_to_loan_segment.is_none())
            .count();
        debug!(
            "Segmented {} records ({} without {}, {} without {})",
            segmented.len(),
            unassigned_dti,
            self.debt_to_income.name(),
            unassigned_itl,
            self.income_to_loan.name()
        );

        segmented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{DEFAULT_DEBT_TO_INCOME_EDGES, DEFAULT_INCOME_TO_LOAN_EDGES};

    fn dti() -> SegmentScale {
        SegmentScale::new("Debt_to_Income_Segment", DEFAULT_DEBT_TO_INCOME_EDGES.to_vec()).unwrap()
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            dti().labels(),
            &[
                "[0.0,0.2)",
                "[0.2,0.4)",
                "[0.4,0.6)",
                "[0.6,0.8)",
                "[0.8,1.0)",
                "[1.0,inf)"
            ]
        );
        let itl = SegmentScale::new("Income_to_Loan_Segment", DEFAULT_INCOME_TO_LOAN_EDGES.to_vec())
            .unwrap();
        assert_eq!(itl.labels().len(), 5);
        assert_eq!(itl.labels()[1], "[0.1,0.3)");
    }

    #[test]
    fn test_boundary_belongs_to_upper_bin() {
        let scale = dti();
        assert_eq!(scale.assign(0.2).unwrap().label, "[0.2,0.4)");
        assert_eq!(scale.assign(0.0).unwrap().ordinal, 0);
        assert_eq!(scale.assign(0.199_999).unwrap().ordinal, 0);
        assert_eq!(scale.assign(1.0).unwrap().label, "[1.0,inf)");
        assert_eq!(scale.assign(42.0).unwrap().ordinal, 5);
    }

    #[test]
    fn test_every_non_negative_value_has_exactly_one_bin() {
        let scale = dti();
        let mut value = 0.0;
        while value < 2.0 {
            let segment = scale.assign(value).expect("non-negative value must be binned");
            let lower = DEFAULT_DEBT_TO_INCOME_EDGES[segment.ordinal];
            let upper = DEFAULT_DEBT_TO_INCOME_EDGES
                .get(segment.ordinal + 1)
                .copied()
                .unwrap_or(f64::INFINITY);
            assert!(lower <= value && value < upper, "value {}", value);
            value += 0.01;
        }
    }

    #[test]
    fn test_out_of_range_values() {
        let scale = dti();
        assert!(scale.assign(-0.1).is_none());
        assert!(scale.assign(f64::NAN).is_none());
        assert!(scale.assign(f64::INFINITY).is_none());
    }

    #[test]
    fn test_invalid_edges() {
        assert!(SegmentScale::new("s", vec![]).is_err());
        assert!(SegmentScale::new("s", vec![0.0, 0.5, 0.5]).is_err());
        assert!(SegmentScale::new("s", vec![0.0, f64::NAN]).is_err());
    }
}
