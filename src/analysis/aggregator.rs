//! Grouped mean aggregation over segmented applications.
//!
//! A view groups records by one or two categorical keys, optionally filters
//! them, and reduces a value column to its arithmetic mean. Records with a
//! missing key or an undefined value do not contribute; a group with no
//! contributing record is absent from the view.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::ViewError;
use crate::features::SegmentedApplication;
use crate::models::{columns, EnrichedApplication};

/// A categorical column usable as a grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupKey {
    Lender,
    FicoScoreGroup,
    DebtToIncomeSegment,
    IncomeToLoanSegment,
}

impl GroupKey {
    pub fn column(&self) -> &'static str {
        match self {
            GroupKey::Lender => columns::LENDER,
            GroupKey::FicoScoreGroup => columns::FICO_SCORE_GROUP,
            GroupKey::DebtToIncomeSegment => columns::DEBT_TO_INCOME_SEGMENT,
            GroupKey::IncomeToLoanSegment => columns::INCOME_TO_LOAN_SEGMENT,
        }
    }

    /// The key for one record. Lenders sort by name, FICO groups by scale
    /// position (unknown labels last), segments by scale position.
    fn key_part(&self, segmented: &SegmentedApplication<'_>) -> Option<KeyPart> {
        let application = &segmented.record.application;
        match self {
            GroupKey::Lender => application.lender.as_ref().map(|lender| KeyPart {
                rank: 0,
                label: lender.clone(),
            }),
            GroupKey::FicoScoreGroup => application.fico_score_group.as_ref().map(|group| KeyPart {
                rank: segmented.record.fico_group_code.code().unwrap_or(usize::MAX),
                label: group.clone(),
            }),
            GroupKey::DebtToIncomeSegment => {
                segmented.debt_to_income_segment.as_ref().map(|s| KeyPart {
                    rank: s.ordinal,
                    label: s.label.clone(),
                })
            }
            GroupKey::IncomeToLoanSegment => {
                segmented.income_to_loan_segment.as_ref().map(|s| KeyPart {
                    rank: s.ordinal,
                    label: s.label.clone(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct KeyPart {
    rank: usize,
    label: String,
}

/// The numeric column being averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueColumn {
    Approved,
    RevenuePotential,
}

impl ValueColumn {
    pub fn column(&self) -> &'static str {
        match self {
            ValueColumn::Approved => columns::APPROVED,
            ValueColumn::RevenuePotential => columns::REVENUE_POTENTIAL,
        }
    }

    fn value(&self, record: &EnrichedApplication) -> Option<f64> {
        match self {
            ValueColumn::Approved => record.application.approved,
            ValueColumn::RevenuePotential => record.revenue_potential.value(),
        }
    }
}

/// Record filters applied before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordFilter {
    /// `Approved == 1`
    Approved,
    /// `High_FICO == 1`
    HighFico,
}

impl RecordFilter {
    fn matches(&self, record: &EnrichedApplication) -> bool {
        match self {
            RecordFilter::Approved => record.application.is_approved(),
            RecordFilter::HighFico => record.high_fico == 1,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RecordFilter::Approved => "Approved == 1",
            RecordFilter::HighFico => "High_FICO == 1",
        }
    }
}

/// Definition of one mean-based view.
#[derive(Debug, Clone)]
pub struct ViewSpec {
    pub name: &'static str,
    pub title: &'static str,
    pub group_by: Vec<GroupKey>,
    pub value: ValueColumn,
    pub filter: Option<RecordFilter>,
}

/// The six grouped-mean views produced on every run.
pub fn standard_views() -> Vec<ViewSpec> {
    vec![
        ViewSpec {
            name: "approval_rates_per_lender",
            title: "Approval Rates by Lender",
            group_by: vec![GroupKey::Lender],
            value: ValueColumn::Approved,
            filter: None,
        },
        ViewSpec {
            name: "approval_rates_by_fico",
            title: "Approval Rates by FICO Score Group",
            group_by: vec![GroupKey::Lender, GroupKey::FicoScoreGroup],
            value: ValueColumn::Approved,
            filter: None,
        },
        ViewSpec {
            name: "revenue_per_approved_app",
            title: "Average Revenue per Approved Application",
            group_by: vec![GroupKey::Lender],
            value: ValueColumn::RevenuePotential,
            filter: Some(RecordFilter::Approved),
        },
        ViewSpec {
            name: "high_value_segments",
            title: "High FICO Score Segment - Average Revenue",
            group_by: vec![GroupKey::Lender],
            value: ValueColumn::RevenuePotential,
            filter: Some(RecordFilter::HighFico),
        },
        ViewSpec {
            name: "approval_rates_by_dti",
            title: "Approval Rates by Debt-to-Income Ratio",
            group_by: vec![GroupKey::DebtToIncomeSegment, GroupKey::Lender],
            value: ValueColumn::Approved,
            filter: None,
        },
        ViewSpec {
            name: "revenue_by_income_to_loan_fico",
            title: "Revenue by Income-to-Loan Ratio (High FICO)",
            group_by: vec![GroupKey::IncomeToLoanSegment, GroupKey::Lender],
            value: ValueColumn::RevenuePotential,
            filter: Some(RecordFilter::HighFico),
        },
    ]
}

/// One group of a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewRow {
    pub key: Vec<String>,
    pub mean: f64,
    pub count: usize,
}

/// Chart-ready grid for a two-key view: first key down, second key across.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub row_key: String,
    pub column_key: String,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub cells: Vec<Vec<Option<f64>>>,
}

/// A named, read-only aggregation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateView {
    pub name: String,
    pub title: String,
    pub key_columns: Vec<String>,
    pub value_column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub rows: Vec<ViewRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot: Option<PivotTable>,
}

impl AggregateView {
    /// Mean for an exact key, if the group exists.
    pub fn get(&self, key: &[&str]) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.key.iter().map(String::as_str).eq(key.iter().copied()))
            .map(|row| row.mean)
    }

    /// Keys in view order.
    pub fn keys(&self) -> Vec<Vec<String>> {
        self.rows.iter().map(|row| row.key.clone()).collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

/// Compute one view.
pub fn aggregate(
    records: &[SegmentedApplication<'_>],
    spec: &ViewSpec,
) -> Result<AggregateView, ViewError> {
    let mut groups: BTreeMap<Vec<KeyPart>, MeanAccumulator> = BTreeMap::new();

    for segmented in records {
        if let Some(filter) = spec.filter {
            if !filter.matches(segmented.record) {
                continue;
            }
        }

        let Some(value) = spec.value.value(segmented.record) else {
            continue;
        };

        let key: Option<Vec<KeyPart>> = spec
            .group_by
            .iter()
            .map(|group_key| group_key.key_part(segmented))
            .collect();
        let Some(key) = key else {
            continue;
        };

        let accumulator = groups.entry(key).or_default();
        accumulator.sum += value;
        accumulator.count += 1;
    }

    if groups.is_empty() {
        return Err(ViewError::NoEligibleRecords {
            view: spec.name.to_string(),
        });
    }

    let pivot = (spec.group_by.len() == 2).then(|| build_pivot(spec, &groups));

    let rows: Vec<ViewRow> = groups
        .into_iter()
        .map(|(key, acc)| ViewRow {
            key: key.into_iter().map(|part| part.label).collect(),
            mean: acc.sum / acc.count as f64,
            count: acc.count,
        })
        .collect();

    debug!("View {}: {} groups", spec.name, rows.len());

    Ok(AggregateView {
        name: spec.name.to_string(),
        title: spec.title.to_string(),
        key_columns: spec.group_by.iter().map(|k| k.column().to_string()).collect(),
        value_column: spec.value.column().to_string(),
        filter: spec.filter.map(|f| f.describe().to_string()),
        rows,
        pivot,
    })
}

fn build_pivot(spec: &ViewSpec, groups: &BTreeMap<Vec<KeyPart>, MeanAccumulator>) -> PivotTable {
    let row_parts: BTreeSet<&KeyPart> = groups.keys().map(|k| &k[0]).collect();
    let column_parts: BTreeSet<&KeyPart> = groups.keys().map(|k| &k[1]).collect();

    let cells = row_parts
        .iter()
        .map(|row| {
            column_parts
                .iter()
                .map(|column| {
                    groups
                        .get(&vec![(*row).clone(), (*column).clone()])
                        .map(|acc| acc.sum / acc.count as f64)
                })
                .collect()
        })
        .collect();

    PivotTable {
        row_key: spec.group_by[0].column().to_string(),
        column_key: spec.group_by[1].column().to_string(),
        row_labels: row_parts.iter().map(|p| p.label.clone()).collect(),
        column_labels: column_parts.iter().map(|p| p.label.clone()).collect(),
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{
        default_feature_tables, FeatureDeriver, SegmentScale, Segmenter,
        DEFAULT_DEBT_TO_INCOME_EDGES, DEFAULT_INCOME_TO_LOAN_EDGES,
    };
    use crate::models::LoanApplication;

    fn application(lender: &str, approved: f64) -> LoanApplication {
        LoanApplication {
            lender: Some(lender.to_string()),
            fico_score_group: Some("Good".to_string()),
            reason: Some("other".to_string()),
            employment_status: Some("full_time".to_string()),
            monthly_housing_payment: Some(1000.0),
            monthly_gross_income: Some(5000.0),
            fico_score: Some(720.0),
            loan_amount: Some(20000.0),
            bounty: Some(500.0),
            approved: Some(approved),
            ever_bankrupt_or_foreclose: Some(0.0),
        }
    }

    fn enrich(applications: Vec<LoanApplication>) -> Vec<EnrichedApplication> {
        FeatureDeriver::new(default_feature_tables())
            .derive_all(applications)
            .0
    }

    fn segmenter() -> Segmenter {
        Segmenter::new(
            SegmentScale::new("dti", DEFAULT_DEBT_TO_INCOME_EDGES.to_vec()).unwrap(),
            SegmentScale::new("itl", DEFAULT_INCOME_TO_LOAN_EDGES.to_vec()).unwrap(),
        )
    }

    fn spec(name: &str) -> ViewSpec {
        standard_views()
            .into_iter()
            .find(|v| v.name == name)
            .unwrap()
    }

    #[test]
    fn test_approval_rate_by_lender() {
        let records = enrich(vec![
            application("A", 1.0),
            application("A", 0.0),
            application("B", 1.0),
        ]);
        let segmented = segmenter().segment(&records);

        let view = aggregate(&segmented, &spec("approval_rates_per_lender")).unwrap();

        assert_eq!(view.get(&["A"]), Some(0.5));
        assert_eq!(view.get(&["B"]), Some(1.0));
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.rows[0].count, 2);
        assert!(view.pivot.is_none());
    }

    #[test]
    fn test_filter_and_empty_partition() {
        let records = enrich(vec![application("A", 1.0), application("B", 0.0)]);
        let segmented = segmenter().segment(&records);

        let view = aggregate(&segmented, &spec("revenue_per_approved_app")).unwrap();

        assert_eq!(view.get(&["A"]), Some(500.0));
        assert_eq!(view.get(&["B"]), None);
        assert_eq!(view.filter.as_deref(), Some("Approved == 1"));
    }

    #[test]
    fn test_no_eligible_records() {
        let low_fico = LoanApplication {
            fico_score: Some(600.0),
            ..application("A", 1.0)
        };
        let records = enrich(vec![low_fico]);
        let segmented = segmenter().segment(&records);

        let err = aggregate(&segmented, &spec("high_value_segments")).unwrap_err();
        assert_eq!(
            err,
            ViewError::NoEligibleRecords {
                view: "high_value_segments".to_string()
            }
        );
    }

    #[test]
    fn test_fico_groups_follow_scale_order() {
        let records = enrich(
            ["Very Good", "Poor", "Excellent", "Good", "Exceptional", "Fair"]
                .into_iter()
                .map(|group| LoanApplication {
                    fico_score_group: Some(group.to_string()),
                    ..application("A", 1.0)
                })
                .collect(),
        );
        let segmented = segmenter().segment(&records);

        let view = aggregate(&segmented, &spec("approval_rates_by_fico")).unwrap();
        let groups: Vec<String> = view.rows.iter().map(|r| r.key[1].clone()).collect();

        assert_eq!(
            groups,
            vec!["Poor", "Fair", "Good", "Very Good", "Exceptional", "Excellent"]
        );
    }

    #[test]
    fn test_segments_sort_by_scale_and_pivot() {
        let records = enrich(vec![
            // 0.9 debt-to-income
            LoanApplication {
                monthly_housing_payment: Some(4500.0),
                ..application("B", 0.0)
            },
            // 0.2 debt-to-income
            application("A", 1.0),
            // 0.1 debt-to-income
            LoanApplication {
                monthly_housing_payment: Some(500.0),
                ..application("B", 1.0)
            },
        ]);
        let segmented = segmenter().segment(&records);

        let view = aggregate(&segmented, &spec("approval_rates_by_dti")).unwrap();

        assert_eq!(
            view.keys(),
            vec![
                vec!["[0.0,0.2)".to_string(), "B".to_string()],
                vec!["[0.2,0.4)".to_string(), "A".to_string()],
                vec!["[0.8,1.0)".to_string(), "B".to_string()],
            ]
        );

        let pivot = view.pivot.unwrap();
        assert_eq!(pivot.row_labels, vec!["[0.0,0.2)", "[0.2,0.4)", "[0.8,1.0)"]);
        assert_eq!(pivot.column_labels, vec!["A", "B"]);
        assert_eq!(pivot.cells[0], vec![None, Some(1.0)]);
        assert_eq!(pivot.cells[1], vec![Some(1.0), None]);
        assert_eq!(pivot.cells[2], vec![None, Some(0.0)]);
    }

    #[test]
    fn test_zero_loan_amount_excluded_from_income_to_loan_view() {
        let records = enrich(vec![
            LoanApplication {
                loan_amount: Some(0.0),
                bounty: Some(9999.0),
                ..application("A", 1.0)
            },
            application("A", 1.0),
        ]);
        let segmented = segmenter().segment(&records);

        let view = aggregate(&segmented, &spec("revenue_by_income_to_loan_fico")).unwrap();

        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].count, 1);
        assert_eq!(view.rows[0].mean, 500.0);
    }

    #[test]
    fn test_undefined_values_are_skipped_not_zeroed() {
        let records = enrich(vec![
            LoanApplication {
                bounty: None,
                ..application("A", 1.0)
            },
            application("A", 1.0),
        ]);
        let segmented = segmenter().segment(&records);

        let view = aggregate(&segmented, &spec("revenue_per_approved_app")).unwrap();
        assert_eq!(view.get(&["A"]), Some(500.0));
        assert_eq!(view.rows[0].count, 1);
    }
}
