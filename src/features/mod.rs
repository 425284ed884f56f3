//! Feature derivation and segmentation.
//!
//! Holds the fixed lookup tables and the projection of enriched records
//! back into a table for export.

pub mod deriver;
pub mod segmenter;

pub use deriver::{DerivationStats, FeatureDeriver, FeatureTables, FicoScale};
pub use segmenter::{SegmentScale, SegmentedApplication, Segmenter};

use std::collections::BTreeMap;

use crate::dataset::RawTable;
use crate::models::{columns, EnrichedApplication};

/// FICO group labels, lowest first.
pub const DEFAULT_FICO_SCALE: [&str; 5] = ["Poor", "Fair", "Good", "Very Good", "Exceptional"];

/// Loan reason to purpose group.
pub const DEFAULT_REASON_GROUPS: [(&str, &str); 7] = [
    ("cover_an_unexpected_cost", "Emergency"),
    ("credit_card_refinancing", "Refinancing"),
    ("home_improvement", "Improvement"),
    ("major_purchase", "Purchase"),
    ("medical_expense", "Emergency"),
    ("small_business", "Business"),
    ("other", "Other"),
];

pub const DEFAULT_HIGH_FICO_THRESHOLD: f64 = 700.0;

pub const DEFAULT_DEBT_TO_INCOME_EDGES: [f64; 6] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];

pub const DEFAULT_INCOME_TO_LOAN_EDGES: [f64; 5] = [0.0, 0.1, 0.3, 0.5, 1.0];

/// Names of the derived columns, in derivation order.
pub const DERIVED_COLUMNS: [&str; 8] = [
    columns::DEBT_TO_INCOME,
    columns::HIGH_FICO,
    columns::FICO_SCORE_GROUP_ENCODED,
    columns::EMPLOYMENT_TYPE,
    columns::LOAN_PURPOSE_GROUP,
    columns::FINANCIAL_HARDSHIP,
    columns::INCOME_TO_LOAN_RATIO,
    columns::REVENUE_POTENTIAL,
];

pub fn default_reason_groups() -> BTreeMap<String, String> {
    DEFAULT_REASON_GROUPS
        .iter()
        .map(|(reason, group)| (reason.to_string(), group.to_string()))
        .collect()
}

/// Tables built from the fixed constants.
pub fn default_feature_tables() -> FeatureTables {
    FeatureTables {
        fico_scale: FicoScale::default(),
        reason_groups: default_reason_groups(),
        high_fico_threshold: DEFAULT_HIGH_FICO_THRESHOLD,
    }
}

/// Append (or overwrite) the derived columns on the cleaned table.
///
/// `enriched` must be one-to-one with the rows of `cleaned`. Undefined
/// values and unknown codes become empty cells.
pub fn enriched_table(cleaned: &RawTable, enriched: &[EnrichedApplication]) -> RawTable {
    let mut table = cleaned.clone();

    let text = |f: &dyn Fn(&EnrichedApplication) -> Option<String>| -> Vec<Option<String>> {
        enriched.iter().map(f).collect()
    };

    let derived: [(&str, Vec<Option<String>>); 8] = [
        (
            columns::DEBT_TO_INCOME,
            text(&|r| r.debt_to_income.value().map(|v| v.to_string())),
        ),
        (columns::HIGH_FICO, text(&|r| Some(r.high_fico.to_string()))),
        (
            columns::FICO_SCORE_GROUP_ENCODED,
            text(&|r| r.fico_group_code.code().map(|c| c.to_string())),
        ),
        (
            columns::EMPLOYMENT_TYPE,
            text(&|r| Some(r.employment_type.to_string())),
        ),
        (
            columns::LOAN_PURPOSE_GROUP,
            text(&|r| r.loan_purpose_group.clone()),
        ),
        (
            columns::FINANCIAL_HARDSHIP,
            text(&|r| Some(r.financial_hardship.to_string())),
        ),
        (
            columns::INCOME_TO_LOAN_RATIO,
            text(&|r| r.income_to_loan_ratio.value().map(|v| v.to_string())),
        ),
        (
            columns::REVENUE_POTENTIAL,
            text(&|r| r.revenue_potential.value().map(|v| v.to_string())),
        ),
    ];

    for (name, values) in derived {
        table.upsert_column(name, values);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{clean_records, load_applications};

    const SAMPLE: &str = include_str!("../../fixtures/loan_applications.csv");

    fn derive_from(table: &RawTable) -> (RawTable, Vec<EnrichedApplication>) {
        let (cleaned, _) = clean_records(table.clone());
        let applications = load_applications(&cleaned).unwrap();
        let deriver = FeatureDeriver::new(default_feature_tables());
        let (enriched, _) = deriver.derive_all(applications);
        (enriched_table(&cleaned, &enriched), enriched)
    }

    #[test]
    fn test_derived_columns_appended_in_order() {
        let raw = RawTable::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        let (table, enriched) = derive_from(&raw);

        assert_eq!(table.len(), enriched.len());
        let tail: Vec<&str> = table.columns()[table.columns().len() - 8..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(tail, DERIVED_COLUMNS);
    }

    #[test]
    fn test_rederiving_enriched_output_is_idempotent() {
        let raw = RawTable::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        let (first_table, first) = derive_from(&raw);

        let reread = RawTable::from_csv_reader(first_table.to_csv_string().unwrap().as_bytes())
            .unwrap();
        let (second_table, second) = derive_from(&reread);

        assert_eq!(first, second);
        assert_eq!(first_table.columns(), second_table.columns());
    }

    #[test]
    fn test_undefined_values_export_as_empty_cells() {
        let raw = RawTable::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        let (table, enriched) = derive_from(&raw);
        let column = table.column_index(columns::INCOME_TO_LOAN_RATIO).unwrap();

        for (row, record) in enriched.iter().enumerate() {
            assert_eq!(
                table.cell(row, column).is_some(),
                record.income_to_loan_ratio.is_defined()
            );
        }
    }
}
