//! Derived financial features.
//!
//! Every formula is a pure function of the raw fields, so deriving twice
//! from the same base columns yields the same values.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::DEFAULT_FICO_SCALE;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    DerivedValue, EmploymentType, EnrichedApplication, FicoCode, LoanApplication,
};

/// Status value that maps to [`EmploymentType::Unemployed`].
const UNEMPLOYED: &str = "Unemployed";

/// Fixed ordinal scale of FICO group labels.
#[derive(Debug, Clone, PartialEq)]
pub struct FicoScale {
    labels: Vec<String>,
}

impl FicoScale {
    /// Build a scale from labels in ascending order. Labels must be unique.
    pub fn new(labels: Vec<String>) -> PipelineResult<Self> {
        if labels.is_empty() {
            return Err(PipelineError::InvalidFicoScale(
                "scale has no labels".to_string(),
            ));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(PipelineError::InvalidFicoScale(format!(
                    "label '{}' appears twice",
                    label
                )));
            }
        }
        Ok(Self { labels })
    }

    /// Ordinal code of a label, `Unknown` when it is not on the scale.
    pub fn encode(&self, label: Option<&str>) -> FicoCode {
        label
            .and_then(|l| self.labels.iter().position(|known| known == l))
            .map(FicoCode::Known)
            .unwrap_or(FicoCode::Unknown)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Default for FicoScale {
    fn default() -> Self {
        Self {
            labels: DEFAULT_FICO_SCALE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Lookup tables and thresholds used by the deriver.
#[derive(Debug, Clone)]
pub struct FeatureTables {
    pub fico_scale: FicoScale,
    pub reason_groups: BTreeMap<String, String>,
    /// `High_FICO` is set when the score is strictly above this value.
    pub high_fico_threshold: f64,
}

/// Counts of records whose features were recovered locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivationStats {
    pub records: usize,
    pub undefined_debt_to_income: usize,
    pub undefined_income_to_loan: usize,
    pub undefined_revenue_potential: usize,
    pub unknown_fico_groups: usize,
    pub unmapped_reasons: usize,
}

/// Computes derived fields from cleaned applications.
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    tables: FeatureTables,
}

impl FeatureDeriver {
    pub fn new(tables: FeatureTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &FeatureTables {
        &self.tables
    }

    /// Derive features for one application.
    pub fn derive(&self, application: LoanApplication) -> EnrichedApplication {
        let debt_to_income = DerivedValue::ratio(
            application.monthly_housing_payment,
            application.monthly_gross_income,
        );

        let high_fico = match application.fico_score {
            Some(score) if score > self.tables.high_fico_threshold => 1,
            _ => 0,
        };

        let fico_group_code = self
            .tables
            .fico_scale
            .encode(application.fico_score_group.as_deref());

        let employment_type = if application.employment_status.as_deref() == Some(UNEMPLOYED) {
            EmploymentType::Unemployed
        } else {
            EmploymentType::Employed
        };

        let loan_purpose_group = application
            .reason
            .as_ref()
            .and_then(|reason| self.tables.reason_groups.get(reason))
            .cloned();

        let financial_hardship = if application.ever_bankrupt_or_foreclose == Some(1.0) {
            1
        } else {
            0
        };

        let income_to_loan_ratio =
            DerivedValue::ratio(application.monthly_gross_income, application.loan_amount);

        let revenue_potential = DerivedValue::product(application.bounty, application.approved);

        EnrichedApplication {
            application,
            debt_to_income,
            high_fico,
            fico_group_code,
            employment_type,
            loan_purpose_group,
            financial_hardship,
            income_to_loan_ratio,
            revenue_potential,
        }
    }

    /// Derive features for every application, one-to-one and in order.
    pub fn derive_all(
        &self,
        applications: Vec<LoanApplication>,
    ) -> (Vec<EnrichedApplication>, DerivationStats) {
        let mut stats = DerivationStats {
            records: applications.len(),
            ..Default::default()
        };

        let enriched: Vec<EnrichedApplication> = applications
            .into_iter()
            .enumerate()
            .map(|(row, application)| {
                let record = self.derive(application);

                if let DerivedValue::Undefined(cause) = record.debt_to_income {
                    stats.undefined_debt_to_income += 1;
                    debug!("row {}: Debt_to_Income undefined ({:?})", row, cause);
                }
                if let DerivedValue::Undefined(cause) = record.income_to_loan_ratio {
                    stats.undefined_income_to_loan += 1;
                    debug!("row {}: Income_to_Loan_Ratio undefined ({:?})", row, cause);
                }
                if !record.revenue_potential.is_defined() {
                    stats.undefined_revenue_potential += 1;
                }
                if record.fico_group_code == FicoCode::Unknown {
                    stats.unknown_fico_groups += 1;
                }
                if record.loan_purpose_group.is_none() {
                    stats.unmapped_reasons += 1;
                }

                record
            })
            .collect();

        if stats.undefined_debt_to_income > 0 || stats.undefined_income_to_loan > 0 {
            warn!(
                "Undefined ratios: {} Debt_to_Income, {} Income_to_Loan_Ratio",
                stats.undefined_debt_to_income, stats.undefined_income_to_loan
            );
        }
        if stats.unknown_fico_groups > 0 {
            warn!(
                "{} records have a FICO group outside the scale",
                stats.unknown_fico_groups
            );
        }
        if stats.unmapped_reasons > 0 {
            warn!(
                "{} records have a loan reason with no purpose group",
                stats.unmapped_reasons
            );
        }

        info!("Derived features for {} records", stats.records);
        (enriched, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{default_feature_tables, DEFAULT_FICO_SCALE};
    use crate::models::UndefinedCause;

    fn deriver() -> FeatureDeriver {
        FeatureDeriver::new(default_feature_tables())
    }

    fn application() -> LoanApplication {
        LoanApplication {
            lender: Some("A".to_string()),
            fico_score_group: Some("Good".to_string()),
            reason: Some("other".to_string()),
            employment_status: Some("full_time".to_string()),
            monthly_housing_payment: Some(1000.0),
            monthly_gross_income: Some(5000.0),
            fico_score: Some(690.0),
            loan_amount: Some(25000.0),
            bounty: Some(500.0),
            approved: Some(1.0),
            ever_bankrupt_or_foreclose: Some(0.0),
        }
    }

    #[test]
    fn test_revenue_potential_follows_approval() {
        let approved = deriver().derive(application());
        assert_eq!(approved.revenue_potential, DerivedValue::Defined(500.0));

        let declined = deriver().derive(LoanApplication {
            approved: Some(0.0),
            ..application()
        });
        assert_eq!(declined.revenue_potential, DerivedValue::Defined(0.0));
    }

    #[test]
    fn test_debt_to_income() {
        let record = deriver().derive(application());
        assert_eq!(record.debt_to_income, DerivedValue::Defined(0.2));
    }

    #[test]
    fn test_high_fico_is_strict() {
        let d = deriver();
        for (score, expected) in [(700.0, 0), (700.5, 1), (701.0, 1), (650.0, 0)] {
            let record = d.derive(LoanApplication {
                fico_score: Some(score),
                ..application()
            });
            assert_eq!(record.high_fico, expected, "score {}", score);
        }

        let missing = d.derive(LoanApplication {
            fico_score: None,
            ..application()
        });
        assert_eq!(missing.high_fico, 0);
    }

    #[test]
    fn test_fico_group_encoding() {
        let d = deriver();
        for (code, label) in DEFAULT_FICO_SCALE.iter().enumerate() {
            let record = d.derive(LoanApplication {
                fico_score_group: Some(label.to_string()),
                ..application()
            });
            assert_eq!(record.fico_group_code, FicoCode::Known(code));
        }

        let unknown = d.derive(LoanApplication {
            fico_score_group: Some("Excellent".to_string()),
            ..application()
        });
        assert_eq!(unknown.fico_group_code, FicoCode::Unknown);
    }

    #[test]
    fn test_employment_type() {
        let d = deriver();
        let unemployed = d.derive(LoanApplication {
            employment_status: Some("Unemployed".to_string()),
            ..application()
        });
        assert_eq!(unemployed.employment_type, EmploymentType::Unemployed);

        let part_time = d.derive(LoanApplication {
            employment_status: Some("part_time".to_string()),
            ..application()
        });
        assert_eq!(part_time.employment_type, EmploymentType::Employed);
    }

    #[test]
    fn test_emergency_reasons_share_group() {
        let d = deriver();
        for reason in ["medical_expense", "cover_an_unexpected_cost"] {
            let record = d.derive(LoanApplication {
                reason: Some(reason.to_string()),
                ..application()
            });
            assert_eq!(record.loan_purpose_group.as_deref(), Some("Emergency"));
        }
    }

    #[test]
    fn test_unmapped_reason_is_missing() {
        let record = deriver().derive(LoanApplication {
            reason: Some("vacation".to_string()),
            ..application()
        });
        assert_eq!(record.loan_purpose_group, None);
    }

    #[test]
    fn test_financial_hardship() {
        let record = deriver().derive(LoanApplication {
            ever_bankrupt_or_foreclose: Some(1.0),
            ..application()
        });
        assert_eq!(record.financial_hardship, 1);
        assert_eq!(deriver().derive(application()).financial_hardship, 0);
    }

    #[test]
    fn test_zero_loan_amount_keeps_record() {
        let (records, stats) = deriver().derive_all(vec![
            LoanApplication {
                loan_amount: Some(0.0),
                ..application()
            },
            application(),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].income_to_loan_ratio,
            DerivedValue::Undefined(UndefinedCause::ZeroDenominator)
        );
        assert_eq!(records[1].income_to_loan_ratio, DerivedValue::Defined(0.2));
        assert_eq!(stats.undefined_income_to_loan, 1);
        assert_eq!(stats.undefined_debt_to_income, 0);
    }

    #[test]
    fn test_injected_tables_are_used() {
        let mut tables = default_feature_tables();
        tables
            .reason_groups
            .insert("vacation".to_string(), "Leisure".to_string());
        tables.high_fico_threshold = 600.0;

        let record = FeatureDeriver::new(tables).derive(LoanApplication {
            reason: Some("vacation".to_string()),
            ..application()
        });
        assert_eq!(record.loan_purpose_group.as_deref(), Some("Leisure"));
        assert_eq!(record.high_fico, 1);
    }

    #[test]
    fn test_fico_scale_rejects_duplicates() {
        let scale = FicoScale::new(vec!["Poor".to_string(), "Poor".to_string()]);
        assert!(scale.is_err());
    }
}
