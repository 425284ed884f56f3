//! Data models for loan applications, derived features and reports.
//!
//! This module contains the core data structures shared by the pipeline
//! stages and the report assembler.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::analysis::{AggregateView, CorrelationMatrix};
use crate::dataset::CleaningStats;
use crate::features::DerivationStats;
use crate::insights::Insights;
use crate::pipeline::OmittedView;

/// Column names read from the raw dataset.
pub mod columns {
    pub const LENDER: &str = "Lender";
    pub const FICO_SCORE_GROUP: &str = "Fico_Score_group";
    pub const REASON: &str = "Reason";
    pub const EMPLOYMENT_STATUS: &str = "Employment_Status";
    pub const MONTHLY_HOUSING_PAYMENT: &str = "Monthly_Housing_Payment";
    pub const MONTHLY_GROSS_INCOME: &str = "Monthly_Gross_Income";
    pub const FICO_SCORE: &str = "FICO_score";
    pub const LOAN_AMOUNT: &str = "Loan_Amount";
    pub const BOUNTY: &str = "bounty";
    pub const APPROVED: &str = "Approved";
    pub const EVER_BANKRUPT_OR_FORECLOSE: &str = "Ever_Bankrupt_or_Foreclose";

    /// Every raw column the pipeline touches.
    pub const REQUIRED: [&str; 11] = [
        LENDER,
        FICO_SCORE_GROUP,
        REASON,
        EMPLOYMENT_STATUS,
        MONTHLY_HOUSING_PAYMENT,
        MONTHLY_GROSS_INCOME,
        FICO_SCORE,
        LOAN_AMOUNT,
        BOUNTY,
        APPROVED,
        EVER_BANKRUPT_OR_FORECLOSE,
    ];

    pub const DEBT_TO_INCOME: &str = "Debt_to_Income";
    pub const HIGH_FICO: &str = "High_FICO";
    pub const FICO_SCORE_GROUP_ENCODED: &str = "FICO_Score_Group_Encoded";
    pub const EMPLOYMENT_TYPE: &str = "Employment_Type";
    pub const LOAN_PURPOSE_GROUP: &str = "Loan_Purpose_Group";
    pub const FINANCIAL_HARDSHIP: &str = "Financial_Hardship";
    pub const INCOME_TO_LOAN_RATIO: &str = "Income_to_Loan_Ratio";
    pub const REVENUE_POTENTIAL: &str = "Revenue_Potential";

    pub const DEBT_TO_INCOME_SEGMENT: &str = "Debt_to_Income_Segment";
    pub const INCOME_TO_LOAN_SEGMENT: &str = "Income_to_Loan_Segment";
}

/// One cleaned loan application, typed.
///
/// Every field is optional: forward fill cannot repair a column whose
/// first rows are missing, and unparseable numbers count as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanApplication {
    pub lender: Option<String>,
    pub fico_score_group: Option<String>,
    pub reason: Option<String>,
    pub employment_status: Option<String>,
    pub monthly_housing_payment: Option<f64>,
    pub monthly_gross_income: Option<f64>,
    pub fico_score: Option<f64>,
    pub loan_amount: Option<f64>,
    pub bounty: Option<f64>,
    pub approved: Option<f64>,
    pub ever_bankrupt_or_foreclose: Option<f64>,
}

impl LoanApplication {
    /// True when the application is marked approved.
    pub fn is_approved(&self) -> bool {
        self.approved == Some(1.0)
    }
}

/// Why a derived value could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedCause {
    /// An operand was missing.
    MissingOperand,
    /// The denominator was zero.
    ZeroDenominator,
    /// The arithmetic produced NaN or infinity.
    NonFinite,
}

/// A derived numeric value that may be explicitly undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DerivedValue {
    Defined(f64),
    Undefined(UndefinedCause),
}

impl DerivedValue {
    /// Guarded division.
    pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Self {
        match (numerator, denominator) {
            (Some(_), Some(d)) if d == 0.0 => Self::Undefined(UndefinedCause::ZeroDenominator),
            (Some(n), Some(d)) => Self::finite(n / d),
            _ => Self::Undefined(UndefinedCause::MissingOperand),
        }
    }

    /// Guarded multiplication.
    pub fn product(a: Option<f64>, b: Option<f64>) -> Self {
        match (a, b) {
            (Some(a), Some(b)) => Self::finite(a * b),
            _ => Self::Undefined(UndefinedCause::MissingOperand),
        }
    }

    fn finite(value: f64) -> Self {
        if value.is_finite() {
            Self::Defined(value)
        } else {
            Self::Undefined(UndefinedCause::NonFinite)
        }
    }

    /// The value, if defined.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }
}

impl fmt::Display for DerivedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined(v) => write!(f, "{}", v),
            Self::Undefined(_) => Ok(()),
        }
    }
}

impl Serialize for DerivedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

/// Ordinal code of a FICO group label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FicoCode {
    Known(usize),
    Unknown,
}

impl FicoCode {
    pub fn code(&self) -> Option<usize> {
        match self {
            Self::Known(code) => Some(*code),
            Self::Unknown => None,
        }
    }
}

/// Employment bucket derived from the raw status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EmploymentType {
    Employed,
    Unemployed,
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmploymentType::Employed => write!(f, "Employed"),
            EmploymentType::Unemployed => write!(f, "Unemployed"),
        }
    }
}

/// A loan application with its derived features.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedApplication {
    pub application: LoanApplication,
    pub debt_to_income: DerivedValue,
    pub high_fico: u8,
    pub fico_group_code: FicoCode,
    pub employment_type: EmploymentType,
    pub loan_purpose_group: Option<String>,
    pub financial_hardship: u8,
    pub income_to_loan_ratio: DerivedValue,
    pub revenue_potential: DerivedValue,
}

/// An ordered band of a segment scale.
///
/// Ordering follows the scale position, never the label text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Segment {
    pub ordinal: usize,
    pub label: String,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Metadata about one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Input dataset path.
    pub input: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Text-generation model, when insights were requested.
    pub model_used: Option<String>,
    /// Records in the raw input.
    pub records_read: usize,
    /// Records after cleaning.
    pub records_analyzed: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The assembled loan insights report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub cleaning: CleaningStats,
    pub derivation: DerivationStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationMatrix>,
    pub views: Vec<AggregateView>,
    pub omitted_views: Vec<OmittedView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<Insights>,
}
