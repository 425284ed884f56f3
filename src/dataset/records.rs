//! Typed view over the cleaned table.

use tracing::debug;

use super::table::{parse_number, RawTable};
use crate::error::PipelineResult;
use crate::models::{columns, LoanApplication};

/// Column positions of every required raw field.
struct ColumnMap {
    lender: usize,
    fico_score_group: usize,
    reason: usize,
    employment_status: usize,
    monthly_housing_payment: usize,
    monthly_gross_income: usize,
    fico_score: usize,
    loan_amount: usize,
    bounty: usize,
    approved: usize,
    ever_bankrupt_or_foreclose: usize,
}

impl ColumnMap {
    fn resolve(table: &RawTable) -> PipelineResult<Self> {
        Ok(Self {
            lender: table.require_column(columns::LENDER)?,
            fico_score_group: table.require_column(columns::FICO_SCORE_GROUP)?,
            reason: table.require_column(columns::REASON)?,
            employment_status: table.require_column(columns::EMPLOYMENT_STATUS)?,
            monthly_housing_payment: table.require_column(columns::MONTHLY_HOUSING_PAYMENT)?,
            monthly_gross_income: table.require_column(columns::MONTHLY_GROSS_INCOME)?,
            fico_score: table.require_column(columns::FICO_SCORE)?,
            loan_amount: table.require_column(columns::LOAN_AMOUNT)?,
            bounty: table.require_column(columns::BOUNTY)?,
            approved: table.require_column(columns::APPROVED)?,
            ever_bankrupt_or_foreclose: table
                .require_column(columns::EVER_BANKRUPT_OR_FORECLOSE)?,
        })
    }
}

/// Convert every row of a cleaned table into a [`LoanApplication`].
///
/// Fails with `MissingColumn` before touching any row if a required column
/// is absent.
pub fn load_applications(table: &RawTable) -> PipelineResult<Vec<LoanApplication>> {
    let map = ColumnMap::resolve(table)?;
    let mut unparsed = 0usize;

    let applications = (0..table.len())
        .map(|row| {
            let text = |column: usize| table.cell(row, column).map(String::from);
            let mut number = |column: usize| {
                let cell = table.cell(row, column)?;
                let parsed = parse_number(cell);
                if parsed.is_none() {
                    unparsed += 1;
                }
                parsed
            };

            LoanApplication {
                monthly_housing_payment: number(map.monthly_housing_payment),
                monthly_gross_income: number(map.monthly_gross_income),
                fico_score: number(map.fico_score),
                loan_amount: number(map.loan_amount),
                bounty: number(map.bounty),
                approved: number(map.approved),
                ever_bankrupt_or_foreclose: number(map.ever_bankrupt_or_foreclose),
                lender: text(map.lender),
                fico_score_group: text(map.fico_score_group),
                reason: text(map.reason),
                employment_status: text(map.employment_status),
            }
        })
        .collect();

    if unparsed > 0 {
        debug!("{} numeric cells could not be parsed and count as missing", unparsed);
    }

    Ok(applications)
}
