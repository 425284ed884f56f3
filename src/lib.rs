//! LoanLens library: loan application cleaning, feature derivation,
//! segment aggregation and insight reports.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod features;
pub mod insights;
pub mod models;
pub mod pipeline;
pub mod report;
