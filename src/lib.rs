//! Petitio Calculator - monetary correction and interest engine for court debts
//!
//! This library provides:
//! - Monthly index rates (IPCA, INPC, IGP-M, TR, SELIC) with live refresh and fallback
//! - Elapsed-period calculation between two dates
//! - Monetary correction by compound monthly growth
//! - Simple and compound late-payment interest
//! - Attorney fee calculation
//! - A complete-calculation front end combining the above

pub mod error;
pub mod rates;
pub mod period;
pub mod correction;
pub mod interest;
pub mod fees;
pub mod calculator;
pub mod config;
pub mod format;

// Re-export commonly used types
pub use error::{CalcError, DateField};
pub use rates::{IndexKind, IndexRate, Provenance, RateIndexProvider, RateTable};
pub use period::CalculationPeriod;
pub use correction::CorrectionResult;
pub use interest::{InterestBasis, InterestResult};
pub use fees::{FeeCategory, FeeResult};
pub use calculator::{CalculationBreakdown, Calculator, CompleteRequest};
pub use config::ProviderConfig;
