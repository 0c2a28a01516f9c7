//! Monetary correction: compounding a principal by an index rate
//!
//! The growth factor uses a real exponent, so a fractional month gets a
//! fractional compounding step: `factor = (1 + rate)^months`. Nothing is
//! rounded here; rounding happens only when amounts are formatted.

use serde::Serialize;

use crate::period::CalculationPeriod;
use crate::rates::{IndexRate, Provenance};

/// Outcome of correcting one principal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionResult {
    pub original_value: f64,
    pub corrected_value: f64,
    /// `corrected_value - original_value`
    pub correction_amount: f64,
    /// Multiplicative growth over the period
    pub factor: f64,
    pub provenance: Provenance,
    /// Index used
    pub index: String,
    /// Monthly rate used, as a percentage
    pub monthly_rate: f64,
    pub months: f64,
}

/// `(1 + monthly_fraction)^months`
pub fn growth_factor(monthly_fraction: f64, months: f64) -> f64 {
    (1.0 + monthly_fraction).powf(months)
}

/// Correct `value` over `period` by `rate`
pub fn apply_correction(value: f64, period: &CalculationPeriod, rate: &IndexRate) -> CorrectionResult {
    let factor = growth_factor(rate.monthly_fraction(), period.months);
    let corrected_value = value * factor;

    CorrectionResult {
        original_value: value,
        corrected_value,
        correction_amount: corrected_value - value,
        factor,
        provenance: rate.provenance,
        index: rate.index.clone(),
        monthly_rate: rate.rate,
        months: period.months,
    }
}
