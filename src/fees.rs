//! Attorney fee (honorários) calculation

use log::debug;
use serde::{Deserialize, Serialize};

/// Percentage applied when none (or an unusable one) is given, and for
/// unrecognized categories
pub const DEFAULT_FEE_PERCENTAGE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeCategory {
    /// Agreed in the engagement contract
    Contractual,
    /// Success fee, paid only on a favourable outcome (ad exitum)
    Contingency,
    /// Awarded by the court against the losing party (sucumbência)
    CourtAwarded,
    /// Fixed amount
    Flat,
}

impl FeeCategory {
    /// Resolve a category name, accepting the Portuguese terms
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'ê' | 'é' => 'e',
                'á' | 'ã' | 'â' => 'a',
                'í' => 'i',
                'ó' | 'õ' | 'ô' => 'o',
                'ú' => 'u',
                'ç' => 'c',
                ' ' | '_' => '-',
                other => other,
            })
            .collect();

        match key.as_str() {
            "contractual" | "contratual" | "contratuais" => Some(FeeCategory::Contractual),
            "contingency" | "ad-exitum" | "exito" => Some(FeeCategory::Contingency),
            "court-awarded" | "sucumbencia" | "sucumbenciais" => Some(FeeCategory::CourtAwarded),
            "flat" | "fixo" | "fixed" => Some(FeeCategory::Flat),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeeCategory::Contractual => "contractual",
            FeeCategory::Contingency => "contingency",
            FeeCategory::CourtAwarded => "court_awarded",
            FeeCategory::Flat => "flat",
        }
    }
}

/// Fee computed on a basis value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeResult {
    pub basis_value: f64,
    pub fee_amount: f64,
    /// `None` when the requested category was not recognized
    pub category: Option<FeeCategory>,
    /// Percentage applied; `None` for flat fees
    pub percentage: Option<f64>,
}

/// Percentage to apply: the given one if usable, else the default
fn effective_percentage(percentage: Option<f64>) -> f64 {
    match percentage {
        Some(p) if p.is_finite() && p > 0.0 => p,
        _ => DEFAULT_FEE_PERCENTAGE,
    }
}

/// Fee for a known category
///
/// Percentage categories charge `basis * pct / 100`, with `pct` defaulting to
/// 20 when absent, non-finite or not positive. Flat fees are `flat_amount`
/// (0 when absent).
pub fn calculate_fee(
    basis_value: f64,
    category: FeeCategory,
    percentage: Option<f64>,
    flat_amount: Option<f64>,
) -> FeeResult {
    match category {
        FeeCategory::Flat => FeeResult {
            basis_value,
            fee_amount: flat_amount.filter(|a| a.is_finite()).unwrap_or(0.0),
            category: Some(category),
            percentage: None,
        },
        _ => {
            let pct = effective_percentage(percentage);
            FeeResult {
                basis_value,
                fee_amount: basis_value * (pct / 100.0),
                category: Some(category),
                percentage: Some(pct),
            }
        }
    }
}

/// Fee for a category given by name
///
/// Unrecognized categories charge the default 20% of the basis whatever
/// percentage was passed.
pub fn calculate_fee_by_name(
    basis_value: f64,
    category: &str,
    percentage: Option<f64>,
    flat_amount: Option<f64>,
) -> FeeResult {
    match FeeCategory::from_name(category) {
        Some(category) => calculate_fee(basis_value, category, percentage, flat_amount),
        None => {
            debug!("Unknown fee category '{}', charging {}%", category, DEFAULT_FEE_PERCENTAGE);
            FeeResult {
                basis_value,
                fee_amount: basis_value * (DEFAULT_FEE_PERCENTAGE / 100.0),
                category: None,
                percentage: Some(DEFAULT_FEE_PERCENTAGE),
            }
        }
    }
}
