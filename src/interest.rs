//! Late-payment interest over an elapsed period

use log::debug;
use serde::{Deserialize, Serialize};

/// Named interest basis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterestBasis {
    /// 1% per month, simple
    #[default]
    #[serde(rename = "simple-1%")]
    Simple1,
    /// 0.5% per month, simple
    #[serde(rename = "simple-0.5%")]
    SimpleHalf,
    /// 1% per month, compound
    #[serde(rename = "compound-1%")]
    Compound1,
    /// Statutory default (Civil Code art. 406), 1% per month simple
    #[serde(rename = "legal-1%")]
    Legal1,
}

impl InterestBasis {
    pub const ALL: [InterestBasis; 4] = [
        InterestBasis::Simple1,
        InterestBasis::SimpleHalf,
        InterestBasis::Compound1,
        InterestBasis::Legal1,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InterestBasis::Simple1 => "simple-1%",
            InterestBasis::SimpleHalf => "simple-0.5%",
            InterestBasis::Compound1 => "compound-1%",
            InterestBasis::Legal1 => "legal-1%",
        }
    }

    /// Monthly rate as a fraction
    pub fn monthly_rate(&self) -> f64 {
        match self {
            InterestBasis::Simple1 | InterestBasis::Compound1 | InterestBasis::Legal1 => 0.01,
            InterestBasis::SimpleHalf => 0.005,
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, InterestBasis::Compound1)
    }

    /// Resolve a basis name; unknown names fall back to `simple-1%`
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.name().eq_ignore_ascii_case(trimmed))
            .unwrap_or_else(|| {
                debug!("Unknown interest basis '{}', using simple-1%", name);
                InterestBasis::Simple1
            })
    }
}

/// Interest computed on a base value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestResult {
    pub base_value: f64,
    pub interest_amount: f64,
    pub basis: InterestBasis,
    pub compound: bool,
    /// Monthly rate as a fraction
    pub monthly_rate: f64,
    pub months: f64,
}

/// Interest on `base_value` over `months`
///
/// - compound: `base * ((1 + r)^months - 1)`
/// - simple: `base * r * months`
pub fn calculate_interest(base_value: f64, months: f64, basis: InterestBasis) -> InterestResult {
    let rate = basis.monthly_rate();
    let interest_amount = if basis.is_compound() {
        base_value * ((1.0 + rate).powf(months) - 1.0)
    } else {
        base_value * rate * months
    };

    InterestResult {
        base_value,
        interest_amount,
        basis,
        compound: basis.is_compound(),
        monthly_rate: rate,
        months,
    }
}
