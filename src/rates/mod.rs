//! Economic index rates used for monetary correction
//!
//! Rates are monthly percentages (0.40 means 0.40% per month). A
//! [`RateIndexProvider`] serves them from a live [`RateSource`] when one has
//! answered, and from the [`RateTable`] fallback otherwise.

mod provider;
pub mod source;
pub mod loader;

pub use provider::{RateIndexProvider, DEFAULT_FETCH_TIMEOUT, DEFAULT_WAIT_TIMEOUT};
pub use source::{BcbSgsSource, HttpRateSource, LiveRate, RateSource};
pub use loader::load_fallback_table;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Fetched from the live source during this session
    Live,
    /// Taken from the static fallback table
    Estimated,
}

impl Provenance {
    /// Interpret a provenance marker sent by a rate source
    ///
    /// Anything other than an explicit "estimated" marker counts as live.
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker.map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "estimated" || m == "estimado" || m == "estimativa" => {
                Provenance::Estimated
            }
            _ => Provenance::Live,
        }
    }
}

/// Supported Brazilian economic indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// IPCA (IBGE), broad consumer inflation
    Ipca,
    /// INPC (IBGE), consumer inflation for lower-income households
    Inpc,
    /// IGP-M (FGV), general price index
    IgpM,
    /// TR, reference rate
    Tr,
    /// SELIC, base interest rate. Already embeds interest.
    Selic,
}

/// Index used when a requested name is unknown
pub const DEFAULT_INDEX: IndexKind = IndexKind::Ipca;

impl IndexKind {
    pub const ALL: [IndexKind; 5] = [
        IndexKind::Ipca,
        IndexKind::Inpc,
        IndexKind::IgpM,
        IndexKind::Tr,
        IndexKind::Selic,
    ];

    /// Canonical identifier used as the rate table key
    pub fn id(&self) -> &'static str {
        match self {
            IndexKind::Ipca => "ipca",
            IndexKind::Inpc => "inpc",
            IndexKind::IgpM => "igpm",
            IndexKind::Tr => "tr",
            IndexKind::Selic => "selic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            IndexKind::Ipca => "IPCA",
            IndexKind::Inpc => "INPC",
            IndexKind::IgpM => "IGP-M",
            IndexKind::Tr => "TR",
            IndexKind::Selic => "SELIC",
        }
    }

    /// Monthly percentage used when no live rate is available
    pub fn fallback_rate(&self) -> f64 {
        match self {
            IndexKind::Ipca => 0.40,
            IndexKind::Inpc => 0.45,
            IndexKind::IgpM => 0.50,
            IndexKind::Tr => 0.10,
            IndexKind::Selic => 0.85,
        }
    }

    /// Banco Central SGS series code for the monthly rate
    pub fn bcb_series(&self) -> u32 {
        match self {
            IndexKind::Ipca => 433,
            IndexKind::Inpc => 188,
            IndexKind::IgpM => 189,
            IndexKind::Tr => 226,
            IndexKind::Selic => 4390,
        }
    }

    /// SELIC already compounds interest, so no late-payment interest is
    /// added on top of it
    pub fn includes_interest(&self) -> bool {
        matches!(self, IndexKind::Selic)
    }

    /// Resolve a user-supplied name, ignoring case and punctuation
    ///
    /// Accepts the Brazilian codes and the generic aliases
    /// (`inflation-index-A`, `base-interest-rate`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "ipca" | "inflationindexa" => Some(IndexKind::Ipca),
            "inpc" | "inflationindexb" => Some(IndexKind::Inpc),
            "igpm" | "generalpriceindex" => Some(IndexKind::IgpM),
            "tr" | "referencerate" => Some(IndexKind::Tr),
            "selic" | "baseinterestrate" => Some(IndexKind::Selic),
            _ => None,
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// A monthly index rate resolved for one calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRate {
    /// Table key (canonical id for known indices)
    pub index: String,
    pub name: String,
    /// Monthly rate as a percentage
    pub rate: f64,
    pub provenance: Provenance,
}

impl IndexRate {
    /// Monthly rate as a fraction (0.40% → 0.004)
    pub fn monthly_fraction(&self) -> f64 {
        self.rate / 100.0
    }

    /// Whether this index already embeds interest
    pub fn includes_interest(&self) -> bool {
        IndexKind::from_name(&self.index).is_some_and(|k| k.includes_interest())
    }
}

/// Static monthly rates keyed by index id
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: HashMap<String, f64>,
}

impl RateTable {
    /// Empty table
    pub fn empty() -> Self {
        Self { rates: HashMap::new() }
    }

    /// Built-in fallback estimates for every supported index
    pub fn fallback() -> Self {
        let rates = IndexKind::ALL
            .iter()
            .map(|k| (k.id().to_string(), k.fallback_rate()))
            .collect();
        Self { rates }
    }

    /// Table key for a user-supplied index name
    pub fn key_for(name: &str) -> String {
        match IndexKind::from_name(name) {
            Some(kind) => kind.id().to_string(),
            None => normalize(name),
        }
    }

    /// Display name for a table key
    pub fn display_name_for(key: &str) -> String {
        IndexKind::from_name(key)
            .map(|k| k.display_name().to_string())
            .unwrap_or_else(|| key.to_uppercase())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.rates.get(&Self::key_for(name)).copied()
    }

    pub fn insert(&mut self, name: &str, rate: f64) {
        self.rates.insert(Self::key_for(name), rate);
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.rates.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::fallback()
    }
}
