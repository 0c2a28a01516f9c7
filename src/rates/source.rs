//! Live rate sources
//!
//! - [`HttpRateSource`]: the platform's own JSON endpoint
//! - [`BcbSgsSource`]: Banco Central do Brasil time series (SGS) API

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;

use super::{IndexKind, Provenance};
use crate::error::RateFetchError;

/// One rate as reported by a live source
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRate {
    /// Index name as the source spells it
    pub index: String,
    /// Monthly rate as a percentage
    pub rate: f64,
    pub provenance: Provenance,
}

/// Anything that can produce the current monthly index rates
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<LiveRate>, RateFetchError>;

    /// Short label for logs
    fn name(&self) -> &str {
        "rate source"
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, RateFetchError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, RateFetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RateFetchError::Status(status.as_u16()));
    }
    Ok(response.text().await?)
}

// ============================================================================
// Platform JSON endpoint
// ============================================================================

/// Entry of the platform endpoint payload
///
/// Either a bare percentage or an object with a provenance marker. Portuguese
/// field names from older deployments are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EndpointEntry {
    Plain(f64),
    Detailed {
        #[serde(alias = "valor")]
        rate: f64,
        #[serde(default, alias = "fonte")]
        source: Option<String>,
    },
}

/// Parse `{ "<index>": <pct> | { "rate": <pct>, "source": "..." } }`
pub fn parse_endpoint_payload(body: &str) -> Result<Vec<LiveRate>, RateFetchError> {
    let entries: HashMap<String, EndpointEntry> =
        serde_json::from_str(body).map_err(|e| RateFetchError::Malformed(e.to_string()))?;

    let mut rates: Vec<LiveRate> = entries
        .into_iter()
        .map(|(index, entry)| match entry {
            EndpointEntry::Plain(rate) => LiveRate {
                index,
                rate,
                provenance: Provenance::Live,
            },
            EndpointEntry::Detailed { rate, source } => LiveRate {
                index,
                rate,
                provenance: Provenance::from_marker(source.as_deref()),
            },
        })
        .collect();

    if rates.is_empty() {
        return Err(RateFetchError::Malformed("payload contains no rates".to_string()));
    }

    rates.sort_by(|a, b| a.index.cmp(&b.index));
    Ok(rates)
}

/// Fetches rates from a JSON endpoint
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: reqwest::Client,
    url: String,
}

impl HttpRateSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RateFetchError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self) -> Result<Vec<LiveRate>, RateFetchError> {
        info!("Fetching index rates from {}", self.url);
        let body = get_text(&self.client, &self.url).await?;
        parse_endpoint_payload(&body)
    }

    fn name(&self) -> &str {
        &self.url
    }
}

// ============================================================================
// Banco Central do Brasil SGS
// ============================================================================

/// Public SGS API root
pub const BCB_SGS_BASE_URL: &str = "https://api.bcb.gov.br/dados/serie";

#[derive(Debug, Deserialize)]
struct SgsObservation {
    valor: String,
}

/// Parse the last observation of an SGS series (`[{"data": "...", "valor": "0.44"}]`)
pub fn parse_sgs_payload(body: &str) -> Result<f64, RateFetchError> {
    let observations: Vec<SgsObservation> =
        serde_json::from_str(body).map_err(|e| RateFetchError::Malformed(e.to_string()))?;

    let last = observations
        .last()
        .ok_or_else(|| RateFetchError::Malformed("series has no observations".to_string()))?;

    last.valor
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| RateFetchError::Malformed(format!("'{}' is not a rate", last.valor)))
}

/// Fetches the latest monthly value of each index from the SGS API
#[derive(Debug, Clone)]
pub struct BcbSgsSource {
    client: reqwest::Client,
    base_url: String,
    indices: Vec<IndexKind>,
}

impl BcbSgsSource {
    pub fn new(timeout: Duration) -> Result<Self, RateFetchError> {
        Self::with_base_url(BCB_SGS_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RateFetchError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            indices: IndexKind::ALL.to_vec(),
        })
    }

    fn series_url(&self, kind: IndexKind) -> String {
        format!(
            "{}/bcdata.sgs.{}/dados/ultimos/1?formato=json",
            self.base_url.trim_end_matches('/'),
            kind.bcb_series()
        )
    }
}

#[async_trait]
impl RateSource for BcbSgsSource {
    /// Series that fail are skipped; the fetch only fails when none answer
    async fn fetch(&self) -> Result<Vec<LiveRate>, RateFetchError> {
        let mut rates = Vec::with_capacity(self.indices.len());
        let mut last_error = None;

        for kind in &self.indices {
            let url = self.series_url(*kind);
            debug!("Fetching {} from {}", kind.display_name(), url);

            let result = match get_text(&self.client, &url).await {
                Ok(body) => parse_sgs_payload(&body),
                Err(e) => Err(e),
            };

            match result {
                Ok(rate) => rates.push(LiveRate {
                    index: kind.id().to_string(),
                    rate,
                    provenance: Provenance::Live,
                }),
                Err(e) => {
                    warn!("SGS series {} ({}) unavailable: {}", kind.bcb_series(), kind.display_name(), e);
                    last_error = Some(e);
                }
            }
        }

        match (rates.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            (true, None) => Err(RateFetchError::Malformed("no series configured".to_string())),
            _ => Ok(rates),
        }
    }

    fn name(&self) -> &str {
        "BCB SGS"
    }
}
