//! Rate provider configuration
//!
//! Defaults suit an offline run; environment variables switch on live rates:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `PETITIO_RATES_URL` | JSON endpoint serving current index rates |
//! | `PETITIO_RATES_BCB` | `1`/`true` to query Banco Central SGS directly |
//! | `PETITIO_RATES_TIMEOUT_SECS` | Upper bound on one live fetch |
//! | `PETITIO_RATES_WAIT_SECS` | Bounded wait for an in-flight fetch |
//! | `PETITIO_FALLBACK_CSV` | CSV overriding the built-in fallback rates |

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::error::{RateFetchError, RateTableError};
use crate::rates::{
    load_fallback_table, BcbSgsSource, HttpRateSource, RateIndexProvider, RateSource, RateTable,
    DEFAULT_FETCH_TIMEOUT, DEFAULT_WAIT_TIMEOUT,
};

/// Where live rates come from
#[derive(Debug, Clone, PartialEq)]
pub enum LiveSource {
    None,
    Endpoint(String),
    BancoCentral,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub live_source: LiveSource,
    pub fetch_timeout: Duration,
    pub wait_timeout: Duration,
    pub fallback_csv: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            live_source: LiveSource::None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            fallback_csv: None,
        }
    }
}

/// Errors building a provider from configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    RateTable(#[from] RateTableError),

    #[error("could not set up live rate source: {0}")]
    Source(#[from] RateFetchError),
}

fn parse_secs(name: &str, raw: &str) -> Option<Duration> {
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
        _ => {
            warn!("Ignoring {}='{}': expected a number of seconds", name, raw);
            None
        }
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl ProviderConfig {
    /// Defaults overridden by `PETITIO_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("PETITIO_RATES_URL").filter(|u| !u.trim().is_empty()) {
            config.live_source = LiveSource::Endpoint(url.trim().to_string());
        } else if lookup("PETITIO_RATES_BCB").is_some_and(|v| is_truthy(&v)) {
            config.live_source = LiveSource::BancoCentral;
        }

        if let Some(d) = lookup("PETITIO_RATES_TIMEOUT_SECS").and_then(|v| parse_secs("PETITIO_RATES_TIMEOUT_SECS", &v)) {
            config.fetch_timeout = d;
        }
        if let Some(d) = lookup("PETITIO_RATES_WAIT_SECS").and_then(|v| parse_secs("PETITIO_RATES_WAIT_SECS", &v)) {
            config.wait_timeout = d;
        }
        if let Some(path) = lookup("PETITIO_FALLBACK_CSV").filter(|p| !p.trim().is_empty()) {
            config.fallback_csv = Some(PathBuf::from(path.trim()));
        }

        config
    }

    /// Build the fallback table, reading the override CSV if configured
    pub fn fallback_table(&self) -> Result<RateTable, RateTableError> {
        match &self.fallback_csv {
            Some(path) => load_fallback_table(path),
            None => Ok(RateTable::fallback()),
        }
    }

    /// Build a provider for this configuration (no fetch is started)
    pub fn build_provider(&self) -> Result<RateIndexProvider, ConfigError> {
        let fallback = self.fallback_table()?;

        let source: Arc<dyn RateSource> = match &self.live_source {
            LiveSource::None => {
                info!("No live rate source configured, serving estimated rates");
                return Ok(RateIndexProvider::offline(fallback));
            }
            LiveSource::Endpoint(url) => Arc::new(HttpRateSource::new(url.clone(), self.fetch_timeout)?),
            LiveSource::BancoCentral => Arc::new(BcbSgsSource::new(self.fetch_timeout)?),
        };

        info!("Live index rates from {}", source.name());
        Ok(RateIndexProvider::with_source(fallback, source, self.fetch_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_lookup(lookup(&[]));
        assert_eq!(config.live_source, LiveSource::None);
        assert_eq!(config.wait_timeout, Duration::from_secs(5));
        assert!(config.fallback_csv.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("PETITIO_RATES_URL", "https://rates.example/api/indices"),
            ("PETITIO_RATES_BCB", "true"),
            ("PETITIO_RATES_WAIT_SECS", "0.5"),
            ("PETITIO_RATES_TIMEOUT_SECS", "soon"),
        ]));

        // Endpoint wins over BCB
        assert_eq!(
            config.live_source,
            LiveSource::Endpoint("https://rates.example/api/indices".to_string())
        );
        assert_eq!(config.wait_timeout, Duration::from_millis(500));
        assert_eq!(config.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
    }

    #[test]
    fn test_bcb_flag() {
        let config = ProviderConfig::from_lookup(lookup(&[("PETITIO_RATES_BCB", "1")]));
        assert_eq!(config.live_source, LiveSource::BancoCentral);
    }

    #[test]
    fn test_offline_provider() {
        let provider = ProviderConfig::default().build_provider().unwrap();
        assert!(provider.is_ready());
        assert_eq!(provider.get_rate("selic").rate, 0.85);
    }

    #[test]
    fn test_missing_fallback_csv_is_an_error() {
        let config = ProviderConfig {
            fallback_csv: Some(PathBuf::from("/nonexistent/rates.csv")),
            ..Default::default()
        };
        assert!(matches!(config.build_provider(), Err(ConfigError::RateTable(_))));
    }
}
