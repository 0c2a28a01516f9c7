//! Complete calculation: correction, optional interest, totals
//!
//! A [`Calculator`] holds only the shared rate provider; every call is a
//! single pure pass producing a fresh [`CalculationBreakdown`].

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::correction::{apply_correction, CorrectionResult};
use crate::error::CalcError;
use crate::fees::{calculate_fee_by_name, FeeResult};
use crate::interest::{calculate_interest, InterestBasis, InterestResult};
use crate::period::CalculationPeriod;
use crate::rates::{RateIndexProvider, DEFAULT_INDEX, DEFAULT_WAIT_TIMEOUT};

/// Inputs of a complete calculation as received from a form or JSON body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub value: f64,

    /// ISO-8601 date the debt became due
    #[serde(default)]
    pub start_date: Option<String>,

    /// ISO-8601 date to update the debt to
    #[serde(default)]
    pub end_date: Option<String>,

    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default)]
    pub apply_interest: bool,

    #[serde(default = "default_basis")]
    pub interest_basis: String,
}

fn default_index() -> String {
    DEFAULT_INDEX.id().to_string()
}

fn default_basis() -> String {
    InterestBasis::default().name().to_string()
}

/// Result of a complete calculation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationBreakdown {
    pub period: CalculationPeriod,
    pub correction: CorrectionResult,
    /// `None` when interest was not requested or the index already embeds it
    pub interest: Option<InterestResult>,
    /// Interest was requested but skipped because the index includes it
    pub interest_included_in_index: bool,
    pub total: f64,
    /// `(total - value) / value * 100`; 0 for a zero value
    pub percent_uplift: f64,
}

impl CalculationBreakdown {
    pub fn interest_amount(&self) -> f64 {
        self.interest.as_ref().map_or(0.0, |i| i.interest_amount)
    }
}

/// Calculation front end over a shared rate provider
#[derive(Debug, Clone)]
pub struct Calculator {
    rates: Arc<RateIndexProvider>,
    wait_timeout: Duration,
}

impl Calculator {
    pub fn new(rates: Arc<RateIndexProvider>) -> Self {
        Self {
            rates,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Bound used by the `*_resolved` methods when waiting on a refresh
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn rates(&self) -> &Arc<RateIndexProvider> {
        &self.rates
    }

    /// Correct `value` from `start` to `end` by the named index
    pub fn correct(
        &self,
        value: f64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        index_name: &str,
    ) -> Result<CorrectionResult, CalcError> {
        let period = CalculationPeriod::from_dates(start, end)?;
        let rate = self.rates.get_rate(index_name);
        Ok(apply_correction(value, &period, &rate))
    }

    /// Interest on `base_value`; unknown basis names mean `simple-1%`
    pub fn interest(&self, base_value: f64, months: f64, basis_name: &str) -> InterestResult {
        calculate_interest(base_value, months, InterestBasis::from_name(basis_name))
    }

    /// Attorney fee; unknown categories charge the default 20%
    pub fn fee(
        &self,
        basis_value: f64,
        category: &str,
        percentage: Option<f64>,
        flat_amount: Option<f64>,
    ) -> FeeResult {
        calculate_fee_by_name(basis_value, category, percentage, flat_amount)
    }

    /// Correction plus optional interest over the period
    ///
    /// Interest is computed on the corrected value and is skipped for indices
    /// that already embed interest (SELIC).
    pub fn calculate_complete(
        &self,
        value: f64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        index_name: &str,
        apply_interest: bool,
        interest_basis: InterestBasis,
    ) -> Result<CalculationBreakdown, CalcError> {
        let period = CalculationPeriod::from_dates(start, end)?;
        let rate = self.rates.get_rate(index_name);
        let correction = apply_correction(value, &period, &rate);

        let interest_included_in_index = apply_interest && rate.includes_interest();
        let interest = if apply_interest && !interest_included_in_index {
            Some(calculate_interest(correction.corrected_value, period.months, interest_basis))
        } else {
            if interest_included_in_index {
                debug!("{} already includes interest, skipping {}", rate.name, interest_basis.name());
            }
            None
        };

        let total = correction.corrected_value + interest.as_ref().map_or(0.0, |i| i.interest_amount);
        let percent_uplift = if value != 0.0 {
            (total - value) / value * 100.0
        } else {
            0.0
        };

        Ok(CalculationBreakdown {
            period,
            correction,
            interest,
            interest_included_in_index,
            total,
            percent_uplift,
        })
    }

    /// [`calculate_complete`](Self::calculate_complete) from raw request fields
    pub fn calculate_request(&self, request: &CompleteRequest) -> Result<CalculationBreakdown, CalcError> {
        let period = CalculationPeriod::parse(request.start_date.as_deref(), request.end_date.as_deref())?;
        self.calculate_complete(
            request.value,
            Some(period.start),
            Some(period.end),
            &request.index,
            request.apply_interest,
            InterestBasis::from_name(&request.interest_basis),
        )
    }

    /// Bounded wait for the session rate refresh; returns whether it finished
    ///
    /// Starts the refresh on first use.
    pub async fn wait_for_rates(&self) -> bool {
        self.rates.start_refresh();
        self.rates.wait_ready(self.wait_timeout).await
    }

    /// Wait (bounded) for the session rate refresh, then calculate
    pub async fn calculate_request_resolved(
        &self,
        request: &CompleteRequest,
    ) -> Result<CalculationBreakdown, CalcError> {
        self.wait_for_rates().await;
        self.calculate_request(request)
    }

    /// Calculate many requests in parallel, keeping input order
    pub fn calculate_batch(&self, requests: &[CompleteRequest]) -> Vec<Result<CalculationBreakdown, CalcError>> {
        requests
            .par_iter()
            .map(|request| self.calculate_request(request))
            .collect()
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new(Arc::new(RateIndexProvider::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DateField;
    use crate::rates::{LiveRate, Provenance, RateSource, RateTable};
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn request(index: &str, apply_interest: bool) -> CompleteRequest {
        CompleteRequest {
            value: 1000.0,
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-07-01".to_string()),
            index: index.to_string(),
            apply_interest,
            interest_basis: "simple-1%".to_string(),
        }
    }

    #[test]
    fn test_correction_only() {
        let calc = Calculator::default();
        let result = calc
            .calculate_complete(1000.0, date(2024, 1, 1), date(2024, 7, 1), "inflation-index-A", false, InterestBasis::Simple1)
            .unwrap();

        assert_relative_eq!(result.correction.factor, 1.004_f64.powi(6), epsilon = 1e-12);
        assert!(result.interest.is_none());
        assert_eq!(result.total, result.correction.corrected_value);
        assert_relative_eq!(result.percent_uplift, (1.004_f64.powi(6) - 1.0) * 100.0, epsilon = 1e-9);
        assert_eq!(result.correction.provenance, Provenance::Estimated);
    }

    #[test]
    fn test_interest_on_corrected_value() {
        let calc = Calculator::default();
        let result = calc.calculate_request(&request("ipca", true)).unwrap();

        let corrected = 1000.0 * 1.004_f64.powi(6);
        let interest = result.interest.as_ref().unwrap();
        assert_relative_eq!(interest.base_value, corrected, epsilon = 1e-9);
        assert_relative_eq!(interest.interest_amount, corrected * 0.01 * 6.0, epsilon = 1e-9);
        assert_relative_eq!(result.total, corrected * 1.06, epsilon = 1e-9);
        assert!(!result.interest_included_in_index);
    }

    #[test]
    fn test_selic_skips_interest() {
        let calc = Calculator::default();
        let result = calc.calculate_request(&request("base-interest-rate", true)).unwrap();

        assert!(result.interest.is_none());
        assert!(result.interest_included_in_index);
        assert_eq!(result.interest_amount(), 0.0);
        assert_relative_eq!(result.total, 1000.0 * 1.0085_f64.powi(6), epsilon = 1e-9);
    }

    #[test]
    fn test_validation_errors_propagate() {
        let calc = Calculator::default();

        let err = calc
            .calculate_complete(1000.0, date(2024, 7, 1), date(2024, 1, 1), "ipca", true, InterestBasis::Simple1)
            .unwrap_err();
        assert!(matches!(err, CalcError::InvalidPeriod { .. }));

        let mut missing = request("ipca", false);
        missing.end_date = None;
        let err = calc.calculate_request(&missing).unwrap_err();
        assert_eq!(err, CalcError::MissingDate { field: DateField::End });
    }

    #[test]
    fn test_zero_value() {
        let calc = Calculator::default();
        let mut zero = request("ipca", true);
        zero.value = 0.0;
        let result = calc.calculate_request(&zero).unwrap();
        assert_eq!(result.total, 0.0);
        assert_eq!(result.percent_uplift, 0.0);
    }

    #[test]
    fn test_idempotent() {
        let calc = Calculator::default();
        let req = request("igpm", true);
        let first = calc.calculate_request(&req).unwrap();
        let second = calc.calculate_request(&req).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total.to_bits(), second.total.to_bits());
    }

    #[test]
    fn test_fee_and_interest_wrappers() {
        let calc = Calculator::default();
        assert_relative_eq!(calc.fee(10_000.0, "contractual", Some(30.0), None).fee_amount, 3000.0, epsilon = 1e-9);
        assert_eq!(
            calc.interest(1024.18, 6.0, "bogus"),
            calc.interest(1024.18, 6.0, "simple-1%")
        );
        assert_relative_eq!(calc.interest(1024.18, 6.0, "simple-1%").interest_amount, 61.4508, epsilon = 1e-9);
    }

    #[test]
    fn test_batch_keeps_order() {
        let calc = Calculator::default();
        let mut bad = request("ipca", false);
        bad.start_date = Some("2025-01-01".to_string());
        let requests = vec![request("ipca", false), bad, request("selic", true)];

        let results = calc.calculate_batch(&requests);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().correction.index, "ipca");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().correction.index, "selic");
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: CompleteRequest =
            serde_json::from_str(r#"{"value": 500.0, "start_date": "2024-01-01", "end_date": "2024-02-01"}"#).unwrap();
        assert_eq!(req.index, "ipca");
        assert_eq!(req.interest_basis, "simple-1%");
        assert!(!req.apply_interest);
    }

    struct LiveIpca;

    #[async_trait]
    impl RateSource for LiveIpca {
        async fn fetch(&self) -> Result<Vec<LiveRate>, crate::error::RateFetchError> {
            Ok(vec![LiveRate {
                index: "ipca".to_string(),
                rate: 0.50,
                provenance: Provenance::Live,
            }])
        }
    }

    #[tokio::test]
    async fn test_resolved_uses_live_rate() {
        let provider = Arc::new(RateIndexProvider::with_source(
            RateTable::fallback(),
            Arc::new(LiveIpca),
            Duration::from_secs(1),
        ));
        provider.start_refresh();

        let calc = Calculator::new(provider).with_wait_timeout(Duration::from_secs(1));
        let result = calc.calculate_request_resolved(&request("ipca", false)).await.unwrap();

        assert_eq!(result.correction.provenance, Provenance::Live);
        assert_relative_eq!(result.correction.factor, 1.005_f64.powi(6), epsilon = 1e-12);
    }

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateSource for CountingSource {
        async fn fetch(&self) -> Result<Vec<LiveRate>, crate::error::RateFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![LiveRate {
                index: "ipca".to_string(),
                rate: 0.50,
                provenance: Provenance::Live,
            }])
        }
    }

    #[tokio::test]
    async fn test_first_resolved_call_fetches_once() {
        let source = Arc::new(CountingSource::default());
        let provider = Arc::new(RateIndexProvider::with_source(
            RateTable::fallback(),
            source.clone(),
            Duration::from_secs(1),
        ));
        let calc = Calculator::new(provider).with_wait_timeout(Duration::from_secs(1));

        let first = calc.calculate_request_resolved(&request("ipca", false)).await.unwrap();
        let second = calc.calculate_request_resolved(&request("ipca", false)).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.correction.provenance, Provenance::Live);
        assert_eq!(first, second);
    }
}
