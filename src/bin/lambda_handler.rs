//! AWS Lambda handler for calculator requests
//!
//! Accepts a JSON event tagged by `operation` and returns the structured
//! result. Validation failures come back in the `error` field with the input
//! field they refer to, so the form can show them inline. Live rates are
//! fetched once per warm container.

use std::sync::Arc;

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};

use petitio_calculator::{
    CalcError, CalculationBreakdown, Calculator, CompleteRequest, CorrectionResult, DateField, FeeCategory,
    FeeResult, IndexRate, InterestBasis, InterestResult, ProviderConfig,
};
use petitio_calculator::rates::DEFAULT_INDEX;
use petitio_calculator::period::CalculationPeriod;

/// Input event
#[derive(Debug, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum CalculatorRequest {
    /// Current rate of every index
    Rates,

    Correct {
        value: f64,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
        #[serde(default = "default_index")]
        index: String,
    },

    Interest {
        base_value: f64,
        months: f64,
        #[serde(default = "default_basis")]
        basis: String,
    },

    Fee {
        basis_value: f64,
        #[serde(default = "default_category")]
        category: String,
        #[serde(default)]
        percentage: Option<f64>,
        #[serde(default)]
        flat_amount: Option<f64>,
    },

    Complete(CompleteRequest),
}

fn default_index() -> String { DEFAULT_INDEX.id().to_string() }
fn default_basis() -> String { InterestBasis::default().name().to_string() }
fn default_category() -> String { FeeCategory::Contractual.name().to_string() }

/// Validation error as shown next to a form field
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub code: &'static str,
    pub field: DateField,
    pub message: String,
}

impl From<CalcError> for FieldError {
    fn from(e: CalcError) -> Self {
        Self {
            code: e.code(),
            field: e.field(),
            message: e.to_string(),
        }
    }
}

/// Output of the handler; exactly one of the result fields is set
#[derive(Debug, Default, Serialize)]
pub struct CalculatorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rates: Option<Vec<IndexRate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<CorrectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest: Option<InterestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<FeeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<CalculationBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FieldError>,
    pub execution_time_ms: u64,
}

fn correct(calculator: &Calculator, value: f64, start: Option<&str>, end: Option<&str>, index: &str) -> Result<CorrectionResult, CalcError> {
    let period = CalculationPeriod::parse(start, end)?;
    calculator.correct(value, Some(period.start), Some(period.end), index)
}

async fn handle(calculator: &Calculator, request: CalculatorRequest) -> CalculatorResponse {
    let start = std::time::Instant::now();
    let mut response = CalculatorResponse::default();

    match request {
        CalculatorRequest::Rates => {
            calculator.wait_for_rates().await;
            response.rates = Some(calculator.rates().snapshot());
        }
        CalculatorRequest::Correct { value, start_date, end_date, index } => {
            calculator.wait_for_rates().await;
            match correct(calculator, value, start_date.as_deref(), end_date.as_deref(), &index) {
                Ok(result) => response.correction = Some(result),
                Err(e) => response.error = Some(e.into()),
            }
        }
        CalculatorRequest::Interest { base_value, months, basis } => {
            response.interest = Some(calculator.interest(base_value, months, &basis));
        }
        CalculatorRequest::Fee { basis_value, category, percentage, flat_amount } => {
            response.fee = Some(calculator.fee(basis_value, &category, percentage, flat_amount));
        }
        CalculatorRequest::Complete(request) => {
            match calculator.calculate_request_resolved(&request).await {
                Ok(result) => response.breakdown = Some(result),
                Err(e) => response.error = Some(e.into()),
            }
        }
    }

    response.execution_time_ms = start.elapsed().as_millis() as u64;
    response
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let config = ProviderConfig::from_env();
    let provider = Arc::new(config.build_provider()?);
    provider.start_refresh();
    let calculator = Arc::new(Calculator::new(provider).with_wait_timeout(config.wait_timeout));

    run(service_fn(move |event: LambdaEvent<CalculatorRequest>| {
        let calculator = Arc::clone(&calculator);
        async move { Ok::<_, Error>(handle(&calculator, event.payload).await) }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_operation() {
        let request: CalculatorRequest = serde_json::from_str(
            r#"{"operation": "complete", "value": 1000.0, "start_date": "2024-01-01",
                "end_date": "2024-07-01", "index": "inflation-index-A", "apply_interest": true}"#,
        )
        .unwrap();

        let response = handle(&Calculator::default(), request).await;
        let breakdown = response.breakdown.expect("breakdown");
        assert!(response.error.is_none());
        assert!(breakdown.interest.is_some());
        assert!(breakdown.total > 1024.0);
    }

    #[tokio::test]
    async fn test_validation_error_names_field() {
        let request: CalculatorRequest = serde_json::from_str(
            r#"{"operation": "correct", "value": 1000.0, "start_date": "2024-01-01"}"#,
        )
        .unwrap();

        let response = handle(&Calculator::default(), request).await;
        let error = response.error.expect("error");
        assert_eq!(error.code, "missing_date");
        assert_eq!(error.field, DateField::End);
        assert!(response.correction.is_none());
    }

    #[tokio::test]
    async fn test_fee_operation() {
        let request: CalculatorRequest = serde_json::from_str(
            r#"{"operation": "fee", "basis_value": 10000.0, "category": "contractual", "percentage": 30}"#,
        )
        .unwrap();

        let response = handle(&Calculator::default(), request).await;
        assert!((response.fee.unwrap().fee_amount - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_defaults_match_library() {
        let request: CalculatorRequest =
            serde_json::from_str(r#"{"operation": "correct", "value": 1.0}"#).unwrap();
        match request {
            CalculatorRequest::Correct { index, .. } => assert_eq!(index, DEFAULT_INDEX.id()),
            other => panic!("unexpected request {:?}", other),
        }

        let request: CalculatorRequest =
            serde_json::from_str(r#"{"operation": "interest", "base_value": 1.0, "months": 1.0}"#).unwrap();
        match request {
            CalculatorRequest::Interest { basis, .. } => assert_eq!(basis, "simple-1%"),
            other => panic!("unexpected request {:?}", other),
        }
    }
}
