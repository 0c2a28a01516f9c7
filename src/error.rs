//! Error types for calculation input validation and live rate fetching

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which date input a validation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    Start,
    End,
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateField::Start => write!(f, "start date"),
            DateField::End => write!(f, "end date"),
        }
    }
}

/// User-correctable validation failures returned by a calculation call
///
/// None of these are fatal; the presentation layer renders them next to the
/// offending input (see [`CalcError::field`]).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("{field} is required")]
    MissingDate { field: DateField },

    #[error("{field} '{value}' is not a valid ISO-8601 date")]
    InvalidDate { field: DateField, value: String },

    #[error("start date {start} is after end date {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
}

impl CalcError {
    /// Input field the error should be displayed next to
    pub fn field(&self) -> DateField {
        match self {
            CalcError::MissingDate { field } => *field,
            CalcError::InvalidDate { field, .. } => *field,
            CalcError::InvalidPeriod { .. } => DateField::Start,
        }
    }

    /// Stable machine-readable code for JSON responses
    pub fn code(&self) -> &'static str {
        match self {
            CalcError::MissingDate { .. } => "missing_date",
            CalcError::InvalidDate { .. } => "invalid_date",
            CalcError::InvalidPeriod { .. } => "invalid_period",
        }
    }
}

/// Failure while fetching live index rates
///
/// Never returned from the rate provider's public lookups: the provider logs
/// it and serves the fallback table instead.
#[derive(Error, Debug)]
pub enum RateFetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate source returned status {0}")]
    Status(u16),

    #[error("malformed rate payload: {0}")]
    Malformed(String),

    #[error("rate source did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Failure while loading a fallback rate table from CSV
#[derive(Error, Debug)]
pub enum RateTableError {
    #[error("could not open rate table: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not read rate table CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {message}")]
    InvalidRow { line: u64, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_field_mapping() {
        let missing = CalcError::MissingDate { field: DateField::End };
        assert_eq!(missing.field(), DateField::End);
        assert_eq!(missing.code(), "missing_date");
        assert_eq!(missing.to_string(), "end date is required");

        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let invalid = CalcError::InvalidPeriod { start, end };
        assert_eq!(invalid.field(), DateField::Start);
        assert_eq!(invalid.code(), "invalid_period");
    }
}
