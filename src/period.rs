//! Elapsed-time calculation between two calendar dates
//!
//! Months are counted the way court calculation sheets do it: whole calendar
//! months plus the day difference over a 30-day month. The day term is not
//! clamped and may be negative (e.g. Jan 31 → Feb 1 is 0.0 months). Historical
//! calculations depend on this exact formula, so it is not calendar-exact.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{CalcError, DateField};

/// Days in the normalized month used for the fractional term
pub const DAYS_PER_MONTH: f64 = 30.0;

/// Elapsed fractional months: `12*years + months + days/30`
pub fn elapsed_months(start: NaiveDate, end: NaiveDate) -> f64 {
    let years = (end.year() - start.year()) as f64;
    let months = end.month() as f64 - start.month() as f64;
    let days = end.day() as f64 - start.day() as f64;

    12.0 * years + months + days / DAYS_PER_MONTH
}

/// Elapsed whole days between two dates
pub fn elapsed_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Parse an ISO-8601 date (`YYYY-MM-DD`) coming from the presentation layer
///
/// Absent or blank input is reported as missing rather than invalid.
pub fn parse_date(field: DateField, raw: Option<&str>) -> Result<Option<NaiveDate>, CalcError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(s) => s,
    };

    // Accept full timestamps too ("2024-01-01T00:00:00Z"), keeping the date part
    let date_part = raw.split('T').next().unwrap_or(raw);

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| CalcError::InvalidDate {
            field,
            value: raw.to_string(),
        })
}

/// Validated interval between two dates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalculationPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Fractional months per [`elapsed_months`]
    pub months: f64,
    /// Whole days per [`elapsed_days`]
    pub days: i64,
}

impl CalculationPeriod {
    /// Build a period from dates that may be absent
    ///
    /// A missing start date is reported before a missing end date.
    pub fn from_dates(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, CalcError> {
        let start = start.ok_or(CalcError::MissingDate { field: DateField::Start })?;
        let end = end.ok_or(CalcError::MissingDate { field: DateField::End })?;
        Self::new(start, end)
    }

    /// Build a period, rejecting a start date after the end date
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CalcError> {
        if start > end {
            return Err(CalcError::InvalidPeriod { start, end });
        }

        Ok(Self {
            start,
            end,
            months: elapsed_months(start, end),
            days: elapsed_days(start, end),
        })
    }

    /// Build a period straight from ISO-8601 strings
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, CalcError> {
        let start = parse_date(DateField::Start, start)?;
        let end = parse_date(DateField::End, end)?;
        Self::from_dates(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_whole_months() {
        assert_relative_eq!(elapsed_months(date(2024, 1, 1), date(2024, 7, 1)), 6.0);
        assert_relative_eq!(elapsed_months(date(2022, 11, 15), date(2024, 2, 15)), 15.0);
    }

    #[test]
    fn test_day_fraction_uses_thirty_day_month() {
        // 2 months + 15/30
        assert_relative_eq!(elapsed_months(date(2024, 1, 10), date(2024, 3, 25)), 2.5);
    }

    #[test]
    fn test_negative_day_term_is_not_clamped() {
        // 1 month + (1 - 31)/30 = 0
        assert_relative_eq!(elapsed_months(date(2024, 1, 31), date(2024, 2, 1)), 0.0);
        // 3 months - 10/30
        assert_relative_eq!(
            elapsed_months(date(2024, 1, 20), date(2024, 4, 10)),
            3.0 - 10.0 / 30.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_elapsed_days() {
        assert_eq!(elapsed_days(date(2024, 1, 1), date(2024, 7, 1)), 182);
        assert_eq!(elapsed_days(date(2023, 3, 1), date(2023, 3, 1)), 0);
    }

    #[test]
    fn test_months_non_negative_for_ordered_dates() {
        let start = date(2023, 1, 31);
        let mut end = start;
        for _ in 0..800 {
            let period = CalculationPeriod::new(start, end).unwrap();
            assert!(period.months >= 0.0, "negative months at {}", end);
            end = end.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_invalid_period() {
        let err = CalculationPeriod::new(date(2024, 7, 1), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, CalcError::InvalidPeriod { .. }));
    }

    #[test]
    fn test_missing_dates_name_the_field() {
        let err = CalculationPeriod::from_dates(None, Some(date(2024, 1, 1))).unwrap_err();
        assert_eq!(err, CalcError::MissingDate { field: DateField::Start });

        let err = CalculationPeriod::from_dates(Some(date(2024, 1, 1)), None).unwrap_err();
        assert_eq!(err, CalcError::MissingDate { field: DateField::End });

        // Start is reported first
        let err = CalculationPeriod::from_dates(None, None).unwrap_err();
        assert_eq!(err.field(), DateField::Start);
    }

    #[test]
    fn test_parse_iso_strings() {
        let period = CalculationPeriod::parse(Some("2024-01-01"), Some("2024-07-01T00:00:00Z")).unwrap();
        assert_eq!(period.days, 182);

        let err = CalculationPeriod::parse(Some("  "), Some("2024-07-01")).unwrap_err();
        assert_eq!(err, CalcError::MissingDate { field: DateField::Start });

        let err = CalculationPeriod::parse(Some("2024-01-01"), Some("01/07/2024")).unwrap_err();
        assert!(matches!(err, CalcError::InvalidDate { field: DateField::End, .. }));
    }
}
