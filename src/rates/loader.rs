//! CSV-based fallback rate loader
//!
//! Lets a deployment replace the built-in estimates without a rebuild. The
//! file has an `index,rate` header and one monthly percentage per row:
//!
//! ```text
//! index,rate
//! ipca,0.38
//! igp-m,0.61
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::info;

use super::RateTable;
use crate::error::RateTableError;

/// Load fallback rates from a CSV file
///
/// Rows override the built-in estimates; indices absent from the file keep
/// their built-in rate.
pub fn load_fallback_table(path: &Path) -> Result<RateTable, RateTableError> {
    let file = File::open(path)?;
    let table = read_fallback_table(file)?;
    info!("Loaded {} fallback rates from {}", table.len(), path.display());
    Ok(table)
}

/// Read fallback rates from any CSV reader
pub fn read_fallback_table<R: Read>(source: R) -> Result<RateTable, RateTableError> {
    let mut reader = csv::Reader::from_reader(source);
    let mut table = RateTable::fallback();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let index = record.get(0).map(str::trim).unwrap_or("");
        if index.is_empty() {
            return Err(RateTableError::InvalidRow {
                line,
                message: "missing index name".to_string(),
            });
        }

        let raw_rate = record.get(1).map(str::trim).unwrap_or("");
        let rate: f64 = raw_rate
            .replace(',', ".")
            .parse()
            .map_err(|_| RateTableError::InvalidRow {
                line,
                message: format!("'{}' is not a rate", raw_rate),
            })?;

        if !rate.is_finite() {
            return Err(RateTableError::InvalidRow {
                line,
                message: format!("rate for {} is not finite", index),
            });
        }

        table.insert(index, rate);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_keep_missing_defaults() {
        let csv = "index,rate\nipca,0.38\nIGP-M,0.61\n";
        let table = read_fallback_table(csv.as_bytes()).unwrap();

        assert_eq!(table.get("ipca"), Some(0.38));
        assert_eq!(table.get("igpm"), Some(0.61));
        // Untouched
        assert_eq!(table.get("selic"), Some(0.85));
    }

    #[test]
    fn test_extra_index_is_kept() {
        let csv = "index,rate\nCDI,0.83\n";
        let table = read_fallback_table(csv.as_bytes()).unwrap();
        assert_eq!(table.get("cdi"), Some(0.83));
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_comma_decimal_separator() {
        let csv = "index,rate\ntr,\"0,12\"\n";
        let table = read_fallback_table(csv.as_bytes()).unwrap();
        assert_eq!(table.get("tr"), Some(0.12));
    }

    #[test]
    fn test_bad_rate_is_rejected() {
        let csv = "index,rate\nipca,abc\n";
        let err = read_fallback_table(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, RateTableError::InvalidRow { line: 2, .. }), "{:?}", err);
    }
}
