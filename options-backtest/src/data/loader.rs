//! File-backed providers.
//!
//! Bar files are CSV, one file per symbol and granularity:
//! `<data_dir>/<SYMBOL>_<granularity>.csv` with the header
//! `timestamp,open,high,low,close,volume`. Timestamps may be
//! `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare `YYYY-MM-DD`
//! for daily bars (stamped at midnight).
//!
//! Earnings calendars are JSON objects mapping symbol to a list of
//! `YYYY-MM-DD` dates.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use super::provider::{BarSeriesProvider, EarningsCalendarProvider};
use super::types::{Bar, Granularity};

/// Expected columns in bar files.
pub const EXPECTED_COLUMNS: &[&str] = &["timestamp", "open", "high", "low", "close", "volume"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: i64,
}

impl BarRow {
    fn into_bar(self, line: usize) -> Result<Bar, LoaderError> {
        let price = |field: &str, raw: &str| {
            Decimal::from_str(raw.trim()).map_err(|e| {
                LoaderError::InvalidData(format!("line {}: bad {} '{}': {}", line, field, raw, e))
            })
        };
        Ok(Bar {
            timestamp: parse_timestamp(&self.timestamp).ok_or_else(|| {
                LoaderError::InvalidData(format!("line {}: bad timestamp '{}'", line, self.timestamp))
            })?,
            open: price("open", &self.open)?,
            high: price("high", &self.high)?,
            low: price("low", &self.low)?,
            close: price("close", &self.close)?,
            volume: self.volume,
        })
    }
}

/// Parse the timestamp formats accepted in bar files.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// CSV bar loader.
pub struct CsvBarProvider {
    data_dir: PathBuf,
}

impl CsvBarProvider {
    /// Create a new loader pointing to a directory of bar files.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Path of a symbol's bar file for a granularity.
    pub fn csv_path(&self, symbol: &str, granularity: Granularity) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.csv", symbol, granularity.as_str()))
    }

    /// Read every bar in a file, in file order.
    pub fn load_file(path: &Path) -> Result<Vec<Bar>, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        for column in EXPECTED_COLUMNS {
            if !headers.iter().any(|h| h.trim() == *column) {
                return Err(LoaderError::InvalidData(format!(
                    "{}: missing column '{}'",
                    path.display(),
                    column
                )));
            }
        }

        let mut bars = Vec::new();
        for (i, row) in reader.deserialize::<BarRow>().enumerate() {
            // Header is line 1.
            bars.push(row?.into_bar(i + 2)?);
        }
        Ok(bars)
    }
}

impl BarSeriesProvider for CsvBarProvider {
    fn get_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        granularity: Granularity,
    ) -> Result<Vec<Bar>, LoaderError> {
        let path = self.csv_path(symbol, granularity);
        let bars = match Self::load_file(&path) {
            Ok(bars) => bars,
            // A symbol without a file is a data gap, not a failure.
            Err(LoaderError::FileNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(bars
            .into_iter()
            .filter(|b| b.date() >= start_date && b.date() <= end_date)
            .collect())
    }
}

/// Earnings calendar loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct JsonEarningsCalendar {
    dates: HashMap<String, BTreeSet<NaiveDate>>,
}

impl JsonEarningsCalendar {
    pub fn load(path: &Path) -> Result<Self, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, LoaderError> {
        let raw: HashMap<String, Vec<NaiveDate>> = serde_json::from_str(content)?;
        Ok(Self {
            dates: raw
                .into_iter()
                .map(|(symbol, dates)| (symbol, dates.into_iter().collect()))
                .collect(),
        })
    }

    pub fn symbol_count(&self) -> usize {
        self.dates.len()
    }
}

impl EarningsCalendarProvider for JsonEarningsCalendar {
    fn get_dates(&self, symbol: &str) -> BTreeSet<NaiveDate> {
        self.dates.get(symbol).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = date(2024, 3, 15).and_hms_opt(9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-15 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15T09:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-15"),
            Some(date(2024, 3, 15).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("15/03/2024"), None);
    }

    #[test]
    fn test_csv_provider_reads_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SPY_minute.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-03-14 09:30:00,99.5,100,95,97,1000").unwrap();
        writeln!(file, "2024-03-15 09:30:00,99.5,100,95,97,1000").unwrap();
        writeln!(file, "2024-03-15 09:31:00,97,101.5,96.8,101,1300").unwrap();
        drop(file);

        let provider = CsvBarProvider::new(dir.path());
        let bars = provider
            .get_series("SPY", date(2024, 3, 15), date(2024, 3, 15), Granularity::Minute)
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, dec!(101));
        assert_eq!(bars[1].volume, 1300);
    }

    #[test]
    fn test_csv_provider_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvBarProvider::new(dir.path());
        let bars = provider
            .get_series("QQQ", date(2024, 1, 1), date(2024, 12, 31), Granularity::Day)
            .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn test_csv_provider_rejects_bad_price() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SPY_day.csv");
        std::fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n2024-03-15,abc,1,1,1,10\n",
        )
        .unwrap();

        let err = CsvBarProvider::load_file(&path).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidData(_)));
    }

    #[test]
    fn test_json_calendar() {
        let calendar = JsonEarningsCalendar::from_json(
            r#"{ "TSLA": ["2024-01-24", "2024-04-23"], "NFLX": [] }"#,
        )
        .unwrap();

        assert_eq!(calendar.symbol_count(), 2);
        assert_eq!(calendar.get_dates("TSLA").len(), 2);
        assert!(calendar.get_dates("NFLX").is_empty());
        assert!(calendar.get_dates("AMD").is_empty());
    }
}
