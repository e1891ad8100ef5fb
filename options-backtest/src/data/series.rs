//! Per-symbol bar series with a trading-day index.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use super::types::Bar;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("{symbol}: bar {index} at {current} is not after the previous bar at {previous}")]
    OutOfOrder {
        symbol: String,
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },
}

/// Validated bars for one symbol, indexed by trading day.
///
/// Construction rejects any series whose timestamps are not strictly
/// increasing, so every consumer can walk bars in order without re-checking.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    symbol: String,
    bars: Vec<Bar>,
    days: BTreeMap<NaiveDate, Range<usize>>,
}

impl SymbolSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();

        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SeriesError::OutOfOrder {
                    symbol,
                    index: i + 1,
                    previous: pair[0].timestamp,
                    current: pair[1].timestamp,
                });
            }
        }

        // Strict ordering makes each day's bars contiguous.
        let mut days = BTreeMap::new();
        let mut start = 0;
        for i in 1..=bars.len() {
            if i == bars.len() || bars[i].date() != bars[start].date() {
                days.insert(bars[start].date(), start..i);
                start = i;
            }
        }

        Ok(Self { symbol, bars, days })
    }

    /// A series with no data at all (provider failure or unknown symbol).
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
            days: BTreeMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars for a single trading day, in chronological order.
    pub fn day(&self, date: NaiveDate) -> Option<&[Bar]> {
        self.days.get(&date).map(|range| &self.bars[range.clone()])
    }

    /// Number of distinct days with at least one bar.
    pub fn trading_days(&self) -> usize {
        self.days.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(day: u32, hour: u32, minute: u32) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap();
        Bar::new(ts, dec!(100), dec!(101), dec!(99), dec!(100), 1_000)
    }

    #[test]
    fn test_groups_bars_by_day() {
        let series = SymbolSeries::new(
            "SPY",
            vec![bar(11, 9, 30), bar(11, 9, 31), bar(12, 9, 30), bar(12, 9, 31), bar(12, 9, 32)],
        )
        .unwrap();

        assert_eq!(series.trading_days(), 2);
        assert_eq!(series.day(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()).unwrap().len(), 2);
        assert_eq!(series.day(NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()).unwrap().len(), 3);
        assert!(series.day(NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()).is_none());
    }

    #[test]
    fn test_rejects_out_of_order_bars() {
        let err = SymbolSeries::new("SPY", vec![bar(11, 9, 31), bar(11, 9, 30)]).unwrap_err();
        match err {
            SeriesError::OutOfOrder { symbol, index, .. } => {
                assert_eq!(symbol, "SPY");
                assert_eq!(index, 1);
            }
        }
    }

    #[test]
    fn test_rejects_duplicate_timestamps() {
        assert!(SymbolSeries::new("SPY", vec![bar(11, 9, 30), bar(11, 9, 30)]).is_err());
    }

    #[test]
    fn test_empty_series() {
        let series = SymbolSeries::empty("QQQ");
        assert!(series.is_empty());
        assert_eq!(series.trading_days(), 0);
        assert!(series.day(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()).is_none());
    }
}
