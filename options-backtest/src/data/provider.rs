//! Market-data and earnings-calendar seams.
//!
//! The engine only talks to these two traits. Broker or vendor clients live
//! outside this crate; in-memory and synthetic implementations here make the
//! simulators testable without a connection.

use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};

use super::loader::LoaderError;
use super::types::{Bar, Granularity};

/// Supplies ordered bars per symbol.
///
/// Implementations must return bars in strictly ascending timestamp order.
/// Missing days are allowed.
pub trait BarSeriesProvider {
    fn get_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        granularity: Granularity,
    ) -> Result<Vec<Bar>, LoaderError>;
}

/// Supplies known earnings announcement dates per symbol. May be empty.
pub trait EarningsCalendarProvider {
    fn get_dates(&self, symbol: &str) -> BTreeSet<NaiveDate>;
}

/// Bars held in memory, keyed by symbol. Granularity is not distinguished.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBarProvider {
    series: HashMap<String, Vec<Bar>>,
}

impl InMemoryBarProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.insert(symbol, bars);
        self
    }

    pub fn insert(&mut self, symbol: &str, bars: Vec<Bar>) {
        self.series.insert(symbol.to_string(), bars);
    }
}

impl BarSeriesProvider for InMemoryBarProvider {
    fn get_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        _granularity: Granularity,
    ) -> Result<Vec<Bar>, LoaderError> {
        // Stored order is preserved; ordering is the engine's job to verify.
        Ok(self
            .series
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date() >= start_date && b.date() <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Earnings dates held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEarningsCalendar {
    dates: HashMap<String, BTreeSet<NaiveDate>>,
}

impl InMemoryEarningsCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dates(mut self, symbol: &str, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.dates
            .entry(symbol.to_string())
            .or_default()
            .extend(dates);
        self
    }

    pub fn from_map(dates: HashMap<String, BTreeSet<NaiveDate>>) -> Self {
        Self { dates }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.dates.keys().map(String::as_str)
    }
}

impl EarningsCalendarProvider for InMemoryEarningsCalendar {
    fn get_dates(&self, symbol: &str) -> BTreeSet<NaiveDate> {
        self.dates.get(symbol).cloned().unwrap_or_default()
    }
}

/// Deterministic fallback calendar: one announcement every `spacing_days`
/// starting at `start`, for every symbol.
///
/// This keeps the straddle backtest runnable without real calendar data. It
/// is a placeholder, not an estimate of actual report dates.
#[derive(Debug, Clone)]
pub struct SyntheticEarningsCalendar {
    start: NaiveDate,
    end: NaiveDate,
    spacing_days: i64,
}

impl SyntheticEarningsCalendar {
    pub fn new(start: NaiveDate, end: NaiveDate, spacing_days: i64) -> Self {
        Self {
            start,
            end,
            spacing_days,
        }
    }
}

impl EarningsCalendarProvider for SyntheticEarningsCalendar {
    fn get_dates(&self, _symbol: &str) -> BTreeSet<NaiveDate> {
        let mut dates = BTreeSet::new();
        if self.spacing_days <= 0 {
            return dates;
        }
        let step = Duration::try_days(self.spacing_days);
        let mut current = self.start;
        while current <= self.end {
            dates.insert(current);
            match step.and_then(|step| current.checked_add_signed(step)) {
                Some(next) => current = next,
                None => break,
            }
        }
        dates
    }
}
