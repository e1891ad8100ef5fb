//! Recoverable per-symbol, per-day conditions.
//!
//! These are not errors: a simulator returns them as values, the driver logs
//! and counts them, and the run continues.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::trade::Trade;

/// Why a symbol produced no trade action on a day.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skip {
    /// No bars for the symbol on that day.
    #[error("no data")]
    DataGap,

    /// Fewer than two bars, so no bar can follow the opening range.
    #[error("fewer than two bars")]
    InsufficientBars,

    /// Sized quantity was below one contract.
    #[error("insufficient capital")]
    InsufficientCapital,

    /// Entry price estimate was zero or negative.
    #[error("non-positive price")]
    NonPositivePrice,
}

/// How often each skip happened over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounters {
    pub data_gaps: usize,
    pub insufficient_bars: usize,
    pub insufficient_capital: usize,
    pub non_positive_price: usize,
}

impl SkipCounters {
    pub fn record(&mut self, skip: Skip) {
        match skip {
            Skip::DataGap => self.data_gaps += 1,
            Skip::InsufficientBars => self.insufficient_bars += 1,
            Skip::InsufficientCapital => self.insufficient_capital += 1,
            Skip::NonPositivePrice => self.non_positive_price += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.data_gaps + self.insufficient_bars + self.insufficient_capital + self.non_positive_price
    }
}

impl fmt::Display for SkipCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data gaps: {}, insufficient bars: {}, insufficient capital: {}, non-positive price: {}",
            self.data_gaps, self.insufficient_bars, self.insufficient_capital, self.non_positive_price
        )
    }
}

/// Everything one simulated day produced.
#[derive(Debug, Clone, Default)]
pub struct DayReport {
    pub trades: Vec<Trade>,
    pub skips: Vec<(String, Skip)>,
}

impl DayReport {
    /// Realized P&L of the trades closed today.
    pub fn pnl(&self) -> Decimal {
        self.trades.iter().map(|t| t.realized_pnl).sum()
    }

    pub fn skip(&mut self, symbol: &str, skip: Skip) {
        self.skips.push((symbol.to_string(), skip));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_counters() {
        let mut counters = SkipCounters::default();
        counters.record(Skip::DataGap);
        counters.record(Skip::DataGap);
        counters.record(Skip::InsufficientCapital);

        assert_eq!(counters.data_gaps, 2);
        assert_eq!(counters.insufficient_capital, 1);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn test_empty_day_has_zero_pnl() {
        let day = DayReport::default();
        assert!(day.pnl().is_zero());
    }
}
