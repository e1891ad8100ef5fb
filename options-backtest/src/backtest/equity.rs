//! Append-only capital ledger for one run.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Daily equity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: Decimal,
    pub daily_pnl: Decimal,
}

/// Seed capital followed by one snapshot per simulated trading day.
///
/// Snapshots can only be added through [`EquityTracker`], so history is
/// never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityCurve {
    initial: Decimal,
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn new(initial: Decimal) -> Self {
        Self {
            initial,
            points: Vec::new(),
        }
    }

    pub fn initial(&self) -> Decimal {
        self.initial
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    /// Seed followed by every snapshot.
    pub fn values(&self) -> Vec<Decimal> {
        std::iter::once(self.initial)
            .chain(self.points.iter().map(|p| p.equity))
            .collect()
    }

    pub fn final_equity(&self) -> Decimal {
        self.points.last().map(|p| p.equity).unwrap_or(self.initial)
    }

    /// Number of values including the seed; never zero.
    pub fn len(&self) -> usize {
        self.points.len() + 1
    }

    /// True when no day has been simulated yet.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Owns the equity curve for the duration of one run.
#[derive(Debug, Clone)]
pub struct EquityTracker {
    capital: Decimal,
    curve: EquityCurve,
}

impl EquityTracker {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            capital: initial_capital,
            curve: EquityCurve::new(initial_capital),
        }
    }

    /// Add a day's realized P&L and append the resulting snapshot.
    pub fn apply_daily_pnl(&mut self, date: NaiveDate, amount: Decimal) {
        self.capital += amount;
        self.curve.points.push(EquityPoint {
            date,
            equity: self.capital,
            daily_pnl: amount,
        });
    }

    pub fn current_capital(&self) -> Decimal {
        self.capital
    }

    pub fn curve(&self) -> &EquityCurve {
        &self.curve
    }

    pub fn into_curve(self) -> EquityCurve {
        self.curve
    }
}
