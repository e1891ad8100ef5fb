//! Pre-earnings straddle simulation.
//!
//! Straddles are opened `entry_days_before` calendar days ahead of an
//! announcement and closed `exit_days_after` days after it. Several can be
//! open at once; the book holding them is owned by the run driver and
//! passed in on every day.
//!
//! Pricing is deliberately crude: each leg costs `price * straddle_premium_rate`
//! at entry, and at exit the pair is worth either `cost * (1 + move)` when the
//! move reached `min_expected_move`, or half its cost otherwise.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::data::{Bar, EarningsCalendarProvider, SymbolSeries};
use crate::risk::PositionSizer;

use super::config::StraddleConfig;
use super::outcome::{DayReport, Skip};
use super::trade::Straddle;

type StraddleKey = (String, NaiveDate);

/// Straddles currently open, plus every (symbol, earnings date) already
/// entered or given up on.
#[derive(Debug, Clone, Default)]
pub struct StraddleBook {
    active: BTreeMap<StraddleKey, Straddle>,
    handled: BTreeSet<StraddleKey>,
}

impl StraddleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open straddles in (symbol, earnings date) order.
    pub fn active(&self) -> impl Iterator<Item = &Straddle> {
        self.active.values()
    }

    pub fn open_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, symbol: &str, earnings_date: NaiveDate) -> bool {
        self.active.contains_key(&(symbol.to_string(), earnings_date))
    }

    /// Whatever is still open when the run ends.
    pub fn into_open(self) -> Vec<Straddle> {
        self.active.into_values().collect()
    }
}

/// Simulates the straddle strategy one day at a time.
#[derive(Debug, Clone)]
pub struct StraddleSimulator {
    config: StraddleConfig,
}

impl StraddleSimulator {
    pub fn new(config: StraddleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StraddleConfig {
        &self.config
    }

    /// Call and put premium estimates for an underlying price.
    pub fn premiums(&self, price: Decimal) -> (Decimal, Decimal) {
        let leg = price * self.config.straddle_premium_rate;
        (leg, leg)
    }

    /// Scheduled entry day for an announcement.
    /// Saturates at `NaiveDate::MIN`, which is never inside a run.
    pub fn entry_target(&self, earnings_date: NaiveDate) -> NaiveDate {
        Duration::try_days(self.config.entry_days_before)
            .and_then(|offset| earnings_date.checked_sub_signed(offset))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Entry is due from the scheduled day through the announcement itself.
    /// Announcements whose scheduled day precedes the run are never entered.
    pub fn entry_due(&self, date: NaiveDate, earnings_date: NaiveDate, run_start: NaiveDate) -> bool {
        let target = self.entry_target(earnings_date);
        target >= run_start && target <= date && date <= earnings_date
    }

    pub fn exit_due(&self, date: NaiveDate, earnings_date: NaiveDate) -> bool {
        (date - earnings_date).num_days() >= self.config.exit_days_after
    }

    /// Run one day: entries first, then exits.
    pub fn process_day(
        &self,
        date: NaiveDate,
        run_start: NaiveDate,
        universe: &[SymbolSeries],
        calendar: &dyn EarningsCalendarProvider,
        book: &mut StraddleBook,
    ) -> DayReport {
        let mut report = DayReport::default();
        self.process_entries(date, run_start, universe, calendar, book, &mut report);
        self.process_exits(date, universe, book, &mut report);
        report
    }

    fn process_entries(
        &self,
        date: NaiveDate,
        run_start: NaiveDate,
        universe: &[SymbolSeries],
        calendar: &dyn EarningsCalendarProvider,
        book: &mut StraddleBook,
        report: &mut DayReport,
    ) {
        let horizon = Duration::try_days(self.config.entry_days_before)
            .and_then(|offset| date.checked_add_signed(offset))
            .unwrap_or(NaiveDate::MAX)
            .max(date);

        for series in universe {
            let symbol = series.symbol();
            let dates = calendar.get_dates(symbol);

            for &earnings_date in dates.range(date..=horizon) {
                if !self.entry_due(date, earnings_date, run_start) {
                    continue;
                }
                let key = (symbol.to_string(), earnings_date);
                if book.handled.contains(&key) || book.active.contains_key(&key) {
                    continue;
                }

                let entry_bar = match series.day(date).and_then(|bars| bars.first()) {
                    Some(bar) => bar,
                    None => {
                        report.skip(symbol, Skip::DataGap);
                        if next_weekday(date) > earnings_date {
                            warn!(
                                symbol = %symbol,
                                earnings = %earnings_date,
                                "No data before earnings, straddle not opened"
                            );
                            book.handled.insert(key);
                        } else {
                            debug!(symbol = %symbol, date = %date, "No data, entry deferred");
                        }
                        continue;
                    }
                };

                book.handled.insert(key.clone());
                match self.open(symbol, earnings_date, entry_bar) {
                    Ok(straddle) => {
                        info!(
                            symbol = %symbol,
                            earnings = %earnings_date,
                            strike = %straddle.strike,
                            quantity = straddle.quantity,
                            cost = %straddle.entry_cost(),
                            "Straddle opened"
                        );
                        book.active.insert(key, straddle);
                    }
                    Err(skip) => {
                        info!(symbol = %symbol, earnings = %earnings_date, reason = %skip, "Straddle skipped");
                        report.skip(symbol, skip);
                    }
                }
            }
        }
    }

    /// Price and size a straddle at the entry bar's close.
    pub fn open(&self, symbol: &str, earnings_date: NaiveDate, entry_bar: &Bar) -> Result<Straddle, Skip> {
        let price = entry_bar.close;
        if price <= Decimal::ZERO {
            return Err(Skip::NonPositivePrice);
        }

        let (call_premium, put_premium) = self.premiums(price);
        let sizing = PositionSizer::straddle_contracts(self.config.capital_per_trade, call_premium + put_premium);
        if !sizing.is_allowed() {
            return Err(Skip::InsufficientCapital);
        }

        Ok(Straddle::open(
            symbol,
            earnings_date,
            entry_bar,
            call_premium,
            put_premium,
            sizing.contracts,
        ))
    }

    fn process_exits(
        &self,
        date: NaiveDate,
        universe: &[SymbolSeries],
        book: &mut StraddleBook,
        report: &mut DayReport,
    ) {
        let due: Vec<StraddleKey> = book
            .active
            .iter()
            .filter(|(_, s)| self.exit_due(date, s.earnings_date))
            .map(|(key, _)| key.clone())
            .collect();

        for key in due {
            let exit_bar = universe
                .iter()
                .find(|s| s.symbol() == key.0)
                .and_then(|s| s.day(date))
                .and_then(|bars| bars.first());

            let Some(exit_bar) = exit_bar else {
                debug!(symbol = %key.0, date = %date, "No data, exit deferred");
                report.skip(&key.0, Skip::DataGap);
                continue;
            };

            if let Some(mut straddle) = book.active.remove(&key) {
                if let Some(trade) = straddle.close(exit_bar, self.config.min_expected_move) {
                    info!(
                        symbol = %trade.symbol,
                        earnings = %key.1,
                        exit_value = %trade.exit_premium,
                        pnl = %trade.realized_pnl,
                        "Straddle closed"
                    );
                    report.trades.push(trade);
                }
            }
        }
    }
}

fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}
