//! 0DTE opening-range breakout simulation.
//!
//! For each symbol and day:
//! 1. The first bar of the day sets the opening range
//! 2. The first later bar closing outside the range on elevated volume is the signal
//! 3. The option premium is repriced on each remaining bar until it reaches
//!    the stop or the target, or the day runs out
//!
//! At most one trade per symbol per day.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::data::{Bar, OptionType, SymbolSeries};
use crate::risk::PositionSizer;

use super::config::{BreakoutConfig, StrategyId};
use super::outcome::{DayReport, Skip};
use super::trade::{atm_strike, OpenTrade, Signal, Trade, TradeExit, TradeOutcome};

/// High, low and volume of a day's first bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningRange {
    pub high: Decimal,
    pub low: Decimal,
    pub volume: i64,
}

impl OpeningRange {
    pub fn from_bar(bar: &Bar) -> Self {
        Self {
            high: bar.high,
            low: bar.low,
            volume: bar.volume,
        }
    }
}

/// Simulates the breakout strategy one day at a time.
#[derive(Debug, Clone)]
pub struct BreakoutSimulator {
    config: BreakoutConfig,
}

impl BreakoutSimulator {
    pub fn new(config: BreakoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BreakoutConfig {
        &self.config
    }

    /// Direction of a breakout on `bar`, if any.
    pub fn detect(&self, range: &OpeningRange, bar: &Bar) -> Option<OptionType> {
        let volume_threshold = Decimal::from(range.volume) * self.config.volume_multiplier;
        if Decimal::from(bar.volume) <= volume_threshold {
            return None;
        }

        if bar.close > range.high {
            Some(OptionType::Call)
        } else if bar.close < range.low {
            Some(OptionType::Put)
        } else {
            None
        }
    }

    /// First signal of the day. The opening bar itself never signals.
    pub fn find_signal(&self, symbol: &str, bars: &[Bar]) -> Option<Signal> {
        let first = bars.first()?;
        let range = OpeningRange::from_bar(first);

        bars.iter()
            .enumerate()
            .skip(1)
            .find_map(|(i, bar)| {
                self.detect(&range, bar).map(|direction| Signal {
                    symbol: symbol.to_string(),
                    direction,
                    trigger_price: bar.close,
                    trigger_volume: bar.volume,
                    day: bar.date(),
                    timestamp: bar.timestamp,
                    bar_index: i,
                })
            })
    }

    /// Premium after the underlying moves from `entry_price` to `price`.
    pub fn reprice(
        premium: Decimal,
        direction: OptionType,
        entry_price: Decimal,
        price: Decimal,
    ) -> Decimal {
        if entry_price.is_zero() {
            return premium;
        }
        let change = (price - entry_price) / entry_price;
        let directional = match direction {
            OptionType::Call => change,
            OptionType::Put => -change,
        };
        premium * (Decimal::ONE + directional)
    }

    /// Simulate one symbol on one day.
    ///
    /// Returns `Ok(None)` when the day had no breakout.
    pub fn simulate_day(
        &self,
        series: &SymbolSeries,
        date: NaiveDate,
    ) -> Result<Option<Trade>, Skip> {
        let bars = series.day(date).ok_or(Skip::DataGap)?;
        if bars.len() < 2 {
            return Err(Skip::InsufficientBars);
        }

        let signal = match self.find_signal(series.symbol(), bars) {
            Some(signal) => signal,
            None => return Ok(None),
        };

        let premium = signal.trigger_price * self.config.premium_rate;
        if premium <= Decimal::ZERO {
            return Err(Skip::NonPositivePrice);
        }
        // Never below one contract once the premium is positive.
        let quantity =
            PositionSizer::breakout_contracts(self.config.risk_per_trade, premium).contracts;

        let stop_loss = premium * self.config.sl_multiplier;
        let take_profit = premium * self.config.tp_multiplier;

        debug!(
            symbol = %signal.symbol,
            direction = signal.direction.as_str(),
            trigger = %signal.trigger_price,
            volume = signal.trigger_volume,
            "Breakout signal"
        );

        let open = OpenTrade {
            symbol: signal.symbol.clone(),
            strategy: StrategyId::OdteBreakout,
            side: signal.direction.into(),
            entry_date: signal.day,
            entry_time: signal.timestamp,
            entry_underlying_price: signal.trigger_price,
            strike: atm_strike(signal.trigger_price),
            earnings_date: None,
            premium_estimate: premium,
            quantity,
            stop_loss_premium: Some(stop_loss),
            take_profit_premium: Some(take_profit),
        };

        let exit = self.walk_exit(&signal, &bars[signal.bar_index + 1..], premium, stop_loss, take_profit);
        let trade = open.close(exit);

        info!(
            symbol = %trade.symbol,
            side = trade.side.as_str(),
            outcome = trade.outcome.as_str(),
            quantity = trade.quantity,
            pnl = %trade.realized_pnl,
            "Breakout trade closed"
        );

        Ok(Some(trade))
    }

    /// Walk the bars after the signal until stop or target. Stop is checked
    /// first on each bar.
    fn walk_exit(
        &self,
        signal: &Signal,
        remaining: &[Bar],
        premium: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> TradeExit {
        let mut last = None;

        for bar in remaining {
            let current = Self::reprice(premium, signal.direction, signal.trigger_price, bar.close);

            if current <= stop_loss {
                return TradeExit {
                    exit_time: bar.timestamp,
                    exit_underlying_price: bar.close,
                    exit_premium: stop_loss,
                    outcome: TradeOutcome::StopLoss,
                };
            }
            if current >= take_profit {
                return TradeExit {
                    exit_time: bar.timestamp,
                    exit_underlying_price: bar.close,
                    exit_premium: take_profit,
                    outcome: TradeOutcome::TakeProfit,
                };
            }
            last = Some((bar, current));
        }

        match last {
            Some((bar, current)) => TradeExit {
                exit_time: bar.timestamp,
                exit_underlying_price: bar.close,
                exit_premium: current,
                outcome: TradeOutcome::Expired,
            },
            // Signal on the day's last bar: the option expires worthless.
            None => TradeExit {
                exit_time: signal.timestamp,
                exit_underlying_price: signal.trigger_price,
                exit_premium: Decimal::ZERO,
                outcome: TradeOutcome::Expired,
            },
        }
    }

    /// Simulate every symbol for one day, in universe order.
    pub fn process_day(&self, date: NaiveDate, universe: &[SymbolSeries]) -> DayReport {
        let mut report = DayReport::default();

        for series in universe {
            match self.simulate_day(series, date) {
                Ok(Some(trade)) => report.trades.push(trade),
                Ok(None) => {}
                Err(skip) => {
                    debug!(symbol = %series.symbol(), date = %date, reason = %skip, "Skipped");
                    report.skip(series.symbol(), skip);
                }
            }
        }

        report
    }
}
