//! Trade records for backtesting.
//!
//! Handles the trade lifecycle for both strategies:
//! - Breakout: an `OpenTrade` built from a signal, sealed once by `close`
//! - Straddle: a `Straddle` held across days, sealed into a `Trade` at exit
//!
//! A sealed `Trade` always satisfies
//! `realized_pnl == (exit_premium - premium_estimate) * quantity`.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::{Bar, OptionType};

use super::config::StrategyId;

/// How a trade ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeOutcome {
    /// Premium reached the take-profit level.
    #[serde(rename = "TP")]
    TakeProfit,
    /// Premium fell to the stop-loss level.
    #[serde(rename = "SL")]
    StopLoss,
    /// Neither level was touched before the holding window ended.
    #[serde(rename = "EXPIRED")]
    Expired,
}

impl TradeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TakeProfit => "TP",
            Self::StopLoss => "SL",
            Self::Expired => "EXPIRED",
        }
    }
}

/// What was bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Call,
    Put,
    /// One call and one put at the same strike.
    Straddle,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::Put => "PUT",
            Self::Straddle => "STRADDLE",
        }
    }
}

impl From<OptionType> for TradeSide {
    fn from(option_type: OptionType) -> Self {
        match option_type {
            OptionType::Call => Self::Call,
            OptionType::Put => Self::Put,
        }
    }
}

/// A breakout detected on one bar. Consumed immediately to open a trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub symbol: String,
    pub direction: OptionType,
    pub trigger_price: Decimal,
    pub trigger_volume: i64,
    pub day: NaiveDate,
    pub timestamp: NaiveDateTime,
    /// Index of the signal bar within the day.
    pub bar_index: usize,
}

/// Strike closest to the underlying price (whole-dollar strikes).
pub fn atm_strike(price: Decimal) -> Decimal {
    price.round()
}

/// A completed trade for reporting. Never mutated after `OpenTrade::close`
/// or `Straddle::close` produces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub strategy: StrategyId,
    pub side: TradeSide,
    pub entry_date: NaiveDate,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_underlying_price: Decimal,
    pub exit_underlying_price: Decimal,
    pub strike: Decimal,
    /// Announcement the trade was opened for (straddles only).
    pub earnings_date: Option<NaiveDate>,
    /// Entry premium per contract (straddle: call + put).
    pub premium_estimate: Decimal,
    pub quantity: i64,
    pub stop_loss_premium: Option<Decimal>,
    pub take_profit_premium: Option<Decimal>,
    pub exit_premium: Decimal,
    pub realized_pnl: Decimal,
    pub outcome: TradeOutcome,
}

impl Trade {
    /// Check if trade was profitable.
    pub fn is_winner(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }

    /// Premium change as a percentage of the entry premium.
    pub fn pnl_pct(&self) -> f64 {
        if self.premium_estimate.is_zero() {
            return 0.0;
        }
        let ratio = (self.exit_premium / self.premium_estimate - Decimal::ONE) * Decimal::from(100);
        ratio.try_into().unwrap_or(0.0)
    }

    pub fn exit_date(&self) -> NaiveDate {
        self.exit_time.date()
    }

    /// Calendar days between entry and exit.
    pub fn days_held(&self) -> i64 {
        (self.exit_date() - self.entry_date).num_days()
    }
}

/// Exit side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeExit {
    pub exit_time: NaiveDateTime,
    pub exit_underlying_price: Decimal,
    pub exit_premium: Decimal,
    pub outcome: TradeOutcome,
}

/// Entry side of a trade, before its exit is known.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTrade {
    pub symbol: String,
    pub strategy: StrategyId,
    pub side: TradeSide,
    pub entry_date: NaiveDate,
    pub entry_time: NaiveDateTime,
    pub entry_underlying_price: Decimal,
    pub strike: Decimal,
    pub earnings_date: Option<NaiveDate>,
    pub premium_estimate: Decimal,
    pub quantity: i64,
    pub stop_loss_premium: Option<Decimal>,
    pub take_profit_premium: Option<Decimal>,
}

impl OpenTrade {
    /// Seal the trade. P&L is derived here and nowhere else.
    pub fn close(self, exit: TradeExit) -> Trade {
        let realized_pnl = (exit.exit_premium - self.premium_estimate) * Decimal::from(self.quantity);
        Trade {
            symbol: self.symbol,
            strategy: self.strategy,
            side: self.side,
            entry_date: self.entry_date,
            entry_time: self.entry_time,
            exit_time: exit.exit_time,
            entry_underlying_price: self.entry_underlying_price,
            exit_underlying_price: exit.exit_underlying_price,
            strike: self.strike,
            earnings_date: self.earnings_date,
            premium_estimate: self.premium_estimate,
            quantity: self.quantity,
            stop_loss_premium: self.stop_loss_premium,
            take_profit_premium: self.take_profit_premium,
            exit_premium: exit.exit_premium,
            realized_pnl,
            outcome: exit.outcome,
        }
    }
}

/// Status of a straddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StraddleStatus {
    Open,
    Closed,
}

/// An ATM call+put pair held across an earnings announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Straddle {
    pub symbol: String,
    pub strike: Decimal,
    pub entry_date: NaiveDate,
    pub entry_time: NaiveDateTime,
    pub earnings_date: NaiveDate,
    pub entry_underlying_price: Decimal,
    pub call_premium: Decimal,
    pub put_premium: Decimal,
    pub quantity: i64,
    pub status: StraddleStatus,
    pub exit_time: Option<NaiveDateTime>,
    pub exit_underlying_price: Option<Decimal>,
    pub exit_value: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
}

impl Straddle {
    /// Open a straddle at the entry bar's close.
    pub fn open(
        symbol: &str,
        earnings_date: NaiveDate,
        entry_bar: &Bar,
        call_premium: Decimal,
        put_premium: Decimal,
        quantity: i64,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            strike: atm_strike(entry_bar.close),
            entry_date: entry_bar.date(),
            entry_time: entry_bar.timestamp,
            earnings_date,
            entry_underlying_price: entry_bar.close,
            call_premium,
            put_premium,
            quantity,
            status: StraddleStatus::Open,
            exit_time: None,
            exit_underlying_price: None,
            exit_value: None,
            realized_pnl: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == StraddleStatus::Open
    }

    /// Combined premium paid per straddle.
    pub fn entry_cost(&self) -> Decimal {
        self.call_premium + self.put_premium
    }

    /// Absolute move of the underlying since entry, as a fraction.
    pub fn price_change_pct(&self, price: Decimal) -> Decimal {
        if self.entry_underlying_price.is_zero() {
            return Decimal::ZERO;
        }
        ((price - self.entry_underlying_price) / self.entry_underlying_price).abs()
    }

    /// Value per straddle at `price`: grows with the move once it reaches
    /// `min_expected_move`, otherwise half the entry cost is lost to decay.
    pub fn value_at(&self, price: Decimal, min_expected_move: Decimal) -> Decimal {
        let change = self.price_change_pct(price);
        if change >= min_expected_move {
            self.entry_cost() * (Decimal::ONE + change)
        } else {
            self.entry_cost() * Decimal::new(5, 1)
        }
    }

    /// Close at the exit bar's close and seal into a `Trade`.
    /// Returns `None` if the straddle is already closed.
    pub fn close(&mut self, exit_bar: &Bar, min_expected_move: Decimal) -> Option<Trade> {
        if !self.is_open() {
            return None;
        }

        let exit_value = self.value_at(exit_bar.close, min_expected_move);
        let trade = OpenTrade {
            symbol: self.symbol.clone(),
            strategy: StrategyId::EarningsStraddle,
            side: TradeSide::Straddle,
            entry_date: self.entry_date,
            entry_time: self.entry_time,
            entry_underlying_price: self.entry_underlying_price,
            strike: self.strike,
            earnings_date: Some(self.earnings_date),
            premium_estimate: self.entry_cost(),
            quantity: self.quantity,
            stop_loss_premium: None,
            take_profit_premium: None,
        }
        .close(TradeExit {
            exit_time: exit_bar.timestamp,
            exit_underlying_price: exit_bar.close,
            exit_premium: exit_value,
            outcome: TradeOutcome::Expired,
        });

        self.status = StraddleStatus::Closed;
        self.exit_time = Some(exit_bar.timestamp);
        self.exit_underlying_price = Some(exit_bar.close);
        self.exit_value = Some(exit_value);
        self.realized_pnl = Some(trade.realized_pnl);

        Some(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar_at(day: u32, close: Decimal) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 4, day)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap();
        Bar::new(ts, close, close, close, close, 1_000_000)
    }

    fn open_call() -> OpenTrade {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(9, 31, 0)
            .unwrap();
        OpenTrade {
            symbol: "SPY".to_string(),
            strategy: StrategyId::OdteBreakout,
            side: TradeSide::Call,
            entry_date: ts.date(),
            entry_time: ts,
            entry_underlying_price: dec!(101),
            strike: dec!(101),
            earnings_date: None,
            premium_estimate: dec!(1.515),
            quantity: 66,
            stop_loss_premium: Some(dec!(0.909)),
            take_profit_premium: Some(dec!(1.818)),
        }
    }

    #[test]
    fn test_close_derives_pnl() {
        let open = open_call();
        let exit_time = open.entry_time + chrono::Duration::minutes(5);
        let trade = open.close(TradeExit {
            exit_time,
            exit_underlying_price: dec!(122),
            exit_premium: dec!(1.818),
            outcome: TradeOutcome::TakeProfit,
        });

        assert_eq!(trade.realized_pnl, dec!(19.998));
        assert!(trade.is_winner());
        assert!((trade.pnl_pct() - 20.0).abs() < 1e-9);
        assert_eq!(trade.days_held(), 0);
    }

    #[test]
    fn test_losing_trade() {
        let open = open_call();
        let exit_time = open.entry_time;
        let trade = open.close(TradeExit {
            exit_time,
            exit_underlying_price: dec!(101),
            exit_premium: dec!(0),
            outcome: TradeOutcome::Expired,
        });
        assert_eq!(trade.realized_pnl, dec!(-99.99));
        assert!(!trade.is_winner());
        assert!((trade.pnl_pct() + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_atm_strike_rounding() {
        assert_eq!(atm_strike(dec!(187.42)), dec!(187));
        assert_eq!(atm_strike(dec!(187.51)), dec!(188));
        // Ties go to the even strike.
        assert_eq!(atm_strike(dec!(186.5)), dec!(186));
    }

    #[test]
    fn test_straddle_decay_loss() {
        // Entry 200, both legs 6.00, exit move 1% < 3%
        let mut straddle = Straddle::open(
            "TSLA",
            NaiveDate::from_ymd_opt(2024, 4, 23).unwrap(),
            &bar_at(22, dec!(200)),
            dec!(6.0),
            dec!(6.0),
            41,
        );
        assert_eq!(straddle.entry_cost(), dec!(12.0));

        let trade = straddle.close(&bar_at(24, dec!(202)), dec!(0.03)).unwrap();
        assert_eq!(trade.exit_premium, dec!(6.0));
        assert_eq!(trade.realized_pnl, dec!(-6.0) * dec!(41));
        assert_eq!(trade.outcome, TradeOutcome::Expired);
        assert_eq!(trade.side, TradeSide::Straddle);
        assert_eq!(trade.stop_loss_premium, None);
        assert!(!straddle.is_open());
    }

    #[test]
    fn test_straddle_gain_from_move() {
        let mut straddle = Straddle::open(
            "NVDA",
            NaiveDate::from_ymd_opt(2024, 4, 23).unwrap(),
            &bar_at(22, dec!(200)),
            dec!(6.0),
            dec!(6.0),
            2,
        );

        // 10% drop counts the same as a rise
        assert_eq!(straddle.price_change_pct(dec!(180)), dec!(0.1));
        assert_eq!(straddle.value_at(dec!(180), dec!(0.03)), dec!(13.2));

        let trade = straddle.close(&bar_at(24, dec!(180)), dec!(0.03)).unwrap();
        assert_eq!(trade.realized_pnl, dec!(2.4));
        assert_eq!(straddle.realized_pnl, Some(dec!(2.4)));
    }

    #[test]
    fn test_straddle_closes_once() {
        let mut straddle = Straddle::open(
            "AMD",
            NaiveDate::from_ymd_opt(2024, 4, 23).unwrap(),
            &bar_at(22, dec!(150)),
            dec!(4.5),
            dec!(4.5),
            55,
        );
        assert!(straddle.close(&bar_at(24, dec!(160)), dec!(0.03)).is_some());
        assert!(straddle.close(&bar_at(25, dec!(170)), dec!(0.03)).is_none());
        assert_eq!(straddle.exit_underlying_price, Some(dec!(160)));
    }

    #[test]
    fn test_outcome_serde_labels() {
        assert_eq!(serde_json::to_string(&TradeOutcome::TakeProfit).unwrap(), "\"TP\"");
        assert_eq!(serde_json::to_string(&TradeOutcome::StopLoss).unwrap(), "\"SL\"");
        assert_eq!(serde_json::to_string(&TradeOutcome::Expired).unwrap(), "\"EXPIRED\"");
    }
}
