//! Performance metrics calculator.
//!
//! Pure function of the trade log, the equity curve and the run length.
//! Degenerate inputs (no trades, flat equity, no losses) resolve to fixed
//! sentinel values instead of failing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::backtest::{EquityCurve, Trade};

/// Trading days per year used to annualize volatility.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Basic statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    /// Trades with `realized_pnl <= 0`.
    pub losing_trades: usize,
    pub win_rate: f64,

    // P&L metrics
    pub gross_profit: Decimal,
    /// Sum of non-positive P&L (zero or negative).
    pub gross_loss: Decimal,
    pub net_profit: Decimal,
    #[serde(with = "non_finite")]
    pub profit_factor: f64,
    pub avg_trade_pnl: Decimal,
    pub avg_winner: Decimal,
    pub avg_loser: Decimal,
    pub largest_winner: Decimal,
    pub largest_loser: Decimal,

    // Return metrics
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub total_return_pct: f64,
    #[serde(with = "non_finite")]
    pub annual_return_pct: f64,

    // Risk metrics
    pub max_drawdown_pct: f64,
    #[serde(with = "non_finite")]
    pub volatility_pct: f64,
    #[serde(with = "non_finite")]
    pub sharpe_ratio: f64,

    // Time metrics
    /// Simulated trading days (equity snapshots after the seed).
    pub trading_days: usize,
    /// Calendar days between start and end date.
    pub period_days: i64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            net_profit: Decimal::ZERO,
            profit_factor: 0.0,
            avg_trade_pnl: Decimal::ZERO,
            avg_winner: Decimal::ZERO,
            avg_loser: Decimal::ZERO,
            largest_winner: Decimal::ZERO,
            largest_loser: Decimal::ZERO,
            initial_capital: Decimal::ZERO,
            final_capital: Decimal::ZERO,
            total_return_pct: 0.0,
            annual_return_pct: 0.0,
            max_drawdown_pct: 0.0,
            volatility_pct: 0.0,
            sharpe_ratio: 0.0,
            trading_days: 0,
            period_days: 0,
        }
    }
}

impl PerformanceMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Performance Summary\n\
             ====================\n\
             \n\
             Initial Capital: ${:.2}\n\
             Final Capital: ${:.2}\n\
             Total Return: {:.2}%\n\
             Annual Return: {:.2}%\n\
             Max Drawdown: {:.2}%\n\
             Volatility: {:.2}%\n\
             Sharpe Ratio: {:.2}\n\
             \n\
             Trades: {} (W: {}, L: {})\n\
             Win Rate: {:.1}%\n\
             Profit Factor: {:.2}\n\
             Gross Profit: ${:.2}\n\
             Gross Loss: ${:.2}\n\
             Net Profit: ${:.2}\n\
             Avg Trade: ${:.2}\n\
             Avg Winner: ${:.2}\n\
             Avg Loser: ${:.2}\n\
             Largest Win: ${:.2}\n\
             Largest Loss: ${:.2}",
            self.initial_capital,
            self.final_capital,
            self.total_return_pct,
            self.annual_return_pct,
            self.max_drawdown_pct,
            self.volatility_pct,
            self.sharpe_ratio,
            self.total_trades,
            self.winning_trades,
            self.losing_trades,
            self.win_rate * 100.0,
            self.profit_factor,
            self.gross_profit,
            self.gross_loss,
            self.net_profit,
            self.avg_trade_pnl,
            self.avg_winner,
            self.avg_loser,
            self.largest_winner,
            self.largest_loser,
        )
    }
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics for a finished run.
    pub fn calculate(
        trades: &[Trade],
        equity_curve: &EquityCurve,
        period_days: i64,
    ) -> PerformanceMetrics {
        // Basic counts
        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        let losing_trades = total_trades - winning_trades;
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        // P&L
        let gross_profit: Decimal = trades
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| t.realized_pnl)
            .sum();
        let gross_loss: Decimal = trades
            .iter()
            .filter(|t| !t.is_winner())
            .map(|t| t.realized_pnl)
            .sum();
        let net_profit = gross_profit + gross_loss;
        let profit_factor = Self::profit_factor(gross_profit, gross_loss);

        let avg_trade_pnl = Self::average(net_profit, total_trades);
        let avg_winner = Self::average(gross_profit, winning_trades);
        let avg_loser = Self::average(gross_loss, losing_trades);

        let largest_winner = trades
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| t.realized_pnl)
            .max()
            .unwrap_or(Decimal::ZERO);
        let largest_loser = trades
            .iter()
            .filter(|t| !t.is_winner())
            .map(|t| t.realized_pnl)
            .min()
            .unwrap_or(Decimal::ZERO);

        // Returns
        let values: Vec<f64> = equity_curve
            .values()
            .into_iter()
            .map(|v| f64::try_from(v).unwrap_or(0.0))
            .collect();
        let initial = values.first().copied().unwrap_or(0.0);
        let last = values.last().copied().unwrap_or(0.0);
        let total_return_pct = if initial != 0.0 {
            (last / initial - 1.0) * 100.0
        } else {
            0.0
        };
        let annual_return_pct = Self::annual_return_pct(total_return_pct, period_days);

        // Risk
        let max_drawdown_pct = Self::max_drawdown_pct(&values);
        let volatility_pct = Self::volatility_pct(&Self::daily_returns(&values));
        let sharpe_ratio = if volatility_pct > 0.0 {
            (annual_return_pct / 100.0) / (volatility_pct / 100.0)
        } else {
            0.0
        };

        PerformanceMetrics {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            gross_profit,
            gross_loss,
            net_profit,
            profit_factor,
            avg_trade_pnl,
            avg_winner,
            avg_loser,
            largest_winner,
            largest_loser,
            initial_capital: equity_curve.initial(),
            final_capital: equity_curve.final_equity(),
            total_return_pct,
            annual_return_pct,
            max_drawdown_pct,
            volatility_pct,
            sharpe_ratio,
            trading_days: equity_curve.points().len(),
            period_days,
        }
    }

    fn average(total: Decimal, count: usize) -> Decimal {
        if count == 0 {
            return Decimal::ZERO;
        }
        total / Decimal::from(count as i64)
    }

    /// `gross_profit / |gross_loss|`; infinite with wins and no losses,
    /// zero with neither.
    pub fn profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> f64 {
        let loss: f64 = gross_loss.abs().try_into().unwrap_or(0.0);
        let profit: f64 = gross_profit.abs().try_into().unwrap_or(0.0);
        if loss == 0.0 {
            return if profit > 0.0 { f64::INFINITY } else { 0.0 };
        }
        profit / loss
    }

    /// Compound the total return to a 365-day year.
    pub fn annual_return_pct(total_return_pct: f64, period_days: i64) -> f64 {
        if period_days <= 0 {
            return 0.0;
        }
        let growth = 1.0 + total_return_pct / 100.0;
        if growth <= 0.0 {
            return -100.0;
        }
        (growth.powf(365.0 / period_days as f64) - 1.0) * 100.0
    }

    /// Largest peak-to-trough decline, as a percentage of the peak.
    pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
        let mut running_max = f64::NEG_INFINITY;
        let mut max_drawdown = 0.0_f64;

        for &value in equity {
            running_max = running_max.max(value);
            if running_max > 0.0 {
                let drawdown = (running_max - value) / running_max;
                max_drawdown = max_drawdown.max(drawdown);
            }
        }

        max_drawdown * 100.0
    }

    /// Day-over-day returns. A zero previous value yields a zero return.
    pub fn daily_returns(equity: &[f64]) -> Vec<f64> {
        equity
            .windows(2)
            .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
            .collect()
    }

    /// Annualized population standard deviation of daily returns, in percent.
    pub fn volatility_pct(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let std_dev = returns.iter().population_std_dev();
        if !std_dev.is_finite() {
            return 0.0;
        }
        std_dev * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
    }
}

/// Serde support for floats that may be infinite or NaN. Finite values are
/// plain numbers; others are the strings `"inf"`, `"-inf"` and `"NaN"`.
pub mod non_finite {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FloatVisitor)
    }

    struct FloatVisitor;

    impl<'de> Visitor<'de> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or one of \"inf\", \"-inf\", \"NaN\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            v.parse::<f64>().map_err(E::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{EquityTracker, OpenTrade, StrategyId, TradeExit, TradeOutcome, TradeSide};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn trade_with_pnl(exit_premium: Decimal) -> Trade {
        let ts = date(2).and_hms_opt(9, 31, 0).unwrap();
        OpenTrade {
            symbol: "SPY".to_string(),
            strategy: StrategyId::OdteBreakout,
            side: TradeSide::Call,
            entry_date: ts.date(),
            entry_time: ts,
            entry_underlying_price: dec!(100),
            strike: dec!(100),
            earnings_date: None,
            premium_estimate: dec!(1.5),
            quantity: 10,
            stop_loss_premium: Some(dec!(0.9)),
            take_profit_premium: Some(dec!(1.8)),
        }
        .close(TradeExit {
            exit_time: ts,
            exit_underlying_price: dec!(100),
            exit_premium,
            outcome: TradeOutcome::Expired,
        })
    }

    fn curve(pnls: &[Decimal]) -> EquityCurve {
        let mut tracker = EquityTracker::new(dec!(10000));
        for (i, pnl) in pnls.iter().enumerate() {
            tracker.apply_daily_pnl(date(2 + i as u32), *pnl);
        }
        tracker.into_curve()
    }

    #[test]
    fn test_max_drawdown() {
        let dd = MetricsCalculator::max_drawdown_pct(&[10000.0, 10500.0, 9800.0, 11000.0]);
        assert!((dd - 6.666_666_666_666_667).abs() < 1e-9);
        assert!((dd - 6.67).abs() < 0.01);
    }

    #[test]
    fn test_degenerate_run() {
        let metrics = MetricsCalculator::calculate(&[], &EquityCurve::new(dec!(10000)), 0);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.profit_factor, 0.0);
        assert_eq!(metrics.total_return_pct, 0.0);
        assert_eq!(metrics.annual_return_pct, 0.0);
        assert_eq!(metrics.max_drawdown_pct, 0.0);
        assert_eq!(metrics.volatility_pct, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.final_capital, dec!(10000));
    }

    #[test]
    fn test_profit_factor() {
        assert_eq!(MetricsCalculator::profit_factor(dec!(15000), dec!(-5000)), 3.0);
        assert_eq!(
            MetricsCalculator::profit_factor(dec!(100), dec!(0)),
            f64::INFINITY
        );
        assert_eq!(MetricsCalculator::profit_factor(dec!(0), dec!(0)), 0.0);
        assert_eq!(MetricsCalculator::profit_factor(dec!(0), dec!(-50)), 0.0);
    }

    #[test]
    fn test_trade_statistics() {
        // +3.0, -6.0, 0 (counts as a loss)
        let trades = vec![
            trade_with_pnl(dec!(1.8)),
            trade_with_pnl(dec!(0.9)),
            trade_with_pnl(dec!(1.5)),
        ];
        let equity = curve(&[dec!(3), dec!(-6), dec!(0)]);
        let metrics = MetricsCalculator::calculate(&trades, &equity, 3);

        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.losing_trades, 2);
        assert!((metrics.win_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(metrics.gross_profit, dec!(3.0));
        assert_eq!(metrics.gross_loss, dec!(-6.0));
        assert_eq!(metrics.net_profit, dec!(-3.0));
        assert_eq!(metrics.profit_factor, 0.5);
        assert_eq!(metrics.avg_loser, dec!(-3.0));
        assert_eq!(metrics.largest_winner, dec!(3.0));
        assert_eq!(metrics.largest_loser, dec!(-6.0));
        assert_eq!(metrics.final_capital, dec!(9997));
        assert!((metrics.total_return_pct - (-0.03)).abs() < 1e-9);
        assert_eq!(metrics.trading_days, 3);
    }

    #[test]
    fn test_annual_return() {
        // 10% over exactly one year
        assert!((MetricsCalculator::annual_return_pct(10.0, 365) - 10.0).abs() < 1e-9);
        assert_eq!(MetricsCalculator::annual_return_pct(10.0, 0), 0.0);
        assert_eq!(MetricsCalculator::annual_return_pct(-100.0, 30), -100.0);
    }

    #[test]
    fn test_volatility_and_sharpe() {
        let returns = MetricsCalculator::daily_returns(&[100.0, 101.0, 100.0]);
        assert_eq!(returns.len(), 2);
        let vol = MetricsCalculator::volatility_pct(&returns);
        // Population std of [0.01, -0.0099...]
        let mean = (returns[0] + returns[1]) / 2.0;
        let std = (((returns[0] - mean).powi(2) + (returns[1] - mean).powi(2)) / 2.0).sqrt();
        assert!((vol - std * 252.0_f64.sqrt() * 100.0).abs() < 1e-9);

        let flat = MetricsCalculator::calculate(&[], &curve(&[dec!(0), dec!(0)]), 10);
        assert_eq!(flat.volatility_pct, 0.0);
        assert_eq!(flat.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_zero_previous_equity_return() {
        assert_eq!(MetricsCalculator::daily_returns(&[0.0, 5.0]), vec![0.0]);
    }

    #[test]
    fn test_idempotent() {
        let trades = vec![trade_with_pnl(dec!(1.8)), trade_with_pnl(dec!(0.9))];
        let equity = curve(&[dec!(3), dec!(-6)]);
        let a = MetricsCalculator::calculate(&trades, &equity, 2);
        let b = MetricsCalculator::calculate(&trades, &equity, 2);
        assert_eq!(a, b);
        assert_eq!(a.sharpe_ratio.to_bits(), b.sharpe_ratio.to_bits());
    }

    #[test]
    fn test_infinite_profit_factor_round_trip() {
        let metrics = PerformanceMetrics {
            profit_factor: f64::INFINITY,
            ..Default::default()
        };
        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"profit_factor\":\"inf\""));

        let back: PerformanceMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.profit_factor, f64::INFINITY);
    }
}
