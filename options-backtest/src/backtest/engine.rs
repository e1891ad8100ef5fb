//! Core backtesting engine.
//!
//! Runs the simulation loop:
//! 1. Validate the configuration
//! 2. Load and order-check every symbol's bars
//! 3. Resolve earnings calendars (straddle only)
//! 4. For each weekday in range, run the strategy's simulator
//! 5. Record the day's realized P&L as one equity snapshot
//! 6. Derive performance metrics

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{
    BarSeriesProvider, EarningsCalendarProvider, Granularity, InMemoryEarningsCalendar,
    SeriesError, SymbolSeries, SyntheticEarningsCalendar,
};
use crate::metrics::{MetricsCalculator, PerformanceMetrics};
use crate::validation::check_series;

use super::breakout::BreakoutSimulator;
use super::config::{
    BacktestConfig, BreakoutConfig, ConfigError, DateRange, StraddleConfig, StrategyConfig,
    StrategyId,
};
use super::equity::{EquityCurve, EquityTracker};
use super::outcome::{DayReport, SkipCounters};
use super::straddle::{StraddleBook, StraddleSimulator};
use super::trade::{Straddle, Trade};

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bar series error: {0}")]
    Series(#[from] SeriesError),
}

/// Result of a completed backtest.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    /// Strategy simulated.
    pub strategy: StrategyId,

    /// Start date.
    pub start_date: NaiveDate,

    /// End date.
    pub end_date: NaiveDate,

    /// All completed trades, in the order they closed.
    pub trades: Vec<Trade>,

    /// Seed capital plus one snapshot per simulated weekday.
    pub equity_curve: EquityCurve,

    /// Derived statistics.
    pub metrics: PerformanceMetrics,

    /// Skipped symbol-days by reason.
    pub skips: SkipCounters,

    /// Straddles still open when the range ended (not realized).
    pub open_straddles: Vec<Straddle>,
}

impl BacktestResult {
    /// Sum of realized P&L over the trade log.
    pub fn total_pnl(&self) -> Decimal {
        self.trades.iter().map(|t| t.realized_pnl).sum()
    }

    pub fn final_equity(&self) -> Decimal {
        self.equity_curve.final_equity()
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        format!(
            "Backtest Results: {} ({} to {})\n\
             ----------------------------------------\n\
             Total Return: {:.2}%\n\
             Final Equity: ${:.2}\n\
             Max Drawdown: {:.2}%\n\
             Sharpe Ratio: {:.2}\n\
             \n\
             Trades: {} (W: {}, L: {})\n\
             Win Rate: {:.1}%\n\
             Profit Factor: {:.2}\n\
             Net Profit: ${:.2}\n\
             \n\
             Skipped: {}\n\
             Open Straddles: {}",
            self.strategy,
            self.start_date,
            self.end_date,
            self.metrics.total_return_pct,
            self.final_equity(),
            self.metrics.max_drawdown_pct,
            self.metrics.sharpe_ratio,
            self.metrics.total_trades,
            self.metrics.winning_trades,
            self.metrics.losing_trades,
            self.metrics.win_rate * 100.0,
            self.metrics.profit_factor,
            self.metrics.net_profit,
            self.skips,
            self.open_straddles.len(),
        )
    }
}

/// The main backtesting engine.
///
/// Owns nothing but its configuration; each `run` builds a fresh equity
/// tracker and straddle book, so runs are independent and deterministic.
pub struct BacktestEngine<'a> {
    config: BacktestConfig,
    bars: &'a dyn BarSeriesProvider,
    earnings: &'a dyn EarningsCalendarProvider,
}

impl<'a> BacktestEngine<'a> {
    /// Create a new backtest engine.
    pub fn new(
        config: BacktestConfig,
        bars: &'a dyn BarSeriesProvider,
        earnings: &'a dyn EarningsCalendarProvider,
    ) -> Self {
        Self {
            config,
            bars,
            earnings,
        }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the configured strategy over the configured range.
    pub fn run(&self) -> Result<BacktestResult, BacktestError> {
        self.config.validate()?;

        let range = self.config.range;
        info!(
            strategy = %self.config.strategy,
            start = %range.start,
            end = %range.end,
            capital = %self.config.initial_capital,
            "Starting backtest"
        );

        let mut tracker = EquityTracker::new(self.config.initial_capital);
        let mut trades = Vec::new();
        let mut skips = SkipCounters::default();
        let mut open_straddles = Vec::new();

        match &self.config.strategy_config {
            StrategyConfig::OdteBreakout(config) => {
                self.run_breakout(config, &mut tracker, &mut trades, &mut skips)?;
            }
            StrategyConfig::EarningsStraddle(config) => {
                open_straddles = self.run_straddle(config, &mut tracker, &mut trades, &mut skips)?;
            }
        }

        let equity_curve = tracker.into_curve();
        let metrics = MetricsCalculator::calculate(&trades, &equity_curve, range.calendar_days());

        info!(
            trades = trades.len(),
            final_equity = %equity_curve.final_equity(),
            skipped = skips.total(),
            "Backtest complete"
        );

        Ok(BacktestResult {
            strategy: self.config.strategy,
            start_date: range.start,
            end_date: range.end,
            trades,
            equity_curve,
            metrics,
            skips,
            open_straddles,
        })
    }

    fn run_breakout(
        &self,
        config: &BreakoutConfig,
        tracker: &mut EquityTracker,
        trades: &mut Vec<Trade>,
        skips: &mut SkipCounters,
    ) -> Result<(), BacktestError> {
        let universe = self.load_universe(&config.tickers, config.granularity)?;
        let simulator = BreakoutSimulator::new(config.clone());

        for date in self.config.range.trading_days() {
            let report = simulator.process_day(date, &universe);
            Self::record_day(date, report, tracker, trades, skips);
        }
        Ok(())
    }

    fn run_straddle(
        &self,
        config: &StraddleConfig,
        tracker: &mut EquityTracker,
        trades: &mut Vec<Trade>,
        skips: &mut SkipCounters,
    ) -> Result<Vec<Straddle>, BacktestError> {
        let range = self.config.range;
        let universe = self.load_universe(&config.tickers, config.granularity)?;
        let calendar = self.resolve_calendar(&config.tickers, range, config.synthetic_spacing_days);
        let simulator = StraddleSimulator::new(config.clone());
        let mut book = StraddleBook::new();

        for date in range.trading_days() {
            let report = simulator.process_day(date, range.start, &universe, &calendar, &mut book);
            Self::record_day(date, report, tracker, trades, skips);
        }

        let open = book.into_open();
        for straddle in &open {
            warn!(
                symbol = %straddle.symbol,
                earnings = %straddle.earnings_date,
                entry = %straddle.entry_date,
                "Straddle still open at end of backtest, not realized"
            );
        }
        Ok(open)
    }

    fn record_day(
        date: NaiveDate,
        report: DayReport,
        tracker: &mut EquityTracker,
        trades: &mut Vec<Trade>,
        skips: &mut SkipCounters,
    ) {
        let pnl = report.pnl();
        tracker.apply_daily_pnl(date, pnl);
        debug!(
            date = %date,
            trades = report.trades.len(),
            pnl = %pnl,
            equity = %tracker.current_capital(),
            "Day processed"
        );

        for (_, skip) in report.skips {
            skips.record(skip);
        }
        trades.extend(report.trades);
    }

    /// Fetch every ticker's bars. A provider failure leaves that symbol
    /// without data; bars out of order abort the run.
    fn load_universe(
        &self,
        tickers: &[String],
        granularity: Granularity,
    ) -> Result<Vec<SymbolSeries>, SeriesError> {
        let range = self.config.range;
        let mut universe = Vec::with_capacity(tickers.len());

        for ticker in tickers {
            let bars = match self.bars.get_series(ticker, range.start, range.end, granularity) {
                Ok(bars) => bars,
                Err(e) => {
                    warn!(symbol = %ticker, error = %e, "Failed to load bars, symbol has no data");
                    universe.push(SymbolSeries::empty(ticker.as_str()));
                    continue;
                }
            };

            let report = check_series(ticker, &bars);
            for check in report.failed_checks() {
                warn!(
                    symbol = %ticker,
                    check = %check.name,
                    details = check.details.as_deref().unwrap_or(""),
                    "{}",
                    check.message
                );
            }

            let series = SymbolSeries::new(ticker.as_str(), bars)?;
            debug!(symbol = %ticker, bars = series.bars().len(), days = series.trading_days(), "Loaded");
            universe.push(series);
        }

        Ok(universe)
    }

    /// Real calendar dates per ticker, falling back to a synthetic schedule
    /// for tickers that have none.
    fn resolve_calendar(
        &self,
        tickers: &[String],
        range: DateRange,
        spacing_days: i64,
    ) -> InMemoryEarningsCalendar {
        let synthetic = SyntheticEarningsCalendar::new(range.start, range.end, spacing_days);
        let mut calendar = InMemoryEarningsCalendar::new();

        for ticker in tickers {
            let mut dates = self.earnings.get_dates(ticker);
            if dates.is_empty() {
                warn!(
                    symbol = %ticker,
                    spacing_days,
                    "No earnings dates, using synthetic calendar"
                );
                dates = synthetic.get_dates(ticker);
            }
            calendar = calendar.with_dates(ticker, dates);
        }

        calendar
    }
}

/// Single entry point: validate, simulate, and measure one run.
pub fn run_backtest(
    strategy: StrategyId,
    range: DateRange,
    initial_capital: Decimal,
    strategy_config: StrategyConfig,
    bars: &dyn BarSeriesProvider,
    earnings: &dyn EarningsCalendarProvider,
) -> Result<BacktestResult, BacktestError> {
    let config = BacktestConfig::new(strategy, range, initial_capital, strategy_config);
    BacktestEngine::new(config, bars, earnings).run()
}
