//! Backtesting engine for intraday breakout and pre-earnings straddle strategies.
//!
//! This module provides a complete day-by-day simulation:
//! - Strategy configuration and validation
//! - Breakout detection and intraday exit simulation
//! - Straddle entry/exit scheduling around earnings
//! - Equity tracking and the run driver

pub mod breakout;
pub mod config;
pub mod engine;
pub mod equity;
pub mod outcome;
pub mod straddle;
pub mod trade;

pub use breakout::{BreakoutSimulator, OpeningRange};
pub use config::{
    BacktestConfig, BreakoutConfig, ConfigError, DateRange, Settings, StraddleConfig,
    StrategyConfig, StrategyId,
};
pub use engine::{run_backtest, BacktestEngine, BacktestError, BacktestResult};
pub use equity::{EquityCurve, EquityPoint, EquityTracker};
pub use outcome::{DayReport, Skip, SkipCounters};
pub use straddle::{StraddleBook, StraddleSimulator};
pub use trade::{
    atm_strike, OpenTrade, Signal, Straddle, StraddleStatus, Trade, TradeExit, TradeOutcome,
    TradeSide,
};
