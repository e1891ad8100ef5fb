//! Performance metrics module.
//!
//! Provides performance calculations for a finished run:
//! - Win rate, profit factor
//! - Total and annualized return
//! - Maximum drawdown, volatility, Sharpe ratio

pub mod calculator;

pub use calculator::{MetricsCalculator, PerformanceMetrics};
