//! Validation module for bar data.
//!
//! Integrity checks over a symbol's bars (ordering, prices, OHLC ranges,
//! volume, continuity), reported as pass/fail results.

pub mod series;

pub use series::{check_series, CheckResult, SeriesReport};
