//! Backtest configuration.
//!
//! Strategy parameters are plain serde structs with defaults, so a settings
//! file only needs to name the values it overrides. Everything is validated
//! before any market data is requested.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Granularity;

/// Largest day offset or spacing accepted in a straddle config (ten years).
pub const MAX_DAY_OFFSET: i64 = 3650;

/// Configuration errors. All of them are fatal and raised before a run starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Strategy {strategy} cannot run with a {config} configuration")]
    StrategyMismatch {
        strategy: StrategyId,
        config: StrategyId,
    },

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Initial capital must be positive, got {0}")]
    InvalidCapital(Decimal),

    #[error("Unknown strategy '{0}' (expected odte_breakout or earnings_straddle)")]
    UnknownStrategy(String),

    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Which strategy a run simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    OdteBreakout,
    EarningsStraddle,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OdteBreakout => "odte_breakout",
            Self::EarningsStraddle => "earnings_straddle",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "odte_breakout" => Ok(Self::OdteBreakout),
            "earnings_straddle" => Ok(Self::EarningsStraddle),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Inclusive calendar range of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Monday through Friday between start and end, inclusive. Holidays are
    /// included; they simply have no bars.
    pub fn trading_days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut current = self.start;
        while current <= self.end {
            if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                days.push(current);
            }
            current += Duration::days(1);
        }
        days
    }

    /// Elapsed calendar days (`end - start`).
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

fn default_breakout_tickers() -> Vec<String> {
    ["SPY", "QQQ", "TSLA", "NVDA", "META", "AMD", "AMZN", "AAPL"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_straddle_tickers() -> Vec<String> {
    ["TSLA", "NFLX", "NVDA", "AMD", "META", "AMZN", "AAPL", "MSFT"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Parameters for the 0DTE opening-range breakout strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutConfig {
    /// Symbols scanned each day, in processing order.
    pub tickers: Vec<String>,

    /// Breakout bar volume must exceed opening volume times this.
    #[serde(with = "rust_decimal::serde::float")]
    pub volume_multiplier: Decimal,

    /// Option premium as a fraction of the underlying price.
    #[serde(with = "rust_decimal::serde::float")]
    pub premium_rate: Decimal,

    /// Stop-loss premium as a multiple of entry premium.
    #[serde(with = "rust_decimal::serde::float")]
    pub sl_multiplier: Decimal,

    /// Take-profit premium as a multiple of entry premium.
    #[serde(with = "rust_decimal::serde::float")]
    pub tp_multiplier: Decimal,

    /// Dollar budget per trade.
    #[serde(with = "rust_decimal::serde::float")]
    pub risk_per_trade: Decimal,

    /// Intraday bar size requested from the provider.
    pub granularity: Granularity,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            tickers: default_breakout_tickers(),
            volume_multiplier: Decimal::new(12, 1),
            premium_rate: Decimal::new(15, 3),
            sl_multiplier: Decimal::new(6, 1),
            tp_multiplier: Decimal::new(12, 1),
            risk_per_trade: Decimal::from(100),
            granularity: Granularity::Minute,
        }
    }
}

impl BreakoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_unique_tickers(&self.tickers)?;
        require_positive("volume_multiplier", self.volume_multiplier)?;
        require_positive("premium_rate", self.premium_rate)?;
        require_positive("sl_multiplier", self.sl_multiplier)?;
        require_positive("tp_multiplier", self.tp_multiplier)?;
        require_positive("risk_per_trade", self.risk_per_trade)?;
        if self.sl_multiplier >= self.tp_multiplier {
            return Err(ConfigError::InvalidParameter {
                name: "sl_multiplier",
                reason: format!(
                    "must be below tp_multiplier ({} >= {})",
                    self.sl_multiplier, self.tp_multiplier
                ),
            });
        }
        Ok(())
    }
}

/// Parameters for the pre-earnings straddle strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StraddleConfig {
    /// Symbols considered, in processing order.
    pub tickers: Vec<String>,

    /// Calendar days before earnings to open.
    pub entry_days_before: i64,

    /// Calendar days after earnings to close.
    pub exit_days_after: i64,

    /// Minimum absolute move (fraction) for the straddle to gain value.
    #[serde(with = "rust_decimal::serde::float")]
    pub min_expected_move: Decimal,

    /// Each leg's premium as a fraction of the underlying price.
    #[serde(with = "rust_decimal::serde::float")]
    pub straddle_premium_rate: Decimal,

    /// Dollar budget per straddle.
    #[serde(with = "rust_decimal::serde::float")]
    pub capital_per_trade: Decimal,

    /// Spacing of the synthetic calendar used when a symbol has no dates.
    pub synthetic_spacing_days: i64,

    /// Bar size requested from the provider.
    pub granularity: Granularity,
}

impl Default for StraddleConfig {
    fn default() -> Self {
        Self {
            tickers: default_straddle_tickers(),
            entry_days_before: 1,
            exit_days_after: 1,
            min_expected_move: Decimal::new(3, 2),
            straddle_premium_rate: Decimal::new(3, 2),
            capital_per_trade: Decimal::from(500),
            synthetic_spacing_days: 90,
            granularity: Granularity::Day,
        }
    }
}

impl StraddleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_unique_tickers(&self.tickers)?;
        require_day_offset("entry_days_before", self.entry_days_before, 0)?;
        require_day_offset("exit_days_after", self.exit_days_after, 0)?;
        if self.min_expected_move < Decimal::ZERO {
            return Err(ConfigError::InvalidParameter {
                name: "min_expected_move",
                reason: format!("must be >= 0, got {}", self.min_expected_move),
            });
        }
        require_positive("straddle_premium_rate", self.straddle_premium_rate)?;
        require_positive("capital_per_trade", self.capital_per_trade)?;
        require_day_offset("synthetic_spacing_days", self.synthetic_spacing_days, 1)?;
        Ok(())
    }
}

/// Tickers must be present and each listed once.
fn require_unique_tickers(tickers: &[String]) -> Result<(), ConfigError> {
    if tickers.is_empty() {
        return Err(ConfigError::MissingParameter("tickers"));
    }
    let mut seen = HashSet::new();
    for ticker in tickers {
        if !seen.insert(ticker.as_str()) {
            return Err(ConfigError::InvalidParameter {
                name: "tickers",
                reason: format!("duplicate ticker {}", ticker),
            });
        }
    }
    Ok(())
}

fn require_day_offset(name: &'static str, days: i64, min: i64) -> Result<(), ConfigError> {
    if days < min || days > MAX_DAY_OFFSET {
        return Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be in {}..={} days, got {}", min, MAX_DAY_OFFSET, days),
        });
    }
    Ok(())
}

fn require_positive(name: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO {
        return Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be > 0, got {}", value),
        });
    }
    Ok(())
}

/// Strategy-specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyConfig {
    OdteBreakout(BreakoutConfig),
    EarningsStraddle(StraddleConfig),
}

impl StrategyConfig {
    /// Default parameters for a strategy.
    pub fn default_for(strategy: StrategyId) -> Self {
        match strategy {
            StrategyId::OdteBreakout => Self::OdteBreakout(BreakoutConfig::default()),
            StrategyId::EarningsStraddle => Self::EarningsStraddle(StraddleConfig::default()),
        }
    }

    pub fn strategy(&self) -> StrategyId {
        match self {
            Self::OdteBreakout(_) => StrategyId::OdteBreakout,
            Self::EarningsStraddle(_) => StrategyId::EarningsStraddle,
        }
    }

    pub fn tickers(&self) -> &[String] {
        match self {
            Self::OdteBreakout(c) => &c.tickers,
            Self::EarningsStraddle(c) => &c.tickers,
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            Self::OdteBreakout(c) => c.granularity,
            Self::EarningsStraddle(c) => c.granularity,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::OdteBreakout(c) => c.validate(),
            Self::EarningsStraddle(c) => c.validate(),
        }
    }
}

/// Configuration for backtest execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Strategy to simulate.
    pub strategy: StrategyId,

    /// Simulated calendar range.
    pub range: DateRange,

    /// Starting equity.
    pub initial_capital: Decimal,

    /// Strategy parameters; must match `strategy`.
    pub strategy_config: StrategyConfig,
}

impl BacktestConfig {
    pub fn new(
        strategy: StrategyId,
        range: DateRange,
        initial_capital: Decimal,
        strategy_config: StrategyConfig,
    ) -> Self {
        Self {
            strategy,
            range,
            initial_capital,
            strategy_config,
        }
    }

    /// Check every rule a run depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.range.start > self.range.end {
            return Err(ConfigError::InvalidDateRange {
                start: self.range.start,
                end: self.range.end,
            });
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(ConfigError::InvalidCapital(self.initial_capital));
        }
        let configured = self.strategy_config.strategy();
        if configured != self.strategy {
            return Err(ConfigError::StrategyMismatch {
                strategy: self.strategy,
                config: configured,
            });
        }
        self.strategy_config.validate()
    }
}

/// Settings file: one optional table per strategy.
///
/// ```toml
/// [odte_breakout]
/// tickers = ["SPY", "QQQ"]
/// risk_per_trade = 250.0
///
/// [earnings_straddle]
/// capital_per_trade = 1000.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub odte_breakout: BreakoutConfig,
    pub earnings_straddle: StraddleConfig,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parameters for one strategy.
    pub fn strategy_config(&self, strategy: StrategyId) -> StrategyConfig {
        match strategy {
            StrategyId::OdteBreakout => StrategyConfig::OdteBreakout(self.odte_breakout.clone()),
            StrategyId::EarningsStraddle => {
                StrategyConfig::EarningsStraddle(self.earnings_straddle.clone())
            }
        }
    }
}
