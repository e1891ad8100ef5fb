pub mod backtest;
pub mod data;
pub mod metrics;
pub mod report;
pub mod risk;
pub mod validation;

// Re-export commonly used types
pub use data::{Bar, BarSeriesProvider, EarningsCalendarProvider, Granularity, OptionType};
pub use backtest::{
    run_backtest, BacktestConfig, BacktestEngine, BacktestError, BacktestResult, DateRange,
    Settings, StrategyConfig, StrategyId, Trade,
};
pub use risk::PositionSizer;
pub use metrics::{PerformanceMetrics, MetricsCalculator};
pub use report::{ReportEmitter, ReportError};
