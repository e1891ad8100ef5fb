//! Run artifacts written to an output directory.
//!
//! Files produced per run:
//! - `trades.csv` / `trades.json`: the trade log
//! - `metrics.json`: performance metrics
//! - `equity_curve.csv` / `equity_curve.json`: seed plus daily snapshots
//! - `symbol_pnl.csv`: per-symbol breakdown
//! - `performance_report.txt`: human-readable summary

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::backtest::{BacktestResult, Trade};

use super::breakdown::symbol_breakdown;

const REPORT_RULE: &str = "==================================================";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Paths of every artifact written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub trades_csv: PathBuf,
    pub trades_json: PathBuf,
    pub metrics_json: PathBuf,
    pub equity_csv: PathBuf,
    pub equity_json: PathBuf,
    pub symbol_pnl_csv: PathBuf,
    pub report_txt: PathBuf,
}

/// One trade as a flat CSV record.
#[derive(Debug, Serialize)]
struct TradeRow<'a> {
    symbol: &'a str,
    strategy: &'static str,
    side: &'static str,
    entry_date: NaiveDate,
    entry_time: NaiveDateTime,
    exit_time: NaiveDateTime,
    entry_underlying_price: Decimal,
    exit_underlying_price: Decimal,
    strike: Decimal,
    earnings_date: Option<NaiveDate>,
    premium_estimate: Decimal,
    quantity: i64,
    stop_loss_premium: Option<Decimal>,
    take_profit_premium: Option<Decimal>,
    exit_premium: Decimal,
    realized_pnl: Decimal,
    pnl_pct: f64,
    outcome: &'static str,
}

impl<'a> From<&'a Trade> for TradeRow<'a> {
    fn from(trade: &'a Trade) -> Self {
        Self {
            symbol: &trade.symbol,
            strategy: trade.strategy.as_str(),
            side: trade.side.as_str(),
            entry_date: trade.entry_date,
            entry_time: trade.entry_time,
            exit_time: trade.exit_time,
            entry_underlying_price: trade.entry_underlying_price,
            exit_underlying_price: trade.exit_underlying_price,
            strike: trade.strike,
            earnings_date: trade.earnings_date,
            premium_estimate: trade.premium_estimate,
            quantity: trade.quantity,
            stop_loss_premium: trade.stop_loss_premium,
            take_profit_premium: trade.take_profit_premium,
            exit_premium: trade.exit_premium,
            realized_pnl: trade.realized_pnl,
            pnl_pct: trade.pnl_pct(),
            outcome: trade.outcome.as_str(),
        }
    }
}

/// Equity curve row; the seed row has no date.
#[derive(Debug, Serialize)]
struct EquityRow {
    index: usize,
    date: Option<NaiveDate>,
    equity: Decimal,
    daily_pnl: Decimal,
}

/// Writes run artifacts into one directory.
pub struct ReportEmitter {
    dir: PathBuf,
}

impl ReportEmitter {
    /// Create the emitter, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ReportError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every artifact for `result`.
    pub fn emit(&self, result: &BacktestResult) -> Result<ReportPaths, ReportError> {
        let paths = ReportPaths {
            dir: self.dir.clone(),
            trades_csv: self.dir.join("trades.csv"),
            trades_json: self.dir.join("trades.json"),
            metrics_json: self.dir.join("metrics.json"),
            equity_csv: self.dir.join("equity_curve.csv"),
            equity_json: self.dir.join("equity_curve.json"),
            symbol_pnl_csv: self.dir.join("symbol_pnl.csv"),
            report_txt: self.dir.join("performance_report.txt"),
        };

        write_csv(&paths.trades_csv, result.trades.iter().map(TradeRow::from))?;
        write_json(&paths.trades_json, &result.trades)?;
        write_json(&paths.metrics_json, &result.metrics)?;

        let curve = &result.equity_curve;
        let seed = EquityRow {
            index: 0,
            date: None,
            equity: curve.initial(),
            daily_pnl: Decimal::ZERO,
        };
        let rows = std::iter::once(seed).chain(curve.points().iter().enumerate().map(|(i, p)| {
            EquityRow {
                index: i + 1,
                date: Some(p.date),
                equity: p.equity,
                daily_pnl: p.daily_pnl,
            }
        }));
        write_csv(&paths.equity_csv, rows)?;

        let values: Vec<f64> = curve
            .values()
            .into_iter()
            .map(|v| f64::try_from(v).unwrap_or(0.0))
            .collect();
        write_json(&paths.equity_json, &values)?;

        write_csv(&paths.symbol_pnl_csv, symbol_breakdown(&result.trades))?;

        fs::write(&paths.report_txt, render_report(result)).map_err(|source| ReportError::Io {
            path: paths.report_txt.clone(),
            source,
        })?;

        info!(
            dir = %self.dir.display(),
            trades = result.trades.len(),
            "Reports written"
        );
        Ok(paths)
    }
}

fn write_csv<T, I>(path: &Path, rows: I) -> Result<(), ReportError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let csv_err = |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Plain-text performance report.
pub fn render_report(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let mut out = String::new();

    out.push_str(&format!("{}\n", REPORT_RULE));
    out.push_str(&format!("BACKTEST REPORT: {}\n", result.strategy.as_str().to_uppercase()));
    out.push_str(&format!("{}\n\n", REPORT_RULE));
    out.push_str(&format!("Period: {} to {}\n", result.start_date, result.end_date));
    out.push_str(&format!("Initial Capital: ${:.2}\n", m.initial_capital));
    out.push_str(&format!("Final Capital: ${:.2}\n\n", m.final_capital));

    out.push_str("PERFORMANCE METRICS:\n");
    out.push_str(&format!("Total Return: {:.2}%\n", m.total_return_pct));
    out.push_str(&format!("Annual Return: {:.2}%\n", m.annual_return_pct));
    out.push_str(&format!("Max Drawdown: {:.2}%\n", m.max_drawdown_pct));
    out.push_str(&format!("Volatility: {:.2}%\n", m.volatility_pct));
    out.push_str(&format!("Sharpe Ratio: {:.2}\n\n", m.sharpe_ratio));

    out.push_str("TRADING STATISTICS:\n");
    out.push_str(&format!("Total Trades: {}\n", m.total_trades));
    out.push_str(&format!(
        "Winning Trades: {} ({:.1}%)\n",
        m.winning_trades,
        m.win_rate * 100.0
    ));
    out.push_str(&format!("Losing Trades: {}\n", m.losing_trades));
    out.push_str(&format!("Average Win: ${:.2}\n", m.avg_winner));
    out.push_str(&format!("Average Loss: ${:.2}\n", m.avg_loser));
    out.push_str(&format!("Profit Factor: {:.2}\n", m.profit_factor));
    out.push_str(&format!("Net Profit: ${:.2}\n", m.net_profit));

    let breakdown = symbol_breakdown(&result.trades);
    if !breakdown.is_empty() {
        out.push_str("\nTICKER BREAKDOWN:\n");
        for row in &breakdown {
            out.push_str(&format!(
                "{}: {} trades, total P&L ${:.2}, avg P&L ${:.2} ({:.1}%)\n",
                row.symbol, row.trades, row.total_pnl, row.avg_pnl, row.avg_pnl_pct
            ));
        }
    }

    out.push_str(&format!("\nSkipped: {}\n", result.skips));
    if !result.open_straddles.is_empty() {
        out.push_str(&format!(
            "Open straddles at end (not realized): {}\n",
            result.open_straddles.len()
        ));
    }

    out
}
