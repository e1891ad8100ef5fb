//! Options backtest CLI
//!
//! # Usage
//!
//! ```bash
//! # Write a settings file with default parameters
//! options-backtest init --path config/settings.toml
//!
//! # Run the 0DTE breakout strategy
//! options-backtest backtest odte_breakout --start-date 2024-01-02 --end-date 2024-03-29
//!
//! # Run the earnings straddle strategy with custom settings
//! options-backtest backtest earnings_straddle --start-date 2023-01-01 \
//!     --config config/settings.toml --earnings data/historical_earnings.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn};

use options_backtest::backtest::{run_backtest, DateRange, Settings, StrategyId};
use options_backtest::data::{
    CsvBarProvider, EarningsCalendarProvider, InMemoryEarningsCalendar, JsonEarningsCalendar,
};
use options_backtest::report::ReportEmitter;

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "options-backtest")]
#[command(about = "Backtest 0DTE breakout and pre-earnings straddle option strategies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest for one strategy
    Backtest {
        /// Strategy to simulate (odte_breakout or earnings_straddle)
        strategy: StrategyId,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,

        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Path to settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Starting capital
        #[arg(long, default_value = "10000")]
        capital: Decimal,

        /// Directory of bar CSV files
        #[arg(short, long, default_value = "data/bars")]
        data: PathBuf,

        /// Earnings calendar JSON
        #[arg(long, default_value = "data/historical_earnings.json")]
        earnings: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Write a settings file with default parameters
    Init {
        /// Destination path
        #[arg(long, default_value = "config/settings.toml")]
        path: PathBuf,
    },
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn load_earnings(path: &Path) -> Result<Box<dyn EarningsCalendarProvider>> {
    if !path.exists() {
        warn!(path = %path.display(), "Earnings file not found, using empty calendar");
        return Ok(Box::new(InMemoryEarningsCalendar::new()));
    }
    let calendar = JsonEarningsCalendar::load(path)
        .with_context(|| format!("Failed to load earnings calendar {}", path.display()))?;
    info!(symbols = calendar.symbol_count(), "Loaded earnings calendar");
    Ok(Box::new(calendar))
}

#[allow(clippy::too_many_arguments)]
fn cmd_backtest(
    strategy: StrategyId,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    config: Option<PathBuf>,
    capital: Decimal,
    data: PathBuf,
    earnings: PathBuf,
    output: PathBuf,
) -> Result<()> {
    let end_date = end_date.unwrap_or_else(|| Local::now().date_naive());
    let range = DateRange::new(start_date, end_date)?;
    let settings = load_settings(config.as_deref())?;
    let strategy_config = settings.strategy_config(strategy);

    println!("{}", SEPARATOR);
    println!("Backtest: {}", strategy);
    println!("{}", SEPARATOR);
    println!("  Period: {} to {}", range.start, range.end);
    println!("  Capital: ${:.2}", capital);
    println!("  Tickers: {}", strategy_config.tickers().join(", "));
    println!("  Data: {}", data.display());

    let bars = CsvBarProvider::new(&data);
    let calendar = load_earnings(&earnings)?;

    let result = run_backtest(
        strategy,
        range,
        capital,
        strategy_config,
        &bars,
        calendar.as_ref(),
    )
    .context("Backtest failed")?;

    println!("\n{}\n", result.summary());

    let run_dir = output.join(format!("backtest_{}_{}_{}", strategy, range.start, range.end));
    let paths = ReportEmitter::new(&run_dir)
        .and_then(|emitter| emitter.emit(&result))
        .with_context(|| format!("Failed to write reports to {}", run_dir.display()))?;

    println!("Results saved to: {}", paths.dir.display());
    println!("{}", SEPARATOR);
    Ok(())
}

fn cmd_init(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = Settings::default().to_toml()?;
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("options_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            strategy,
            start_date,
            end_date,
            config,
            capital,
            data,
            earnings,
            output,
        } => cmd_backtest(
            strategy, start_date, end_date, config, capital, data, earnings, output,
        ),
        Commands::Init { path } => cmd_init(&path),
    }
}
