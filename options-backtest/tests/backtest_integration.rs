//! End-to-end runs through the file-backed providers and report emitter.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use options_backtest::backtest::{
    run_backtest, BacktestError, BreakoutConfig, DateRange, StraddleConfig, StrategyConfig,
    StrategyId,
};
use options_backtest::data::{
    Bar, CsvBarProvider, InMemoryBarProvider, InMemoryEarningsCalendar, JsonEarningsCalendar,
    SeriesError,
};
use options_backtest::report::ReportEmitter;

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn write_file(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn breakout_config(tickers: &[&str]) -> StrategyConfig {
    StrategyConfig::OdteBreakout(BreakoutConfig {
        tickers: tickers.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    })
}

fn weekdays(range: DateRange) -> usize {
    let mut count = 0;
    let mut day = range.start;
    while day <= range.end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
        day += Duration::days(1);
    }
    count
}

#[test]
fn test_breakout_from_csv_to_reports() {
    let data = TempDir::new().unwrap();
    write_file(
        data.path(),
        "SPY_minute.csv",
        "timestamp,open,high,low,close,volume\n\
         2024-03-15 09:30:00,97,100,95,97,1000\n\
         2024-03-15 09:31:00,100,101.5,100,101,1300\n\
         2024-03-15 09:32:00,101,122,101,122,500\n",
    );

    let bars = CsvBarProvider::new(data.path());
    let range = DateRange::new(date(3, 15), date(3, 15)).unwrap();
    let result = run_backtest(
        StrategyId::OdteBreakout,
        range,
        dec!(10000),
        breakout_config(&["SPY", "QQQ"]),
        &bars,
        &InMemoryEarningsCalendar::new(),
    )
    .unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.quantity, 66);
    assert_eq!(trade.premium_estimate, dec!(1.515));
    assert_eq!(trade.realized_pnl, dec!(19.998));
    assert_eq!(result.final_equity(), dec!(10019.998));
    // QQQ has no file
    assert_eq!(result.skips.data_gaps, 1);

    let out = TempDir::new().unwrap();
    let paths = ReportEmitter::new(out.path().join("run"))
        .unwrap()
        .emit(&result)
        .unwrap();
    let report = fs::read_to_string(&paths.report_txt).unwrap();
    assert!(report.contains("Total Trades: 1"));
    let symbol_pnl = fs::read_to_string(&paths.symbol_pnl_csv).unwrap();
    assert_eq!(symbol_pnl.lines().count(), 2);
}

#[test]
fn test_straddle_from_csv_and_json_calendar() {
    let data = TempDir::new().unwrap();
    let mut csv = String::from("timestamp,open,high,low,close,volume\n");
    let mut day = date(4, 1);
    while day <= date(4, 19) {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            let close = if day >= date(4, 11) { 220 } else { 200 };
            csv.push_str(&format!("{},{},{},{},{},1000000\n", day, close, close, close, close));
        }
        day += Duration::days(1);
    }
    write_file(data.path(), "TSLA_day.csv", &csv);

    let calendar = JsonEarningsCalendar::from_json(r#"{"TSLA": ["2024-04-10"]}"#).unwrap();
    let config = StrategyConfig::EarningsStraddle(StraddleConfig {
        tickers: vec!["TSLA".to_string()],
        ..Default::default()
    });

    let result = run_backtest(
        StrategyId::EarningsStraddle,
        DateRange::new(date(4, 1), date(4, 19)).unwrap(),
        dec!(10000),
        config,
        &CsvBarProvider::new(data.path()),
        &calendar,
    )
    .unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_date, date(4, 9));
    assert_eq!(trade.exit_date(), date(4, 11));
    assert_eq!(trade.quantity, 41);
    // 10% move: 12 * 1.1 = 13.2 per straddle
    assert_eq!(trade.exit_premium, dec!(13.2));
    assert_eq!(trade.realized_pnl, dec!(1.2) * dec!(41));
    assert!(result.open_straddles.is_empty());
    assert_eq!(result.equity_curve.len(), 1 + 15);
}

#[test]
fn test_out_of_order_csv_is_fatal() {
    let data = TempDir::new().unwrap();
    write_file(
        data.path(),
        "SPY_minute.csv",
        "timestamp,open,high,low,close,volume\n\
         2024-03-15 09:31:00,97,100,95,97,1000\n\
         2024-03-15 09:30:00,100,101,100,101,1300\n",
    );

    let err = run_backtest(
        StrategyId::OdteBreakout,
        DateRange::new(date(3, 15), date(3, 15)).unwrap(),
        dec!(10000),
        breakout_config(&["SPY"]),
        &CsvBarProvider::new(data.path()),
        &InMemoryEarningsCalendar::new(),
    )
    .unwrap_err();

    assert!(matches!(err, BacktestError::Series(SeriesError::OutOfOrder { .. })));
}

/// One day of minute bars from a list of (close, volume) pairs.
fn day_bars(day: NaiveDate, moves: &[(i64, i64)]) -> Vec<Bar> {
    moves
        .iter()
        .enumerate()
        .map(|(i, &(cents, volume))| {
            let close = Decimal::new(cents, 2);
            let ts = day.and_hms_opt(9, 30, 0).unwrap() + Duration::minutes(i as i64);
            Bar::new(ts, close, close + dec!(0.5), close - dec!(0.5), close, volume)
        })
        .collect()
}

fn arb_day() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((9_000i64..11_000, 100i64..5_000), 0..8)
}

proptest! {
    #[test]
    fn prop_breakout_run_accounting(
        days in prop::collection::vec((arb_day(), arb_day()), 1..10),
    ) {
        let start = date(4, 1);
        let range = DateRange::new(start, start + Duration::days(days.len() as i64 - 1)).unwrap();

        let mut spy = Vec::new();
        let mut qqq = Vec::new();
        for (offset, (a, b)) in days.iter().enumerate() {
            let day = start + Duration::days(offset as i64);
            spy.extend(day_bars(day, a));
            qqq.extend(day_bars(day, b));
        }
        let provider = InMemoryBarProvider::new()
            .with_series("SPY", spy)
            .with_series("QQQ", qqq);

        let result = run_backtest(
            StrategyId::OdteBreakout,
            range,
            dec!(10000),
            breakout_config(&["SPY", "QQQ"]),
            &provider,
            &InMemoryEarningsCalendar::new(),
        )
        .unwrap();

        // Capital only moves by realized P&L
        prop_assert_eq!(result.final_equity() - dec!(10000), result.total_pnl());

        // Seed plus one snapshot per weekday
        prop_assert_eq!(result.equity_curve.len(), 1 + weekdays(range));

        // At most one trade per symbol per day
        let mut seen = HashSet::new();
        for trade in &result.trades {
            prop_assert!(seen.insert((trade.symbol.clone(), trade.entry_date)));
            prop_assert!(trade.quantity >= 1);
            prop_assert_eq!(
                trade.realized_pnl,
                (trade.exit_premium - trade.premium_estimate) * Decimal::from(trade.quantity)
            );
        }

        prop_assert_eq!(result.metrics.total_trades, result.trades.len());
        prop_assert_eq!(
            result.metrics.winning_trades + result.metrics.losing_trades,
            result.trades.len()
        );
    }
}
