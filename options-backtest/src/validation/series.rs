//! Bar series integrity checks.
//!
//! Validates:
//! - Timestamp ordering (strictly increasing)
//! - Price validity (all prices > 0)
//! - OHLC consistency (low <= open, close <= high)
//! - Volume validity (>= 0)
//! - Date continuity (no gap longer than a week)
//!
//! Only ordering is enforced by the engine; the rest is advisory.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::data::Bar;

/// Largest number of examples quoted in a failure's details.
const MAX_EXAMPLES: usize = 5;

/// Result of a single validation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Integrity report for one symbol's bars.
#[derive(Debug, Clone)]
pub struct SeriesReport {
    pub symbol: String,
    pub bar_count: usize,
    pub trading_days: usize,
    pub checks: Vec<CheckResult>,
}

impl SeriesReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        format!(
            "{} ({} bars, {} trading days): {}/{} checks passed",
            self.symbol,
            self.bar_count,
            self.trading_days,
            passed,
            self.checks.len()
        )
    }
}

/// Run every check over a symbol's bars.
pub fn check_series(symbol: &str, bars: &[Bar]) -> SeriesReport {
    let mut days: Vec<NaiveDate> = bars.iter().map(|b| b.date()).collect();
    days.sort();
    days.dedup();

    SeriesReport {
        symbol: symbol.to_string(),
        bar_count: bars.len(),
        trading_days: days.len(),
        checks: vec![
            check_ordering(bars),
            check_positive_prices(bars),
            check_ohlc_consistency(bars),
            check_volume(bars),
            check_date_continuity(&days),
        ],
    }
}

fn examples(found: &[String]) -> Option<String> {
    Some(
        found
            .iter()
            .take(MAX_EXAMPLES)
            .cloned()
            .collect::<Vec<_>>()
            .join("; "),
    )
}

fn check_ordering(bars: &[Bar]) -> CheckResult {
    let violations: Vec<String> = bars
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[1].timestamp <= w[0].timestamp)
        .map(|(i, w)| format!("bar {}: {} after {}", i + 1, w[1].timestamp, w[0].timestamp))
        .collect();

    if violations.is_empty() {
        CheckResult::pass("timestamp_ordering", "Timestamps strictly increasing")
    } else {
        CheckResult::fail(
            "timestamp_ordering",
            &format!("{} bars out of order", violations.len()),
            examples(&violations),
        )
    }
}

fn check_positive_prices(bars: &[Bar]) -> CheckResult {
    let bad: Vec<String> = bars
        .iter()
        .filter(|b| [b.open, b.high, b.low, b.close].iter().any(|p| *p <= Decimal::ZERO))
        .map(|b| b.timestamp.to_string())
        .collect();

    if bad.is_empty() {
        CheckResult::pass("price_validity", "All prices positive")
    } else {
        CheckResult::fail(
            "price_validity",
            &format!("{} bars with non-positive prices", bad.len()),
            examples(&bad),
        )
    }
}

fn check_ohlc_consistency(bars: &[Bar]) -> CheckResult {
    let bad: Vec<String> = bars
        .iter()
        .filter(|b| {
            b.low > b.high
                || b.open < b.low
                || b.open > b.high
                || b.close < b.low
                || b.close > b.high
        })
        .map(|b| b.timestamp.to_string())
        .collect();

    if bad.is_empty() {
        CheckResult::pass("ohlc_consistency", "low <= open, close <= high")
    } else {
        CheckResult::fail(
            "ohlc_consistency",
            &format!("{} bars outside their own range", bad.len()),
            examples(&bad),
        )
    }
}

fn check_volume(bars: &[Bar]) -> CheckResult {
    let bad: Vec<String> = bars
        .iter()
        .filter(|b| b.volume < 0)
        .map(|b| b.timestamp.to_string())
        .collect();

    if bad.is_empty() {
        CheckResult::pass("volume_validity", "All volumes non-negative")
    } else {
        CheckResult::fail(
            "volume_validity",
            &format!("{} bars with negative volume", bad.len()),
            examples(&bad),
        )
    }
}

fn check_date_continuity(days: &[NaiveDate]) -> CheckResult {
    // More than a week without bars is suspicious; holidays never are.
    let gaps: Vec<String> = days
        .windows(2)
        .filter(|w| (w[1] - w[0]).num_days() > 7)
        .map(|w| format!("{} to {} ({} days)", w[0], w[1], (w[1] - w[0]).num_days()))
        .collect();

    if gaps.is_empty() {
        CheckResult::pass(
            "date_continuity",
            &format!("{} trading days, no major gaps", days.len()),
        )
    } else {
        CheckResult::fail(
            "date_continuity",
            &format!("{} major gaps found", gaps.len()),
            examples(&gaps),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(day: u32, minute: u32, low: Decimal, close: Decimal, volume: i64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(9, 30 + minute, 0)
            .unwrap();
        Bar::new(ts, close, dec!(110), low, close, volume)
    }

    #[test]
    fn test_clean_series_passes() {
        let bars = vec![
            bar(11, 0, dec!(95), dec!(100), 1000),
            bar(11, 1, dec!(95), dec!(101), 1200),
            bar(12, 0, dec!(95), dec!(99), 900),
        ];
        let report = check_series("SPY", &bars);
        assert!(report.all_passed(), "{:?}", report.failed_checks());
        assert_eq!(report.trading_days, 2);
        assert!(report.summary().contains("5/5 checks passed"));
    }

    #[test]
    fn test_out_of_order_detected() {
        let bars = vec![bar(11, 1, dec!(95), dec!(100), 1000), bar(11, 0, dec!(95), dec!(100), 1000)];
        let report = check_series("SPY", &bars);
        assert!(!report.check("timestamp_ordering").unwrap().passed);
    }

    #[test]
    fn test_advisory_failures() {
        let bars = vec![
            bar(1, 0, dec!(95), dec!(0), 1000),
            bar(1, 1, dec!(102), dec!(101), -5),
            bar(20, 0, dec!(95), dec!(100), 1000),
        ];
        let report = check_series("QQQ", &bars);

        assert!(!report.check("price_validity").unwrap().passed);
        assert!(!report.check("ohlc_consistency").unwrap().passed);
        assert!(!report.check("volume_validity").unwrap().passed);
        assert!(!report.check("date_continuity").unwrap().passed);
        assert!(report.check("timestamp_ordering").unwrap().passed);
        assert_eq!(report.failed_checks().len(), 4);
    }
}
