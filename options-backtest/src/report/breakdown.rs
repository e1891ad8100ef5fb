//! Per-symbol P&L breakdown.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::Trade;

/// Aggregated results for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolBreakdown {
    pub symbol: String,
    pub trades: usize,
    pub winners: usize,
    pub total_pnl: Decimal,
    pub avg_pnl: Decimal,
    pub avg_pnl_pct: f64,
}

/// Group trades by symbol, sorted by symbol.
pub fn symbol_breakdown(trades: &[Trade]) -> Vec<SymbolBreakdown> {
    let mut grouped: BTreeMap<&str, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        grouped.entry(trade.symbol.as_str()).or_default().push(trade);
    }

    grouped
        .into_iter()
        .map(|(symbol, trades)| {
            let count = trades.len();
            let total_pnl: Decimal = trades.iter().map(|t| t.realized_pnl).sum();
            SymbolBreakdown {
                symbol: symbol.to_string(),
                trades: count,
                winners: trades.iter().filter(|t| t.is_winner()).count(),
                total_pnl,
                avg_pnl: total_pnl / Decimal::from(count as i64),
                avg_pnl_pct: trades.iter().map(|t| t.pnl_pct()).sum::<f64>() / count as f64,
            }
        })
        .collect()
}
