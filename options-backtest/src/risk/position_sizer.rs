//! Position sizing module.
//!
//! Determines the number of contracts for a simulated entry:
//! - Breakout: risk budget divided by the premium, floored, at least 1
//! - Straddle: capital divided by the combined premium, floored; a result
//!   below 1 means the trade cannot be funded

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Result of position sizing calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizingResult {
    /// Recommended number of contracts.
    pub contracts: i64,
    /// Contracts the budget buys before any minimum is applied.
    pub affordable: i64,
    /// Budget the calculation was made against.
    pub budget: Decimal,
    /// Cost of one contract (or one call+put pair).
    pub unit_cost: Decimal,
    /// Why the trade is not allowed (if it isn't).
    pub constraint_reason: Option<String>,
}

impl SizingResult {
    /// Check if the trade is allowed (at least 1 contract).
    pub fn is_allowed(&self) -> bool {
        self.contracts >= 1
    }

    fn rejected(budget: Decimal, unit_cost: Decimal, reason: String) -> Self {
        Self {
            contracts: 0,
            affordable: 0,
            budget,
            unit_cost,
            constraint_reason: Some(reason),
        }
    }
}

/// Position sizer for determining contract counts.
pub struct PositionSizer;

impl PositionSizer {
    /// Size a breakout entry: `max(1, floor(risk_budget / premium))`.
    pub fn breakout_contracts(risk_budget: Decimal, premium: Decimal) -> SizingResult {
        if premium <= Decimal::ZERO {
            return SizingResult::rejected(
                risk_budget,
                premium,
                format!("Non-positive premium estimate ({})", premium),
            );
        }

        let affordable = Self::affordable(risk_budget, premium);
        SizingResult {
            contracts: affordable.max(1),
            affordable,
            budget: risk_budget,
            unit_cost: premium,
            constraint_reason: None,
        }
    }

    /// Size a straddle entry: `floor(capital / (call + put))`, no minimum.
    pub fn straddle_contracts(capital: Decimal, total_cost: Decimal) -> SizingResult {
        if total_cost <= Decimal::ZERO {
            return SizingResult::rejected(
                capital,
                total_cost,
                format!("Non-positive straddle cost ({})", total_cost),
            );
        }

        let affordable = Self::affordable(capital, total_cost);
        if affordable < 1 {
            return SizingResult::rejected(
                capital,
                total_cost,
                format!("Capital {} does not cover one straddle at {}", capital, total_cost),
            );
        }

        SizingResult {
            contracts: affordable,
            affordable,
            budget: capital,
            unit_cost: total_cost,
            constraint_reason: None,
        }
    }

    fn affordable(budget: Decimal, unit_cost: Decimal) -> i64 {
        if budget <= Decimal::ZERO {
            return 0;
        }
        (budget / unit_cost).floor().to_i64().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_breakout_sizing() {
        // $100 risk, $1.515 premium = 66 contracts
        let result = PositionSizer::breakout_contracts(dec!(100), dec!(1.515));
        assert_eq!(result.contracts, 66);
        assert!(result.is_allowed());
    }

    #[test]
    fn test_breakout_sizing_minimum_one() {
        // Premium above the whole budget still buys one contract
        let result = PositionSizer::breakout_contracts(dec!(100), dec!(150));
        assert_eq!(result.affordable, 0);
        assert_eq!(result.contracts, 1);
    }

    #[test]
    fn test_breakout_sizing_rejects_zero_premium() {
        let result = PositionSizer::breakout_contracts(dec!(100), dec!(0));
        assert!(!result.is_allowed());
        assert!(result.constraint_reason.is_some());
    }

    #[test]
    fn test_straddle_sizing() {
        // $500 capital, $12 per straddle = 41
        let result = PositionSizer::straddle_contracts(dec!(500), dec!(12));
        assert_eq!(result.contracts, 41);
    }

    #[test]
    fn test_straddle_insufficient_capital() {
        // $500 capital, $30 + $30 per straddle on a $1000 stock = 8
        assert_eq!(PositionSizer::straddle_contracts(dec!(500), dec!(60)).contracts, 8);

        // $500 capital, $600 per straddle = not allowed
        let result = PositionSizer::straddle_contracts(dec!(500), dec!(600));
        assert!(!result.is_allowed());
        assert_eq!(result.contracts, 0);
    }
}
