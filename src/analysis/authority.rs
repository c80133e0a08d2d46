//! Authority and liquidity evaluation
//!
//! Authority verdicts are derived in [`crate::analysis::types`]: the verdict
//! constructor takes only the optional authority address, so `is_revoked`
//! is always the exact complement of `has_authority`. This module derives
//! the liquidity-pool state from the market snapshot and the LP report.

use crate::analysis::types::{LiquidityState, LiquidityStatus};
use crate::sources::{LpReport, MarketSnapshot};

/// Burn share treated as a full burn. Dust left in the pool below this
/// threshold cannot be pulled.
pub const FULL_BURN_PCT: f64 = 99.99;

/// Burn share below which the pool counts as unprotected
pub const LOW_BURN_PCT: f64 = 50.0;

pub struct LiquidityEvaluator {
    min_liquidity_usd: f64,
}

impl LiquidityEvaluator {
    pub fn new(min_liquidity_usd: f64) -> Self {
        Self { min_liquidity_usd }
    }

    /// Map the available pool evidence onto a liquidity verdict.
    ///
    /// SAFE requires a full burn or a recognized permanent lock; burns
    /// under half the LP supply are RISKY; measured burns in between are
    /// UNKNOWN with `exists` set. Tokens still on a launch curve count as
    /// implicitly locked since supply has not reached an open pool yet.
    /// Pools without any burn measurement fall back to the liquidity
    /// floor: thin pools are RISKY, the rest UNKNOWN.
    pub fn evaluate(
        &self,
        market: Option<&MarketSnapshot>,
        report: Option<&LpReport>,
    ) -> LiquidityState {
        let market_has_pool = market.is_some();
        let report_has_pool = report.map(|r| r.pool_exists).unwrap_or(false);
        if !market_has_pool && !report_has_pool {
            return LiquidityState::unknown();
        }

        let pre_migration = market.map(|m| m.pre_migration).unwrap_or(false)
            || report.map(|r| r.pre_migration).unwrap_or(false);
        let burn_pct = report.and_then(|r| r.burn_pct);
        let permanent_lock = report.map(|r| r.permanent_lock).unwrap_or(false);

        if pre_migration {
            return LiquidityState {
                exists: true,
                is_locked: true,
                is_burned: false,
                burn_percentage: burn_pct.unwrap_or(0.0),
                status: LiquidityStatus::Safe,
            };
        }

        match burn_pct {
            Some(burn) => {
                let is_burned = burn >= FULL_BURN_PCT;
                let status = if is_burned || permanent_lock {
                    LiquidityStatus::Safe
                } else if burn < LOW_BURN_PCT {
                    LiquidityStatus::Risky
                } else {
                    LiquidityStatus::Unknown
                };
                LiquidityState {
                    exists: true,
                    is_locked: permanent_lock,
                    is_burned,
                    burn_percentage: burn,
                    status,
                }
            }
            None => {
                let liquidity_usd = market.and_then(|m| m.liquidity_usd).unwrap_or(0.0);
                let status = if permanent_lock {
                    LiquidityStatus::Safe
                } else if liquidity_usd < self.min_liquidity_usd {
                    LiquidityStatus::Risky
                } else {
                    LiquidityStatus::Unknown
                };
                LiquidityState {
                    exists: true,
                    is_locked: permanent_lock,
                    is_burned: false,
                    burn_percentage: 0.0,
                    status,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(liquidity_usd: f64, pre_migration: bool) -> MarketSnapshot {
        MarketSnapshot {
            pool_address: Some("Pool111".to_string()),
            price_usd: Some(0.001),
            liquidity_usd: Some(liquidity_usd),
            market_cap_usd: Some(100_000.0),
            volume_24h_usd: Some(50_000.0),
            pre_migration,
        }
    }

    fn report(burn_pct: Option<f64>, permanent_lock: bool, pre_migration: bool) -> LpReport {
        LpReport {
            creator: None,
            rugged: false,
            pool_exists: true,
            burn_pct,
            permanent_lock,
            pre_migration,
            holders: Vec::new(),
        }
    }

    #[test]
    fn test_no_pool_anywhere_is_unknown() {
        let evaluator = LiquidityEvaluator::new(1000.0);
        let state = evaluator.evaluate(None, None);
        assert!(!state.exists);
        assert_eq!(state.status, LiquidityStatus::Unknown);
    }

    #[test]
    fn test_full_burn_is_safe() {
        let evaluator = LiquidityEvaluator::new(1000.0);
        let state = evaluator.evaluate(
            Some(&market(20_000.0, false)),
            Some(&report(Some(99.99), false, false)),
        );
        assert_eq!(state.status, LiquidityStatus::Safe);
        assert!(state.is_burned);
        assert!(!state.is_locked);
    }

    #[test]
    fn test_low_burn_is_risky() {
        let evaluator = LiquidityEvaluator::new(1000.0);
        for burn in [0.0, 30.0, 49.9] {
            let state = evaluator.evaluate(
                Some(&market(20_000.0, false)),
                Some(&report(Some(burn), false, false)),
            );
            assert_eq!(state.status, LiquidityStatus::Risky, "burn {burn}");
            assert!(!state.is_burned);
        }
    }

    #[test]
    fn test_partial_burn_is_indeterminate() {
        let evaluator = LiquidityEvaluator::new(1000.0);
        for burn in [50.0, 75.0, 99.9] {
            let state = evaluator.evaluate(
                Some(&market(20_000.0, false)),
                Some(&report(Some(burn), false, false)),
            );
            assert_eq!(state.status, LiquidityStatus::Unknown, "burn {burn}");
            assert!(state.exists);
            assert!(!state.is_burned);
        }
    }

    #[test]
    fn test_permanent_lock_is_safe_without_burn() {
        let evaluator = LiquidityEvaluator::new(1000.0);
        let state = evaluator.evaluate(
            Some(&market(20_000.0, false)),
            Some(&report(Some(10.0), true, false)),
        );
        assert_eq!(state.status, LiquidityStatus::Safe);
        assert!(state.is_locked);
    }

    #[test]
    fn test_launch_curve_counts_as_locked() {
        let evaluator = LiquidityEvaluator::new(1000.0);

        let state = evaluator.evaluate(Some(&market(5_000.0, true)), None);
        assert_eq!(state.status, LiquidityStatus::Safe);
        assert!(state.is_locked);

        let state = evaluator.evaluate(None, Some(&report(None, false, true)));
        assert_eq!(state.status, LiquidityStatus::Safe);
        assert!(state.is_locked);
    }

    #[test]
    fn test_missing_burn_data_uses_liquidity_floor() {
        let evaluator = LiquidityEvaluator::new(1000.0);

        let thin = evaluator.evaluate(Some(&market(500.0, false)), None);
        assert_eq!(thin.status, LiquidityStatus::Risky);
        assert!(thin.exists);

        let healthy = evaluator.evaluate(Some(&market(50_000.0, false)), None);
        assert_eq!(healthy.status, LiquidityStatus::Unknown);
        assert!(healthy.exists);
    }
}
