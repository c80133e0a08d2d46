//! Composite risk scoring
//!
//! Six components (authorities, holder distribution, liquidity, market
//! activity, bundles, security flags), each normalized to [0,100] with
//! 100 = safest, combined as a weighted sum. Components whose source data
//! was unavailable drop out and the remaining weights renormalize, so a
//! missing provider never dilutes what the evidence actually says.
//! [`SafetyScore`] owns the polarity; this module never emits a raw number.

use crate::analysis::holders::{largest_organic, top_concentration};
use crate::analysis::types::{
    Authorities, BundleDetection, ConfidenceTier, FlagKind, FlagSeverity, HolderRecord,
    LiquidityState, LiquidityStatus, MarketMetrics, RedFlag, RiskLevel, SafetyScore,
    ScoreBreakdown,
};
use crate::config::ScoringConfig;
use crate::sources::SecurityFlags;

/// Upper bound of the partial-burn warning band
const PARTIAL_BURN_PCT: f64 = 90.0;

/// Burn share below which the pool counts as unprotected
const LOW_BURN_PCT: f64 = 50.0;

/// Everything the scorer consumes. Optional inputs correspond to secondary
/// sources that may have been absent for this run.
pub struct ScoreInputs<'a> {
    pub authorities: &'a Authorities,
    /// Classified holders; `None` when no source produced a holder list
    pub holders: Option<&'a [HolderRecord]>,
    pub holder_count: Option<usize>,
    pub liquidity: &'a LiquidityState,
    /// Measured LP burn share; `None` when no provider reported one
    pub lp_burn: Option<f64>,
    pub market: Option<&'a MarketMetrics>,
    pub bundles: Option<&'a BundleDetection>,
    pub security: Option<&'a SecurityFlags>,
    /// The LP report marks the token as already rugged
    pub report_rugged: bool,
}

#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub score: SafetyScore,
    pub level: RiskLevel,
    pub breakdown: ScoreBreakdown,
    pub red_flags: Vec<RedFlag>,
}

pub struct RiskScorer {
    config: ScoringConfig,
}

impl RiskScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, inputs: &ScoreInputs<'_>) -> ScoreOutcome {
        // An already-rugged report is decisive even when the flags provider
        // said nothing
        let security = if inputs.report_rugged {
            Some(0.0)
        } else {
            inputs.security.map(|s| self.security_component(s))
        };
        let breakdown = ScoreBreakdown {
            authority: Some(authority_component(inputs.authorities)),
            holders: inputs.holders.map(|h| self.holder_component(h)),
            liquidity: Some(self.liquidity_component(inputs.liquidity, inputs.lp_burn)),
            market: inputs.market.map(|m| self.market_component(m)),
            bundles: inputs.bundles.map(bundle_component),
            security,
        };

        let score = self.weighted(&breakdown);
        let level = RiskLevel::from_score(score, &self.config);
        let red_flags = self.collect_flags(inputs);

        ScoreOutcome {
            score,
            level,
            breakdown,
            red_flags,
        }
    }

    /// Weighted sum over the components that have data, renormalized by the
    /// weight actually in play
    fn weighted(&self, breakdown: &ScoreBreakdown) -> SafetyScore {
        let parts = [
            (breakdown.authority, self.config.weight_authority),
            (breakdown.holders, self.config.weight_holders),
            (breakdown.liquidity, self.config.weight_liquidity),
            (breakdown.market, self.config.weight_market),
            (breakdown.bundles, self.config.weight_bundles),
            (breakdown.security, self.config.weight_security),
        ];

        let mut sum = 0.0;
        let mut weight = 0.0;
        for (component, w) in parts {
            if let Some(value) = component {
                sum += value * w;
                weight += w;
            }
        }

        if weight <= f64::EPSILON {
            return SafetyScore::from_weighted(50.0);
        }
        SafetyScore::from_weighted(sum / weight)
    }

    fn holder_component(&self, holders: &[HolderRecord]) -> f64 {
        let top10 = top_concentration(holders, 10);
        let mut score = (100.0 - top10).clamp(0.0, 100.0);

        if let Some(largest) = largest_organic(holders) {
            if largest.pct_of_supply > self.config.concentration_high_pct {
                score = score.min(10.0);
            } else if largest.pct_of_supply > self.config.single_holder_pct {
                score = score.min(25.0);
            }
        }
        score
    }

    fn liquidity_component(&self, liquidity: &LiquidityState, lp_burn: Option<f64>) -> f64 {
        if liquidity.is_locked {
            return 100.0;
        }
        if !liquidity.exists {
            return 30.0;
        }
        match lp_burn {
            Some(burn) => burn.clamp(0.0, 100.0),
            // Pool exists but nobody measured a burn: thin pools are the
            // risky case, anything else stays middle-of-the-road
            None => match liquidity.status {
                LiquidityStatus::Risky => 20.0,
                _ => 50.0,
            },
        }
    }

    fn market_component(&self, market: &MarketMetrics) -> f64 {
        let mut score: f64 = 100.0;

        if let Some(liquidity) = market.liquidity_usd {
            if liquidity < self.config.min_liquidity_usd {
                score -= 40.0;
            }
            if let Some(market_cap) = market.market_cap_usd {
                if liquidity > 0.0 && market_cap / liquidity > self.config.max_mc_liquidity_ratio {
                    score -= 30.0;
                }
            }
        }
        score.max(0.0)
    }

    fn security_component(&self, flags: &SecurityFlags) -> f64 {
        if flags.is_scam || flags.is_honeypot {
            return 0.0;
        }
        let tax = flags
            .buy_tax_pct
            .unwrap_or(0.0)
            .max(flags.sell_tax_pct.unwrap_or(0.0));
        if tax > self.config.max_tax_pct {
            return 40.0;
        }
        100.0
    }

    /// Every triggered rule appends exactly one flag
    fn collect_flags(&self, inputs: &ScoreInputs<'_>) -> Vec<RedFlag> {
        let mut flags = Vec::new();

        // Authorities
        if let Some(address) = inputs.authorities.mint.address() {
            flags.push(RedFlag::new(
                FlagKind::MintAuthority,
                FlagSeverity::Critical,
                "Mint Authority Active",
                format!("Mint authority {address} can issue unlimited new supply"),
            ));
        }
        if let Some(address) = inputs.authorities.freeze.address() {
            flags.push(RedFlag::new(
                FlagKind::FreezeAuthority,
                FlagSeverity::Critical,
                "Freeze Authority Active",
                format!("Freeze authority {address} can lock holder accounts"),
            ));
        }

        // Holder distribution
        if let Some(holders) = inputs.holders {
            let top10 = top_concentration(holders, 10);
            if top10 > self.config.concentration_critical_pct {
                flags.push(RedFlag::new(
                    FlagKind::HolderConcentration,
                    FlagSeverity::Critical,
                    "Extreme Holder Concentration",
                    format!("Top 10 organic holders control {top10:.1}% of supply"),
                ));
            } else if top10 > self.config.concentration_high_pct {
                flags.push(RedFlag::new(
                    FlagKind::HolderConcentration,
                    FlagSeverity::High,
                    "High Holder Concentration",
                    format!("Top 10 organic holders control {top10:.1}% of supply"),
                ));
            }

            if let Some(largest) = largest_organic(holders) {
                if largest.pct_of_supply > self.config.single_holder_pct {
                    flags.push(RedFlag::new(
                        FlagKind::SingleHolder,
                        FlagSeverity::High,
                        "Dominant Single Holder",
                        format!(
                            "{} holds {:.1}% of supply",
                            largest.address, largest.pct_of_supply
                        ),
                    ));
                }
            }
        }

        // Liquidity burn
        if inputs.liquidity.exists && !inputs.liquidity.is_locked {
            if let Some(burn) = inputs.lp_burn {
                if burn < LOW_BURN_PCT {
                    flags.push(RedFlag::new(
                        FlagKind::LpUnburned,
                        FlagSeverity::High,
                        "Liquidity Not Burned",
                        format!("Only {burn:.1}% of LP tokens are burned or locked"),
                    ));
                } else if burn < PARTIAL_BURN_PCT {
                    flags.push(RedFlag::new(
                        FlagKind::LpPartialBurn,
                        FlagSeverity::Medium,
                        "Partial Liquidity Burn",
                        format!("{burn:.1}% of LP tokens burned; the rest can be pulled"),
                    ));
                }
            }
        }

        // Market depth
        if let Some(market) = inputs.market {
            if let Some(liquidity) = market.liquidity_usd {
                if liquidity < self.config.min_liquidity_usd {
                    flags.push(RedFlag::new(
                        FlagKind::ThinLiquidity,
                        FlagSeverity::Medium,
                        "Thin Liquidity",
                        format!(
                            "Pool liquidity ${liquidity:.0} is below the ${:.0} floor",
                            self.config.min_liquidity_usd
                        ),
                    ));
                }
                if let Some(market_cap) = market.market_cap_usd {
                    if liquidity > 0.0 {
                        let ratio = market_cap / liquidity;
                        if ratio > self.config.max_mc_liquidity_ratio {
                            flags.push(RedFlag::new(
                                FlagKind::McLiquidityRatio,
                                FlagSeverity::Medium,
                                "Inflated Market Cap",
                                format!("Market cap is {ratio:.0}x pool liquidity"),
                            ));
                        }
                    }
                }
            }
        }

        // Bundles
        if let Some(bundles) = inputs.bundles {
            if let Some(confidence) = bundles.confidence {
                let severity = match confidence {
                    ConfidenceTier::High => FlagSeverity::High,
                    ConfidenceTier::Medium => FlagSeverity::Medium,
                };
                flags.push(RedFlag::new(
                    FlagKind::BundleDetected,
                    severity,
                    "Coordinated Wallet Group",
                    format!(
                        "{} wallets acquired in a coordinated pattern, holding {:.1}% of supply",
                        bundles.bundled_count, bundles.bundled_pct
                    ),
                ));
            }
        }

        // Security provider
        if let Some(security) = inputs.security {
            if security.is_scam || security.is_honeypot {
                let what = if security.is_honeypot {
                    "a honeypot"
                } else {
                    "a scam"
                };
                flags.push(RedFlag::new(
                    FlagKind::ScamReport,
                    FlagSeverity::Critical,
                    "Scam Or Honeypot Reported",
                    format!("Security provider flags this token as {what}"),
                ));
            }

            let buy = security.buy_tax_pct.unwrap_or(0.0);
            let sell = security.sell_tax_pct.unwrap_or(0.0);
            if buy.max(sell) > self.config.max_tax_pct {
                flags.push(RedFlag::new(
                    FlagKind::ExcessiveTax,
                    FlagSeverity::High,
                    "Excessive Trading Tax",
                    format!("Buy tax {buy:.1}%, sell tax {sell:.1}%"),
                ));
            }
        }

        // LP report verdict
        if inputs.report_rugged {
            flags.push(RedFlag::new(
                FlagKind::RuggedReport,
                FlagSeverity::Critical,
                "Rug Already Reported",
                "The LP report provider marks this token as already rugged".to_string(),
            ));
        }

        // Holder count floor
        if let Some(count) = inputs.holder_count {
            if count < self.config.min_holder_count {
                flags.push(RedFlag::new(
                    FlagKind::LowHolderCount,
                    FlagSeverity::Low,
                    "Few Holders",
                    format!(
                        "Only {count} holders on record (minimum {})",
                        self.config.min_holder_count
                    ),
                ));
            }
        }

        flags
    }
}

fn authority_component(authorities: &Authorities) -> f64 {
    let mut score = 100.0;
    if authorities.mint.has_authority() {
        score -= 50.0;
    }
    if authorities.freeze.has_authority() {
        score -= 50.0;
    }
    score
}

fn bundle_component(bundles: &BundleDetection) -> f64 {
    match bundles.confidence {
        Some(ConfidenceTier::High) => 20.0,
        Some(ConfidenceTier::Medium) => 50.0,
        None => 100.0,
    }
}
