//! Analysis orchestrator
//!
//! One entry point ties the pipeline together: fetch the mandatory mint
//! snapshot, fan out to the secondary sources under per-source timeouts,
//! classify and cluster holders, evaluate liquidity, score, and hand the
//! finished assessment to the reputation engine. A secondary failure
//! degrades its field of the assessment; only a failed mint fetch aborts.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::authority::LiquidityEvaluator;
use crate::analysis::bundles::BundleDetector;
use crate::analysis::holders::{self, apply_bundles, summarize, HolderClassifier};
use crate::analysis::scoring::{RiskScorer, ScoreInputs};
use crate::analysis::types::{
    Authorities, BundleDetection, HolderFiltering, HolderRecord, HolderSource, MarketMetrics,
    RiskAssessment,
};
use crate::config::Config;
use crate::error::Error;
use crate::exchanges::ExchangeRegistry;
use crate::reputation::ReputationEngine;
use crate::sources::{
    fetch_secondary, LedgerSource, LpReport, LpReportSource, MarketSnapshot, MarketSource,
    RawHolder, SecurityFlags, SecuritySource,
};

/// Payloads gathered by the secondary fan-out; every field may be absent
struct SecondaryData {
    market: Option<MarketSnapshot>,
    security: Option<SecurityFlags>,
    report: Option<LpReport>,
    holders: Option<Vec<RawHolder>>,
    holder_count: Option<usize>,
}

pub struct AnalysisEngine {
    ledger: Arc<dyn LedgerSource>,
    market: Arc<dyn MarketSource>,
    security: Arc<dyn SecuritySource>,
    lp_report: Arc<dyn LpReportSource>,
    exchanges: Arc<dyn ExchangeRegistry>,
    reputation: Option<Arc<ReputationEngine>>,
    config: Config,
}

impl AnalysisEngine {
    pub fn new(
        ledger: Arc<dyn LedgerSource>,
        market: Arc<dyn MarketSource>,
        security: Arc<dyn SecuritySource>,
        lp_report: Arc<dyn LpReportSource>,
        exchanges: Arc<dyn ExchangeRegistry>,
        config: Config,
    ) -> Self {
        Self {
            ledger,
            market,
            security,
            lp_report,
            exchanges,
            reputation: None,
            config,
        }
    }

    /// Attach the reputation engine; assessments then feed labels and history
    pub fn with_reputation(mut self, reputation: Arc<ReputationEngine>) -> Self {
        self.reputation = Some(reputation);
        self
    }

    /// Analyze one token to completion
    pub async fn analyze(&self, mint: &str) -> RiskAssessment {
        self.analyze_with_cancel(mint, CancellationToken::new())
            .await
    }

    /// Analyze one token, discarding the run if `cancel` fires before it
    /// completes. The mandatory ledger fetch is never interrupted mid-flight,
    /// but its result is thrown away: a cancelled run returns a
    /// failure-marked assessment and leaves no reputation state behind.
    pub async fn analyze_with_cancel(
        &self,
        mint: &str,
        cancel: CancellationToken,
    ) -> RiskAssessment {
        info!(mint = %mint, "Starting token analysis");

        if let Err(e) = Pubkey::from_str(mint) {
            let err = Error::InvalidAddress(format!("{mint}: {e}"));
            error!(mint = %mint, error = %err, "Rejecting analysis request");
            return RiskAssessment::failed(mint, err);
        }

        let snapshot = match self.ledger.fetch_snapshot(mint).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(mint = %mint, error = %e, "Mint fetch failed, aborting analysis");
                return RiskAssessment::failed(mint, e);
            }
        };
        debug!(
            mint = %mint,
            supply = snapshot.supply,
            decimals = snapshot.decimals,
            "Fetched mint snapshot"
        );

        let mut gathered = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(mint = %mint, "Cancelled during source fan-out, discarding run");
                return RiskAssessment::failed(mint, Error::Cancelled);
            }
            data = self.fetch_secondaries(mint) => data,
        };

        // Holder fallback: the report's embedded list stands in when the
        // ledger enumeration produced nothing
        let ledger_holders = gathered.holders.take().filter(|h| !h.is_empty());
        let (raw_holders, holder_source) = match ledger_holders {
            Some(h) => (Some(h), HolderSource::Ledger),
            None => {
                if gathered.report.is_none() && !cancel.is_cancelled() {
                    gathered.report = fetch_secondary(
                        "holder_fallback",
                        mint,
                        self.config.sources.holder_fallback_timeout_ms,
                        self.lp_report.fetch(mint),
                    )
                    .await;
                }
                match gathered
                    .report
                    .as_ref()
                    .map(|r| r.holders.clone())
                    .filter(|h| !h.is_empty())
                {
                    Some(h) => {
                        info!(mint = %mint, holders = h.len(), "Using report holder list as fallback");
                        (Some(h), HolderSource::FallbackReport)
                    }
                    None => {
                        warn!(mint = %mint, "No holder list available from any source");
                        (None, HolderSource::Unavailable)
                    }
                }
            }
        };

        let classifier = HolderClassifier::new(self.exchanges.as_ref())
            .with_pools(gathered.market.as_ref().and_then(|m| m.pool_address.clone()));
        let mut holder_records = raw_holders.map(|raw| classifier.classify(&snapshot, raw));

        let bundles = match holder_records.as_mut() {
            Some(records) => Some(self.detect_bundles(mint, records, &cancel).await),
            None => None,
        };

        let lp_burn = gathered.report.as_ref().and_then(|r| r.burn_pct);
        let liquidity = LiquidityEvaluator::new(self.config.scoring.min_liquidity_usd)
            .evaluate(gathered.market.as_ref(), gathered.report.as_ref());

        let market_metrics = gathered.market.as_ref().map(|m| MarketMetrics {
            price_usd: m.price_usd,
            liquidity_usd: m.liquidity_usd,
            market_cap_usd: m.market_cap_usd,
            volume_24h_usd: m.volume_24h_usd,
        });

        let authorities = Authorities::from_snapshot(&snapshot);
        let outcome = RiskScorer::new(self.config.scoring.clone()).score(&ScoreInputs {
            authorities: &authorities,
            holders: holder_records.as_deref(),
            holder_count: gathered.holder_count,
            liquidity: &liquidity,
            lp_burn,
            market: market_metrics.as_ref(),
            bundles: bundles.as_ref(),
            security: gathered.security.as_ref(),
            report_rugged: gathered.report.as_ref().map_or(false, |r| r.rugged),
        });

        let holder_filtering = holder_records
            .as_deref()
            .map(|h| summarize(h, bundles.clone()))
            .unwrap_or_else(HolderFiltering::empty);

        let assessment = RiskAssessment {
            analysis_id: Uuid::new_v4(),
            token: snapshot.address.clone(),
            score: outcome.score,
            level: outcome.level,
            breakdown: outcome.breakdown,
            authorities: Some(authorities),
            // Without an authoritative count the visible list is the floor
            holder_count: gathered
                .holder_count
                .unwrap_or_else(|| holder_records.as_ref().map_or(0, |h| h.len())),
            top_holders: holder_records.unwrap_or_default(),
            holder_source,
            holder_filtering,
            liquidity_pool: liquidity,
            market: market_metrics,
            creator: gathered.report.as_ref().and_then(|r| r.creator.clone()),
            red_flags: outcome.red_flags,
            analysis_failed: false,
            analyzed_at: Utc::now(),
        };

        // Abandoned runs leave no trace: no history entry, no labels
        if cancel.is_cancelled() {
            warn!(mint = %mint, "Cancelled before completion, discarding run");
            return RiskAssessment::failed(mint, Error::Cancelled);
        }

        info!(
            mint = %mint,
            score = %assessment.score,
            level = %assessment.level,
            flags = assessment.red_flags.len(),
            "Analysis complete"
        );

        if let Some(reputation) = &self.reputation {
            if let Err(e) = reputation.record_analysis(&assessment).await {
                warn!(mint = %mint, error = %e, "Failed to append analysis history");
            }
            let applied = reputation
                .process_assessment(&assessment, gathered.security.as_ref())
                .await;
            if applied > 0 {
                info!(mint = %mint, labels = applied, "Recorded reputation labels");
            }
        }

        assessment
    }

    async fn fetch_secondaries(&self, mint: &str) -> SecondaryData {
        let sources = &self.config.sources;
        let (market, security, report, holders, holder_count) = tokio::join!(
            fetch_secondary(
                "market_pairs",
                mint,
                sources.market_timeout_ms,
                self.market.fetch(mint),
            ),
            fetch_secondary(
                "security_flags",
                mint,
                sources.security_timeout_ms,
                self.security.fetch(mint),
            ),
            fetch_secondary(
                "lp_report",
                mint,
                sources.lp_report_timeout_ms,
                self.lp_report.fetch(mint),
            ),
            fetch_secondary("ledger_holders", mint, sources.holders_timeout_ms, async {
                self.ledger.fetch_holders(mint).await.map(Some)
            }),
            fetch_secondary("holder_count", mint, sources.holders_timeout_ms, async {
                self.ledger.fetch_holder_count(mint).await.map(Some)
            }),
        );
        SecondaryData {
            market,
            security,
            report,
            holders,
            holder_count,
        }
    }

    /// Funding scan plus both cluster strategies; detected members are
    /// retagged in place so concentration math skips them
    async fn detect_bundles(
        &self,
        mint: &str,
        records: &mut [HolderRecord],
        cancel: &CancellationToken,
    ) -> BundleDetection {
        let organic_wallets: Vec<String> = holders::organic(records)
            .map(|h| h.address.clone())
            .collect();

        let funding = if organic_wallets.len() >= 2 {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Vec::new(),
                edges = fetch_secondary(
                    "funding_edges",
                    mint,
                    self.config.sources.funding_timeout_ms,
                    async { self.ledger.fetch_funding_edges(&organic_wallets).await.map(Some) },
                ) => edges.unwrap_or_default(),
            }
        } else {
            Vec::new()
        };

        let detection = BundleDetector::new(self.config.clusters.clone()).detect(records, &funding);
        if detection.detected() {
            info!(
                mint = %mint,
                groups = detection.groups.len(),
                wallets = detection.bundled_count,
                "Detected coordinated wallet groups"
            );
            apply_bundles(records, &detection);
        }
        detection
    }
}
