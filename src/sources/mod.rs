//! Source connectors for external data providers
//!
//! Each provider exposes the same contract: fetch data for one token address,
//! returning `Ok(None)` when the provider has nothing for that token. The
//! orchestrator wraps every secondary fetch in [`fetch_secondary`], which owns
//! the per-source timeout and degrades any failure to an absent payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::analysis::types::{FundingEdge, TokenSnapshot};
use crate::error::Result;

pub mod ledger;
pub mod market;
pub mod security;

pub use ledger::LedgerConnector;
pub use market::MarketConnector;
pub use security::{LpReportConnector, SecurityFlagsConnector};

/// One holder row before classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHolder {
    pub address: String,
    pub balance: u64,
}

/// Market-data payload for the best trading pair of a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub pool_address: Option<String>,
    pub price_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    /// Token still trades on its launch curve, no open pool yet
    pub pre_migration: bool,
}

/// Flags payload from the token-security provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityFlags {
    pub is_scam: bool,
    pub is_honeypot: bool,
    pub buy_tax_pct: Option<f64>,
    pub sell_tax_pct: Option<f64>,
}

/// LP/holder report payload from the second security provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpReport {
    pub creator: Option<String>,
    pub rugged: bool,
    pub pool_exists: bool,
    /// Burned-or-locked share of the LP supply, when the provider measured it
    pub burn_pct: Option<f64>,
    /// A recognized permanent-lock mechanism holds the LP tokens
    pub permanent_lock: bool,
    pub pre_migration: bool,
    /// Embedded holder list, used as the holder-enumeration fallback
    pub holders: Vec<RawHolder>,
}

/// Authoritative ledger source; the snapshot fetch is the mandatory step
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Fetch mint state. Failure here aborts the whole analysis.
    async fn fetch_snapshot(&self, mint: &str) -> Result<TokenSnapshot>;

    /// Largest holders aggregated by owner wallet, sorted descending
    async fn fetch_holders(&self, mint: &str) -> Result<Vec<RawHolder>>;

    /// Total count of funded token accounts for the mint
    async fn fetch_holder_count(&self, mint: &str) -> Result<usize>;

    /// First-funding edges for the given wallets, best effort
    async fn fetch_funding_edges(&self, wallets: &[String]) -> Result<Vec<FundingEdge>>;
}

/// Market-data REST provider
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch(&self, mint: &str) -> Result<Option<MarketSnapshot>>;
}

/// Token-security flags provider
#[async_trait]
pub trait SecuritySource: Send + Sync {
    async fn fetch(&self, mint: &str) -> Result<Option<SecurityFlags>>;
}

/// LP/holder report provider
#[async_trait]
pub trait LpReportSource: Send + Sync {
    async fn fetch(&self, mint: &str) -> Result<Option<LpReport>>;
}

/// Run one secondary fetch under its own timeout.
///
/// Errors and timeouts never propagate past this point: the corresponding
/// assessment field stays absent and the outcome is logged.
pub async fn fetch_secondary<T, F>(
    source_name: &'static str,
    mint: &str,
    timeout_ms: u64,
    fetch: F,
) -> Option<T>
where
    F: Future<Output = Result<Option<T>>>,
{
    match timeout(Duration::from_millis(timeout_ms), fetch).await {
        Ok(Ok(payload)) => {
            debug!(
                mint = %mint,
                source = source_name,
                present = payload.is_some(),
                "Secondary fetch complete"
            );
            payload
        }
        Ok(Err(e)) => {
            warn!(mint = %mint, source = source_name, error = %e, "Secondary source unavailable");
            None
        }
        Err(_) => {
            warn!(
                mint = %mint,
                source = source_name,
                timeout_ms,
                "Secondary source timed out"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_fetch_secondary_success() {
        let result = fetch_secondary("test", "mint", 1000, async { Ok(Some(7u32)) }).await;
        assert_eq!(result, Some(7));
    }

    #[tokio::test]
    async fn test_fetch_secondary_absent() {
        let result: Option<u32> = fetch_secondary("test", "mint", 1000, async { Ok(None) }).await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_fetch_secondary_error_degrades() {
        let result: Option<u32> = fetch_secondary("test", "mint", 1000, async {
            Err(Error::source_unavailable("test", "boom"))
        })
        .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_fetch_secondary_timeout_degrades() {
        let result: Option<u32> = fetch_secondary("test", "mint", 10, async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(Some(1))
        })
        .await;
        assert_eq!(result, None);
    }
}
