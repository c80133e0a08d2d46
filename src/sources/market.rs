//! Market-data REST connector (DexScreener token-pairs API)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SourcesConfig;
use crate::error::{Error, Result};
use crate::sources::{MarketSnapshot, MarketSource};

const SOURCE_NAME: &str = "market";

/// Dex identifiers that mean the token still trades on a launch curve
const LAUNCH_CURVE_DEXES: &[&str] = &["pumpfun", "launchlab", "moonshot"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Liquidity {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexPair {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "dexId")]
    pub dex_id: String,
    #[serde(rename = "pairAddress")]
    pub pair_address: String,
    #[serde(rename = "baseToken")]
    pub base_token: BaseToken,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
    pub volume: Option<Volume>,
    pub liquidity: Option<Liquidity>,
    #[serde(rename = "marketCap")]
    pub market_cap: Option<f64>,
    pub fdv: Option<f64>,
}

impl DexPair {
    fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    fn is_launch_curve(&self) -> bool {
        LAUNCH_CURVE_DEXES.contains(&self.dex_id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairsResponse {
    pub pairs: Option<Vec<DexPair>>,
}

pub struct MarketConnector {
    client: reqwest::Client,
    base_url: String,
}

impl MarketConnector {
    pub fn new(config: &SourcesConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.market_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.market_base_url.clone(),
        }
    }

    async fn get_token_pairs(&self, mint: &str) -> Result<Vec<DexPair>> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, mint);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Error::source_unavailable(
                SOURCE_NAME,
                format!("status {}", response.status()),
            ));
        }

        let data: TokenPairsResponse = response
            .json()
            .await
            .map_err(|e| Error::SourcePayload {
                source_name: SOURCE_NAME.to_string(),
                reason: e.to_string(),
            })?;
        Ok(data.pairs.unwrap_or_default())
    }

    /// Pick the venue that matters: the deepest pool wins
    fn best_pair(pairs: Vec<DexPair>) -> Option<DexPair> {
        pairs.into_iter().max_by(|a, b| {
            a.liquidity_usd()
                .partial_cmp(&b.liquidity_usd())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[async_trait]
impl MarketSource for MarketConnector {
    async fn fetch(&self, mint: &str) -> Result<Option<MarketSnapshot>> {
        let pairs = self.get_token_pairs(mint).await?;
        debug!(mint = %mint, pairs = pairs.len(), "Market pairs fetched");

        let Some(pair) = Self::best_pair(pairs) else {
            return Ok(None);
        };

        let price_usd = pair.price_usd.as_ref().and_then(|p| p.parse::<f64>().ok());
        let pre_migration = pair.is_launch_curve();

        Ok(Some(MarketSnapshot {
            pool_address: Some(pair.pair_address.clone()),
            price_usd,
            liquidity_usd: pair.liquidity.as_ref().and_then(|l| l.usd),
            market_cap_usd: pair.market_cap.or(pair.fdv),
            volume_24h_usd: pair.volume.as_ref().and_then(|v| v.h24),
            pre_migration,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(dex_id: &str, liquidity_usd: f64) -> DexPair {
        DexPair {
            chain_id: "solana".into(),
            dex_id: dex_id.into(),
            pair_address: format!("{}-pool", dex_id),
            base_token: BaseToken {
                address: "mint".into(),
                name: None,
                symbol: None,
            },
            price_usd: Some("0.0001".into()),
            volume: None,
            liquidity: Some(Liquidity {
                usd: Some(liquidity_usd),
                base: None,
                quote: None,
            }),
            market_cap: Some(50_000.0),
            fdv: None,
        }
    }

    #[test]
    fn test_best_pair_prefers_deepest_pool() {
        let best = MarketConnector::best_pair(vec![
            pair("raydium", 12_000.0),
            pair("pumpswap", 48_000.0),
            pair("orca", 3_000.0),
        ])
        .unwrap();
        assert_eq!(best.pair_address, "pumpswap-pool");
    }

    #[test]
    fn test_launch_curve_detection() {
        assert!(pair("pumpfun", 1_000.0).is_launch_curve());
        assert!(!pair("pumpswap", 1_000.0).is_launch_curve());
        assert!(!pair("raydium", 1_000.0).is_launch_curve());
    }

    #[test]
    fn test_pairs_response_parse() {
        let json = r#"{
            "pairs": [{
                "chainId": "solana",
                "dexId": "pumpswap",
                "pairAddress": "PoolAddr111",
                "baseToken": {"address": "Mint111", "name": "Test", "symbol": "TST"},
                "priceUsd": "0.000042",
                "volume": {"h24": 125000.5},
                "liquidity": {"usd": 48000.0},
                "marketCap": 420000.0
            }]
        }"#;
        let parsed: TokenPairsResponse = serde_json::from_str(json).unwrap();
        let pairs = parsed.pairs.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].liquidity_usd(), 48000.0);
    }
}
