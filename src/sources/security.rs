//! Security-scan REST connectors
//!
//! Two independent providers: a token-security flags endpoint (scam/honeypot
//! and trade taxes) and an LP report endpoint whose embedded holder list
//! doubles as the holder-enumeration fallback. Provider payloads are parsed
//! into explicit schemas here; nothing partially shaped leaves this module.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourcesConfig;
use crate::error::{Error, Result};
use crate::sources::{LpReport, LpReportSource, RawHolder, SecurityFlags, SecuritySource};

const FLAGS_SOURCE: &str = "security_flags";
const REPORT_SOURCE: &str = "lp_report";

/// Market types that mean supply still sits on a launch curve
const LAUNCH_CURVE_MARKETS: &[&str] = &["pump_fun", "launchlab"];

// ============ Token-security flags provider ============

/// Wire envelope: `result` maps the queried address to its security row
#[derive(Debug, Deserialize)]
struct FlagsResponse {
    code: Option<i64>,
    message: Option<String>,
    result: Option<HashMap<String, FlagsEntry>>,
}

/// Security row. The provider reports booleans as "0"/"1" strings and
/// taxes as fractional strings ("0.05" = 5%).
#[derive(Debug, Deserialize)]
struct FlagsEntry {
    is_honeypot: Option<String>,
    is_blacklisted: Option<String>,
    buy_tax: Option<String>,
    sell_tax: Option<String>,
}

fn wire_bool(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("1"))
}

fn wire_tax_pct(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .and_then(|v| v.parse::<f64>().ok())
        .map(|fraction| fraction * 100.0)
}

pub struct SecurityFlagsConnector {
    client: reqwest::Client,
    base_url: String,
}

impl SecurityFlagsConnector {
    pub fn new(config: &SourcesConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.security_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.security_base_url.clone(),
        }
    }
}

#[async_trait]
impl SecuritySource for SecurityFlagsConnector {
    async fn fetch(&self, mint: &str) -> Result<Option<SecurityFlags>> {
        let url = format!(
            "{}/api/v1/token_security/solana?contract_addresses={}",
            self.base_url, mint
        );
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::source_unavailable(
                FLAGS_SOURCE,
                format!("status {}", response.status()),
            ));
        }

        let body: FlagsResponse = response.json().await.map_err(|e| Error::SourcePayload {
            source_name: FLAGS_SOURCE.to_string(),
            reason: e.to_string(),
        })?;

        if body.code.is_some() && body.code != Some(1) {
            return Err(Error::source_unavailable(
                FLAGS_SOURCE,
                body.message.unwrap_or_else(|| "provider error".into()),
            ));
        }

        let Some(entry) = body.result.and_then(|mut map| map.remove(mint)) else {
            debug!(mint = %mint, "Security provider has no entry for token");
            return Ok(None);
        };

        Ok(Some(SecurityFlags {
            is_scam: wire_bool(&entry.is_blacklisted),
            is_honeypot: wire_bool(&entry.is_honeypot),
            buy_tax_pct: wire_tax_pct(&entry.buy_tax),
            sell_tax_pct: wire_tax_pct(&entry.sell_tax),
        }))
    }
}

// ============ LP report provider ============

#[derive(Debug, Deserialize)]
struct ReportResponse {
    creator: Option<String>,
    rugged: Option<bool>,
    markets: Option<Vec<ReportMarket>>,
    #[serde(rename = "topHolders")]
    top_holders: Option<Vec<ReportHolder>>,
}

#[derive(Debug, Deserialize)]
struct ReportMarket {
    #[serde(rename = "marketType")]
    market_type: Option<String>,
    lp: Option<ReportLp>,
}

#[derive(Debug, Deserialize)]
struct ReportLp {
    /// Burned-or-locked share of LP supply, already a percentage
    #[serde(rename = "lpLockedPct")]
    lp_locked_pct: Option<f64>,
    /// Locker program holding the LP tokens, when one is recognized
    locker: Option<String>,
}

/// Holder row as the report carries it: `owner` is the wallet, `amount` the
/// raw balance of its token account
#[derive(Debug, Deserialize)]
struct ReportHolder {
    owner: Option<String>,
    amount: Option<u64>,
}

pub struct LpReportConnector {
    client: reqwest::Client,
    base_url: String,
}

impl LpReportConnector {
    pub fn new(config: &SourcesConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.lp_report_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.lp_report_base_url.clone(),
        }
    }

    fn convert(report: ReportResponse) -> LpReport {
        let markets = report.markets.unwrap_or_default();
        let pool_exists = !markets.is_empty();
        let pre_migration = pool_exists
            && markets.iter().all(|m| {
                m.market_type
                    .as_deref()
                    .map(|t| LAUNCH_CURVE_MARKETS.contains(&t))
                    .unwrap_or(false)
            });

        // Deepest measurement wins when several pools report a burn figure
        let burn_pct = markets
            .iter()
            .filter_map(|m| m.lp.as_ref().and_then(|lp| lp.lp_locked_pct))
            .fold(None, |best: Option<f64>, pct| {
                Some(best.map_or(pct, |b| b.max(pct)))
            });
        let permanent_lock = markets
            .iter()
            .any(|m| m.lp.as_ref().map(|lp| lp.locker.is_some()).unwrap_or(false));

        let holders = report
            .top_holders
            .unwrap_or_default()
            .into_iter()
            .filter_map(|h| {
                let address = h.owner?;
                let balance = h.amount?;
                if balance == 0 {
                    return None;
                }
                Some(RawHolder { address, balance })
            })
            .collect();

        LpReport {
            creator: report.creator,
            rugged: report.rugged.unwrap_or(false),
            pool_exists,
            burn_pct,
            permanent_lock,
            pre_migration,
            holders,
        }
    }
}

#[async_trait]
impl LpReportSource for LpReportConnector {
    async fn fetch(&self, mint: &str) -> Result<Option<LpReport>> {
        let url = format!("{}/v1/tokens/{}/report", self.base_url, mint);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(mint = %mint, "No LP report for token");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::source_unavailable(
                REPORT_SOURCE,
                format!("status {}", response.status()),
            ));
        }

        let body: ReportResponse = response.json().await.map_err(|e| Error::SourcePayload {
            source_name: REPORT_SOURCE.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(Self::convert(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_bool_and_tax() {
        assert!(wire_bool(&Some("1".into())));
        assert!(!wire_bool(&Some("0".into())));
        assert!(!wire_bool(&None));
        assert_eq!(wire_tax_pct(&Some("0.05".into())), Some(5.0));
        assert_eq!(wire_tax_pct(&Some("garbage".into())), None);
        assert_eq!(wire_tax_pct(&None), None);
    }

    #[test]
    fn test_flags_response_parse() {
        let json = r#"{
            "code": 1,
            "message": "OK",
            "result": {
                "Mint111": {
                    "is_honeypot": "1",
                    "is_blacklisted": "0",
                    "buy_tax": "0.02",
                    "sell_tax": "0.12"
                }
            }
        }"#;
        let body: FlagsResponse = serde_json::from_str(json).unwrap();
        let entry = body.result.unwrap().remove("Mint111").unwrap();
        assert!(wire_bool(&entry.is_honeypot));
        assert!(!wire_bool(&entry.is_blacklisted));
        assert_eq!(wire_tax_pct(&entry.sell_tax), Some(12.0));
    }

    #[test]
    fn test_report_convert_migrated_pool() {
        let report = ReportResponse {
            creator: Some("CreatorWallet".into()),
            rugged: Some(false),
            markets: Some(vec![ReportMarket {
                market_type: Some("raydium".into()),
                lp: Some(ReportLp {
                    lp_locked_pct: Some(99.99),
                    locker: None,
                }),
            }]),
            top_holders: Some(vec![
                ReportHolder {
                    owner: Some("Wallet1".into()),
                    amount: Some(5_000),
                },
                ReportHolder {
                    owner: Some("Wallet2".into()),
                    amount: Some(0),
                },
            ]),
        };
        let lp = LpReportConnector::convert(report);
        assert!(lp.pool_exists);
        assert!(!lp.pre_migration);
        assert_eq!(lp.burn_pct, Some(99.99));
        assert!(!lp.permanent_lock);
        assert_eq!(lp.holders.len(), 1);
        assert_eq!(lp.creator.as_deref(), Some("CreatorWallet"));
    }

    #[test]
    fn test_report_convert_launch_curve() {
        let report = ReportResponse {
            creator: None,
            rugged: None,
            markets: Some(vec![ReportMarket {
                market_type: Some("pump_fun".into()),
                lp: None,
            }]),
            top_holders: None,
        };
        let lp = LpReportConnector::convert(report);
        assert!(lp.pool_exists);
        assert!(lp.pre_migration);
        assert_eq!(lp.burn_pct, None);
    }

    #[test]
    fn test_report_convert_takes_best_burn_measurement() {
        let report = ReportResponse {
            creator: None,
            rugged: Some(true),
            markets: Some(vec![
                ReportMarket {
                    market_type: Some("raydium".into()),
                    lp: Some(ReportLp {
                        lp_locked_pct: Some(40.0),
                        locker: None,
                    }),
                },
                ReportMarket {
                    market_type: Some("meteora".into()),
                    lp: Some(ReportLp {
                        lp_locked_pct: Some(97.5),
                        locker: Some("Locker111".into()),
                    }),
                },
            ]),
            top_holders: None,
        };
        let lp = LpReportConnector::convert(report);
        assert!(lp.rugged);
        assert_eq!(lp.burn_pct, Some(97.5));
        assert!(lp.permanent_lock);
    }
}
