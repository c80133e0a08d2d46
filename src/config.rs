//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub clusters: ClusterConfig,
    #[serde(default)]
    pub reputation: ReputationConfig,
    #[serde(default)]
    pub exchanges: ExchangesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for the mandatory mint-fetch retry backoff
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Cap on signatures scanned per wallet when building funding edges
    #[serde(default = "default_funding_signature_limit")]
    pub funding_signature_limit: usize,
}

/// Per-provider endpoints and timeouts for the secondary fan-out
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_market_base_url")]
    pub market_base_url: String,
    #[serde(default = "default_market_timeout_ms")]
    pub market_timeout_ms: u64,

    #[serde(default = "default_security_base_url")]
    pub security_base_url: String,
    #[serde(default = "default_security_timeout_ms")]
    pub security_timeout_ms: u64,

    #[serde(default = "default_lp_report_base_url")]
    pub lp_report_base_url: String,
    #[serde(default = "default_lp_report_timeout_ms")]
    pub lp_report_timeout_ms: u64,

    /// Timeout for the primary ledger holder enumeration
    #[serde(default = "default_holders_timeout_ms")]
    pub holders_timeout_ms: u64,
    /// Timeout for the security-report holder fallback
    #[serde(default = "default_holder_fallback_timeout_ms")]
    pub holder_fallback_timeout_ms: u64,
    /// Timeout for the funding-history scan feeding cluster detection
    #[serde(default = "default_funding_timeout_ms")]
    pub funding_timeout_ms: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            market_base_url: default_market_base_url(),
            market_timeout_ms: default_market_timeout_ms(),
            security_base_url: default_security_base_url(),
            security_timeout_ms: default_security_timeout_ms(),
            lp_report_base_url: default_lp_report_base_url(),
            lp_report_timeout_ms: default_lp_report_timeout_ms(),
            holders_timeout_ms: default_holders_timeout_ms(),
            holder_fallback_timeout_ms: default_holder_fallback_timeout_ms(),
            funding_timeout_ms: default_funding_timeout_ms(),
        }
    }
}

/// Component weights, level thresholds, and red-flag trigger points
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_weight_authority")]
    pub weight_authority: f64,
    #[serde(default = "default_weight_holders")]
    pub weight_holders: f64,
    #[serde(default = "default_weight_liquidity")]
    pub weight_liquidity: f64,
    #[serde(default = "default_weight_market")]
    pub weight_market: f64,
    #[serde(default = "default_weight_bundles")]
    pub weight_bundles: f64,
    #[serde(default = "default_weight_security")]
    pub weight_security: f64,

    /// Score at or above this is LOW risk
    #[serde(default = "default_level_low")]
    pub level_low: u8,
    /// Score at or above this (but below low) is MODERATE risk
    #[serde(default = "default_level_moderate")]
    pub level_moderate: u8,
    /// Score at or above this (but below moderate) is HIGH risk
    #[serde(default = "default_level_high")]
    pub level_high: u8,

    /// Top-10 organic concentration above this is a critical flag
    #[serde(default = "default_concentration_critical_pct")]
    pub concentration_critical_pct: f64,
    /// Top-10 organic concentration above this is a high flag
    #[serde(default = "default_concentration_high_pct")]
    pub concentration_high_pct: f64,
    /// Single organic holder above this is a high flag
    #[serde(default = "default_single_holder_pct")]
    pub single_holder_pct: f64,
    /// Buy or sell tax above this is a high flag
    #[serde(default = "default_max_tax_pct")]
    pub max_tax_pct: f64,
    /// Market-cap to liquidity ratio above this is a medium flag
    #[serde(default = "default_max_mc_liquidity_ratio")]
    pub max_mc_liquidity_ratio: f64,
    /// Organic holder count below this is a low flag
    #[serde(default = "default_min_holder_count")]
    pub min_holder_count: usize,
    /// Liquidity below this USD floor is a medium flag (and RISKY without burn data)
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_authority: default_weight_authority(),
            weight_holders: default_weight_holders(),
            weight_liquidity: default_weight_liquidity(),
            weight_market: default_weight_market(),
            weight_bundles: default_weight_bundles(),
            weight_security: default_weight_security(),
            level_low: default_level_low(),
            level_moderate: default_level_moderate(),
            level_high: default_level_high(),
            concentration_critical_pct: default_concentration_critical_pct(),
            concentration_high_pct: default_concentration_high_pct(),
            single_holder_pct: default_single_holder_pct(),
            max_tax_pct: default_max_tax_pct(),
            max_mc_liquidity_ratio: default_max_mc_liquidity_ratio(),
            min_holder_count: default_min_holder_count(),
            min_liquidity_usd: default_min_liquidity_usd(),
        }
    }
}

/// Tuning knobs for bundle/cluster detection
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Supply-share tolerance (percentage points) for the fingerprint strategy
    #[serde(default = "default_share_tolerance_pct")]
    pub share_tolerance_pct: f64,
    /// Shares below this never fingerprint (dust)
    #[serde(default = "default_min_share_pct")]
    pub min_share_pct: f64,
    /// Wallets funded by one source within this window are correlated
    #[serde(default = "default_funding_window_secs")]
    pub funding_window_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            share_tolerance_pct: default_share_tolerance_pct(),
            min_share_pct: default_min_share_pct(),
            funding_window_secs: default_funding_window_secs(),
        }
    }
}

/// Reputation store paths and severity policy
#[derive(Debug, Clone, Deserialize)]
pub struct ReputationConfig {
    #[serde(default = "default_labels_path")]
    pub labels_path: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
    /// Severity at or above this counts as critical for rug accounting
    #[serde(default = "default_critical_severity")]
    pub critical_severity: u8,
    /// Severity added by an admin rug confirmation (capped at 100)
    #[serde(default = "default_confirm_severity_delta")]
    pub confirm_severity_delta: u8,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            labels_path: default_labels_path(),
            history_path: default_history_path(),
            critical_severity: default_critical_severity(),
            confirm_severity_delta: default_confirm_severity_delta(),
        }
    }
}

/// Exchange allow-list registry backing file
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangesConfig {
    #[serde(default = "default_exchanges_path")]
    pub file_path: String,
}

impl Default for ExchangesConfig {
    fn default() -> Self {
        Self {
            file_path: default_exchanges_path(),
        }
    }
}

// Default value functions
fn default_rpc_endpoint() -> String {
    std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_rpc_timeout_ms() -> u64 {
    15000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_funding_signature_limit() -> usize {
    25
}

fn default_market_base_url() -> String {
    "https://api.dexscreener.com".into()
}

fn default_market_timeout_ms() -> u64 {
    5000
}

fn default_security_base_url() -> String {
    "https://api.gopluslabs.io".into()
}

fn default_security_timeout_ms() -> u64 {
    5000
}

fn default_lp_report_base_url() -> String {
    "https://api.rugcheck.xyz".into()
}

fn default_lp_report_timeout_ms() -> u64 {
    5000
}

fn default_holders_timeout_ms() -> u64 {
    8000
}

fn default_holder_fallback_timeout_ms() -> u64 {
    4000
}

fn default_funding_timeout_ms() -> u64 {
    8000
}

fn default_weight_authority() -> f64 {
    0.25
}

fn default_weight_holders() -> f64 {
    0.20
}

fn default_weight_liquidity() -> f64 {
    0.25
}

fn default_weight_market() -> f64 {
    0.10
}

fn default_weight_bundles() -> f64 {
    0.10
}

fn default_weight_security() -> f64 {
    0.10
}

fn default_level_low() -> u8 {
    70
}

fn default_level_moderate() -> u8 {
    40
}

fn default_level_high() -> u8 {
    20
}

fn default_concentration_critical_pct() -> f64 {
    80.0
}

fn default_concentration_high_pct() -> f64 {
    50.0
}

fn default_single_holder_pct() -> f64 {
    30.0
}

fn default_max_tax_pct() -> f64 {
    5.0
}

fn default_max_mc_liquidity_ratio() -> f64 {
    100.0
}

fn default_min_holder_count() -> usize {
    50
}

fn default_min_liquidity_usd() -> f64 {
    1000.0
}

fn default_share_tolerance_pct() -> f64 {
    0.1
}

fn default_min_share_pct() -> f64 {
    0.25
}

fn default_funding_window_secs() -> u64 {
    3600
}

fn default_labels_path() -> String {
    "data/bad_actors.json".into()
}

fn default_history_path() -> String {
    "data/analysis_history.json".into()
}

fn default_critical_severity() -> u8 {
    80
}

fn default_confirm_severity_delta() -> u8 {
    20
}

fn default_exchanges_path() -> String {
    "data/exchange_wallets.json".into()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.timeout_ms", default_rpc_timeout_ms() as i64)?
            .set_default("rpc.max_retries", default_max_retries() as i64)?
            .set_default(
                "rpc.retry_base_delay_ms",
                default_retry_base_delay_ms() as i64,
            )?
            .set_default(
                "rpc.funding_signature_limit",
                default_funding_signature_limit() as i64,
            )?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix MINTGUARD_)
            .add_source(
                config::Environment::with_prefix("MINTGUARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let weight_sum = self.scoring.weight_authority
            + self.scoring.weight_holders
            + self.scoring.weight_liquidity
            + self.scoring.weight_market
            + self.scoring.weight_bundles
            + self.scoring.weight_security;
        if (weight_sum - 1.0).abs() > 0.001 {
            anyhow::bail!("scoring weights must sum to 1.0, got {:.3}", weight_sum);
        }

        if !(self.scoring.level_high < self.scoring.level_moderate
            && self.scoring.level_moderate < self.scoring.level_low)
        {
            anyhow::bail!(
                "level thresholds must be ordered high < moderate < low, got {}/{}/{}",
                self.scoring.level_high,
                self.scoring.level_moderate,
                self.scoring.level_low
            );
        }

        if self.scoring.level_low > 100 {
            anyhow::bail!("level_low cannot exceed 100");
        }

        // Score 0 is the failure sentinel and must stay below every level band
        if self.scoring.level_high == 0 {
            anyhow::bail!("level_high must be positive");
        }

        if self.clusters.share_tolerance_pct <= 0.0 {
            anyhow::bail!("share_tolerance_pct must be positive");
        }

        if self.clusters.funding_window_secs == 0 {
            anyhow::bail!("funding_window_secs must be positive");
        }

        if self.reputation.critical_severity > 100 {
            anyhow::bail!("critical_severity cannot exceed 100");
        }

        for (name, timeout) in [
            ("market_timeout_ms", self.sources.market_timeout_ms),
            ("security_timeout_ms", self.sources.security_timeout_ms),
            ("lp_report_timeout_ms", self.sources.lp_report_timeout_ms),
            ("holders_timeout_ms", self.sources.holders_timeout_ms),
            (
                "holder_fallback_timeout_ms",
                self.sources.holder_fallback_timeout_ms,
            ),
            ("funding_timeout_ms", self.sources.funding_timeout_ms),
        ] {
            if timeout == 0 {
                anyhow::bail!("{} must be positive", name);
            }
        }

        if self.reputation.labels_path.is_empty() || self.reputation.history_path.is_empty() {
            anyhow::bail!("reputation store paths cannot be empty");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    timeout: {}ms
    max_retries: {}
  Sources:
    market: {} ({}ms)
    security: {} ({}ms)
    lp_report: {} ({}ms)
  Scoring:
    weights: auth {} / holders {} / liq {} / market {} / bundles {} / security {}
    levels: LOW>={} MODERATE>={} HIGH>={}
  Clusters:
    share_tolerance: {}pp
    funding_window: {}s
  Reputation:
    labels: {}
    history: {}
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.rpc.max_retries,
            self.sources.market_base_url,
            self.sources.market_timeout_ms,
            self.sources.security_base_url,
            self.sources.security_timeout_ms,
            self.sources.lp_report_base_url,
            self.sources.lp_report_timeout_ms,
            self.scoring.weight_authority,
            self.scoring.weight_holders,
            self.scoring.weight_liquidity,
            self.scoring.weight_market,
            self.scoring.weight_bundles,
            self.scoring.weight_security,
            self.scoring.level_low,
            self.scoring.level_moderate,
            self.scoring.level_high,
            self.clusters.share_tolerance_pct,
            self.clusters.funding_window_secs,
            self.reputation.labels_path,
            self.reputation.history_path,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                endpoint: default_rpc_endpoint(),
                timeout_ms: default_rpc_timeout_ms(),
                max_retries: default_max_retries(),
                retry_base_delay_ms: default_retry_base_delay_ms(),
                funding_signature_limit: default_funding_signature_limit(),
            },
            sources: SourcesConfig::default(),
            scoring: ScoringConfig::default(),
            clusters: ClusterConfig::default(),
            reputation: ReputationConfig::default(),
            exchanges: ExchangesConfig::default(),
        }
    }
}
