//! Shared data structures for the analysis pipeline

use crate::config::ScoringConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger state of the token mint, fetched fresh per analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub address: String,
    pub decimals: u8,
    pub supply: u64,
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TokenSnapshot {
    /// Convert a raw token amount to its UI representation
    pub fn ui_amount(&self, raw: u64) -> f64 {
        raw as f64 / 10f64.powi(self.decimals as i32)
    }

    /// Percentage of total supply held by a raw amount
    pub fn pct_of_supply(&self, raw: u64) -> f64 {
        if self.supply == 0 {
            return 0.0;
        }
        raw as f64 / self.supply as f64 * 100.0
    }
}

/// Classification of a token holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderTag {
    /// Regular wallet, counts toward concentration
    Organic,
    /// Known exchange deposit wallet
    Exchange,
    /// Liquidity pool vault
    Lp,
    /// Protocol or system-owned account
    Protocol,
    /// Member of a detected single-actor cluster
    Bundled,
}

impl std::fmt::Display for HolderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HolderTag::Organic => write!(f, "organic"),
            HolderTag::Exchange => write!(f, "exchange"),
            HolderTag::Lp => write!(f, "lp"),
            HolderTag::Protocol => write!(f, "protocol"),
            HolderTag::Bundled => write!(f, "bundled"),
        }
    }
}

/// One holder row after classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderRecord {
    pub address: String,
    pub balance: u64,
    pub pct_of_supply: f64,
    pub tag: HolderTag,
}

/// Where the holder list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderSource {
    Ledger,
    FallbackReport,
    Unavailable,
}

/// First-funding relationship for one wallet, input to cluster detection only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingEdge {
    pub wallet: String,
    pub funder: String,
    pub funded_at: DateTime<Utc>,
}

/// Detection strategy that produced a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStrategy {
    FundingCorrelation,
    ShareFingerprint,
}

/// Confidence tier for a detected cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Medium,
    High,
}

/// Wallets likely controlled by one actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterGroup {
    pub members: Vec<String>,
    pub strategy: ClusterStrategy,
    pub confidence: ConfidenceTier,
    /// Combined share of total supply held by the members
    pub total_pct: f64,
}

/// Aggregate bundle findings for one token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleDetection {
    pub groups: Vec<ClusterGroup>,
    pub bundled_count: usize,
    pub bundled_pct: f64,
    /// Highest confidence across groups, if any were found
    pub confidence: Option<ConfidenceTier>,
}

impl BundleDetection {
    pub fn empty() -> Self {
        Self {
            groups: Vec::new(),
            bundled_count: 0,
            bundled_pct: 0.0,
            confidence: None,
        }
    }

    pub fn detected(&self) -> bool {
        !self.groups.is_empty()
    }
}

/// Mint or freeze permission state; the revoked bit is derived, never stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityVerdict {
    address: Option<String>,
    has_authority: bool,
    is_revoked: bool,
}

impl AuthorityVerdict {
    /// Build the verdict from the on-chain authority field
    pub fn new(address: Option<String>) -> Self {
        let has_authority = address.is_some();
        Self {
            address,
            has_authority,
            is_revoked: !has_authority,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn has_authority(&self) -> bool {
        self.has_authority
    }

    pub fn is_revoked(&self) -> bool {
        self.is_revoked
    }
}

/// Both mint-level permissions for one token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorities {
    pub mint: AuthorityVerdict,
    pub freeze: AuthorityVerdict,
}

impl Authorities {
    pub fn from_snapshot(snapshot: &TokenSnapshot) -> Self {
        Self {
            mint: AuthorityVerdict::new(snapshot.mint_authority.clone()),
            freeze: AuthorityVerdict::new(snapshot.freeze_authority.clone()),
        }
    }

    /// True when neither permission can be exercised anymore
    pub fn fully_revoked(&self) -> bool {
        self.mint.is_revoked() && self.freeze.is_revoked()
    }
}

/// Liquidity safety status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LiquidityStatus {
    Safe,
    Risky,
    Unknown,
}

impl std::fmt::Display for LiquidityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiquidityStatus::Safe => write!(f, "SAFE"),
            LiquidityStatus::Risky => write!(f, "RISKY"),
            LiquidityStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Pool existence and burn/lock verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityState {
    pub exists: bool,
    pub is_locked: bool,
    pub is_burned: bool,
    pub burn_percentage: f64,
    pub status: LiquidityStatus,
}

impl LiquidityState {
    /// State when no pool could be located
    pub fn unknown() -> Self {
        Self {
            exists: false,
            is_locked: false,
            is_burned: false,
            burn_percentage: 0.0,
            status: LiquidityStatus::Unknown,
        }
    }
}

/// Severity attached to a red flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for FlagSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagSeverity::Low => write!(f, "low"),
            FlagSeverity::Medium => write!(f, "medium"),
            FlagSeverity::High => write!(f, "high"),
            FlagSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Discrete finding categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    MintAuthority,
    FreezeAuthority,
    HolderConcentration,
    SingleHolder,
    LpUnburned,
    LpPartialBurn,
    ThinLiquidity,
    BundleDetected,
    ScamReport,
    RuggedReport,
    ExcessiveTax,
    McLiquidityRatio,
    LowHolderCount,
    AnalysisFailed,
}

/// A discrete, severity-tagged finding; immutable once attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedFlag {
    pub kind: FlagKind,
    pub severity: FlagSeverity,
    pub title: String,
    pub description: String,
}

impl RedFlag {
    pub fn new(
        kind: FlagKind,
        severity: FlagSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Composite safety score, the single polarity authority: 100 = safest.
///
/// Computed scores are clamped to 1..=100; 0 is reserved for the
/// analysis-failed sentinel and is unreachable through scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafetyScore(u8);

impl SafetyScore {
    pub const MAX: u8 = 100;

    /// Clamp a weighted component sum into the legitimate score range
    pub fn from_weighted(raw: f64) -> Self {
        Self(raw.round().clamp(1.0, Self::MAX as f64) as u8)
    }

    /// Sentinel for an analysis that could not run
    pub fn failed() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_failure_sentinel(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for SafetyScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/100", self.0)
    }
}

/// Risk level derived from the safety score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskLevel {
    /// The only score-to-level mapping in the crate
    pub fn from_score(score: SafetyScore, scoring: &ScoringConfig) -> Self {
        let v = score.value();
        if v >= scoring.level_low {
            RiskLevel::Low
        } else if v >= scoring.level_moderate {
            RiskLevel::Moderate
        } else if v >= scoring.level_high {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Moderate => write!(f, "MODERATE"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// Per-component scores before weighting, each in [0,100], 100 = safest.
/// `None` marks a component whose source data was unavailable; absent
/// components drop out of the weighted sum instead of diluting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub authority: Option<f64>,
    pub holders: Option<f64>,
    pub liquidity: Option<f64>,
    pub market: Option<f64>,
    pub bundles: Option<f64>,
    pub security: Option<f64>,
}

/// Count and combined share of one excluded holder category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedCategory {
    pub tag: HolderTag,
    pub count: usize,
    pub total_pct: f64,
}

/// Transparency block: what was filtered out of concentration math and why
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderFiltering {
    /// Combined share of supply across every tracked holder
    pub total_pct: f64,
    pub organic_count: usize,
    pub organic_pct: f64,
    pub excluded: Vec<ExcludedCategory>,
    pub bundled_detection: Option<BundleDetection>,
}

impl HolderFiltering {
    pub fn empty() -> Self {
        Self {
            total_pct: 0.0,
            organic_count: 0,
            organic_pct: 0.0,
            excluded: Vec::new(),
            bundled_detection: None,
        }
    }
}

/// Market snapshot carried into the assessment when the connector succeeded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMetrics {
    pub price_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
}

/// The engine's single output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub analysis_id: Uuid,
    pub token: String,
    pub score: SafetyScore,
    pub level: RiskLevel,
    pub breakdown: ScoreBreakdown,
    pub authorities: Option<Authorities>,
    pub holder_count: usize,
    pub top_holders: Vec<HolderRecord>,
    pub holder_source: HolderSource,
    pub holder_filtering: HolderFiltering,
    pub liquidity_pool: LiquidityState,
    pub market: Option<MarketMetrics>,
    /// Creator wallet reported by the LP scan, when known
    pub creator: Option<String>,
    pub red_flags: Vec<RedFlag>,
    pub analysis_failed: bool,
    pub analyzed_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// Degenerate assessment for a pipeline that could not start.
    ///
    /// Carries the failure sentinel score and exactly one critical flag;
    /// `analysis_failed` keeps it distinguishable from a real extreme score.
    pub fn failed(token: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            analysis_id: Uuid::new_v4(),
            token: token.into(),
            score: SafetyScore::failed(),
            level: RiskLevel::Extreme,
            breakdown: ScoreBreakdown::default(),
            authorities: None,
            holder_count: 0,
            top_holders: Vec::new(),
            holder_source: HolderSource::Unavailable,
            holder_filtering: HolderFiltering::empty(),
            liquidity_pool: LiquidityState::unknown(),
            market: None,
            creator: None,
            red_flags: vec![RedFlag::new(
                FlagKind::AnalysisFailed,
                FlagSeverity::Critical,
                "Analysis Failed",
                reason.to_string(),
            )],
            analysis_failed: true,
            analyzed_at: Utc::now(),
        }
    }

    /// Highest severity across attached flags
    pub fn max_severity(&self) -> Option<FlagSeverity> {
        self.red_flags.iter().map(|f| f.severity).max()
    }

    pub fn has_flag(&self, kind: FlagKind) -> bool {
        self.red_flags.iter().any(|f| f.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_verdict_complement() {
        let active = AuthorityVerdict::new(Some("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU".into()));
        assert!(active.has_authority());
        assert!(!active.is_revoked());

        let revoked = AuthorityVerdict::new(None);
        assert!(!revoked.has_authority());
        assert!(revoked.is_revoked());
    }

    #[test]
    fn test_safety_score_clamps_above_sentinel() {
        assert_eq!(SafetyScore::from_weighted(-50.0).value(), 1);
        assert_eq!(SafetyScore::from_weighted(0.0).value(), 1);
        assert_eq!(SafetyScore::from_weighted(250.0).value(), 100);
        assert_eq!(SafetyScore::from_weighted(55.4).value(), 55);
        assert!(!SafetyScore::from_weighted(0.0).is_failure_sentinel());
        assert!(SafetyScore::failed().is_failure_sentinel());
    }

    #[test]
    fn test_risk_level_thresholds() {
        let scoring = ScoringConfig::default();
        assert_eq!(
            RiskLevel::from_score(SafetyScore::from_weighted(85.0), &scoring),
            RiskLevel::Low
        );
        assert_eq!(
            RiskLevel::from_score(SafetyScore::from_weighted(70.0), &scoring),
            RiskLevel::Low
        );
        assert_eq!(
            RiskLevel::from_score(SafetyScore::from_weighted(69.0), &scoring),
            RiskLevel::Moderate
        );
        assert_eq!(
            RiskLevel::from_score(SafetyScore::from_weighted(39.0), &scoring),
            RiskLevel::High
        );
        assert_eq!(
            RiskLevel::from_score(SafetyScore::from_weighted(5.0), &scoring),
            RiskLevel::Extreme
        );
        assert_eq!(
            RiskLevel::from_score(SafetyScore::failed(), &scoring),
            RiskLevel::Extreme
        );
    }

    #[test]
    fn test_failed_assessment_shape() {
        let assessment = RiskAssessment::failed("BadMint111", "rpc unreachable");
        assert!(assessment.analysis_failed);
        assert!(assessment.score.is_failure_sentinel());
        assert_eq!(assessment.red_flags.len(), 1);
        assert_eq!(assessment.red_flags[0].title, "Analysis Failed");
        assert_eq!(assessment.red_flags[0].severity, FlagSeverity::Critical);
        assert!(assessment.red_flags[0].description.contains("rpc unreachable"));
    }

    #[test]
    fn test_snapshot_percentages() {
        let snapshot = TokenSnapshot {
            address: "mint".into(),
            decimals: 6,
            supply: 1_000_000_000,
            mint_authority: None,
            freeze_authority: None,
            created_at: None,
        };
        assert!((snapshot.pct_of_supply(20_000_000) - 2.0).abs() < 1e-9);
        assert!((snapshot.ui_amount(1_500_000) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(FlagSeverity::Critical > FlagSeverity::High);
        assert!(FlagSeverity::High > FlagSeverity::Medium);
        assert!(FlagSeverity::Medium > FlagSeverity::Low);
    }
}
