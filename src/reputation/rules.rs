//! Automatic flagging rules
//!
//! A deterministic pass over a completed assessment that proposes
//! `FlagWallet` calls. Rules target the token's authority wallet, the actor
//! who can exercise the risky permission; bundle rules target the bundled
//! members themselves. Evidence strings are stable for identical findings,
//! so re-analyzing an unchanged token never duplicates evidence.

use tracing::debug;

use crate::analysis::holders::top_concentration;
use crate::analysis::types::{ConfidenceTier, FlagKind, FlagSeverity, RiskAssessment, RiskLevel};
use crate::reputation::store::LabelType;
use crate::sources::SecurityFlags;

/// One proposed `FlagWallet` call
#[derive(Debug, Clone)]
pub struct FlagRequest {
    pub wallet: String,
    pub label_type: LabelType,
    pub severity: u8,
    pub evidence: String,
    pub method: String,
    pub confidence: f64,
}

/// Propose labels for a completed, non-failed assessment
pub fn evaluate(
    assessment: &RiskAssessment,
    security: Option<&SecurityFlags>,
) -> Vec<FlagRequest> {
    if assessment.analysis_failed {
        return Vec::new();
    }

    let token = &assessment.token;
    let mut requests = Vec::new();

    let target = primary_target(assessment);
    if let Some(wallet) = &target {
        // Provider scam or honeypot flag
        if assessment.has_flag(FlagKind::ScamReport) {
            requests.push(FlagRequest {
                wallet: wallet.clone(),
                label_type: LabelType::ScamTokenCreator,
                severity: 90,
                evidence: format!("Token {token} flagged as scam/honeypot by security provider"),
                method: "security_provider_flag".to_string(),
                confidence: 0.9,
            });
        }

        // Provider already recorded the rug
        if assessment.has_flag(FlagKind::RuggedReport) {
            requests.push(FlagRequest {
                wallet: wallet.clone(),
                label_type: LabelType::ScamTokenCreator,
                severity: 90,
                evidence: format!("Token {token} marked already rugged by the LP report provider"),
                method: "report_rugged".to_string(),
                confidence: 0.9,
            });
        }

        // Confiscatory trading taxes
        if assessment.has_flag(FlagKind::ExcessiveTax) {
            let (buy, sell) = security
                .map(|s| {
                    (
                        s.buy_tax_pct.unwrap_or(0.0),
                        s.sell_tax_pct.unwrap_or(0.0),
                    )
                })
                .unwrap_or((0.0, 0.0));
            requests.push(FlagRequest {
                wallet: wallet.clone(),
                label_type: LabelType::ScamTokenCreator,
                severity: 70,
                evidence: format!("Token {token} trades with {buy:.1}%/{sell:.1}% taxes"),
                method: "excessive_tax".to_string(),
                confidence: 0.7,
            });
        }

        // Live authority on a token already rated dangerous
        let authority_active = assessment
            .authorities
            .as_ref()
            .map(|a| !a.fully_revoked())
            .unwrap_or(false);
        let dangerous = matches!(assessment.level, RiskLevel::High | RiskLevel::Extreme);
        if authority_active && dangerous {
            requests.push(FlagRequest {
                wallet: wallet.clone(),
                label_type: LabelType::Suspicious,
                severity: 60,
                evidence: format!(
                    "Token {token} rated {} with an active mint or freeze authority",
                    assessment.level
                ),
                method: "active_authority_high_risk".to_string(),
                confidence: 0.6,
            });
        }

        // Extreme organic concentration
        if assessment
            .red_flags
            .iter()
            .any(|f| f.kind == FlagKind::HolderConcentration && f.severity == FlagSeverity::Critical)
        {
            let pct = top_concentration(&assessment.top_holders, 10);
            requests.push(FlagRequest {
                wallet: wallet.clone(),
                label_type: LabelType::Suspicious,
                severity: 65,
                evidence: format!(
                    "Token {token}: top organic holders control {pct:.1}% of supply"
                ),
                method: "extreme_concentration".to_string(),
                confidence: 0.7,
            });
        }

        // Pool too thin to absorb an exit
        if assessment.has_flag(FlagKind::ThinLiquidity) {
            requests.push(FlagRequest {
                wallet: wallet.clone(),
                label_type: LabelType::Suspicious,
                severity: 40,
                evidence: format!("Token {token} pool liquidity below configured floor"),
                method: "thin_liquidity".to_string(),
                confidence: 0.5,
            });
        }
    } else if !assessment.red_flags.is_empty() {
        debug!(token = %token, "No authority or creator wallet to attach labels to");
    }

    // Bundled members get their own label regardless of the primary target
    if let Some(detection) = &assessment.holder_filtering.bundled_detection {
        for group in &detection.groups {
            let (severity, confidence) = match group.confidence {
                ConfidenceTier::High => (70, 0.8),
                ConfidenceTier::Medium => (55, 0.6),
            };
            for member in &group.members {
                requests.push(FlagRequest {
                    wallet: member.clone(),
                    label_type: LabelType::Bundler,
                    severity,
                    evidence: format!(
                        "Member of {}-wallet coordinated group on token {token}",
                        group.members.len()
                    ),
                    method: "bundle_detection".to_string(),
                    confidence,
                });
            }
        }
    }

    requests
}

/// The wallet automatic rules attach to: whoever can still exercise an
/// authority, else the recorded creator
fn primary_target(assessment: &RiskAssessment) -> Option<String> {
    assessment
        .authorities
        .as_ref()
        .and_then(|a| a.mint.address().or_else(|| a.freeze.address()))
        .map(str::to_string)
        .or_else(|| assessment.creator.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{
        Authorities, BundleDetection, ClusterGroup, ClusterStrategy, ConfidenceTier, FlagSeverity,
        HolderRecord, HolderTag, RedFlag, SafetyScore, TokenSnapshot,
    };

    fn base_assessment(mint_authority: Option<&str>) -> RiskAssessment {
        let snapshot = TokenSnapshot {
            address: "Mint111".to_string(),
            decimals: 6,
            supply: 1_000_000,
            mint_authority: mint_authority.map(String::from),
            freeze_authority: None,
            created_at: None,
        };
        let mut assessment = RiskAssessment::failed(snapshot.address.clone(), "placeholder");
        assessment.analysis_failed = false;
        assessment.red_flags.clear();
        // Neutral rating so each test triggers exactly the rule it targets
        assessment.score = SafetyScore::from_weighted(90.0);
        assessment.level = RiskLevel::Low;
        assessment.authorities = Some(Authorities::from_snapshot(&snapshot));
        assessment
    }

    #[test]
    fn test_scam_flag_targets_authority_wallet() {
        let mut assessment = base_assessment(Some("Deployer1"));
        assessment.red_flags.push(RedFlag::new(
            FlagKind::ScamReport,
            FlagSeverity::Critical,
            "Scam Or Honeypot Reported",
            "test",
        ));

        let requests = evaluate(&assessment, None);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].wallet, "Deployer1");
        assert_eq!(requests[0].label_type, LabelType::ScamTokenCreator);
        assert_eq!(requests[0].severity, 90);
    }

    #[test]
    fn test_rugged_report_labels_creator_as_scammer() {
        let mut assessment = base_assessment(Some("Deployer1"));
        assessment.red_flags.push(RedFlag::new(
            FlagKind::RuggedReport,
            FlagSeverity::Critical,
            "Rug Already Reported",
            "test",
        ));

        let requests = evaluate(&assessment, None);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].wallet, "Deployer1");
        assert_eq!(requests[0].label_type, LabelType::ScamTokenCreator);
        assert_eq!(requests[0].severity, 90);
        assert!(requests[0].evidence.contains("already rugged"));
    }

    #[test]
    fn test_no_target_no_wallet_rules() {
        let mut assessment = base_assessment(None);
        assessment.red_flags.push(RedFlag::new(
            FlagKind::ScamReport,
            FlagSeverity::Critical,
            "Scam Or Honeypot Reported",
            "test",
        ));

        assert!(evaluate(&assessment, None).is_empty());
    }

    #[test]
    fn test_creator_is_fallback_target() {
        let mut assessment = base_assessment(None);
        assessment.creator = Some("Creator1".to_string());
        assessment.red_flags.push(RedFlag::new(
            FlagKind::ScamReport,
            FlagSeverity::Critical,
            "Scam Or Honeypot Reported",
            "test",
        ));

        let requests = evaluate(&assessment, None);
        assert_eq!(requests[0].wallet, "Creator1");
    }

    #[test]
    fn test_active_authority_on_dangerous_token() {
        let mut assessment = base_assessment(Some("Deployer1"));
        assessment.score = SafetyScore::from_weighted(25.0);
        assessment.level = RiskLevel::High;

        let requests = evaluate(&assessment, None);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].wallet, "Deployer1");
        assert_eq!(requests[0].label_type, LabelType::Suspicious);
        assert_eq!(requests[0].severity, 60);
        assert!(requests[0].evidence.contains("HIGH"));
    }

    #[test]
    fn test_bundled_members_each_get_a_label() {
        let mut assessment = base_assessment(None);
        assessment.top_holders = vec![
            HolderRecord {
                address: "W1".to_string(),
                balance: 100,
                pct_of_supply: 2.0,
                tag: HolderTag::Bundled,
            },
            HolderRecord {
                address: "W2".to_string(),
                balance: 100,
                pct_of_supply: 2.0,
                tag: HolderTag::Bundled,
            },
            HolderRecord {
                address: "W3".to_string(),
                balance: 100,
                pct_of_supply: 2.0,
                tag: HolderTag::Bundled,
            },
        ];
        assessment.holder_filtering.bundled_detection = Some(BundleDetection {
            groups: vec![ClusterGroup {
                members: vec!["W1".to_string(), "W2".to_string(), "W3".to_string()],
                strategy: ClusterStrategy::FundingCorrelation,
                confidence: ConfidenceTier::High,
                total_pct: 6.0,
            }],
            bundled_count: 3,
            bundled_pct: 6.0,
            confidence: Some(ConfidenceTier::High),
        });

        let requests = evaluate(&assessment, None);
        let bundlers: Vec<&FlagRequest> = requests
            .iter()
            .filter(|r| r.label_type == LabelType::Bundler)
            .collect();
        assert_eq!(bundlers.len(), 3);
        assert!(bundlers.iter().all(|r| r.severity == 70));
    }

    #[test]
    fn test_failed_assessment_produces_nothing() {
        let failed = RiskAssessment::failed("Mint111", "rpc down");
        assert!(evaluate(&failed, None).is_empty());
    }

    #[test]
    fn test_evidence_is_stable_across_runs() {
        let mut a = base_assessment(Some("Deployer1"));
        a.red_flags.push(RedFlag::new(
            FlagKind::ScamReport,
            FlagSeverity::Critical,
            "Scam Or Honeypot Reported",
            "test",
        ));

        let first = evaluate(&a, None);
        let second = evaluate(&a, None);
        assert_eq!(first[0].evidence, second[0].evidence);
    }
}
