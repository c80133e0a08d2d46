//! Reputation engine
//!
//! Applies the automatic flagging rules after each analysis and services
//! the manual rug-confirmation workflow. Label merges run inside the
//! store's atomic upsert; the engine only decides what the merged label
//! looks like.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::analysis::types::RiskAssessment;
use crate::config::ReputationConfig;
use crate::error::{Error, Result};
use crate::reputation::rules::{self, FlagRequest};
use crate::reputation::store::{
    BadActorLabel, HistoryEntry, LabelType, LabelUpdate, ReputationStore, RugConfirmation,
};
use crate::sources::SecurityFlags;

/// True when this exact evidence text has not been recorded on the label yet
pub fn is_new_incident(existing: Option<&BadActorLabel>, evidence: &str) -> bool {
    existing.map_or(true, |label| !label.evidence.contains_key(evidence))
}

/// True when the incoming severity lifts the label across the critical
/// threshold for the first time
pub fn crosses_critical(existing_severity: Option<u8>, incoming: u8, threshold: u8) -> bool {
    existing_severity.map_or(true, |s| s < threshold) && incoming >= threshold
}

pub struct ReputationEngine {
    store: Arc<dyn ReputationStore>,
    config: ReputationConfig,
}

impl ReputationEngine {
    pub fn new(store: Arc<dyn ReputationStore>, config: ReputationConfig) -> Self {
        Self { store, config }
    }

    /// Record or update a bad-actor label.
    ///
    /// Merging is monotonic: severity and confidence only rise, evidence
    /// keyed by text dedupes itself, and the rug count moves only when new
    /// evidence carries the wallet across the critical threshold.
    pub async fn flag_wallet(&self, request: FlagRequest) -> Result<BadActorLabel> {
        let threshold = self.config.critical_severity;
        let FlagRequest {
            wallet,
            label_type,
            severity,
            evidence,
            method,
            confidence,
        } = request;

        let wallet_for_label = wallet.clone();
        let update: LabelUpdate = Box::new(move |existing| {
            let now = Utc::now();
            let counts_as_rug = is_new_incident(existing.as_ref(), &evidence)
                && crosses_critical(existing.as_ref().map(|l| l.severity), severity, threshold);

            let mut label = existing.unwrap_or_else(|| {
                BadActorLabel::new(wallet_for_label, label_type, severity, method, confidence)
            });
            if counts_as_rug {
                label.rug_count += 1;
            }
            label.severity = label.severity.max(severity.min(100));
            label.confidence = label.confidence.max(confidence);
            label.evidence.entry(evidence).or_insert(now);
            label.active = true;
            label.updated_at = now;
            label
        });

        let label = self.store.upsert_label(&wallet, label_type, update).await?;
        info!(
            wallet = %label.wallet,
            label = %label.label_type,
            severity = label.severity,
            "Recorded bad actor label"
        );
        Ok(label)
    }

    /// Admin confirmation that a token was rugged.
    ///
    /// Resolves the responsible wallet from the recorded analysis history:
    /// the mint authority captured at analysis time, else the creator. Every
    /// confirmation counts a rug, even when one is already on record.
    pub async fn confirm_rug(
        &self,
        token: &str,
        reviewer: &str,
        victims: Option<u32>,
        losses_usd: Option<f64>,
    ) -> Result<BadActorLabel> {
        let history = self.store.history_for(token).await?;
        let latest = history
            .last()
            .ok_or_else(|| Error::NoConfirmTarget(token.to_string()))?;
        let target = latest
            .mint_authority
            .clone()
            .or_else(|| latest.creator.clone())
            .ok_or_else(|| Error::NoConfirmTarget(token.to_string()))?;

        let base = self.config.critical_severity;
        let delta = self.config.confirm_severity_delta;
        let confirmation = RugConfirmation {
            token: token.to_string(),
            reviewer: reviewer.to_string(),
            victims,
            losses_usd,
            confirmed_at: Utc::now(),
        };
        let evidence = format!("Rug of token {token} confirmed by {reviewer}");

        let target_for_label = target.clone();
        let update: LabelUpdate = Box::new(move |existing| {
            let now = Utc::now();
            let mut label = existing.unwrap_or_else(|| {
                BadActorLabel::new(
                    target_for_label,
                    LabelType::SerialRugger,
                    base,
                    "manual_confirmation".to_string(),
                    1.0,
                )
            });
            label.severity = label.severity.max(base).saturating_add(delta).min(100);
            label.rug_count += 1;
            label.confidence = 1.0;
            label.evidence.entry(evidence).or_insert(now);
            label.confirmations.push(confirmation);
            label.active = true;
            label.updated_at = now;
            label
        });

        let label = self
            .store
            .upsert_label(&target, LabelType::SerialRugger, update)
            .await?;
        info!(
            wallet = %label.wallet,
            token = %token,
            rug_count = label.rug_count,
            "Confirmed rug"
        );
        Ok(label)
    }

    /// Run the automatic rules for a completed assessment. Store failures
    /// are logged and swallowed; reputation must never fail an analysis.
    pub async fn process_assessment(
        &self,
        assessment: &RiskAssessment,
        security: Option<&SecurityFlags>,
    ) -> usize {
        let requests = rules::evaluate(assessment, security);
        if requests.is_empty() {
            return 0;
        }

        let mut applied = 0;
        for request in requests {
            let wallet = request.wallet.clone();
            match self.flag_wallet(request).await {
                Ok(_) => applied += 1,
                Err(e) => warn!(wallet = %wallet, error = %e, "Failed to record label"),
            }
        }
        applied
    }

    /// Append one analysis run to the history ledger
    pub async fn record_analysis(&self, assessment: &RiskAssessment) -> Result<()> {
        let entry = HistoryEntry {
            analysis_id: assessment.analysis_id,
            token: assessment.token.clone(),
            mint_authority: assessment
                .authorities
                .as_ref()
                .and_then(|a| a.mint.address().map(String::from)),
            creator: assessment.creator.clone(),
            score: assessment.score,
            level: assessment.level,
            analyzed_at: assessment.analyzed_at,
        };
        self.store.append_history(entry).await
    }

    /// Every label attached to one wallet, highest severity first
    pub async fn labels_for(&self, wallet: &str) -> Result<Vec<BadActorLabel>> {
        self.store.labels_for(wallet).await
    }

    /// Every active label, for the blacklist listing
    pub async fn blacklist(&self) -> Result<Vec<BadActorLabel>> {
        self.store.list_active().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{
        Authorities, FlagKind, FlagSeverity, RedFlag, RiskLevel, SafetyScore, TokenSnapshot,
    };
    use crate::reputation::store::JsonFileStore;
    use std::path::Path;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn engine_in(dir: &Path) -> ReputationEngine {
        let store = Arc::new(JsonFileStore::new(
            dir.join("labels.json").to_string_lossy().to_string(),
            dir.join("history.json").to_string_lossy().to_string(),
        ));
        ReputationEngine::new(store, ReputationConfig::default())
    }

    fn request(severity: u8, evidence: &str) -> FlagRequest {
        FlagRequest {
            wallet: "Wallet1".to_string(),
            label_type: LabelType::Suspicious,
            severity,
            evidence: evidence.to_string(),
            method: "test".to_string(),
            confidence: 0.5,
        }
    }

    #[test]
    fn test_new_incident_predicate() {
        assert!(is_new_incident(None, "anything"));

        let mut label = BadActorLabel::new(
            "Wallet1".to_string(),
            LabelType::Suspicious,
            40,
            "test".to_string(),
            0.5,
        );
        label.evidence.insert("seen before".to_string(), Utc::now());
        assert!(!is_new_incident(Some(&label), "seen before"));
        assert!(is_new_incident(Some(&label), "fresh finding"));
    }

    #[test]
    fn test_crosses_critical_predicate() {
        assert!(crosses_critical(None, 80, 80));
        assert!(crosses_critical(Some(40), 90, 80));
        assert!(!crosses_critical(Some(85), 95, 80));
        assert!(!crosses_critical(None, 79, 80));
    }

    #[tokio::test]
    async fn test_flag_wallet_is_idempotent() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());

        let first = engine
            .flag_wallet(request(90, "same evidence"))
            .await
            .unwrap();
        let second = engine
            .flag_wallet(request(90, "same evidence"))
            .await
            .unwrap();

        assert_eq!(second.evidence.len(), 1);
        assert_eq!(second.rug_count, first.rug_count);
        assert_eq!(second.severity, first.severity);
        assert_eq!(
            second.evidence.get("same evidence"),
            first.evidence.get("same evidence")
        );
    }

    #[tokio::test]
    async fn test_severity_never_decreases() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());

        engine.flag_wallet(request(90, "first")).await.unwrap();
        let label = engine.flag_wallet(request(60, "second")).await.unwrap();
        assert_eq!(label.severity, 90);
        assert_eq!(label.evidence.len(), 2);
        assert!(label.active);
    }

    #[tokio::test]
    async fn test_rug_count_moves_only_on_critical_crossing() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());

        // below the threshold: no rug counted
        let label = engine.flag_wallet(request(40, "mild")).await.unwrap();
        assert_eq!(label.rug_count, 0);

        // new evidence carries the wallet across: counted once
        let label = engine.flag_wallet(request(90, "severe")).await.unwrap();
        assert_eq!(label.rug_count, 1);

        // duplicate evidence at the same severity: not counted again
        let label = engine.flag_wallet(request(90, "severe")).await.unwrap();
        assert_eq!(label.rug_count, 1);

        // already across the threshold: new evidence alone is not a new rug
        let label = engine.flag_wallet(request(95, "worse")).await.unwrap();
        assert_eq!(label.rug_count, 1);
        assert_eq!(label.severity, 95);
    }

    #[tokio::test]
    async fn test_confirm_rug_targets_recorded_authority() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());

        engine
            .store
            .append_history(HistoryEntry {
                analysis_id: Uuid::nil(),
                token: "Mint111".to_string(),
                mint_authority: Some("Deployer1".to_string()),
                creator: Some("Creator1".to_string()),
                score: SafetyScore::from_weighted(20.0),
                level: RiskLevel::High,
                analyzed_at: Utc::now(),
            })
            .await
            .unwrap();

        let label = engine
            .confirm_rug("Mint111", "reviewer-a", Some(120), Some(50_000.0))
            .await
            .unwrap();
        assert_eq!(label.wallet, "Deployer1");
        assert_eq!(label.label_type, LabelType::SerialRugger);
        assert_eq!(label.severity, 100);
        assert_eq!(label.rug_count, 1);
        assert_eq!(label.confirmations.len(), 1);
        assert_eq!(label.confirmations[0].reviewer, "reviewer-a");
        assert_eq!(label.confirmations[0].victims, Some(120));

        let label = engine
            .confirm_rug("Mint111", "reviewer-b", None, None)
            .await
            .unwrap();
        assert_eq!(label.rug_count, 2);
        assert_eq!(label.confirmations.len(), 2);
    }

    #[tokio::test]
    async fn test_confirm_rug_without_target_fails() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());

        let missing = engine
            .confirm_rug("Unknown111", "reviewer", None, None)
            .await;
        assert!(matches!(missing, Err(Error::NoConfirmTarget(_))));

        engine
            .store
            .append_history(HistoryEntry {
                analysis_id: Uuid::nil(),
                token: "Anon111".to_string(),
                mint_authority: None,
                creator: None,
                score: SafetyScore::from_weighted(50.0),
                level: RiskLevel::Moderate,
                analyzed_at: Utc::now(),
            })
            .await
            .unwrap();

        let anon = engine.confirm_rug("Anon111", "reviewer", None, None).await;
        assert!(matches!(anon, Err(Error::NoConfirmTarget(_))));
    }

    #[tokio::test]
    async fn test_process_assessment_applies_rule_labels() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path());

        let snapshot = TokenSnapshot {
            address: "Mint111".to_string(),
            decimals: 6,
            supply: 1_000_000,
            mint_authority: Some("Deployer1".to_string()),
            freeze_authority: None,
            created_at: None,
        };
        let mut assessment = RiskAssessment::failed("Mint111", "placeholder");
        assessment.analysis_failed = false;
        assessment.red_flags.clear();
        // Low risk keeps the active-authority rule quiet; only the scam rule fires
        assessment.score = SafetyScore::from_weighted(90.0);
        assessment.level = RiskLevel::Low;
        assessment.authorities = Some(Authorities::from_snapshot(&snapshot));
        assessment.red_flags.push(RedFlag::new(
            FlagKind::ScamReport,
            FlagSeverity::Critical,
            "Scam Or Honeypot Reported",
            "test",
        ));

        let applied = engine.process_assessment(&assessment, None).await;
        assert_eq!(applied, 1);

        let labels = engine.labels_for("Deployer1").await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label_type, LabelType::ScamTokenCreator);
        assert_eq!(labels[0].severity, 90);
    }
}
