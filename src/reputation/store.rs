//! Reputation persistence
//!
//! Keyed CRUD for bad-actor labels plus an append-only sink of completed
//! analysis runs. The JSON-file store serializes every label mutation
//! through a single write-guard critical section, so concurrent analyses
//! flagging the same wallet never lose an update.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::{RiskLevel, SafetyScore};
use crate::error::{Error, Result};

/// Label categories for flagged wallets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelType {
    ScamTokenCreator,
    SerialRugger,
    Bundler,
    Suspicious,
}

impl std::fmt::Display for LabelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelType::ScamTokenCreator => write!(f, "scam_token_creator"),
            LabelType::SerialRugger => write!(f, "serial_rugger"),
            LabelType::Bundler => write!(f, "bundler"),
            LabelType::Suspicious => write!(f, "suspicious"),
        }
    }
}

/// Metadata recorded by an admin rug confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RugConfirmation {
    pub token: String,
    pub reviewer: String,
    pub victims: Option<u32>,
    pub losses_usd: Option<f64>,
    pub confirmed_at: DateTime<Utc>,
}

/// One flagged wallet under one label type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadActorLabel {
    pub wallet: String,
    pub label_type: LabelType,
    /// 0..=100, only ever raised by automatic rules
    pub severity: u8,
    pub rug_count: u32,
    /// Evidence text mapped to the moment it was first recorded; keying by
    /// text makes duplicate evidence a no-op
    pub evidence: BTreeMap<String, DateTime<Utc>>,
    /// Rule or workflow that produced the most recent update
    pub detection_method: String,
    pub confidence: f64,
    pub active: bool,
    #[serde(default)]
    pub confirmations: Vec<RugConfirmation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BadActorLabel {
    pub fn new(
        wallet: String,
        label_type: LabelType,
        severity: u8,
        detection_method: String,
        confidence: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            wallet,
            label_type,
            severity: severity.min(100),
            rug_count: 0,
            evidence: BTreeMap::new(),
            detection_method,
            confidence,
            active: true,
            confirmations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One completed analysis run, kept for admin confirmation and offline use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub analysis_id: Uuid,
    pub token: String,
    /// Mint authority at analysis time, the primary confirmation target
    pub mint_authority: Option<String>,
    pub creator: Option<String>,
    pub score: SafetyScore,
    pub level: RiskLevel,
    pub analyzed_at: DateTime<Utc>,
}

/// Label mutation applied inside the store's critical section
pub type LabelUpdate = Box<dyn FnOnce(Option<BadActorLabel>) -> BadActorLabel + Send>;

#[async_trait]
pub trait ReputationStore: Send + Sync {
    /// Atomic insert-or-update keyed by wallet + label type. The update
    /// closure runs under the store's write guard; no select-then-branch.
    async fn upsert_label(
        &self,
        wallet: &str,
        label_type: LabelType,
        update: LabelUpdate,
    ) -> Result<BadActorLabel>;

    async fn get(&self, wallet: &str, label_type: LabelType) -> Result<Option<BadActorLabel>>;

    /// Every label attached to one wallet
    async fn labels_for(&self, wallet: &str) -> Result<Vec<BadActorLabel>>;

    async fn list_active(&self) -> Result<Vec<BadActorLabel>>;

    async fn deactivate(&self, wallet: &str, label_type: LabelType) -> Result<()>;

    async fn append_history(&self, entry: HistoryEntry) -> Result<()>;

    /// History entries for one token, oldest first
    async fn history_for(&self, token: &str) -> Result<Vec<HistoryEntry>>;
}

fn label_key(wallet: &str, label_type: LabelType) -> String {
    format!("{wallet}:{label_type}")
}

/// JSON-file store, the default backend
pub struct JsonFileStore {
    labels: RwLock<HashMap<String, BadActorLabel>>,
    history: RwLock<Vec<HistoryEntry>>,
    labels_path: String,
    history_path: String,
}

impl JsonFileStore {
    pub fn new(labels_path: impl Into<String>, history_path: impl Into<String>) -> Self {
        Self {
            labels: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            labels_path: labels_path.into(),
            history_path: history_path.into(),
        }
    }

    /// Load both files from disk, tolerating first-run absence
    pub async fn load(&self) -> Result<()> {
        if Path::new(&self.labels_path).exists() {
            let data = tokio::fs::read_to_string(&self.labels_path)
                .await
                .map_err(|e| Error::ReputationStore(e.to_string()))?;
            let labels: HashMap<String, BadActorLabel> =
                serde_json::from_str(&data).map_err(|e| Error::ReputationStore(e.to_string()))?;

            let mut guard = self.labels.write().await;
            *guard = labels;
            info!("Loaded {} bad actor labels from {}", guard.len(), self.labels_path);
        }

        if Path::new(&self.history_path).exists() {
            let data = tokio::fs::read_to_string(&self.history_path)
                .await
                .map_err(|e| Error::ReputationStore(e.to_string()))?;
            let history: Vec<HistoryEntry> =
                serde_json::from_str(&data).map_err(|e| Error::ReputationStore(e.to_string()))?;

            let mut guard = self.history.write().await;
            *guard = history;
            debug!("Loaded {} history entries from {}", guard.len(), self.history_path);
        }

        Ok(())
    }

    async fn save_labels(&self, labels: &HashMap<String, BadActorLabel>) -> Result<()> {
        let data = serde_json::to_string_pretty(labels)
            .map_err(|e| Error::ReputationStore(e.to_string()))?;
        tokio::fs::write(&self.labels_path, data)
            .await
            .map_err(|e| Error::ReputationStore(e.to_string()))?;
        Ok(())
    }

    async fn save_history(&self, history: &[HistoryEntry]) -> Result<()> {
        let data = serde_json::to_string_pretty(history)
            .map_err(|e| Error::ReputationStore(e.to_string()))?;
        tokio::fs::write(&self.history_path, data)
            .await
            .map_err(|e| Error::ReputationStore(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ReputationStore for JsonFileStore {
    async fn upsert_label(
        &self,
        wallet: &str,
        label_type: LabelType,
        update: LabelUpdate,
    ) -> Result<BadActorLabel> {
        let key = label_key(wallet, label_type);

        let mut guard = self.labels.write().await;
        let updated = update(guard.get(&key).cloned());
        guard.insert(key, updated.clone());
        self.save_labels(&guard).await?;
        drop(guard);

        Ok(updated)
    }

    async fn get(&self, wallet: &str, label_type: LabelType) -> Result<Option<BadActorLabel>> {
        let guard = self.labels.read().await;
        Ok(guard.get(&label_key(wallet, label_type)).cloned())
    }

    async fn labels_for(&self, wallet: &str) -> Result<Vec<BadActorLabel>> {
        let guard = self.labels.read().await;
        let mut labels: Vec<BadActorLabel> = guard
            .values()
            .filter(|l| l.wallet == wallet)
            .cloned()
            .collect();
        labels.sort_by(|a, b| b.severity.cmp(&a.severity));
        Ok(labels)
    }

    async fn list_active(&self) -> Result<Vec<BadActorLabel>> {
        let guard = self.labels.read().await;
        let mut labels: Vec<BadActorLabel> =
            guard.values().filter(|l| l.active).cloned().collect();
        labels.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.wallet.cmp(&b.wallet))
        });
        Ok(labels)
    }

    async fn deactivate(&self, wallet: &str, label_type: LabelType) -> Result<()> {
        let key = label_key(wallet, label_type);

        let mut guard = self.labels.write().await;
        let label = guard
            .get_mut(&key)
            .ok_or_else(|| Error::LabelNotFound(wallet.to_string()))?;
        label.active = false;
        label.updated_at = Utc::now();
        self.save_labels(&guard).await?;

        Ok(())
    }

    async fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        let mut guard = self.history.write().await;
        guard.push(entry);
        self.save_history(&guard).await?;
        Ok(())
    }

    async fn history_for(&self, token: &str) -> Result<Vec<HistoryEntry>> {
        let guard = self.history.read().await;
        Ok(guard
            .iter()
            .filter(|e| e.token == token)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> JsonFileStore {
        JsonFileStore::new(
            dir.join("labels.json").to_string_lossy().to_string(),
            dir.join("history.json").to_string_lossy().to_string(),
        )
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let label = store
            .upsert_label(
                "Wallet1",
                LabelType::Suspicious,
                Box::new(|existing| {
                    assert!(existing.is_none());
                    BadActorLabel::new(
                        "Wallet1".to_string(),
                        LabelType::Suspicious,
                        40,
                        "test".to_string(),
                        0.5,
                    )
                }),
            )
            .await
            .unwrap();
        assert_eq!(label.severity, 40);

        let label = store
            .upsert_label(
                "Wallet1",
                LabelType::Suspicious,
                Box::new(|existing| {
                    let mut label = existing.unwrap();
                    label.severity = 60;
                    label
                }),
            )
            .await
            .unwrap();
        assert_eq!(label.severity, 60);
    }

    #[tokio::test]
    async fn test_labels_are_keyed_by_wallet_and_type() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        for label_type in [LabelType::Suspicious, LabelType::Bundler] {
            store
                .upsert_label(
                    "Wallet1",
                    label_type,
                    Box::new(move |_| {
                        BadActorLabel::new(
                            "Wallet1".to_string(),
                            label_type,
                            30,
                            "test".to_string(),
                            0.5,
                        )
                    }),
                )
                .await
                .unwrap();
        }

        assert_eq!(store.labels_for("Wallet1").await.unwrap().len(), 2);
        assert!(store
            .get("Wallet1", LabelType::Bundler)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get("Wallet1", LabelType::SerialRugger)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();

        {
            let store = store_in(dir.path());
            store
                .upsert_label(
                    "Wallet1",
                    LabelType::SerialRugger,
                    Box::new(|_| {
                        BadActorLabel::new(
                            "Wallet1".to_string(),
                            LabelType::SerialRugger,
                            95,
                            "test".to_string(),
                            1.0,
                        )
                    }),
                )
                .await
                .unwrap();
            store
                .append_history(HistoryEntry {
                    analysis_id: Uuid::nil(),
                    token: "Mint111".to_string(),
                    mint_authority: Some("Deployer1".to_string()),
                    creator: None,
                    score: SafetyScore::from_weighted(15.0),
                    level: RiskLevel::Extreme,
                    analyzed_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let store = store_in(dir.path());
        store.load().await.unwrap();

        let label = store
            .get("Wallet1", LabelType::SerialRugger)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(label.severity, 95);

        let history = store.history_for("Mint111").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].mint_authority.as_deref(), Some("Deployer1"));
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_active_list() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store
            .upsert_label(
                "Wallet1",
                LabelType::Suspicious,
                Box::new(|_| {
                    BadActorLabel::new(
                        "Wallet1".to_string(),
                        LabelType::Suspicious,
                        40,
                        "test".to_string(),
                        0.5,
                    )
                }),
            )
            .await
            .unwrap();
        assert_eq!(store.list_active().await.unwrap().len(), 1);

        store
            .deactivate("Wallet1", LabelType::Suspicious)
            .await
            .unwrap();
        assert!(store.list_active().await.unwrap().is_empty());

        let missing = store.deactivate("Nobody", LabelType::Suspicious).await;
        assert!(missing.is_err());
    }
}
