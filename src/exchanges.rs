//! Exchange wallet registry
//!
//! Custodial deposit and hot wallets. Balances owned by these are excluded
//! from holder-concentration math. A seed set of publicly labeled wallets
//! ships with the binary; operator additions persist to a JSON file and
//! survive restarts.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ExchangesConfig;
use crate::error::{Error, Result};

/// Publicly labeled custodial wallets on mainnet. Incomplete by nature;
/// operators extend the set with `exchange add`.
const SEED_WALLETS: [(&str, &str); 10] = [
    ("5tzFkiKscXHK5ZXCGbXZxdw7gTjjD1mBwuoFbhUvuAi9", "Binance"),
    ("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM", "Binance"),
    ("2ojv9BAiHUrvsm9gxDe7fJSzbNZSJcxZvf8dqmWGHG8S", "Coinbase"),
    ("H8sMJSCQxfKiFTCfDR3DUMLPwcRbM61LGFJ8N4dK3WjS", "Coinbase"),
    ("GJRs4FwHtemZ5ZE9x3FNvJ8TMwitKTh21yxdRPqn7npE", "Coinbase"),
    ("5VCwKtCXgCJ6kit5FybXjvriW3xELsFDhYrPSqtJNmcD", "OKX"),
    ("AC5RDfQFmDS1deWZos921JfqscXdByf8BKHs5ACWjtW2", "Bybit"),
    ("FWznbcNXWQuHTawe9RxvQ2LdCENssh12dsznf4RiouN5", "Kraken"),
    ("u6PJ8DtQuPFnfmwHbGFULQ4u4EgjDiyYKjVEsynXq2w", "Gate.io"),
    ("BmFdpraQhkiDQE6SnfG5omcA1VwzqfXrwtNYBwWTymy6", "KuCoin"),
];

lazy_static::lazy_static! {
    static ref SEED_LOOKUP: HashMap<&'static str, &'static str> =
        SEED_WALLETS.into_iter().collect();
}

/// One registered exchange wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeWallet {
    pub wallet: String,
    /// Exchange name when the operator supplied one
    pub exchange: Option<String>,
    pub added_at: DateTime<Utc>,
    /// Part of the compiled-in seed set (never persisted)
    #[serde(skip)]
    pub builtin: bool,
}

/// Allow-list the holder classifier queries. Injected so analysis code
/// never reaches for process globals.
#[async_trait]
pub trait ExchangeRegistry: Send + Sync {
    /// True when the wallet belongs to a known exchange
    fn contains(&self, wallet: &str) -> bool;

    /// Register a wallet. Returns false when it was already known.
    async fn add(&self, wallet: String, exchange: Option<String>) -> Result<bool>;

    /// Every registered wallet, seed set and runtime additions alike
    fn entries(&self) -> Vec<ExchangeWallet>;

    /// Re-read runtime additions from disk
    async fn reload(&self) -> Result<()>;
}

/// Registry backed by the seed set plus an optional JSON file of additions
pub struct ExchangeDirectory {
    additions: DashMap<String, ExchangeWallet>,
    file_path: Option<String>,
}

impl ExchangeDirectory {
    pub fn new(config: &ExchangesConfig) -> Self {
        Self {
            additions: DashMap::new(),
            file_path: Some(config.file_path.clone()),
        }
    }

    /// Registry without persistence, for tests and one-shot runs
    pub fn in_memory() -> Self {
        Self {
            additions: DashMap::new(),
            file_path: None,
        }
    }

    /// Load persisted additions from disk
    pub async fn load(&self) -> Result<()> {
        if let Some(path) = &self.file_path {
            if Path::new(path).exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| Error::ExchangeRegistry(e.to_string()))?;

                let entries: HashMap<String, ExchangeWallet> = serde_json::from_str(&data)
                    .map_err(|e| Error::ExchangeRegistry(e.to_string()))?;

                for (wallet, entry) in entries {
                    self.additions.insert(wallet, entry);
                }

                info!(
                    "Loaded {} exchange wallet additions from {}",
                    self.additions.len(),
                    path
                );
            }
        }
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        if let Some(path) = &self.file_path {
            let entries: HashMap<String, ExchangeWallet> = self
                .additions
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect();

            let data = serde_json::to_string_pretty(&entries)
                .map_err(|e| Error::ExchangeRegistry(e.to_string()))?;

            tokio::fs::write(path, data)
                .await
                .map_err(|e| Error::ExchangeRegistry(e.to_string()))?;

            debug!("Saved {} exchange wallet additions to {}", entries.len(), path);
        }
        Ok(())
    }
}

#[async_trait]
impl ExchangeRegistry for ExchangeDirectory {
    fn contains(&self, wallet: &str) -> bool {
        SEED_LOOKUP.contains_key(wallet) || self.additions.contains_key(wallet)
    }

    async fn add(&self, wallet: String, exchange: Option<String>) -> Result<bool> {
        if self.contains(&wallet) {
            debug!(wallet = %wallet, "Exchange wallet already registered");
            return Ok(false);
        }

        let entry = ExchangeWallet {
            wallet: wallet.clone(),
            exchange,
            added_at: Utc::now(),
            builtin: false,
        };
        self.additions.insert(wallet.clone(), entry);
        self.save().await?;

        info!(wallet = %wallet, "Registered exchange wallet");
        Ok(true)
    }

    fn entries(&self) -> Vec<ExchangeWallet> {
        let mut out: Vec<ExchangeWallet> = SEED_WALLETS
            .iter()
            .map(|(wallet, exchange)| ExchangeWallet {
                wallet: (*wallet).to_string(),
                exchange: Some((*exchange).to_string()),
                added_at: DateTime::<Utc>::UNIX_EPOCH,
                builtin: true,
            })
            .collect();

        let mut added: Vec<ExchangeWallet> =
            self.additions.iter().map(|e| e.value().clone()).collect();
        added.sort_by(|a, b| a.added_at.cmp(&b.added_at));
        out.extend(added);
        out
    }

    async fn reload(&self) -> Result<()> {
        self.additions.clear();
        self.load().await
    }
}
