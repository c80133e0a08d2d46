//! Solana RPC connector
//!
//! Owns the mandatory mint-account fetch plus holder enumeration, holder
//! count, and first-funding reconstruction. The mandatory fetch retries
//! transient RPC failures with exponential backoff; everything else runs
//! single-attempt and is time-bounded by the orchestrator.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcTransactionConfig,
};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionEncoding,
};
use spl_token::state::Mint;
use tracing::{debug, warn};

use crate::analysis::types::{FundingEdge, TokenSnapshot};
use crate::config::RpcConfig;
use crate::error::{Error, Result};
use crate::sources::{LedgerSource, RawHolder};

/// SPL token account layout: amount field location
const TOKEN_ACCOUNT_LEN: usize = 165;
const TOKEN_ACCOUNT_AMOUNT_OFFSET: usize = 64;

pub struct LedgerConnector {
    client: RpcClient,
    retry_base_delay_ms: u64,
    timeout_ms: u64,
    funding_signature_limit: usize,
    /// First funding never changes once observed, safe to cache per wallet
    funding_cache: DashMap<String, Option<FundingEdge>>,
}

impl LedgerConnector {
    pub fn new(config: &RpcConfig) -> Self {
        let client = RpcClient::new_with_commitment(
            config.endpoint.clone(),
            CommitmentConfig::confirmed(),
        );
        Self {
            client,
            retry_base_delay_ms: config.retry_base_delay_ms,
            timeout_ms: config.timeout_ms,
            funding_signature_limit: config.funding_signature_limit,
            funding_cache: DashMap::new(),
        }
    }

    /// Connectivity probe for startup checks
    pub async fn health_check(&self) -> Result<u64> {
        let slot = self.client.get_slot().await?;
        Ok(slot)
    }

    /// Best-effort creation time: block time of the oldest signature, only
    /// when the first page covers the whole history
    async fn first_signature_time(&self, pubkey: &Pubkey) -> Option<DateTime<Utc>> {
        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(1000),
            ..Default::default()
        };
        let signatures = self
            .client
            .get_signatures_for_address_with_config(pubkey, config)
            .await
            .ok()?;
        if signatures.len() >= 1000 {
            return None;
        }
        signatures
            .last()
            .and_then(|sig| sig.block_time)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// First funding for one wallet: oldest visible signature, then the
    /// system transfer that paid the wallet in that transaction
    async fn first_funding(&self, wallet: &str) -> Option<FundingEdge> {
        if let Some(cached) = self.funding_cache.get(wallet) {
            return cached.clone();
        }

        let edge = self.fetch_first_funding(wallet).await;
        self.funding_cache.insert(wallet.to_string(), edge.clone());
        edge
    }

    async fn fetch_first_funding(&self, wallet: &str) -> Option<FundingEdge> {
        let pubkey = Pubkey::from_str(wallet).ok()?;
        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(self.funding_signature_limit),
            ..Default::default()
        };

        let signatures = match self
            .client
            .get_signatures_for_address_with_config(&pubkey, config)
            .await
        {
            Ok(sigs) => sigs,
            Err(e) => {
                debug!(wallet = %wallet, error = %e, "Signature scan failed");
                return None;
            }
        };

        // Newest first, so the last entry is the oldest visible transaction
        let oldest = signatures.iter().rev().find(|s| s.err.is_none())?;
        let funded_at = oldest
            .block_time
            .and_then(|ts| DateTime::from_timestamp(ts, 0))?;

        let signature = Signature::from_str(&oldest.signature).ok()?;
        let tx_config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };

        let tx = match self
            .client
            .get_transaction_with_config(&signature, tx_config)
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                debug!(wallet = %wallet, error = %e, "Funding transaction fetch failed");
                return None;
            }
        };

        let funder = extract_funder(&tx, wallet)?;
        Some(FundingEdge {
            wallet: wallet.to_string(),
            funder,
            funded_at,
        })
    }
}

#[async_trait]
impl LedgerSource for LedgerConnector {
    async fn fetch_snapshot(&self, mint: &str) -> Result<TokenSnapshot> {
        let pubkey =
            Pubkey::from_str(mint).map_err(|e| Error::InvalidAddress(format!("{}: {}", mint, e)))?;

        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(self.retry_base_delay_ms),
            max_interval: Duration::from_millis(self.retry_base_delay_ms * 4),
            max_elapsed_time: Some(Duration::from_millis(self.timeout_ms)),
            ..Default::default()
        };

        let account = retry(backoff, || async {
            match self.client.get_account(&pubkey).await {
                Ok(account) => Ok(account),
                Err(e) => {
                    let e = Error::from(e);
                    if e.is_retryable() {
                        debug!(mint = %mint, error = %e, "Retrying mint fetch");
                        Err(backoff::Error::transient(e))
                    } else {
                        Err(backoff::Error::permanent(e))
                    }
                }
            }
        })
        .await
        .map_err(|e| Error::MintFetch(e.to_string()))?;

        if account.owner != spl_token::id() {
            return Err(Error::MintDecode(format!(
                "account {} is not owned by the token program",
                mint
            )));
        }

        let state = Mint::unpack(&account.data).map_err(|e| Error::MintDecode(e.to_string()))?;

        let created_at = self.first_signature_time(&pubkey).await;

        Ok(TokenSnapshot {
            address: mint.to_string(),
            decimals: state.decimals,
            supply: state.supply,
            mint_authority: Option::<Pubkey>::from(state.mint_authority).map(|p| p.to_string()),
            freeze_authority: Option::<Pubkey>::from(state.freeze_authority).map(|p| p.to_string()),
            created_at,
        })
    }

    async fn fetch_holders(&self, mint: &str) -> Result<Vec<RawHolder>> {
        let pubkey = Pubkey::from_str(mint)
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", mint, e)))?;

        let largest = self.client.get_token_largest_accounts(&pubkey).await?;
        if largest.is_empty() {
            return Ok(Vec::new());
        }

        // Largest-accounts returns token accounts; resolve the owner wallets
        let mut keyed: Vec<(u64, Pubkey)> = Vec::new();
        for entry in &largest {
            let amount: u64 = entry.amount.amount.parse().unwrap_or(0);
            if amount == 0 {
                continue;
            }
            if let Ok(key) = Pubkey::from_str(&entry.address) {
                keyed.push((amount, key));
            }
        }

        let account_keys: Vec<Pubkey> = keyed.iter().map(|(_, key)| *key).collect();
        let accounts = self.client.get_multiple_accounts(&account_keys).await?;

        let mut balances: Vec<(String, u64)> = Vec::new();
        for ((amount, _), account) in keyed.iter().zip(accounts.iter()) {
            let Some(account) = account else { continue };
            if account.data.len() < TOKEN_ACCOUNT_LEN {
                continue;
            }
            // Owner sits at bytes 32..64 of the token account
            let owner_bytes: [u8; 32] = match account.data[32..64].try_into() {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            let owner = Pubkey::new_from_array(owner_bytes);
            balances.push((owner.to_string(), *amount));
        }

        Ok(aggregate_by_owner(balances))
    }

    async fn fetch_holder_count(&self, mint: &str) -> Result<usize> {
        let pubkey = Pubkey::from_str(mint)
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", mint, e)))?;

        let config = RpcProgramAccountsConfig {
            filters: Some(vec![
                RpcFilterType::DataSize(TOKEN_ACCOUNT_LEN as u64),
                // Mint occupies bytes 0..32 of a token account
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, pubkey.to_bytes().to_vec())),
            ]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(CommitmentConfig::confirmed()),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .client
            .get_program_accounts_with_config(&spl_token::id(), config)
            .await?;

        let funded = accounts
            .iter()
            .filter(|(_, account)| {
                account
                    .data
                    .get(TOKEN_ACCOUNT_AMOUNT_OFFSET..TOKEN_ACCOUNT_AMOUNT_OFFSET + 8)
                    .and_then(|bytes| bytes.try_into().ok())
                    .map(u64::from_le_bytes)
                    .unwrap_or(0)
                    > 0
            })
            .count();

        Ok(funded)
    }

    async fn fetch_funding_edges(&self, wallets: &[String]) -> Result<Vec<FundingEdge>> {
        let mut edges = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            if let Some(edge) = self.first_funding(wallet).await {
                edges.push(edge);
            }
        }

        if edges.len() < wallets.len() {
            warn!(
                requested = wallets.len(),
                resolved = edges.len(),
                "Funding history incomplete"
            );
        }

        Ok(edges)
    }
}

/// Sum per-owner balances and sort descending
fn aggregate_by_owner(balances: Vec<(String, u64)>) -> Vec<RawHolder> {
    let mut by_owner: HashMap<String, u64> = HashMap::new();
    for (owner, amount) in balances {
        *by_owner.entry(owner).or_insert(0) += amount;
    }

    let mut holders: Vec<RawHolder> = by_owner
        .into_iter()
        .map(|(address, balance)| RawHolder { address, balance })
        .collect();
    holders.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.address.cmp(&b.address)));
    holders
}

/// Pull the paying wallet out of a jsonParsed transaction
fn extract_funder(tx: &EncodedConfirmedTransactionWithStatusMeta, wallet: &str) -> Option<String> {
    let EncodedTransaction::Json(ui_tx) = &tx.transaction.transaction else {
        return None;
    };
    let UiMessage::Parsed(message) = &ui_tx.message else {
        return None;
    };

    for instruction in &message.instructions {
        if let UiInstruction::Parsed(UiParsedInstruction::Parsed(ix)) = instruction {
            if let Some(funder) = funder_from_parsed(&ix.program, &ix.parsed, wallet) {
                return Some(funder);
            }
        }
    }
    None
}

/// Match a parsed system instruction that credits `wallet` and return its source
fn funder_from_parsed(program: &str, parsed: &serde_json::Value, wallet: &str) -> Option<String> {
    if program != "system" {
        return None;
    }
    let kind = parsed.get("type").and_then(|v| v.as_str())?;
    let info = parsed.get("info")?;

    let destination = match kind {
        "transfer" => info.get("destination"),
        "createAccount" => info.get("newAccount"),
        _ => None,
    }?;

    if destination.as_str() != Some(wallet) {
        return None;
    }
    info.get("source")
        .and_then(|v| v.as_str())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aggregate_by_owner_merges_accounts() {
        let holders = aggregate_by_owner(vec![
            ("walletA".into(), 100),
            ("walletB".into(), 300),
            ("walletA".into(), 50),
        ]);
        assert_eq!(holders.len(), 2);
        assert_eq!(holders[0].address, "walletB");
        assert_eq!(holders[0].balance, 300);
        assert_eq!(holders[1].address, "walletA");
        assert_eq!(holders[1].balance, 150);
    }

    #[test]
    fn test_funder_from_transfer() {
        let parsed = json!({
            "type": "transfer",
            "info": {
                "source": "FunderWallet",
                "destination": "TargetWallet",
                "lamports": 50_000_000u64
            }
        });
        assert_eq!(
            funder_from_parsed("system", &parsed, "TargetWallet"),
            Some("FunderWallet".to_string())
        );
        assert_eq!(funder_from_parsed("system", &parsed, "OtherWallet"), None);
        assert_eq!(funder_from_parsed("spl-token", &parsed, "TargetWallet"), None);
    }

    #[test]
    fn test_funder_from_create_account() {
        let parsed = json!({
            "type": "createAccount",
            "info": {
                "source": "FunderWallet",
                "newAccount": "TargetWallet",
                "lamports": 2_000_000u64
            }
        });
        assert_eq!(
            funder_from_parsed("system", &parsed, "TargetWallet"),
            Some("FunderWallet".to_string())
        );
    }
}
