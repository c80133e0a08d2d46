//! Holder classification
//!
//! Tags each raw holder (organic / exchange / lp / protocol) and recomputes
//! percentages from raw balances against total supply. Concentration math
//! downstream runs over the organic subset only; every excluded category is
//! reported with its count and combined share, never silently dropped.

use std::collections::HashSet;

use crate::analysis::types::{
    BundleDetection, ExcludedCategory, HolderFiltering, HolderRecord, HolderTag, TokenSnapshot,
};
use crate::exchanges::ExchangeRegistry;
use crate::sources::RawHolder;

/// Program and infrastructure addresses that can never be organic holders
const PROTOCOL_ADDRESSES: [&str; 7] = [
    "11111111111111111111111111111111",             // system program
    "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",  // token program
    "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb",  // token-2022 program
    "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL", // associated token program
    "1nc1nerator11111111111111111111111111111111",  // burn address
    "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P",  // pump.fun bonding curve program
    "39azUYFWPz3VHgKCf3VChUwbpURdCHRxjWVowf5jUJjg", // pump.fun migration authority
];

/// Vault authorities of the major AMMs. Pool addresses discovered for the
/// token under analysis are merged in at classification time.
const LP_AUTHORITIES: [&str; 4] = [
    "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1", // Raydium AMM v4
    "GpMZbSM2GgvTKHJirzeGfMFoaZ8UR2X7F4v8vHTvxFbL", // Raydium CPMM
    "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA",  // Pump AMM
    "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo",  // Meteora DLMM
];

pub struct HolderClassifier<'a> {
    registry: &'a dyn ExchangeRegistry,
    lp_addresses: HashSet<String>,
}

impl<'a> HolderClassifier<'a> {
    pub fn new(registry: &'a dyn ExchangeRegistry) -> Self {
        Self {
            registry,
            lp_addresses: HashSet::new(),
        }
    }

    /// Merge pool addresses discovered for this token into the LP set
    pub fn with_pools<I>(mut self, pools: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.lp_addresses.extend(pools);
        self
    }

    /// Tag every holder and normalize balances against total supply.
    /// Precedence: liquidity pool > exchange > protocol > organic.
    pub fn classify(&self, snapshot: &TokenSnapshot, raw: Vec<RawHolder>) -> Vec<HolderRecord> {
        let mut holders: Vec<HolderRecord> = raw
            .into_iter()
            .map(|h| HolderRecord {
                tag: self.tag_for(&h.address),
                pct_of_supply: snapshot.pct_of_supply(h.balance),
                address: h.address,
                balance: h.balance,
            })
            .collect();

        holders.sort_by(|a, b| {
            b.balance
                .cmp(&a.balance)
                .then_with(|| a.address.cmp(&b.address))
        });
        holders
    }

    fn tag_for(&self, address: &str) -> HolderTag {
        if self.lp_addresses.contains(address) || LP_AUTHORITIES.contains(&address) {
            HolderTag::Lp
        } else if self.registry.contains(address) {
            HolderTag::Exchange
        } else if PROTOCOL_ADDRESSES.contains(&address) {
            HolderTag::Protocol
        } else {
            HolderTag::Organic
        }
    }
}

/// Holders still counted toward concentration after filtering
pub fn organic(holders: &[HolderRecord]) -> impl Iterator<Item = &HolderRecord> {
    holders.iter().filter(|h| h.tag == HolderTag::Organic)
}

/// Combined share of the N largest organic holders. Relies on the
/// classifier's descending sort.
pub fn top_concentration(holders: &[HolderRecord], n: usize) -> f64 {
    organic(holders).take(n).map(|h| h.pct_of_supply).sum()
}

/// Largest single organic holder
pub fn largest_organic(holders: &[HolderRecord]) -> Option<&HolderRecord> {
    organic(holders).next()
}

/// Retag members of detected bundle groups as a distinct bucket
pub fn apply_bundles(holders: &mut [HolderRecord], detection: &BundleDetection) {
    if detection.groups.is_empty() {
        return;
    }
    let members: HashSet<&String> = detection.groups.iter().flat_map(|g| &g.members).collect();
    for holder in holders.iter_mut() {
        if holder.tag == HolderTag::Organic && members.contains(&holder.address) {
            holder.tag = HolderTag::Bundled;
        }
    }
}

/// Per-tag accounting for the assessment output
pub fn summarize(holders: &[HolderRecord], bundles: Option<BundleDetection>) -> HolderFiltering {
    let total_pct: f64 = holders.iter().map(|h| h.pct_of_supply).sum();
    let organic_count = organic(holders).count();
    let organic_pct: f64 = organic(holders).map(|h| h.pct_of_supply).sum();

    let excluded = [
        HolderTag::Lp,
        HolderTag::Exchange,
        HolderTag::Protocol,
        HolderTag::Bundled,
    ]
    .into_iter()
    .filter_map(|tag| {
        let tagged: Vec<&HolderRecord> = holders.iter().filter(|h| h.tag == tag).collect();
        if tagged.is_empty() {
            return None;
        }
        Some(ExcludedCategory {
            tag,
            count: tagged.len(),
            total_pct: tagged.iter().map(|h| h.pct_of_supply).sum(),
        })
    })
    .collect();

    HolderFiltering {
        total_pct,
        organic_count,
        organic_pct,
        excluded,
        bundled_detection: bundles,
    }
}
