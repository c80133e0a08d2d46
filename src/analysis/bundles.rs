//! Bundle detection
//!
//! Finds coordinated wallet groups among organic holders. Two strategies:
//! funding correlation (wallets first funded by one source inside a time
//! window) and share fingerprint (near-identical supply percentages,
//! characteristic of scripted distribution). Funding groups claim wallets
//! first; the fingerprint pass only considers unclaimed wallets, so groups
//! stay disjoint.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::analysis::holders::organic;
use crate::analysis::types::{
    BundleDetection, ClusterGroup, ClusterStrategy, ConfidenceTier, FundingEdge, HolderRecord,
};
use crate::config::ClusterConfig;

const MIN_GROUP_SIZE: usize = 3;
const HIGH_CONFIDENCE_SIZE: usize = 5;

pub struct BundleDetector {
    config: ClusterConfig,
}

impl BundleDetector {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Run both strategies over the organic holder subset. Funding edges are
    /// optional; without them only the share fingerprint runs.
    pub fn detect(&self, holders: &[HolderRecord], funding: &[FundingEdge]) -> BundleDetection {
        let shares: HashMap<&str, f64> = organic(holders)
            .map(|h| (h.address.as_str(), h.pct_of_supply))
            .collect();
        if shares.is_empty() {
            return BundleDetection::empty();
        }

        let mut claimed: HashSet<String> = HashSet::new();
        let mut groups = self.funding_groups(&shares, funding, &mut claimed);
        groups.extend(self.fingerprint_groups(holders, &claimed));

        if groups.is_empty() {
            return BundleDetection::empty();
        }

        let bundled_count = groups.iter().map(|g| g.members.len()).sum();
        let bundled_pct = groups.iter().map(|g| g.total_pct).sum();
        let confidence = groups.iter().map(|g| g.confidence).max();

        debug!(
            groups = groups.len(),
            wallets = bundled_count,
            "Coordinated wallet groups detected"
        );

        BundleDetection {
            groups,
            bundled_count,
            bundled_pct,
            confidence,
        }
    }

    /// Group wallets by first-funding source, splitting each source's wallets
    /// into runs that fit inside the funding window
    fn funding_groups(
        &self,
        shares: &HashMap<&str, f64>,
        funding: &[FundingEdge],
        claimed: &mut HashSet<String>,
    ) -> Vec<ClusterGroup> {
        let mut by_funder: HashMap<&str, Vec<(&str, DateTime<Utc>)>> = HashMap::new();
        for edge in funding {
            if shares.contains_key(edge.wallet.as_str()) {
                by_funder
                    .entry(edge.funder.as_str())
                    .or_default()
                    .push((edge.wallet.as_str(), edge.funded_at));
            }
        }

        let window = self.config.funding_window_secs as i64;
        let mut groups = Vec::new();

        let mut funders: Vec<&str> = by_funder.keys().copied().collect();
        funders.sort_unstable();

        for funder in funders {
            let mut wallets = by_funder.remove(funder).unwrap_or_default();
            wallets.sort_by_key(|(_, funded_at)| *funded_at);

            let mut run: Vec<(&str, DateTime<Utc>)> = Vec::new();
            for (wallet, funded_at) in wallets {
                let fits = run
                    .first()
                    .map(|(_, start)| (funded_at - *start).num_seconds() <= window)
                    .unwrap_or(true);
                if !fits {
                    self.close_funding_run(funder, &run, shares, claimed, &mut groups);
                    run.clear();
                }
                run.push((wallet, funded_at));
            }
            self.close_funding_run(funder, &run, shares, claimed, &mut groups);
        }

        groups
    }

    fn close_funding_run(
        &self,
        funder: &str,
        run: &[(&str, DateTime<Utc>)],
        shares: &HashMap<&str, f64>,
        claimed: &mut HashSet<String>,
        groups: &mut Vec<ClusterGroup>,
    ) {
        if run.len() < MIN_GROUP_SIZE {
            return;
        }

        // Timing counts as overwhelming when the whole run fits in a tenth
        // of the window
        let span = (run[run.len() - 1].1 - run[0].1).num_seconds();
        let tight = span * 10 <= self.config.funding_window_secs as i64;
        let confidence = if run.len() >= HIGH_CONFIDENCE_SIZE || tight {
            ConfidenceTier::High
        } else {
            ConfidenceTier::Medium
        };

        let members: Vec<String> = run.iter().map(|(w, _)| (*w).to_string()).collect();
        let total_pct = members
            .iter()
            .map(|w| shares.get(w.as_str()).copied().unwrap_or(0.0))
            .sum();

        debug!(
            funder = %funder,
            members = members.len(),
            span_secs = span,
            "Common funding group"
        );

        claimed.extend(members.iter().cloned());
        groups.push(ClusterGroup {
            members,
            strategy: ClusterStrategy::FundingCorrelation,
            confidence,
            total_pct,
        });
    }

    /// Group unclaimed wallets whose supply share sits within the tolerance
    /// of a group anchor. Dust below the minimum share never fingerprints.
    fn fingerprint_groups(
        &self,
        holders: &[HolderRecord],
        claimed: &HashSet<String>,
    ) -> Vec<ClusterGroup> {
        let candidates: Vec<&HolderRecord> = organic(holders)
            .filter(|h| h.pct_of_supply >= self.config.min_share_pct)
            .filter(|h| !claimed.contains(&h.address))
            .collect();

        let mut buckets: Vec<Vec<&HolderRecord>> = Vec::new();
        for holder in candidates {
            let mut placed = false;
            for bucket in &mut buckets {
                if let Some(anchor) = bucket.first() {
                    if (holder.pct_of_supply - anchor.pct_of_supply).abs()
                        <= self.config.share_tolerance_pct
                    {
                        bucket.push(holder);
                        placed = true;
                        break;
                    }
                }
            }
            if !placed {
                buckets.push(vec![holder]);
            }
        }

        buckets
            .into_iter()
            .filter(|bucket| bucket.len() >= MIN_GROUP_SIZE)
            .map(|bucket| {
                let confidence = if bucket.len() >= HIGH_CONFIDENCE_SIZE {
                    ConfidenceTier::High
                } else {
                    ConfidenceTier::Medium
                };
                debug!(
                    members = bucket.len(),
                    share = format!("{:.2}%", bucket[0].pct_of_supply),
                    "Share fingerprint group"
                );
                ClusterGroup {
                    members: bucket.iter().map(|h| h.address.clone()).collect(),
                    strategy: ClusterStrategy::ShareFingerprint,
                    confidence,
                    total_pct: bucket.iter().map(|h| h.pct_of_supply).sum(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::HolderTag;
    use chrono::TimeZone;

    fn config() -> ClusterConfig {
        ClusterConfig {
            share_tolerance_pct: 0.1,
            min_share_pct: 0.25,
            funding_window_secs: 3600,
        }
    }

    fn holder(address: &str, pct: f64) -> HolderRecord {
        HolderRecord {
            address: address.to_string(),
            balance: (pct * 10_000.0) as u64,
            pct_of_supply: pct,
            tag: HolderTag::Organic,
        }
    }

    fn edge(wallet: &str, funder: &str, offset_secs: i64) -> FundingEdge {
        FundingEdge {
            wallet: wallet.to_string(),
            funder: funder.to_string(),
            funded_at: Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_funding_group_of_six_is_high_confidence() {
        let detector = BundleDetector::new(config());
        let holders: Vec<HolderRecord> =
            (0..6).map(|i| holder(&format!("W{i}"), 2.0 + i as f64)).collect();
        let funding: Vec<FundingEdge> = (0..6)
            .map(|i| edge(&format!("W{i}"), "Funder1", i * 300))
            .collect();

        let detection = detector.detect(&holders, &funding);
        assert!(detection.detected());
        assert_eq!(detection.groups.len(), 1);
        assert_eq!(detection.bundled_count, 6);
        assert_eq!(detection.confidence, Some(ConfidenceTier::High));
        assert!((detection.bundled_pct - (2.0 + 3.0 + 4.0 + 5.0 + 6.0 + 7.0)).abs() < 1e-9);
    }

    #[test]
    fn test_tight_timing_upgrades_small_group() {
        let detector = BundleDetector::new(config());
        let holders: Vec<HolderRecord> =
            (0..3).map(|i| holder(&format!("W{i}"), 5.0 + i as f64)).collect();

        // Spread across most of the window: medium
        let loose: Vec<FundingEdge> = (0..3)
            .map(|i| edge(&format!("W{i}"), "Funder1", i * 1500))
            .collect();
        let detection = detector.detect(&holders, &loose);
        assert_eq!(detection.confidence, Some(ConfidenceTier::Medium));

        // All inside a tenth of the window: high
        let tight: Vec<FundingEdge> = (0..3)
            .map(|i| edge(&format!("W{i}"), "Funder1", i * 60))
            .collect();
        let detection = detector.detect(&holders, &tight);
        assert_eq!(detection.confidence, Some(ConfidenceTier::High));
    }

    #[test]
    fn test_two_wallets_never_group() {
        let detector = BundleDetector::new(config());
        let holders = vec![holder("W0", 5.0), holder("W1", 6.0)];
        let funding = vec![edge("W0", "Funder1", 0), edge("W1", "Funder1", 10)];

        let detection = detector.detect(&holders, &funding);
        assert!(!detection.detected());
        assert!(detection.groups.is_empty());
    }

    #[test]
    fn test_fingerprint_groups_similar_shares() {
        let detector = BundleDetector::new(config());
        let holders = vec![
            holder("A1", 2.00),
            holder("A2", 1.98),
            holder("A3", 1.95),
            holder("A4", 1.92),
            holder("Whale", 40.0),
        ];

        let detection = detector.detect(&holders, &[]);
        assert_eq!(detection.groups.len(), 1);
        let group = &detection.groups[0];
        assert_eq!(group.strategy, ClusterStrategy::ShareFingerprint);
        assert_eq!(group.members.len(), 4);
        assert_eq!(group.confidence, ConfidenceTier::Medium);
    }

    #[test]
    fn test_fingerprint_group_of_five_is_high_confidence() {
        let detector = BundleDetector::new(config());
        // Five shares inside the tolerance of the 2.00 anchor, no funding data
        let holders = vec![
            holder("B1", 2.00),
            holder("B2", 1.98),
            holder("B3", 1.96),
            holder("B4", 1.94),
            holder("B5", 1.92),
            holder("Whale", 40.0),
        ];

        let detection = detector.detect(&holders, &[]);
        assert_eq!(detection.groups.len(), 1);
        let group = &detection.groups[0];
        assert_eq!(group.strategy, ClusterStrategy::ShareFingerprint);
        assert_eq!(group.members.len(), 5);
        assert_eq!(group.confidence, ConfidenceTier::High);
        assert_eq!(detection.confidence, Some(ConfidenceTier::High));
    }

    #[test]
    fn test_dust_never_fingerprints() {
        let detector = BundleDetector::new(config());
        let holders: Vec<HolderRecord> =
            (0..8).map(|i| holder(&format!("D{i}"), 0.1)).collect();

        let detection = detector.detect(&holders, &[]);
        assert!(!detection.detected());
    }

    #[test]
    fn test_strategies_stay_disjoint() {
        let detector = BundleDetector::new(config());
        // Five wallets at the same share; three of them share a funder
        let holders: Vec<HolderRecord> =
            (0..5).map(|i| holder(&format!("W{i}"), 2.0)).collect();
        let funding: Vec<FundingEdge> = (0..3)
            .map(|i| edge(&format!("W{i}"), "Funder1", i * 30))
            .collect();

        let detection = detector.detect(&holders, &funding);
        let mut seen = HashSet::new();
        for group in &detection.groups {
            for member in &group.members {
                assert!(seen.insert(member.clone()), "wallet in two groups");
            }
        }
        assert_eq!(detection.bundled_count, seen.len());

        // The funded trio is claimed; the two leftovers are below the
        // fingerprint minimum group size
        assert_eq!(detection.groups.len(), 1);
        assert_eq!(
            detection.groups[0].strategy,
            ClusterStrategy::FundingCorrelation
        );
    }

    #[test]
    fn test_non_organic_holders_ignored() {
        let detector = BundleDetector::new(config());
        let mut lp = holder("Pool1", 2.0);
        lp.tag = HolderTag::Lp;
        let holders = vec![lp, holder("W1", 2.0), holder("W2", 2.0)];

        let detection = detector.detect(&holders, &[]);
        // Only two organic wallets share the fingerprint
        assert!(!detection.detected());
    }
}
