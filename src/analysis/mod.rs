//! Token risk analysis pipeline: classification, clustering, evaluation, scoring

pub mod authority;
pub mod bundles;
pub mod engine;
pub mod holders;
pub mod scoring;
pub mod types;

pub use engine::AnalysisEngine;
pub use types::{
    Authorities, AuthorityVerdict, BundleDetection, ClusterGroup, ConfidenceTier, FlagKind,
    FlagSeverity, HolderRecord, HolderSource, HolderTag, LiquidityState, LiquidityStatus, RedFlag,
    RiskAssessment, RiskLevel, SafetyScore, TokenSnapshot,
};
