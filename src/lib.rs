//! Mintguard Library
//!
//! Risk analysis engine for Solana tokens: composite safety scoring,
//! holder clustering, liquidity evaluation, and wallet reputation.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod exchanges;
pub mod reputation;
pub mod sources;

// Re-export commonly used types
pub use analysis::{AnalysisEngine, RiskAssessment, RiskLevel, SafetyScore};
pub use config::Config;
pub use error::{Error, Result};
