//! Bad-actor reputation: labels that outlive a single analysis

pub mod engine;
pub mod rules;
pub mod store;

pub use engine::ReputationEngine;
pub use rules::FlagRequest;
pub use store::{
    BadActorLabel, HistoryEntry, JsonFileStore, LabelType, ReputationStore, RugConfirmation,
};
