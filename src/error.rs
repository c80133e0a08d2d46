//! Error types for the risk analysis engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the analysis engine
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Fatal input errors: the pipeline cannot start
    #[error("Invalid token address: {0}")]
    InvalidAddress(String),

    #[error("Mint account fetch failed: {0}")]
    MintFetch(String),

    #[error("Mint account decode failed: {0}")]
    MintDecode(String),

    // Caller-driven abort: the run is discarded, nothing persists
    #[error("Analysis cancelled before completion")]
    Cancelled,

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    // Secondary source errors: recovered at the orchestrator boundary
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Source '{source_name}' timed out after {timeout_ms}ms")]
    SourceTimeout { source_name: String, timeout_ms: u64 },

    #[error("Source '{source_name}' returned malformed payload: {reason}")]
    SourcePayload { source_name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),

    // Reputation store errors
    #[error("Reputation store error: {0}")]
    ReputationStore(String),

    #[error("Label not found for wallet: {0}")]
    LabelNotFound(String),

    #[error("No confirmable wallet for token: {0}")]
    NoConfirmTarget(String),

    // Allow-list registry errors
    #[error("Exchange registry error: {0}")]
    ExchangeRegistry(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error aborts the whole analysis (vs. degrading one field)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddress(_) | Error::MintFetch(_) | Error::MintDecode(_) | Error::Cancelled
        )
    }

    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::RpcTimeout(_) | Error::RpcConnection(_) | Error::Http(_)
        )
    }

    /// Build the unavailable-source error for a named connector
    pub fn source_unavailable(source_name: &str, reason: impl ToString) -> Self {
        Error::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Http(format!("request timed out: {}", e))
        } else {
            Error::Http(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
