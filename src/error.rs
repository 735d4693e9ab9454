//! Error types for the mint sniper

use thiserror::Error;

/// Main error type for the sniper
#[derive(Error, Debug)]
pub enum SniperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Node connection error: {0}")]
    NodeConnection(String),

    #[error("Indexer denied access (403): check the API key and endpoint permissions")]
    IndexerForbidden,

    #[error("No transaction hash found after {requests} indexer requests in {elapsed_ms}ms")]
    IndexerExhausted { requests: u32, elapsed_ms: u128 },

    #[error("Missing payload for transaction {tx_hash}")]
    MissingPayload { tx_hash: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Rewrite invariant violated: {0}")]
    RewriteInvariant(String),

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Receipt lookup failed for {tx_hash}: {message}")]
    Receipt { tx_hash: String, message: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid marketplace URL: {0}")]
    MarketplaceUrl(String),
}

impl SniperError {
    /// Check if error is absorbed by the attempt loop
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SniperError::NodeConnection(_)
                | SniperError::GasEstimation(_)
                | SniperError::Transaction(_)
                | SniperError::Broadcast(_)
                | SniperError::Receipt { .. }
                | SniperError::Timeout { .. }
        )
    }

    /// Check if error belongs to the detection phase (aborts the run, no attempts consumed)
    pub fn is_detection_error(&self) -> bool {
        matches!(
            self,
            SniperError::IndexerForbidden
                | SniperError::IndexerExhausted { .. }
                | SniperError::MissingPayload { .. }
                | SniperError::InvalidPayload(_)
                | SniperError::RewriteInvariant(_)
        )
    }
}

/// Result type for sniper operations
pub type SniperResult<T> = Result<T, SniperError>;
