//! Transaction indexer access
//!
//! The indexer is polled for the newest transaction touching the target
//! contract. `PayloadSource` owns the pacing and backoff policy; clients only
//! translate HTTP outcomes into [`IndexerError`] variants.

pub mod blockvision;
pub mod source;

pub use blockvision::BlockVisionClient;
pub use source::{PayloadSource, PollBudget};

use async_trait::async_trait;
use ethers::types::Address;
use serde::Deserialize;
use thiserror::Error;

/// HTTP-level indexer failures, classified for the backoff policy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexerError {
    #[error("access denied (403)")]
    Forbidden,

    #[error("rate limited (429)")]
    RateLimited,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// One record of the indexer's transaction listing
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct IndexedTransaction {
    #[serde(default)]
    pub hash: String,
}

/// `{ result: { data: [ ... ] } }`
#[derive(Debug, Default, Deserialize)]
pub struct TransactionListResponse {
    #[serde(default)]
    pub result: TransactionListResult,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionListResult {
    #[serde(default)]
    pub data: Vec<IndexedTransaction>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// Most recent transactions touching `address`, newest first
    async fn latest_transactions(
        &self,
        address: Address,
        limit: u32,
    ) -> Result<Vec<IndexedTransaction>, IndexerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape() {
        let body = r#"{"code":0,"result":{"data":[{"hash":"0xabc","from":"0x1"}],"nextPageCursor":""}}"#;
        let parsed: TransactionListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result.data.len(), 1);
        assert_eq!(parsed.result.data[0].hash, "0xabc");
    }

    #[test]
    fn test_missing_fields_decode_to_empty() {
        let parsed: TransactionListResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.result.data.is_empty());

        let parsed: TransactionListResponse =
            serde_json::from_str(r#"{"result":{"data":[{}]}}"#).unwrap();
        assert_eq!(parsed.result.data[0].hash, "");
    }
}
