//! BlockVision account-transactions client

use super::{IndexedTransaction, IndexerClient, IndexerError, TransactionListResponse};
use crate::config::IndexerConfig;

use async_trait::async_trait;
use ethers::types::Address;
use ethers::utils::to_checksum;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

pub struct BlockVisionClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BlockVisionClient {
    pub fn new(config: &IndexerConfig) -> Result<Self, IndexerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| IndexerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Map a non-success HTTP status onto the backoff classes
fn classify_status(status: StatusCode) -> Option<IndexerError> {
    match status {
        s if s.is_success() => None,
        StatusCode::FORBIDDEN => Some(IndexerError::Forbidden),
        StatusCode::TOO_MANY_REQUESTS => Some(IndexerError::RateLimited),
        s => Some(IndexerError::Status(s.as_u16())),
    }
}

fn classify_transport(err: reqwest::Error) -> IndexerError {
    if err.is_timeout() {
        IndexerError::Timeout
    } else if err.is_decode() {
        IndexerError::Decode(err.to_string())
    } else {
        IndexerError::Transport(err.to_string())
    }
}

#[async_trait]
impl IndexerClient for BlockVisionClient {
    async fn latest_transactions(
        &self,
        address: Address,
        limit: u32,
    ) -> Result<Vec<IndexedTransaction>, IndexerError> {
        let response = self
            .client
            .get(&self.base_url)
            .header("accept", "application/json")
            .header("x-api-key", &self.api_key)
            .query(&[
                ("address", to_checksum(&address, None)),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        debug!("Indexer responded with status {}", status);
        if let Some(err) = classify_status(status) {
            return Err(err);
        }

        let body: TransactionListResponse = response.json().await.map_err(classify_transport)?;
        Ok(body.result.data)
    }
}
