//! HTTP chain provider backed by ethers

use super::{NodeClient, ReceiptStatus};
use crate::config::NodeConfig;
use crate::error::{SniperError, SniperResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::{debug, info};

/// Node RPC client over HTTP
pub struct ChainProvider {
    http: Provider<Http>,
    receipt_poll_interval: Duration,
}

impl ChainProvider {
    /// Create a provider and check that the node is reachable
    pub async fn connect(config: &NodeConfig) -> SniperResult<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| SniperError::NodeConnection(format!("Invalid RPC URL: {}", e)))?
            .interval(Duration::from_millis(100));

        let block = provider
            .get_block_number()
            .await
            .map_err(|e| SniperError::NodeConnection(format!("RPC unreachable: {}", e)))?;
        info!("Connected to node at block {}", block);

        Ok(Self {
            http: provider,
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
        })
    }

    async fn poll_receipt(&self, tx_hash: H256) -> SniperResult<TransactionReceipt> {
        loop {
            let receipt = self
                .http
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| SniperError::Receipt {
                    tx_hash: format!("{:?}", tx_hash),
                    message: e.to_string(),
                })?;

            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }
}

#[async_trait]
impl NodeClient for ChainProvider {
    async fn chain_id(&self) -> SniperResult<u64> {
        self.http
            .get_chainid()
            .await
            .map(|id| id.as_u64())
            .map_err(|e| SniperError::NodeConnection(e.to_string()))
    }

    async fn transaction_input(&self, tx_hash: H256) -> SniperResult<Option<Bytes>> {
        debug!("Fetching transaction {:?}", tx_hash);
        let tx = self
            .http
            .get_transaction(tx_hash)
            .await
            .map_err(|e| SniperError::NodeConnection(e.to_string()))?;

        Ok(tx.map(|tx| tx.input))
    }

    async fn pending_nonce(&self, account: Address) -> SniperResult<U256> {
        self.http
            .get_transaction_count(account, Some(BlockId::Number(BlockNumber::Pending)))
            .await
            .map_err(|e| SniperError::NodeConnection(format!("Nonce lookup failed: {}", e)))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> SniperResult<U256> {
        self.http
            .estimate_gas(tx, None)
            .await
            .map_err(|e| SniperError::GasEstimation(e.to_string()))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> SniperResult<H256> {
        let pending = self
            .http
            .send_raw_transaction(raw)
            .await
            .map_err(|e| SniperError::Broadcast(e.to_string()))?;

        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        timeout: Duration,
    ) -> SniperResult<ReceiptStatus> {
        match tokio::time::timeout(timeout, self.poll_receipt(tx_hash)).await {
            Ok(receipt) => receipt.map(|r| ReceiptStatus::from_receipt(&r)),
            Err(_) => Err(SniperError::Timeout {
                operation: format!("receipt of {:?}", tx_hash),
            }),
        }
    }
}
