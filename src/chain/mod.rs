//! Chain module - node access and address handling
//!
//! This module provides:
//! - The `NodeClient` seam used by the rewriter, gas policy and submission engine
//! - An ethers-backed HTTP implementation with bounded receipt waits
//! - Validated, checksummed contract addresses

pub mod address;
pub mod provider;

pub use address::{contract_from_marketplace_url, ContractAddress};
pub use provider::ChainProvider;

use crate::error::SniperResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};
use std::time::Duration;

/// Execution outcome recorded in a transaction receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

impl ReceiptStatus {
    pub fn from_receipt(receipt: &TransactionReceipt) -> Self {
        if receipt.status == Some(U64::from(1)) {
            ReceiptStatus::Success
        } else {
            ReceiptStatus::Reverted
        }
    }
}

/// Node RPC operations the sniper depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Chain ID reported by the node
    async fn chain_id(&self) -> SniperResult<u64>;

    /// Call data of a transaction, or `None` if the node does not know the transaction
    async fn transaction_input(&self, tx_hash: H256) -> SniperResult<Option<Bytes>>;

    /// Transaction count of `account`, including pending transactions
    async fn pending_nonce(&self, account: Address) -> SniperResult<U256>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> SniperResult<U256>;

    async fn send_raw_transaction(&self, raw: Bytes) -> SniperResult<H256>;

    /// Wait up to `timeout` for the transaction to be mined
    async fn wait_for_receipt(&self, tx_hash: H256, timeout: Duration)
        -> SniperResult<ReceiptStatus>;
}
