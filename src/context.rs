//! Runtime context shared by the detection and submission components

use crate::chain::NodeClient;
use crate::clock::Clock;
use crate::error::{SniperError, SniperResult};
use crate::indexer::IndexerClient;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::sync::Arc;

/// Node client, indexer client, signing credential and time source for one run
pub struct SniperContext {
    pub node: Arc<dyn NodeClient>,
    pub indexer: Arc<dyn IndexerClient>,
    pub wallet: LocalWallet,
    pub clock: Arc<dyn Clock>,
}

impl SniperContext {
    pub fn new(
        node: Arc<dyn NodeClient>,
        indexer: Arc<dyn IndexerClient>,
        wallet: LocalWallet,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            node,
            indexer,
            wallet,
            clock,
        }
    }

    /// Address of the signing account
    pub fn operator(&self) -> Address {
        self.wallet.address()
    }
}

/// Load the signing key from the environment variable `env_name`
pub fn load_wallet(env_name: &str) -> SniperResult<LocalWallet> {
    let key = std::env::var(env_name)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| SniperError::Wallet(format!("No signing key configured. Set {}", env_name)))?;

    parse_wallet(&key)
}

/// Parse a hex private key; the chain id is attached once the node is known
pub fn parse_wallet(key: &str) -> SniperResult<LocalWallet> {
    let key = key.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    key.parse::<LocalWallet>()
        .map_err(|e| SniperError::Wallet(format!("Invalid private key: {}", e)))
}
