//! Rate-limited polling for the newest transaction against a contract

use super::{IndexerClient, IndexerError};
use crate::chain::ContractAddress;
use crate::clock::{Clock, Pacer};
use crate::config::IndexerConfig;
use crate::error::{SniperError, SniperResult};

use ethers::types::H256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bounds for one detection run, whichever is hit first
#[derive(Debug, Clone, Copy)]
pub struct PollBudget {
    pub max_wait: Duration,
    pub max_requests: u32,
}

impl PollBudget {
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self {
            max_wait: config.max_wait(),
            max_requests: config.max_requests,
        }
    }
}

/// Polls the indexer until a transaction hash for the contract shows up
pub struct PayloadSource {
    indexer: Arc<dyn IndexerClient>,
    clock: Arc<dyn Clock>,
    request_interval: Duration,
    rate_limit_cooldown: Duration,
    error_penalty: Duration,
    timeout_penalty: Duration,
}

impl PayloadSource {
    pub fn new(
        indexer: Arc<dyn IndexerClient>,
        clock: Arc<dyn Clock>,
        config: &IndexerConfig,
    ) -> Self {
        Self {
            indexer,
            clock,
            request_interval: config.request_interval(),
            rate_limit_cooldown: Duration::from_millis(config.rate_limit_cooldown_ms),
            error_penalty: Duration::from_millis(config.error_penalty_ms),
            timeout_penalty: Duration::from_millis(config.timeout_penalty_ms),
        }
    }

    /// Find the hash of the most recent transaction touching `contract`.
    ///
    /// Fails immediately on a 403. Every issued request counts toward
    /// `budget.max_requests`, including rate-limited and failed ones.
    pub async fn find_latest_transaction(
        &self,
        contract: &ContractAddress,
        budget: PollBudget,
    ) -> SniperResult<H256> {
        let start = self.clock.elapsed();
        let deadline = start + budget.max_wait;
        let mut pacer = Pacer::new(self.request_interval);
        let mut requests = 0u32;

        info!(
            "Polling indexer for {} (max {} requests, {:?})",
            contract, budget.max_requests, budget.max_wait
        );

        while requests < budget.max_requests {
            pacer.tick(self.clock.as_ref(), deadline).await;
            let now = self.clock.elapsed();
            if now >= deadline {
                break;
            }

            requests += 1;
            let reply = match tokio::time::timeout(
                deadline - now,
                self.indexer.latest_transactions(contract.address(), 1),
            )
            .await
            {
                Ok(reply) => reply,
                Err(_) => Err(IndexerError::Timeout),
            };

            match reply {
                Ok(records) => {
                    crate::metrics::record_indexer_request("ok");
                    match records.first() {
                        None => debug!("No transactions yet for {} (request {})", contract, requests),
                        Some(record) => match parse_tx_hash(&record.hash) {
                            Some(hash) => {
                                info!("Latest transaction found: {:?} after {} requests", hash, requests);
                                return Ok(hash);
                            }
                            None => debug!("Ignoring malformed hash {:?}", record.hash),
                        },
                    }
                }
                Err(IndexerError::Forbidden) => {
                    crate::metrics::record_indexer_request("forbidden");
                    return Err(SniperError::IndexerForbidden);
                }
                Err(IndexerError::RateLimited) => {
                    crate::metrics::record_indexer_request("rate_limited");
                    warn!("Indexer rate limit hit, cooling down for {:?}", self.rate_limit_cooldown);
                    self.pause(self.rate_limit_cooldown, deadline).await;
                }
                Err(IndexerError::Timeout) => {
                    crate::metrics::record_indexer_request("timeout");
                    warn!("Indexer request timed out, retrying after {:?}", self.timeout_penalty);
                    self.pause(self.timeout_penalty, deadline).await;
                }
                Err(e) => {
                    crate::metrics::record_indexer_request("error");
                    warn!("Indexer error: {}", e);
                    self.pause(self.error_penalty, deadline).await;
                }
            }
        }

        Err(SniperError::IndexerExhausted {
            requests,
            elapsed_ms: (self.clock.elapsed() - start).as_millis(),
        })
    }

    /// Sleep for `duration`, truncated at the deadline
    async fn pause(&self, duration: Duration, deadline: Duration) {
        let remaining = deadline.saturating_sub(self.clock.elapsed());
        let pause = duration.min(remaining);
        if !pause.is_zero() {
            self.clock.sleep(pause).await;
        }
    }
}

/// Accept only `0x`-prefixed 32-byte hashes
fn parse_tx_hash(raw: &str) -> Option<H256> {
    let digits = raw.strip_prefix("0x")?;
    if digits.len() != 64 {
        return None;
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(digits, &mut bytes).ok()?;
    Some(H256::from(bytes))
}
