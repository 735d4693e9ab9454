//! Gas pricing and limit policy for repeated submission attempts

use crate::chain::{ContractAddress, NodeClient};
use crate::config::GasConfig;
use crate::payload::CallPayload;

use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use tracing::{debug, warn};

const GWEI: u64 = 1_000_000_000;

/// Escalating legacy gas price and clamped gas limit
pub struct GasPolicy {
    /// One price unit in wei
    unit: U256,
    base_multiplier: u64,
    step_multiplier: u64,
    ceiling_multiplier: u64,
    min_limit: u64,
    max_limit: u64,
    fallback_limit: u64,
}

impl GasPolicy {
    pub fn new(config: &GasConfig) -> Self {
        Self {
            unit: U256::from(config.unit_gwei) * U256::from(GWEI),
            base_multiplier: config.base_multiplier,
            step_multiplier: config.step_multiplier,
            ceiling_multiplier: config.ceiling_multiplier,
            min_limit: config.min_limit,
            max_limit: config.max_limit,
            fallback_limit: config.fallback_limit,
        }
    }

    /// `min(unit × (base + step × attempt), unit × ceiling)`, attempts start at 1
    pub fn price_for_attempt(&self, attempt: u32) -> U256 {
        let multiplier = self
            .base_multiplier
            .saturating_add(self.step_multiplier.saturating_mul(u64::from(attempt)))
            .min(self.ceiling_multiplier);
        self.unit * U256::from(multiplier)
    }

    /// Highest price the schedule can produce
    pub fn price_ceiling(&self) -> U256 {
        self.unit * U256::from(self.ceiling_multiplier)
    }

    /// Estimate the gas limit for the exact transaction shape, clamped into
    /// `[min_limit, max_limit]`. Estimation failures fall back to `fallback_limit`.
    pub async fn limit_for(
        &self,
        node: &dyn NodeClient,
        from: Address,
        contract: &ContractAddress,
        payload: &CallPayload,
        value: U256,
    ) -> U256 {
        let tx: TypedTransaction = TransactionRequest::new()
            .to(contract.address())
            .from(from)
            .data(payload.bytes().clone())
            .value(value)
            .into();

        match node.estimate_gas(&tx).await {
            Ok(estimate) => {
                let limit = estimate.clamp(U256::from(self.min_limit), U256::from(self.max_limit));
                debug!("Gas estimate {} clamped to {}", estimate, limit);
                limit
            }
            Err(e) => {
                warn!("Gas estimation failed, using fallback {}: {}", self.fallback_limit, e);
                crate::metrics::record_gas_limit_fallback();
                U256::from(self.fallback_limit)
            }
        }
    }
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self::new(&GasConfig::default())
    }
}

/// Format a wei amount as gwei for log lines
pub fn format_gwei(wei: U256) -> String {
    ethers::utils::format_units(wei, "gwei").unwrap_or_else(|_| format!("{} wei", wei))
}

pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::from(GWEI)
}
