//! Positional beneficiary rewrite of a detected transaction's call data
//!
//! The first 32-byte argument slot is assumed to hold the recipient address.
//! The target contract's ABI is never consulted: whatever sits in slot 0 is
//! replaced, everything after it is kept verbatim.

use super::CallPayload;
use crate::chain::NodeClient;
use crate::error::{SniperError, SniperResult};

use ethers::types::{Address, Bytes, H256};
use std::sync::Arc;
use tracing::debug;

/// `0x` + 4-byte selector
const SELECTOR_END: usize = 10;
/// End of the first 32-byte argument slot
const FIRST_SLOT_END: usize = SELECTOR_END + 64;

pub struct CalldataRewriter {
    node: Arc<dyn NodeClient>,
}

impl CalldataRewriter {
    pub fn new(node: Arc<dyn NodeClient>) -> Self {
        Self { node }
    }

    /// Fetch `tx_hash` from the node and redirect its call data to `beneficiary`
    pub async fn rewrite_payload(
        &self,
        tx_hash: H256,
        beneficiary: Address,
    ) -> SniperResult<CallPayload> {
        let input = self
            .node
            .transaction_input(tx_hash)
            .await?
            .ok_or_else(|| SniperError::MissingPayload {
                tx_hash: format!("{:?}", tx_hash),
            })?;

        let original = normalize(&input);
        debug!("Original calldata: {}", original);

        let payload = rewrite_calldata(&original, beneficiary)?;
        debug!(
            "Rewritten calldata (selector 0x{}): {}",
            hex::encode(payload.selector()),
            payload
        );
        Ok(payload)
    }
}

fn normalize(input: &Bytes) -> String {
    format!("0x{}", hex::encode(input))
}

/// Replace the first argument slot of `calldata` with `beneficiary`.
///
/// `calldata` is `0x`-prefixed hex. The selector is kept, characters 10..74
/// become the zero-padded beneficiary and everything from character 74 on is
/// preserved. Payloads shorter than the first slot get the slot appended.
pub fn rewrite_calldata(calldata: &str, beneficiary: Address) -> SniperResult<CallPayload> {
    let normalized = calldata.trim().to_ascii_lowercase();
    let normalized = if normalized.starts_with("0x") {
        normalized
    } else {
        format!("0x{}", normalized)
    };

    if !normalized.is_ascii() {
        return Err(SniperError::InvalidPayload(
            "calldata contains non-ASCII characters".to_string(),
        ));
    }
    if normalized.len() < SELECTOR_END {
        return Err(SniperError::InvalidPayload(format!(
            "calldata {:?} is shorter than a method selector",
            normalized
        )));
    }

    let selector = &normalized[..SELECTOR_END];
    let slot = format!("{:0>64}", hex::encode(beneficiary.as_bytes()));
    let remainder = normalized.get(FIRST_SLOT_END..).unwrap_or("");
    let rewritten = format!("{}{}{}", selector, slot, remainder);

    if !rewritten.starts_with("0x") || rewritten.len() < SELECTOR_END {
        return Err(SniperError::RewriteInvariant(format!(
            "rewritten calldata {:?} lost its selector",
            rewritten
        )));
    }

    let bytes = hex::decode(&rewritten[2..]).map_err(|e| {
        SniperError::RewriteInvariant(format!("rewritten calldata is not valid hex: {}", e))
    })?;

    Ok(CallPayload::new(Bytes::from(bytes)))
}
