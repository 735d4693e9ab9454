//! Call payload extraction and beneficiary rewriting

mod rewriter;

pub use rewriter::CalldataRewriter;
#[cfg(test)]
pub(crate) use rewriter::rewrite_calldata;

use ethers::types::Bytes;
use std::fmt;

/// Rewritten call data: 4-byte selector followed by ABI-encoded arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPayload(Bytes);

impl CallPayload {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn selector(&self) -> [u8; 4] {
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&self.0[..4]);
        selector
    }

    /// Lowercase `0x`-prefixed hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Display for CallPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
