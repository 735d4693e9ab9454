//! Contract address validation and marketplace URL parsing

use crate::error::{SniperError, SniperResult};

use ethers::types::Address;
use ethers::utils::to_checksum;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A validated 20-byte contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContractAddress(Address);

impl ContractAddress {
    /// Parse a `0x`-optional, 40 hex digit address.
    ///
    /// All-lowercase and all-uppercase input is accepted as is. Mixed-case input
    /// must carry a valid EIP-55 checksum.
    pub fn parse(input: &str) -> SniperResult<Self> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 40 {
            return Err(SniperError::InvalidAddress(format!(
                "{:?}: expected 40 hex digits, got {}",
                input,
                digits.len()
            )));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SniperError::InvalidAddress(format!(
                "{:?}: contains non-hex characters",
                input
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| SniperError::InvalidAddress(format!("{:?}: {}", input, e)))?;
        let address = Address::from(bytes);

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            let expected = to_checksum(&address, None);
            if expected[2..] != *digits {
                return Err(SniperError::InvalidAddress(format!(
                    "{:?}: checksum mismatch (expected {})",
                    input, expected
                )));
            }
        }

        Ok(Self(address))
    }

    pub fn address(&self) -> Address {
        self.0
    }

    /// EIP-55 checksummed representation
    pub fn checksummed(&self) -> String {
        to_checksum(&self.0, None)
    }
}

impl FromStr for ContractAddress {
    type Err = SniperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Address> for ContractAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.checksummed())
    }
}

/// Extract the contract address from a `.../mint-terminal/<network>/<address>` listing URL
pub fn contract_from_marketplace_url(raw_url: &str, network: &str) -> SniperResult<ContractAddress> {
    let url = Url::parse(raw_url.trim())
        .map_err(|e| SniperError::MarketplaceUrl(format!("{}: {}", raw_url, e)))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["mint-terminal", net, address, ..] if *net == network => ContractAddress::parse(address),
        ["mint-terminal", net, ..] => Err(SniperError::MarketplaceUrl(format!(
            "expected network {}, got {}",
            network, net
        ))),
        _ => Err(SniperError::MarketplaceUrl(format!(
            "{}: expected path mint-terminal/{}/<address>",
            raw_url, network
        ))),
    }
}
