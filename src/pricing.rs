//! Human price input ("0.1 ETH", "1000 GWEI", "42 WEI") to wei

use crate::error::{SniperError, SniperResult};

use ethers::types::U256;

/// Denominations accepted after the number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceUnit {
    Eth,
    Gwei,
    Wei,
}

impl PriceUnit {
    fn decimals(self) -> usize {
        match self {
            PriceUnit::Eth => 18,
            PriceUnit::Gwei => 9,
            PriceUnit::Wei => 0,
        }
    }

    fn parse(unit: &str) -> SniperResult<Self> {
        match unit {
            "ETH" => Ok(PriceUnit::Eth),
            "GWEI" => Ok(PriceUnit::Gwei),
            "WEI" => Ok(PriceUnit::Wei),
            other => Err(SniperError::InvalidPrice(format!(
                "unknown unit {:?}, use ETH, GWEI or WEI",
                other
            ))),
        }
    }
}

/// Convert a price expression to wei. Empty input means a free mint; a bare
/// number is read as ETH.
pub fn parse_price(input: &str) -> SniperResult<U256> {
    let normalized = input.trim().to_ascii_uppercase();
    let mut parts = normalized.split_whitespace();

    let amount = match parts.next() {
        Some(amount) => amount,
        None => return Ok(U256::zero()),
    };
    let unit = match parts.next() {
        Some(unit) => PriceUnit::parse(unit)?,
        None => PriceUnit::Eth,
    };
    if let Some(extra) = parts.next() {
        return Err(SniperError::InvalidPrice(format!(
            "unexpected trailing input {:?}",
            extra
        )));
    }

    to_base_units(amount, unit.decimals())
}

/// Exact decimal to integer conversion with `decimals` fractional digits
fn to_base_units(amount: &str, decimals: usize) -> SniperResult<U256> {
    let mut pieces = amount.split('.');
    let whole = pieces.next().unwrap_or("");
    let frac = pieces.next().unwrap_or("");

    if pieces.next().is_some() {
        return Err(SniperError::InvalidPrice(format!("{:?}: too many decimal points", amount)));
    }
    if whole.is_empty() && frac.is_empty() {
        return Err(SniperError::InvalidPrice(format!("{:?}: not a number", amount)));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(SniperError::InvalidPrice(format!("{:?}: not a number", amount)));
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals {
        return Err(SniperError::InvalidPrice(format!(
            "{:?}: at most {} decimal places for this unit",
            amount, decimals
        )));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let digits = format!("{}{:0<width$}", whole, frac, width = decimals);

    U256::from_dec_str(&digits)
        .map_err(|e| SniperError::InvalidPrice(format!("{:?}: {}", amount, e)))
}
