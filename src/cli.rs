//! Command line arguments and interactive prompts

use crate::chain::{contract_from_marketplace_url, ContractAddress};
use crate::pricing::parse_price;

use anyhow::{Context, Result};
use clap::Parser;
use ethers::types::U256;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mint-sniper", version, about = "Snipe an NFT mint by replaying the latest mint call")]
pub struct Cli {
    /// Contract address to snipe.
    #[arg(long, conflicts_with = "url")]
    pub contract: Option<String>,

    /// Marketplace listing URL (.../mint-terminal/<network>/<address>).
    #[arg(long)]
    pub url: Option<String>,

    /// Mint price, e.g. "0.1 ETH", "1000 GWEI", "42 WEI". Empty means free.
    #[arg(long)]
    pub price: Option<String>,

    /// Override the configured number of submission attempts.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Configuration file (defaults to $SNIPER_CONFIG or config/default.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Resolve the target contract from flags, or ask until a valid one is given
pub fn resolve_contract<R: BufRead, W: Write>(
    cli: &Cli,
    network: &str,
    input: &mut R,
    out: &mut W,
) -> Result<ContractAddress> {
    if let Some(address) = &cli.contract {
        return Ok(ContractAddress::parse(address)?);
    }
    if let Some(url) = &cli.url {
        return Ok(contract_from_marketplace_url(url, network)?);
    }

    loop {
        let choice = prompt_line(
            input,
            out,
            "Choose input (1 = contract address, 2 = marketplace URL): ",
        )?;
        match choice.trim() {
            "1" => {
                let address = prompt_line(input, out, "Contract address to snipe: ")?;
                match ContractAddress::parse(&address) {
                    Ok(contract) => return Ok(contract),
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            "2" => {
                let url = prompt_line(
                    input,
                    out,
                    &format!("Marketplace URL (https://magiceden.io/mint-terminal/{}/0x...): ", network),
                )?;
                match contract_from_marketplace_url(&url, network) {
                    Ok(contract) => return Ok(contract),
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            _ => writeln!(out, "Invalid choice, enter 1 or 2")?,
        }
    }
}

/// Resolve the mint price from flags or a prompt
pub fn resolve_price<R: BufRead, W: Write>(cli: &Cli, input: &mut R, out: &mut W) -> Result<U256> {
    let expression = match &cli.price {
        Some(price) => price.clone(),
        None => prompt_line(
            input,
            out,
            "Price (e.g. '0.1 ETH', '1000 GWEI', '100000000000000000 WEI', Enter for free): ",
        )?,
    };
    Ok(parse_price(&expression)?)
}

fn prompt_line<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> Result<String> {
    write!(out, "{prompt}")?;
    out.flush().context("flush stdout")?;
    let mut buf = String::new();
    let read = input.read_line(&mut buf).context("read input")?;
    if read == 0 {
        anyhow::bail!("input closed");
    }
    Ok(buf.trim().to_string())
}
