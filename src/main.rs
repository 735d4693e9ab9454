//! Mint Sniper - NFT mint front-running bot
//!
//! Detects the newest transaction against a mint contract through an indexer,
//! redirects its call data to the operator's address and resubmits it with
//! escalating gas until a receipt reports success or the attempt budget is spent.

use anyhow::Result;
use clap::Parser;
use ethers::signers::Signer;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod chain;
mod cli;
mod clock;
mod config;
mod context;
mod error;
mod indexer;
mod metrics;
mod payload;
mod pricing;
mod tx;

use chain::{ChainProvider, ContractAddress, NodeClient};
use cli::Cli;
use clock::TokioClock;
use config::Settings;
use context::SniperContext;
use indexer::BlockVisionClient;
use tx::{SnipeOutcome, SubmissionEngine};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(max_attempts) = cli.max_attempts {
        settings.sniper.max_attempts = max_attempts;
        settings.validate()?;
    }

    init_logging(settings.logging.json);
    info!("Starting Mint Sniper v{}", env!("CARGO_PKG_VERSION"));
    if settings.indexer.api_key.is_empty() {
        warn!("Indexer API key is empty - requests will likely be rejected");
    }

    // A missing signing key is fatal before any prompt or network call
    let wallet = context::load_wallet(&settings.wallet.private_key_env)?;
    info!("Operator account: {:?}", wallet.address());

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();
    let contract =
        cli::resolve_contract(&cli, &settings.sniper.marketplace_network, &mut input, &mut out)?;
    let value = match cli::resolve_price(&cli, &mut input, &mut out) {
        Ok(value) => value,
        Err(e) => {
            println!("Error: {}", e);
            println!("Sniping cancelled: invalid price.");
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("Using price {} wei for {}", value, contract);

    // Initialize node connection
    let provider = ChainProvider::connect(&settings.node).await?;
    let chain_id = match settings.node.chain_id {
        Some(id) => id,
        None => provider.chain_id().await?,
    };
    info!("Node connection established (chain {})", chain_id);

    let wallet = wallet.with_chain_id(chain_id);
    let beneficiary = match &settings.sniper.beneficiary {
        Some(address) => ContractAddress::parse(address)?.address(),
        None => wallet.address(),
    };
    info!("Beneficiary: {:?}", beneficiary);

    let indexer = BlockVisionClient::new(&settings.indexer)?;
    let ctx = Arc::new(SniperContext::new(
        Arc::new(provider),
        Arc::new(indexer),
        wallet,
        Arc::new(TokioClock::new()),
    ));
    let engine = SubmissionEngine::new(ctx, &settings, beneficiary);

    let succeeded = match engine.snipe(&contract, value).await {
        Ok(outcome) => {
            match &outcome {
                SnipeOutcome::Succeeded { tx_hash, attempt } => {
                    println!("Snipe succeeded on attempt {}! Hash: {:?}", attempt, tx_hash)
                }
                SnipeOutcome::Exhausted { attempts } => {
                    println!("Snipe failed after {} attempts.", attempts)
                }
            }
            outcome.is_success()
        }
        Err(e) if e.is_detection_error() => {
            println!("Error: {}", e);
            println!("Could not start sniping: no calldata detected.");
            false
        }
        Err(e) => {
            error!("Snipe aborted: {}", e);
            false
        }
    };

    finish_metrics(&settings);

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_logging(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,mint_sniper=debug,hyper=warn,reqwest=warn")
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

fn finish_metrics(settings: &Settings) {
    debug!("Run metrics:\n{}", metrics::render());
    if let Some(path) = &settings.metrics.dump_path {
        match metrics::dump(path) {
            Ok(()) => info!("Metrics written to {:?}", path),
            Err(e) => warn!("Failed to write metrics to {:?}: {}", path, e),
        }
    }
}
