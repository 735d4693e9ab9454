//! Configuration management for the mint sniper
//!
//! Loads configuration from a TOML file with environment variable substitution.
//! Every field has a default, so a missing file falls back to defaults plus the
//! environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node: NodeConfig,
    pub indexer: IndexerConfig,
    pub sniper: SniperConfig,
    pub gas: GasConfig,
    pub wallet: WalletConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub rpc_url: String,
    pub chain_id: Option<u64>,
    pub receipt_poll_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            chain_id: None,
            receipt_poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub base_url: String,
    pub api_key: String,
    /// Minimum spacing between requests (5 req/s quota)
    pub request_interval_ms: u64,
    /// Cooldown after a 429
    pub rate_limit_cooldown_ms: u64,
    /// Penalty after a non-2xx status or transport error
    pub error_penalty_ms: u64,
    /// Penalty after a request timeout
    pub timeout_penalty_ms: u64,
    pub max_wait_secs: u64,
    pub max_requests: u32,
    pub request_timeout_secs: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.blockvision.org/v2/monad/account/transactions".to_string(),
            api_key: String::new(),
            request_interval_ms: 200,
            rate_limit_cooldown_ms: 5_000,
            error_penalty_ms: 1_000,
            timeout_penalty_ms: 2_000,
            max_wait_secs: 10,
            max_requests: 50,
            request_timeout_secs: 20,
        }
    }
}

impl IndexerConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SniperConfig {
    pub max_attempts: u32,
    pub attempt_pause_ms: u64,
    pub receipt_timeout_secs: u64,
    pub receipt_retries: u32,
    pub receipt_retry_pause_ms: u64,
    /// Address written into the beneficiary slot; defaults to the signing account
    pub beneficiary: Option<String>,
    pub marketplace_network: String,
}

impl Default for SniperConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            attempt_pause_ms: 50,
            receipt_timeout_secs: 30,
            receipt_retries: 3,
            receipt_retry_pause_ms: 1_000,
            beneficiary: None,
            marketplace_network: "monad-testnet".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Size of one price unit in gwei
    pub unit_gwei: u64,
    pub base_multiplier: u64,
    pub step_multiplier: u64,
    pub ceiling_multiplier: u64,
    pub min_limit: u64,
    pub max_limit: u64,
    pub fallback_limit: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            unit_gwei: 1,
            base_multiplier: 50,
            step_multiplier: 10,
            ceiling_multiplier: 100,
            min_limit: 50_000,
            max_limit: 150_000,
            fallback_limit: 100_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "PRIVATE_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub dump_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `SNIPER_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let config_path = env::var("SNIPER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&config_path)
    }

    /// Load settings from a specific file; a missing file yields defaults
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let settings = if config_path.exists() {
            let config_str = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            Self::parse(&config_str)?
        } else {
            tracing::debug!("No config file at {:?}, using defaults", config_path);
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML document after substituting environment variables
    pub fn parse(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);
        toml::from_str(&config_str).with_context(|| "Failed to parse configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.node.rpc_url.trim().is_empty() {
            anyhow::bail!("node.rpc_url must be set (RPC_URL)");
        }
        if self.sniper.max_attempts == 0 {
            anyhow::bail!("sniper.max_attempts must be at least 1");
        }
        if self.sniper.receipt_retries == 0 {
            anyhow::bail!("sniper.receipt_retries must be at least 1");
        }
        if self.indexer.max_requests == 0 {
            anyhow::bail!("indexer.max_requests must be at least 1");
        }

        let gas = &self.gas;
        if !(gas.min_limit <= gas.fallback_limit && gas.fallback_limit <= gas.max_limit) {
            anyhow::bail!(
                "gas limits must satisfy min_limit <= fallback_limit <= max_limit ({} / {} / {})",
                gas.min_limit,
                gas.fallback_limit,
                gas.max_limit
            );
        }
        if gas.base_multiplier > gas.ceiling_multiplier {
            anyhow::bail!("gas.base_multiplier exceeds gas.ceiling_multiplier");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
