//! Configuration management for the farmer
//!
//! Loads configuration from a TOML file with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub account: AccountSettings,
    pub farm: FarmSettings,
    pub ping_pong: Option<PingPongSettings>,
    pub quick_swap: Option<QuickSwapSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub rpc_url: String,
    pub proxy: Option<String>,
    /// Gas price override in wei, used on the transfer path only
    pub gas_price: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSettings {
    pub private_key: String,
    /// Repeat count for every enabled farm
    pub tran_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FarmSettings {
    pub stt_send: bool,
    pub ping_pong_swap: bool,
    pub quick_swap: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PingPongSettings {
    pub router_contract: String,
    pub ping_contract: String,
    pub pong_contract: String,
    /// JSON ABI text for the pool router
    pub router_abi: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuickSwapSettings {
    pub router_contract: String,
    /// JSON ABI text for the swap router
    pub router_abi: String,
    pub usdc_contract: String,
    pub wstt_contract: String,
}

impl Settings {
    /// Load settings from a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api.rpc_url.is_empty() {
            anyhow::bail!("api.rpc_url must not be empty");
        }
        if self.account.private_key.is_empty() {
            anyhow::bail!("account.private_key must not be empty");
        }
        if self.farm.ping_pong_swap && self.ping_pong.is_none() {
            anyhow::bail!("farm.ping_pong_swap is enabled but the [ping_pong] section is missing");
        }
        if self.farm.quick_swap && self.quick_swap.is_none() {
            anyhow::bail!("farm.quick_swap is enabled but the [quick_swap] section is missing");
        }
        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
    }

    let mut result = input.to_string();
    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
