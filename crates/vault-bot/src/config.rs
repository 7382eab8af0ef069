//! Application configuration.

use std::path::PathBuf;

use alloy::primitives::Address;
use serde::Deserialize;

use vault_engine::EngineConfig;

use crate::error::{AppError, AppResult};
use crate::keys::KeySource;

/// Top-level configuration, loaded from a TOML file.
///
/// Private keys are never placed in the file; each section names an
/// environment variable (or key file) to load its key from.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// SQLite database path for the execution store.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    pub chain: ChainConfig,
    pub venue: VenueConfig,
    pub engine: EngineConfig,
}

/// Chain connectivity and contract addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,

    /// Trade executor contract (intent events + settlement entrypoint).
    pub executor_address: Address,

    /// Environment variable holding the settlement signer key.
    #[serde(default = "default_chain_key_env")]
    pub key_env: String,

    /// Key file, takes precedence over `key_env` when set.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// When set, the loaded key must derive exactly this address.
    #[serde(default)]
    pub signer_address: Option<Address>,
}

/// Venue connectivity.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    #[serde(default = "default_venue_api_url")]
    pub api_url: String,

    #[serde(default = "default_is_mainnet")]
    pub is_mainnet: bool,

    /// Venue account whose state and fills the engine reads.
    pub user_address: Address,

    /// Venue vault/subaccount traded on behalf of, if any.
    #[serde(default)]
    pub vault_address: Option<Address>,

    /// Environment variable holding the venue agent key.
    #[serde(default = "default_venue_key_env")]
    pub key_env: String,

    /// Key file, takes precedence over `key_env` when set.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

fn default_database_path() -> String {
    "vault-bot.db".to_string()
}

fn default_chain_key_env() -> String {
    "BOT_SIGNER_PRIVATE_KEY".to_string()
}

fn default_venue_api_url() -> String {
    "https://api.hyperliquid.xyz".to_string()
}

fn default_is_mainnet() -> bool {
    true
}

fn default_venue_key_env() -> String {
    "VENUE_AGENT_PRIVATE_KEY".to_string()
}

impl AppConfig {
    /// Load and parse the configuration file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config {path}: {e}")))
    }
}

impl ChainConfig {
    #[must_use]
    pub fn key_source(&self) -> KeySource {
        match &self.key_file {
            Some(path) => KeySource::File { path: path.clone() },
            None => KeySource::EnvVar {
                var_name: self.key_env.clone(),
            },
        }
    }
}

impl VenueConfig {
    #[must_use]
    pub fn key_source(&self) -> KeySource {
        match &self.key_file {
            Some(path) => KeySource::File { path: path.clone() },
            None => KeySource::EnvVar {
                var_name: self.key_env.clone(),
            },
        }
    }
}
