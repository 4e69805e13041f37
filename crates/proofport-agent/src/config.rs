use std::fs;
use std::str::FromStr;

use alloy::primitives::Address;
use serde::Deserialize;
use thiserror::Error;
use tracing::Level;
use url::Url;

fn default_signing_ttl() -> u64 {
    600
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct AgentConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub eas_graphql_endpoint: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub signing_base_url: Option<String>,
    #[serde(default = "default_signing_ttl")]
    pub signing_ttl_seconds: u64,
    /// Attester allowlist the Merkle tree is built from. Empty means the
    /// compiled-in default list.
    #[serde(default)]
    pub signer_allowlist: Vec<Address>,
    pub prover: ProverConfig,
    #[serde(default)]
    pub payment: Option<PaymentConfig>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

/// Which prover backend serves `generate_proof`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ProverConfig {
    /// Local proving binary invoked per request.
    Local { binary_path: String },
    /// Remote TEE prover behind the vsock bridge.
    Enclave { endpoint: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct PaymentConfig {
    pub enabled: bool,
    pub base_url: String,
    pub amount: String,
    pub currency: String,
    pub network: String,
    pub pay_to: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("Failed to parse log level: {0}")]
    LogLevelParseError(String),
}

impl AgentConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: AgentConfig = serde_json::from_str(&data)?;
        Ok(config)
    }

    pub fn rpc_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.rpc_url).map_err(ConfigError::from)
    }

    pub fn eas_graphql_endpoint(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.eas_graphql_endpoint).map_err(ConfigError::from)
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::LogLevelParseError(self.log_level.clone()))
    }
}
