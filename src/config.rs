use std::env;
use std::time::Duration;

use crate::analytics::PipelineSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub eth_rpc_url: Option<String>,
    pub database_url: String,
    pub http_bind_addr: String,
    pub request_timeout: Duration,
    pub pipeline: PipelineSettings,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing ETH_RPC_URL env var")]
    MissingEthRpcUrl,
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let eth_rpc_url = env::var("ETH_RPC_URL").ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/eth-analytics.db".to_string());
        let http_bind_addr = env::var("HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8805".to_string());
        let request_timeout = Duration::from_secs(env_u64("REQUEST_TIMEOUT_SECS", 10)?);
        let skew_secs = env_u64("BUCKET_SKEW_SECS", 60)?;

        Ok(Self {
            eth_rpc_url,
            database_url,
            http_bind_addr,
            request_timeout,
            pipeline: PipelineSettings {
                skew_correction: chrono::Duration::seconds(skew_secs as i64),
            },
        })
    }

    pub fn require_eth_rpc_url(&self) -> Result<&str, ConfigError> {
        self.eth_rpc_url
            .as_deref()
            .ok_or(ConfigError::MissingEthRpcUrl)
    }
}

fn env_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(raw) => parse_u64(var, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|v| *v <= i64::MAX as u64 / 1000)
        .ok_or_else(|| ConfigError::InvalidNumber {
            var,
            value: raw.to_string(),
        })
}
