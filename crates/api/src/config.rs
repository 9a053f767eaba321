//! Server configuration from the environment.

use std::net::SocketAddr;

use opsflow_infra::config::{ConfigError, OrchestratorConfig};
use tracing::debug;

pub const BIND_ADDR: &str = "OPSFLOW_BIND_ADDR";
pub const STAGE: &str = "OPSFLOW_STAGE";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_STAGE: &str = "demo";

#[derive(Debug, thiserror::Error)]
pub enum ApiConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Orchestrator(#[from] ConfigError),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Deployment stage name echoed in status responses.
    pub stage: String,
    pub orchestrator: OrchestratorConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ApiConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup(BIND_ADDR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.parse().map_err(|e: std::net::AddrParseError| {
            ApiConfigError::Invalid {
                key: BIND_ADDR,
                value: raw_addr.clone(),
                reason: e.to_string(),
            }
        })?;

        let stage = lookup(STAGE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_STAGE.to_string());

        let orchestrator = OrchestratorConfig::from_lookup(&lookup)?;
        debug!(bind_addr = %bind_addr, stage = %stage, "api configuration loaded");

        Ok(Self {
            bind_addr,
            stage,
            orchestrator,
        })
    }
}
