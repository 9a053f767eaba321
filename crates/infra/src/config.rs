//! Orchestrator configuration, loaded once from the environment.

use std::time::Duration;

use opsflow_core::DEFAULT_SUCCESS_STATUS;
use tracing::debug;

use crate::executions::launcher::TaskDefinition;

pub const EXECUTION_TIMEOUT_SECS: &str = "OPSFLOW_EXECUTION_TIMEOUT_SECS";
pub const HEARTBEAT_TIMEOUT_SECS: &str = "OPSFLOW_HEARTBEAT_TIMEOUT_SECS";
pub const SUCCESS_STATUS: &str = "OPSFLOW_SUCCESS_STATUS";
pub const MONITOR_INTERVAL_MS: &str = "OPSFLOW_MONITOR_INTERVAL_MS";
pub const WORKER_COMMAND: &str = "OPSFLOW_WORKER_COMMAND";
pub const CALLBACK_URL: &str = opsflow_core::env::CALLBACK_URL;

/// Configuration error (bad value in the environment).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Hard limit between launch and terminal report
    pub execution_timeout: Duration,
    /// Liveness window reset by heartbeats (None = no liveness tracking)
    pub heartbeat_timeout: Option<Duration>,
    /// Status value that marks a report as success
    pub success_status: String,
    /// How often the timeout monitor sweeps running executions
    pub monitor_interval: Duration,
    /// What gets launched for each execution
    pub task: TaskDefinition,
    /// Base URL workers use to report back
    pub callback_url: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_secs(24 * 60 * 60),
            heartbeat_timeout: Some(Duration::from_secs(600)),
            success_status: DEFAULT_SUCCESS_STATUS.to_string(),
            monitor_interval: Duration::from_millis(250),
            task: TaskDefinition::new("opsflow-worker", ["opsflow-worker"]),
            callback_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_success_status(mut self, status: impl Into<String>) -> Self {
        self.success_status = status.into();
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.task = task;
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = url.into();
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_u64(&lookup, EXECUTION_TIMEOUT_SECS)? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: EXECUTION_TIMEOUT_SECS,
                    value: secs.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.execution_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_u64(&lookup, HEARTBEAT_TIMEOUT_SECS)? {
            config.heartbeat_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(ms) = parse_u64(&lookup, MONITOR_INTERVAL_MS)? {
            config.monitor_interval = Duration::from_millis(ms.max(1));
        }

        if let Some(status) = non_empty(&lookup, SUCCESS_STATUS) {
            config.success_status = status;
        }

        if let Some(command) = non_empty(&lookup, WORKER_COMMAND) {
            let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
            config.task = TaskDefinition::new(parts[0].clone(), parts);
        }

        if let Some(url) = non_empty(&lookup, CALLBACK_URL) {
            config.callback_url = url.trim_end_matches('/').to_string();
        }

        debug!(
            execution_timeout_secs = config.execution_timeout.as_secs(),
            heartbeat_timeout_secs = ?config.heartbeat_timeout.map(|d| d.as_secs()),
            success_status = %config.success_status,
            worker_command = ?config.task.command,
            "orchestrator configuration loaded"
        );

        Ok(config)
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        None => Ok(None),
        Some(raw) => raw.parse::<u64>().map(Some).map_err(|e| ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}
