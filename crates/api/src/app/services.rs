use std::sync::Arc;

use opsflow_infra::executions::{
    InMemoryExecutionStore, ProcessLauncher, TimeoutMonitorHandle, spawn_timeout_monitor,
};
use opsflow_infra::Orchestrator;

use crate::config::ApiConfig;

/// Application services shared by all handlers.
///
/// Owns the timeout monitor: dropping the services stops it.
#[derive(Debug)]
pub struct AppServices {
    orchestrator: Arc<Orchestrator>,
    stage: String,
    _monitor: TimeoutMonitorHandle,
}

impl AppServices {
    /// Wrap `orchestrator` and start its timeout monitor.
    pub fn start(orchestrator: Arc<Orchestrator>, stage: &str) -> std::io::Result<Self> {
        let interval = orchestrator.config().monitor_interval;
        let monitor = spawn_timeout_monitor(orchestrator.clone(), interval)?;
        Ok(Self {
            orchestrator,
            stage: stage.to_string(),
            _monitor: monitor,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }
}

/// In-memory execution store + child-process launcher.
pub fn build_services(config: &ApiConfig) -> std::io::Result<AppServices> {
    let orchestrator = Orchestrator::new(
        InMemoryExecutionStore::arc(),
        Arc::new(ProcessLauncher::new()),
        config.orchestrator.clone(),
    );
    tracing::info!(
        worker_command = ?config.orchestrator.task.command,
        execution_timeout_secs = config.orchestrator.execution_timeout.as_secs(),
        "execution services ready"
    );
    AppServices::start(Arc::new(orchestrator), &config.stage)
}
