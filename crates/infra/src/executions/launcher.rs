//! Worker launching (the provisioning-layer seam).

use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use opsflow_core::env;

/// Environment handed to a launched worker.
pub type WorkerEnvironment = BTreeMap<String, String>;

/// What to run for an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDefinition {
    /// Logical name, used in logs and instance ids
    pub family: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
}

impl TaskDefinition {
    pub fn new<I, S>(family: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            family: family.into(),
            command: command.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }
}

/// Handle to a worker that was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningInstance {
    pub instance_id: String,
    pub launched_at: DateTime<Utc>,
}

impl RunningInstance {
    fn new(family: &str) -> Self {
        Self {
            instance_id: format!("{family}/{}", Uuid::now_v7().simple()),
            launched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    #[error("task definition {0:?} has no command")]
    EmptyCommand(String),
    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("launch rejected: {0}")]
    Rejected(String),
}

/// Starts workers. Implementations must not block until the worker exits.
pub trait TaskLauncher: Send + Sync {
    fn launch(
        &self,
        task: &TaskDefinition,
        env: &WorkerEnvironment,
    ) -> Result<RunningInstance, LaunchError>;
}

/// Launches each worker as a local child process.
///
/// The child inherits this process's environment minus every job-option
/// variable, overlaid with the worker environment. A detached thread reaps it
/// and logs the exit status.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl TaskLauncher for ProcessLauncher {
    fn launch(
        &self,
        task: &TaskDefinition,
        env: &WorkerEnvironment,
    ) -> Result<RunningInstance, LaunchError> {
        let mut command = worker_command(task, env)?;
        let program = task.program().unwrap_or_default().to_string();

        let mut child = command
            .spawn()
            .map_err(|e| LaunchError::Spawn {
                program,
                message: e.to_string(),
            })?;

        let instance = RunningInstance::new(&task.family);
        let instance_id = instance.instance_id.clone();
        let pid = child.id();
        info!(instance_id = %instance_id, pid, "worker process started");

        let reaper = thread::Builder::new()
            .name(format!("reap-{pid}"))
            .spawn(move || match child.wait() {
                Ok(status) if status.success() => {
                    info!(instance_id = %instance_id, pid, "worker process exited cleanly")
                }
                Ok(status) => {
                    warn!(instance_id = %instance_id, pid, exit_code = ?status.code(), "worker process exited with failure")
                }
                Err(e) => warn!(instance_id = %instance_id, pid, error = %e, "failed to wait for worker process"),
            });
        if let Err(e) = reaper {
            warn!(pid, error = %e, "could not spawn reaper thread; worker left unsupervised");
        }

        Ok(instance)
    }
}

/// Options the job did not supply must not be filled from the server's own
/// environment.
fn worker_command(
    task: &TaskDefinition,
    worker_env: &WorkerEnvironment,
) -> Result<Command, LaunchError> {
    let (program, args) = task
        .command
        .split_first()
        .ok_or_else(|| LaunchError::EmptyCommand(task.family.clone()))?;

    let mut command = Command::new(program);
    command.args(args);
    for name in env::option_var_names() {
        command.env_remove(name);
    }
    command.envs(worker_env).stdin(Stdio::null());
    Ok(command)
}

/// A launch captured by [`RecordingLauncher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub task: TaskDefinition,
    pub env: WorkerEnvironment,
    pub instance: RunningInstance,
}

/// Launcher that starts nothing and remembers what it was asked to run.
///
/// Used by tests and by dry deployments that drive callbacks by hand.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<LaunchRecord>>,
    reject_with: Option<String>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher whose every launch fails.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            launches: Mutex::new(Vec::new()),
            reject_with: Some(reason.into()),
        }
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<LaunchRecord> {
        self.launches.lock().ok()?.last().cloned()
    }
}

impl TaskLauncher for RecordingLauncher {
    fn launch(
        &self,
        task: &TaskDefinition,
        env: &WorkerEnvironment,
    ) -> Result<RunningInstance, LaunchError> {
        if let Some(reason) = &self.reject_with {
            return Err(LaunchError::Rejected(reason.clone()));
        }
        let instance = RunningInstance::new(&task.family);
        if let Ok(mut launches) = self.launches.lock() {
            launches.push(LaunchRecord {
                task: task.clone(),
                env: env.clone(),
                instance: instance.clone(),
            });
        }
        Ok(instance)
    }
}

impl<T: TaskLauncher + ?Sized> TaskLauncher for std::sync::Arc<T> {
    fn launch(
        &self,
        task: &TaskDefinition,
        env: &WorkerEnvironment,
    ) -> Result<RunningInstance, LaunchError> {
        (**self).launch(task, env)
    }
}
