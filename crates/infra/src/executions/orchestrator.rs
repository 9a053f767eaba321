//! The orchestrator: starts executions, accepts worker callbacks, answers
//! status queries and enforces timeouts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use opsflow_core::{
    CallbackToken, DomainError, ExecutionId, ExecutionState, ExecutionStatus, FailureKind,
    JobName, JobRequest, Outcome, StatusPayload, env,
};

use super::launcher::{TaskLauncher, WorkerEnvironment};
use super::store::{ExecutionRecord, ExecutionStats, ExecutionStore, StoreError};
use crate::config::OrchestratorConfig;

/// Errors surfaced to callers of the report, heartbeat and describe paths.
///
/// `start` never returns one of these for submission problems; it records a
/// FAILED execution instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("execution not found: {0}")]
    NotFound(ExecutionId),
    #[error("callback token is not recognized")]
    InvalidToken,
    #[error("execution {execution_id} already finished as {state}; report rejected")]
    DuplicateReport {
        execution_id: ExecutionId,
        state: ExecutionState,
    },
    #[error("execution {execution_id} already finished as {state}")]
    ExecutionFinished {
        execution_id: ExecutionId,
        state: ExecutionState,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrchestratorError::NotFound(id),
            StoreError::Domain(DomainError::DuplicateReport {
                execution_id,
                state,
            }) => OrchestratorError::DuplicateReport {
                execution_id,
                state,
            },
            StoreError::Finished { id, state } => OrchestratorError::ExecutionFinished {
                execution_id: id,
                state,
            },
            other => OrchestratorError::Store(other),
        }
    }
}

/// Drives the `RUNNING → {SUCCEEDED | FAILED | TIMED_OUT}` lifecycle.
pub struct Orchestrator {
    store: Arc<dyn ExecutionStore>,
    launcher: Arc<dyn TaskLauncher>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        launcher: Arc<dyn TaskLauncher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            launcher,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Start an execution and return its handle.
    ///
    /// Every submission yields a queryable execution: an unknown job name or
    /// a failed launch is recorded as FAILED rather than returned as an error.
    /// Only a storage failure propagates.
    pub fn start(&self, request: JobRequest) -> Result<ExecutionId, OrchestratorError> {
        let now = Utc::now();
        let execution_id = ExecutionId::new();

        let job_name = match request.parsed_job_name() {
            Ok(name) => name,
            Err(_) => {
                warn!(
                    execution_id = %execution_id,
                    job_name = %request.job_name,
                    "rejecting submission with unknown job name"
                );
                let cause = format!(
                    "job name {:?} is not recognized; valid values are: {}",
                    request.job_name,
                    JobName::valid_values()
                );
                let mut record = self.new_record(execution_id, &request.job_name, None, now);
                record
                    .status
                    .finish(Outcome::failure(FailureKind::InvalidJobName, cause), now)
                    .map_err(StoreError::from)?;
                return Ok(self.store.insert(record)?);
            }
        };

        let token = CallbackToken::generate();
        let environment = self.worker_environment(&token, job_name, &request);

        // Registered before launch so an immediate report finds its token.
        self.store.insert(self.new_record(
            execution_id,
            &request.job_name,
            Some(token),
            now,
        ))?;

        match self.launcher.launch(&self.config.task, &environment) {
            Ok(instance) => {
                info!(
                    execution_id = %execution_id,
                    job_name = %job_name,
                    instance_id = %instance.instance_id,
                    "execution running"
                );
                self.store.attach_instance(execution_id, instance)?;
            }
            Err(e) => {
                error!(execution_id = %execution_id, error = %e, "worker launch failed");
                let outcome = Outcome::failure(FailureKind::LaunchFailure, e.to_string());
                match self.store.finish(execution_id, outcome, Utc::now()) {
                    // A report cannot arrive for a worker that never started,
                    // but a sweep could have raced us.
                    Ok(_) | Err(StoreError::Domain(DomainError::DuplicateReport { .. })) => {}
                    Err(other) => return Err(other.into()),
                }
            }
        }

        Ok(execution_id)
    }

    /// A worker reported its result payload.
    pub fn report_result(
        &self,
        token: &CallbackToken,
        payload: StatusPayload,
    ) -> Result<ExecutionStatus, OrchestratorError> {
        let outcome = Outcome::from_report(payload, &self.config.success_status);
        self.complete(token, outcome)
    }

    /// A worker reported a failure.
    pub fn report_failure(
        &self,
        token: &CallbackToken,
        error_kind: &str,
        error_cause: &str,
    ) -> Result<ExecutionStatus, OrchestratorError> {
        let outcome = Outcome::Failed(opsflow_core::failure_payload(error_kind, error_cause));
        self.complete(token, outcome)
    }

    /// A worker signalled liveness. Only the liveness deadline moves.
    pub fn heartbeat(&self, token: &CallbackToken) -> Result<ExecutionRecord, OrchestratorError> {
        let now = Utc::now();
        let execution_id = self.resolve(token)?;
        self.expire_if_overdue(execution_id, now)?;

        let next = self.heartbeat_deadline(now);
        let record = self.store.record_heartbeat(execution_id, now, next)?;
        debug!(execution_id = %execution_id, "heartbeat received");
        Ok(record)
    }

    /// Read-only snapshot of an execution.
    ///
    /// An execution past its deadline reads as TIMED_OUT even before the
    /// monitor has swept it; the store is not written.
    pub fn describe_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<ExecutionStatus, OrchestratorError> {
        let now = Utc::now();
        let record = self
            .store
            .get(execution_id)?
            .ok_or(OrchestratorError::NotFound(execution_id))?;
        let mut status = record.status.clone();
        if record.is_overdue(now) {
            status
                .finish(Outcome::TimedOut, now)
                .map_err(StoreError::from)?;
        }
        Ok(status)
    }

    pub fn stats(&self) -> Result<ExecutionStats, OrchestratorError> {
        Ok(self.store.stats()?)
    }

    /// Time out every running execution past its deadline. Returns the ids
    /// that were transitioned by this call.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionId>, OrchestratorError> {
        let mut expired = Vec::new();
        for execution_id in self.store.overdue(now)? {
            if self.time_out(execution_id, now)? {
                expired.push(execution_id);
            }
        }
        Ok(expired)
    }

    fn complete(
        &self,
        token: &CallbackToken,
        outcome: Outcome,
    ) -> Result<ExecutionStatus, OrchestratorError> {
        let now = Utc::now();
        let execution_id = self.resolve(token)?;
        self.expire_if_overdue(execution_id, now)?;

        match self.store.finish(execution_id, outcome, now) {
            Ok(status) => {
                info!(
                    execution_id = %execution_id,
                    state = %status.state,
                    "execution finished"
                );
                Ok(status)
            }
            Err(e) => {
                let err = OrchestratorError::from(e);
                if matches!(err, OrchestratorError::DuplicateReport { .. }) {
                    warn!(execution_id = %execution_id, error = %err, "late or duplicate report rejected");
                }
                Err(err)
            }
        }
    }

    fn resolve(&self, token: &CallbackToken) -> Result<ExecutionId, OrchestratorError> {
        self.store
            .find_by_token(token)?
            .ok_or(OrchestratorError::InvalidToken)
    }

    /// The monitor sweeps periodically; a report landing between the deadline
    /// and the next sweep must still see TIMED_OUT.
    fn expire_if_overdue(
        &self,
        execution_id: ExecutionId,
        now: DateTime<Utc>,
    ) -> Result<(), OrchestratorError> {
        let record = self
            .store
            .get(execution_id)?
            .ok_or(OrchestratorError::NotFound(execution_id))?;
        if record.is_overdue(now) {
            self.time_out(execution_id, now)?;
        }
        Ok(())
    }

    fn time_out(&self, execution_id: ExecutionId, now: DateTime<Utc>) -> Result<bool, OrchestratorError> {
        match self.store.finish(execution_id, Outcome::TimedOut, now) {
            Ok(_) => {
                warn!(execution_id = %execution_id, "execution timed out");
                Ok(true)
            }
            Err(StoreError::Domain(DomainError::DuplicateReport { .. })) => Ok(false),
            Err(other) => Err(other.into()),
        }
    }

    fn new_record(
        &self,
        execution_id: ExecutionId,
        job_name: &str,
        token: Option<CallbackToken>,
        now: DateTime<Utc>,
    ) -> ExecutionRecord {
        ExecutionRecord {
            status: ExecutionStatus::running(execution_id, now),
            job_name: job_name.to_string(),
            token,
            deadline: now + to_chrono(self.config.execution_timeout),
            heartbeat_deadline: self.heartbeat_deadline(now),
            last_heartbeat: None,
            instance: None,
        }
    }

    fn heartbeat_deadline(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.config.heartbeat_timeout.map(|t| now + to_chrono(t))
    }

    fn worker_environment(
        &self,
        token: &CallbackToken,
        job_name: JobName,
        request: &JobRequest,
    ) -> WorkerEnvironment {
        let mut environment = WorkerEnvironment::new();

        for (key, value) in &request.job_options {
            match env::option_var_name(key) {
                Some(name) => {
                    environment.insert(name.to_string(), value.clone());
                }
                None => warn!(option = %key, "job option is not recognized; dropped"),
            }
        }

        environment.insert(env::TASK_TOKEN.to_string(), token.as_str().to_string());
        environment.insert(env::JOB_NAME.to_string(), job_name.as_str().to_string());
        environment.insert(env::CALLBACK_URL.to_string(), self.config.callback_url.clone());
        environment
    }
}

fn to_chrono(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(36_500))
}
