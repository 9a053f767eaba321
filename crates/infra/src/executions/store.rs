//! Execution storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use opsflow_core::{CallbackToken, DomainError, ExecutionId, ExecutionState, ExecutionStatus, Outcome};

use super::launcher::RunningInstance;

/// Everything the orchestrator tracks for one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    /// Public status (what `describe` returns)
    pub status: ExecutionStatus,
    /// Job name exactly as submitted
    pub job_name: String,
    /// Token bound to the worker (None when nothing was launched)
    pub token: Option<CallbackToken>,
    /// Hard deadline for a terminal report
    pub deadline: DateTime<Utc>,
    /// Liveness deadline, pushed forward by heartbeats
    pub heartbeat_deadline: Option<DateTime<Utc>>,
    /// Last heartbeat received
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Worker handle once launched
    pub instance: Option<RunningInstance>,
}

impl ExecutionRecord {
    pub fn id(&self) -> ExecutionId {
        self.status.execution_id
    }

    /// Running and past either deadline.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal()
            && (now >= self.deadline || self.heartbeat_deadline.is_some_and(|h| now >= h))
    }
}

/// Execution store abstraction.
///
/// `finish` and `record_heartbeat` must check-and-update atomically: two
/// concurrent terminal reports can never both succeed.
pub trait ExecutionStore: Send + Sync {
    /// Insert a new execution.
    fn insert(&self, record: ExecutionRecord) -> Result<ExecutionId, StoreError>;

    /// Get an execution by ID.
    fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, StoreError>;

    /// Resolve a callback token to its execution.
    fn find_by_token(&self, token: &CallbackToken) -> Result<Option<ExecutionId>, StoreError>;

    /// Attach the launched worker handle.
    fn attach_instance(&self, id: ExecutionId, instance: RunningInstance) -> Result<(), StoreError>;

    /// Apply the terminal transition; fails with a duplicate-report domain
    /// error if the execution already finished.
    fn finish(
        &self,
        id: ExecutionId,
        outcome: Outcome,
        at: DateTime<Utc>,
    ) -> Result<ExecutionStatus, StoreError>;

    /// Record a heartbeat and move the liveness deadline.
    fn record_heartbeat(
        &self,
        id: ExecutionId,
        at: DateTime<Utc>,
        next_deadline: Option<DateTime<Utc>>,
    ) -> Result<ExecutionRecord, StoreError>;

    /// Running executions whose deadline has passed.
    fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionId>, StoreError>;

    /// Counts per state.
    fn stats(&self) -> Result<ExecutionStats, StoreError>;
}

/// Execution store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("execution not found: {0}")]
    NotFound(ExecutionId),
    #[error("execution already exists: {0}")]
    AlreadyExists(ExecutionId),
    #[error("callback token already bound to another execution")]
    TokenInUse,
    #[error("execution {id} already finished as {state}")]
    Finished { id: ExecutionId, state: ExecutionState },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Execution statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExecutionStats {
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

/// In-memory execution store.
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<ExecutionId, ExecutionRecord>>,
    tokens: RwLock<HashMap<CallbackToken, ExecutionId>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl ExecutionStore for InMemoryExecutionStore {
    fn insert(&self, record: ExecutionRecord) -> Result<ExecutionId, StoreError> {
        let mut executions = self.executions.write().map_err(poisoned)?;
        let mut tokens = self.tokens.write().map_err(poisoned)?;

        let id = record.id();
        if executions.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        if let Some(token) = &record.token {
            if tokens.contains_key(token) {
                return Err(StoreError::TokenInUse);
            }
            tokens.insert(token.clone(), id);
        }
        executions.insert(id, record);
        Ok(id)
    }

    fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, StoreError> {
        let executions = self.executions.read().map_err(poisoned)?;
        Ok(executions.get(&id).cloned())
    }

    fn find_by_token(&self, token: &CallbackToken) -> Result<Option<ExecutionId>, StoreError> {
        let tokens = self.tokens.read().map_err(poisoned)?;
        Ok(tokens.get(token).copied())
    }

    fn attach_instance(&self, id: ExecutionId, instance: RunningInstance) -> Result<(), StoreError> {
        let mut executions = self.executions.write().map_err(poisoned)?;
        let record = executions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.instance = Some(instance);
        Ok(())
    }

    fn finish(
        &self,
        id: ExecutionId,
        outcome: Outcome,
        at: DateTime<Utc>,
    ) -> Result<ExecutionStatus, StoreError> {
        let mut executions = self.executions.write().map_err(poisoned)?;
        let record = executions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.status.finish(outcome, at)?;
        Ok(record.status.clone())
    }

    fn record_heartbeat(
        &self,
        id: ExecutionId,
        at: DateTime<Utc>,
        next_deadline: Option<DateTime<Utc>>,
    ) -> Result<ExecutionRecord, StoreError> {
        let mut executions = self.executions.write().map_err(poisoned)?;
        let record = executions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status.is_terminal() {
            return Err(StoreError::Finished {
                id,
                state: record.status.state,
            });
        }
        record.last_heartbeat = Some(at);
        record.heartbeat_deadline = next_deadline;
        Ok(record.clone())
    }

    fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionId>, StoreError> {
        let executions = self.executions.read().map_err(poisoned)?;
        let mut result: Vec<_> = executions
            .values()
            .filter(|r| r.is_overdue(now))
            .map(|r| r.id())
            .collect();
        result.sort();
        Ok(result)
    }

    fn stats(&self) -> Result<ExecutionStats, StoreError> {
        let executions = self.executions.read().map_err(poisoned)?;
        let mut stats = ExecutionStats::default();

        for record in executions.values() {
            match record.status.state {
                ExecutionState::Running => stats.running += 1,
                ExecutionState::Succeeded => stats.succeeded += 1,
                ExecutionState::Failed => stats.failed += 1,
                ExecutionState::TimedOut => stats.timed_out += 1,
            }
        }

        Ok(stats)
    }
}

impl<T: ExecutionStore + ?Sized> ExecutionStore for Arc<T> {
    fn insert(&self, record: ExecutionRecord) -> Result<ExecutionId, StoreError> {
        (**self).insert(record)
    }

    fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, StoreError> {
        (**self).get(id)
    }

    fn find_by_token(&self, token: &CallbackToken) -> Result<Option<ExecutionId>, StoreError> {
        (**self).find_by_token(token)
    }

    fn attach_instance(&self, id: ExecutionId, instance: RunningInstance) -> Result<(), StoreError> {
        (**self).attach_instance(id, instance)
    }

    fn finish(
        &self,
        id: ExecutionId,
        outcome: Outcome,
        at: DateTime<Utc>,
    ) -> Result<ExecutionStatus, StoreError> {
        (**self).finish(id, outcome, at)
    }

    fn record_heartbeat(
        &self,
        id: ExecutionId,
        at: DateTime<Utc>,
        next_deadline: Option<DateTime<Utc>>,
    ) -> Result<ExecutionRecord, StoreError> {
        (**self).record_heartbeat(id, at, next_deadline)
    }

    fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionId>, StoreError> {
        (**self).overdue(now)
    }

    fn stats(&self) -> Result<ExecutionStats, StoreError> {
        (**self).stats()
    }
}
