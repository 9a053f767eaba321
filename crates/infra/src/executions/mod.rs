//! Asynchronous execution orchestration.
//!
//! ## Design
//!
//! - Each submission becomes an execution with a fresh callback token
//! - The worker runs out-of-process and reports back through the token
//! - Exactly one terminal transition per execution; later reports are rejected
//! - A monitor thread enforces the hard and liveness deadlines
//!
//! ## Components
//!
//! - `Orchestrator`: start / report / heartbeat / describe
//! - `ExecutionStore`: persistence for executions (in-memory)
//! - `TaskLauncher`: starts workers (child process, or recording for tests)
//! - `TimeoutMonitorHandle`: background deadline sweeps

pub mod launcher;
pub mod monitor;
pub mod orchestrator;
pub mod store;

pub use launcher::{
    LaunchError, LaunchRecord, ProcessLauncher, RecordingLauncher, RunningInstance,
    TaskDefinition, TaskLauncher, WorkerEnvironment,
};
pub use monitor::{MonitorStats, TimeoutMonitorHandle, spawn_timeout_monitor};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use store::{ExecutionRecord, ExecutionStats, ExecutionStore, InMemoryExecutionStore, StoreError};
