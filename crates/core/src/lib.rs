//! `opsflow-core`: protocol building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the job request, and the execution state machine shared by the
//! orchestrator, the worker and the HTTP front door.

pub mod env;
pub mod error;
pub mod execution;
pub mod id;
pub mod job;

pub use error::{DomainError, DomainResult, FailureKind};
pub use execution::{
    DEFAULT_SUCCESS_STATUS, ExecutionState, ExecutionStatus, FAILED_STATUS, Outcome,
    StatusPayload, failure_payload,
};
pub use id::{CallbackToken, ExecutionId};
pub use job::{JobName, JobOptions, JobRequest};
