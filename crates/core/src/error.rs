//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::execution::ExecutionState;
use crate::id::ExecutionId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic protocol failures (malformed input,
/// lifecycle conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The submitted job name is not one the system knows.
    #[error("invalid job name: {0:?}")]
    InvalidJobName(String),

    /// A terminal report arrived for an execution that already finished.
    #[error("execution {execution_id} already finished as {state}")]
    DuplicateReport {
        execution_id: ExecutionId,
        state: ExecutionState,
    },
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Failure vocabulary carried in the `error` field of a failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidJobName,
    MissingConfiguration,
    ConfigurationStoreUnavailable,
    OperationFailure,
    NotImplemented,
    ExecutionTimeout,
    LaunchFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidJobName => "InvalidJobName",
            FailureKind::MissingConfiguration => "MissingConfiguration",
            FailureKind::ConfigurationStoreUnavailable => "ConfigurationStoreUnavailable",
            FailureKind::OperationFailure => "OperationFailure",
            FailureKind::NotImplemented => "NotImplemented",
            FailureKind::ExecutionTimeout => "ExecutionTimeout",
            FailureKind::LaunchFailure => "LaunchFailure",
        }
    }
}

impl core::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
