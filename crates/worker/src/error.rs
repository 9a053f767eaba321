use opsflow_core::FailureKind;

use crate::operation::OperationError;
use crate::params::ParameterError;
use crate::reporter::ReportError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("environment variable TASK_TOKEN_ENV_VARIABLE is missing; set it to 'localtest' to run without an orchestrator")]
    MissingToken,

    #[error("{0}")]
    InvalidJobName(String),

    #[error("{0}")]
    MissingConfiguration(String),

    #[error("error trying to get parameter store entries: {0}")]
    ConfigurationStore(ParameterError),

    #[error("{0}")]
    Operation(#[from] OperationError),

    #[error("{0} is recognized but not implemented")]
    NotImplemented(String),

    #[error("failed to deliver report: {0}")]
    Report(#[from] ReportError),
}

impl WorkerError {
    /// The `error` value reported back through the callback token.
    ///
    /// `None` for errors that cannot be reported.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            WorkerError::MissingToken | WorkerError::Report(_) => None,
            WorkerError::InvalidJobName(_) => Some(FailureKind::InvalidJobName),
            WorkerError::MissingConfiguration(_) => Some(FailureKind::MissingConfiguration),
            WorkerError::ConfigurationStore(_) => Some(FailureKind::ConfigurationStoreUnavailable),
            WorkerError::Operation(_) => Some(FailureKind::OperationFailure),
            WorkerError::NotImplemented(_) => Some(FailureKind::NotImplemented),
        }
    }

    /// Process exit status for a run that ended in this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            WorkerError::MissingToken => 2,
            WorkerError::Report(_) => 3,
            _ => 1,
        }
    }
}

impl From<ParameterError> for WorkerError {
    fn from(e: ParameterError) -> Self {
        match e {
            ParameterError::NotFound(path) => {
                WorkerError::MissingConfiguration(format!("parameter {path} is not set"))
            }
            other => WorkerError::ConfigurationStore(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_errors_split_by_cause() {
        let missing: WorkerError = ParameterError::NotFound("/p".to_string()).into();
        assert_eq!(missing.kind(), Some(FailureKind::MissingConfiguration));

        let denied: WorkerError = ParameterError::AccessDenied("/p".to_string()).into();
        assert_eq!(denied.kind(), Some(FailureKind::ConfigurationStoreUnavailable));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(WorkerError::MissingToken.exit_code(), 2);
        assert_eq!(WorkerError::MissingToken.kind(), None);
        assert_eq!(WorkerError::NotImplemented("db_restore".into()).exit_code(), 1);
        assert_eq!(
            WorkerError::Report(ReportError::Transport("refused".into())).exit_code(),
            3
        );
    }
}
