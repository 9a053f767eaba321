//! One worker invocation, from environment to exactly one report.

use chrono::Utc;
use opsflow_core::{DEFAULT_SUCCESS_STATUS, FailureKind, JobName, StatusPayload};
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::operation::BackupOperation;
use crate::params::ParameterStore;
use crate::reporter::CallbackReporter;
use crate::resolve::{BackupSettings, resolve_backup_settings};

pub const DRY_RUN_MESSAGE: &str = "Dry run flag passed, no backup performed.";

/// The terminal outcome of a run, built once and then reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerReport {
    Succeeded(StatusPayload),
    Failed { kind: FailureKind, cause: String },
}

impl WorkerReport {
    pub fn exit_code(&self) -> u8 {
        match self {
            WorkerReport::Succeeded(_) => 0,
            WorkerReport::Failed { .. } => 1,
        }
    }
}

/// Run the job described by `config` and report its outcome.
///
/// Exactly one of `report_result` / `report_failure` is sent. `Err` is
/// returned only when nothing could be reported: the token is missing or the
/// report itself was not delivered.
pub fn run(
    config: &WorkerConfig,
    reporter: &dyn CallbackReporter,
    parameters: Option<&dyn ParameterStore>,
    operation: &dyn BackupOperation,
) -> Result<WorkerReport, WorkerError> {
    let token = config.token.as_ref().ok_or(WorkerError::MissingToken)?;

    let mut heartbeat = || {
        if let Err(e) = reporter.heartbeat(token) {
            warn!(error = %e, "heartbeat not delivered");
        }
    };

    let report = match perform(config, parameters, operation, &mut heartbeat) {
        Ok(output) => WorkerReport::Succeeded(output),
        Err(e) => {
            let kind = e.kind().unwrap_or(FailureKind::OperationFailure);
            error!(error = %kind, cause = %e, "job failed");
            WorkerReport::Failed {
                kind,
                cause: e.to_string(),
            }
        }
    };

    match &report {
        WorkerReport::Succeeded(output) => reporter.report_result(token, output)?,
        WorkerReport::Failed { kind, cause } => reporter.report_failure(token, *kind, cause)?,
    }
    Ok(report)
}

fn perform(
    config: &WorkerConfig,
    parameters: Option<&dyn ParameterStore>,
    operation: &dyn BackupOperation,
    heartbeat: &mut dyn FnMut(),
) -> Result<StatusPayload, WorkerError> {
    let raw = config.job_name.as_deref().ok_or_else(|| {
        WorkerError::InvalidJobName(format!(
            "a required JOB_NAME env variable was not set, valid values are: {}",
            JobName::valid_values()
        ))
    })?;
    let job = raw.parse::<JobName>().map_err(|_| {
        WorkerError::InvalidJobName(format!(
            "job name {raw:?} is not valid, valid values are: {}",
            JobName::valid_values()
        ))
    })?;

    info!(job_name = %job, "starting job");
    match job {
        JobName::DbBackup => {
            let settings = resolve_backup_settings(&config.database, parameters)?;
            backup(&settings, operation, heartbeat)
        }
        JobName::DbRestore => Err(WorkerError::NotImplemented(job.to_string())),
    }
}

fn backup(
    settings: &BackupSettings,
    operation: &dyn BackupOperation,
    heartbeat: &mut dyn FnMut(),
) -> Result<StatusPayload, WorkerError> {
    if settings.is_dry_run() {
        info!(db_name = %settings.db_name, "dry run, skipping backup");
        return Ok(success(DRY_RUN_MESSAGE));
    }

    operation.run(settings, heartbeat)?;
    Ok(success(format!(
        "Database {} from host {} backed up on {}",
        settings.db_name,
        settings.host,
        Utc::now().format("%Y-%m-%d-%H")
    )))
}

fn success(message: impl Into<String>) -> StatusPayload {
    StatusPayload::from([
        ("status".to_string(), DEFAULT_SUCCESS_STATUS.to_string()),
        ("message".to_string(), message.into()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationError;
    use crate::params::{InMemoryParameterStore, parameter_path};
    use crate::reporter::ReportError;
    use opsflow_core::CallbackToken;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Result(StatusPayload),
        Failure(FailureKind, String),
        Heartbeat,
    }

    #[derive(Default)]
    struct FakeReporter {
        calls: Mutex<Vec<Call>>,
        fail_reports: bool,
        fail_heartbeats: bool,
    }

    impl FakeReporter {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn terminal_calls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| *c != Call::Heartbeat)
                .collect()
        }

        fn record(&self, call: Call, fail: bool) -> Result<(), ReportError> {
            self.calls.lock().unwrap().push(call);
            if fail {
                Err(ReportError::Transport("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    impl CallbackReporter for FakeReporter {
        fn report_result(&self, _: &CallbackToken, output: &StatusPayload) -> Result<(), ReportError> {
            self.record(Call::Result(output.clone()), self.fail_reports)
        }

        fn report_failure(
            &self,
            _: &CallbackToken,
            kind: FailureKind,
            cause: &str,
        ) -> Result<(), ReportError> {
            self.record(Call::Failure(kind, cause.to_string()), self.fail_reports)
        }

        fn heartbeat(&self, _: &CallbackToken) -> Result<(), ReportError> {
            self.record(Call::Heartbeat, self.fail_heartbeats)
        }
    }

    #[derive(Default)]
    struct FakeOperation {
        runs: Mutex<Vec<BackupSettings>>,
        fail_with: Option<OperationError>,
        heartbeats: usize,
    }

    impl FakeOperation {
        fn runs(&self) -> Vec<BackupSettings> {
            self.runs.lock().unwrap().clone()
        }
    }

    impl BackupOperation for FakeOperation {
        fn run(
            &self,
            settings: &BackupSettings,
            heartbeat: &mut dyn FnMut(),
        ) -> Result<(), OperationError> {
            self.runs.lock().unwrap().push(settings.clone());
            for _ in 0..self.heartbeats {
                heartbeat();
            }
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    fn config(pairs: &[(&str, &str)]) -> WorkerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_vars(&vars)
    }

    const FULL_BACKUP: &[(&str, &str)] = &[
        ("TASK_TOKEN_ENV_VARIABLE", "token-1"),
        ("JOB_NAME", "db_backup"),
        ("DB_NAME", "orders"),
        ("DB_HOST", "db.internal"),
        ("DB_PORT", "3306"),
        ("DB_USER", "backup"),
        ("DB_PASS", "hunter2"),
        ("S3_BUCKET", "backups"),
        ("S3_PATH", "orders/"),
    ];

    fn with(base: &[(&'static str, &'static str)], overrides: &[(&'static str, &'static str)]) -> WorkerConfig {
        let mut pairs: Vec<(&str, &str)> = base
            .iter()
            .filter(|(k, _)| !overrides.iter().any(|(o, _)| o == k))
            .copied()
            .collect();
        pairs.extend(overrides.iter().copied().filter(|(_, v)| !v.is_empty()));
        config(&pairs)
    }

    #[test]
    fn backup_reports_success_once() {
        let reporter = FakeReporter::default();
        let operation = FakeOperation::default();

        let report = run(&config(FULL_BACKUP), &reporter, None, &operation).unwrap();

        assert_eq!(report.exit_code(), 0);
        assert_eq!(operation.runs().len(), 1);
        let calls = reporter.terminal_calls();
        assert_eq!(calls.len(), 1);
        let Call::Result(output) = &calls[0] else {
            panic!("expected success, got {calls:?}");
        };
        assert_eq!(output["status"], "job complete");
        assert!(output["message"].starts_with("Database orders from host db.internal backed up on "));
    }

    #[test]
    fn dry_run_skips_operation() {
        let reporter = FakeReporter::default();
        let operation = FakeOperation::default();
        let cfg = with(FULL_BACKUP, &[("DB_HOST", "dummy-dryrun")]);

        let report = run(&cfg, &reporter, None, &operation).unwrap();

        assert!(operation.runs().is_empty());
        assert_eq!(
            report,
            WorkerReport::Succeeded(success(DRY_RUN_MESSAGE))
        );
        assert_eq!(reporter.calls(), vec![Call::Result(success(DRY_RUN_MESSAGE))]);
    }

    #[test]
    fn missing_db_name_fails_without_operation() {
        let reporter = FakeReporter::default();
        let operation = FakeOperation::default();
        let cfg = with(FULL_BACKUP, &[("DB_NAME", "")]);

        let report = run(&cfg, &reporter, None, &operation).unwrap();

        assert_eq!(report.exit_code(), 1);
        assert!(operation.runs().is_empty());
        let calls = reporter.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::Failure(FailureKind::MissingConfiguration, _)));
    }

    #[test]
    fn restore_is_not_implemented() {
        let reporter = FakeReporter::default();
        let operation = FakeOperation::default();
        let cfg = with(FULL_BACKUP, &[("JOB_NAME", "db_restore")]);

        let report = run(&cfg, &reporter, None, &operation).unwrap();

        assert!(matches!(report, WorkerReport::Failed { kind: FailureKind::NotImplemented, .. }));
        assert!(operation.runs().is_empty());
        assert_eq!(reporter.calls().len(), 1);
    }

    #[test]
    fn unknown_or_missing_job_name_is_invalid() {
        for job in ["db_vacuum", ""] {
            let reporter = FakeReporter::default();
            let operation = FakeOperation::default();
            let cfg = with(FULL_BACKUP, &[("JOB_NAME", job)]);

            let report = run(&cfg, &reporter, None, &operation).unwrap();

            let WorkerReport::Failed { kind, cause } = report else {
                panic!("expected failure for {job:?}");
            };
            assert_eq!(kind, FailureKind::InvalidJobName);
            assert!(cause.contains("db_backup, db_restore"));
            assert!(operation.runs().is_empty());
            assert_eq!(reporter.calls().len(), 1);
        }
    }

    #[test]
    fn job_name_is_case_insensitive() {
        let reporter = FakeReporter::default();
        let operation = FakeOperation::default();
        let cfg = with(FULL_BACKUP, &[("JOB_NAME", "DB_BACKUP")]);

        let report = run(&cfg, &reporter, None, &operation).unwrap();
        assert_eq!(report.exit_code(), 0);
        assert_eq!(operation.runs().len(), 1);
    }

    #[test]
    fn missing_token_reports_nothing() {
        let reporter = FakeReporter::default();
        let operation = FakeOperation::default();
        let cfg = with(FULL_BACKUP, &[("TASK_TOKEN_ENV_VARIABLE", "")]);

        let err = run(&cfg, &reporter, None, &operation).unwrap_err();

        assert!(matches!(err, WorkerError::MissingToken));
        assert_eq!(err.exit_code(), 2);
        assert!(reporter.calls().is_empty());
        assert!(operation.runs().is_empty());
    }

    #[test]
    fn settings_fall_back_to_parameter_store() {
        let store = [
            ("db_host", "store-host"),
            ("db_port", "3307"),
            ("db_user", "store-user"),
            ("db_pass", "store-pass"),
            ("s3_bucket", "store-bucket"),
            ("s3_path", "store-path"),
        ]
        .into_iter()
        .fold(InMemoryParameterStore::new(), |store, (field, value)| {
            store.with(parameter_path("orders", "prod", field), value)
        });
        let reporter = FakeReporter::default();
        let operation = FakeOperation::default();
        let cfg = config(&[
            ("TASK_TOKEN_ENV_VARIABLE", "token-1"),
            ("JOB_NAME", "db_backup"),
            ("DB_NAME", "orders"),
            ("DB_ENV", "prod"),
        ]);

        let report = run(&cfg, &reporter, Some(&store), &operation).unwrap();

        assert_eq!(report.exit_code(), 0);
        let runs = operation.runs();
        assert_eq!(runs[0].host, "store-host");
        assert_eq!(runs[0].s3_path, "store-path");
    }

    #[test]
    fn store_failure_is_reported() {
        let store = InMemoryParameterStore::new()
            .deny(parameter_path("orders", "prod", "db_host"));
        let reporter = FakeReporter::default();
        let operation = FakeOperation::default();
        let cfg = config(&[
            ("TASK_TOKEN_ENV_VARIABLE", "token-1"),
            ("JOB_NAME", "db_backup"),
            ("DB_NAME", "orders"),
            ("DB_ENV", "prod"),
        ]);

        let report = run(&cfg, &reporter, Some(&store), &operation).unwrap();

        assert!(matches!(
            report,
            WorkerReport::Failed { kind: FailureKind::ConfigurationStoreUnavailable, .. }
        ));
        assert!(operation.runs().is_empty());
    }

    #[test]
    fn operation_failure_carries_cause() {
        let reporter = FakeReporter::default();
        let operation = FakeOperation {
            fail_with: Some(OperationError::Failed {
                status: "exit status: 2".into(),
                cause: "mysqldump: access denied".into(),
            }),
            ..FakeOperation::default()
        };

        let report = run(&config(FULL_BACKUP), &reporter, None, &operation).unwrap();

        let WorkerReport::Failed { kind, cause } = report else {
            panic!("expected failure");
        };
        assert_eq!(kind, FailureKind::OperationFailure);
        assert!(cause.contains("mysqldump: access denied"));
        assert_eq!(reporter.calls(), vec![Call::Failure(kind, cause)]);
    }

    #[test]
    fn undelivered_report_is_an_error() {
        let reporter = FakeReporter {
            fail_reports: true,
            ..FakeReporter::default()
        };
        let operation = FakeOperation::default();

        let err = run(&config(FULL_BACKUP), &reporter, None, &operation).unwrap_err();

        assert!(matches!(err, WorkerError::Report(_)));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(reporter.calls().len(), 1);
    }

    #[test]
    fn heartbeat_failures_do_not_fail_the_job() {
        let reporter = FakeReporter {
            fail_heartbeats: true,
            ..FakeReporter::default()
        };
        let operation = FakeOperation {
            heartbeats: 3,
            ..FakeOperation::default()
        };

        let report = run(&config(FULL_BACKUP), &reporter, None, &operation).unwrap();

        assert_eq!(report.exit_code(), 0);
        let calls = reporter.calls();
        assert_eq!(calls.iter().filter(|c| **c == Call::Heartbeat).count(), 3);
        assert!(matches!(calls.last(), Some(Call::Result(_))));
    }
}
