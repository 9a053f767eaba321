use std::process::ExitCode;

use opsflow_worker::operation::ScriptBackup;
use opsflow_worker::params::{JsonFileParameterStore, ParameterStore};
use opsflow_worker::reporter::reporter_for;
use opsflow_worker::{WorkerConfig, WorkerError, WorkerReport, run};
use tracing::{error, info};

fn main() -> ExitCode {
    opsflow_observability::init();

    let config = WorkerConfig::from_env();
    let code = match execute(&config) {
        Ok(report) => {
            info!(exit_code = report.exit_code(), "worker finished");
            report.exit_code()
        }
        Err(e) => {
            error!(error = %e, "worker aborted");
            e.exit_code()
        }
    };
    ExitCode::from(code)
}

fn execute(config: &WorkerConfig) -> Result<WorkerReport, WorkerError> {
    let token = config.token.as_ref().ok_or(WorkerError::MissingToken)?;
    let reporter = reporter_for(token, &config.callback_url)?;
    let parameters = config.parameter_file.as_ref().map(JsonFileParameterStore::new);
    let operation = ScriptBackup::new(&config.backup_script, config.heartbeat_interval);

    run(
        config,
        reporter.as_ref(),
        parameters.as_ref().map(|p| p as &dyn ParameterStore),
        &operation,
    )
}
