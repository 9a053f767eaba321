//! Settings resolution for a backup: environment first, parameter store
//! second.

use opsflow_core::env;
use tracing::{debug, info};

use crate::config::DatabaseVars;
use crate::error::WorkerError;
use crate::params::{ParameterStore, parameter_path};

/// Host value that turns a backup into a no-op.
pub const DRY_RUN_HOST: &str = "dummy-dryrun";

/// Fully resolved inputs of the backup procedure.
#[derive(Clone, PartialEq, Eq)]
pub struct BackupSettings {
    pub db_name: String,
    pub host: String,
    pub port: String,
    pub user: String,
    pub pass: String,
    pub s3_bucket: String,
    pub s3_path: String,
}

impl BackupSettings {
    pub fn is_dry_run(&self) -> bool {
        self.host == DRY_RUN_HOST
    }

    /// Positional arguments of the backup script.
    pub fn script_args(&self) -> [&str; 7] {
        [
            self.host.as_str(),
            self.port.as_str(),
            self.user.as_str(),
            self.pass.as_str(),
            self.db_name.as_str(),
            self.s3_bucket.as_str(),
            self.s3_path.as_str(),
        ]
    }
}

impl std::fmt::Debug for BackupSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupSettings")
            .field("db_name", &self.db_name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_path", &self.s3_path)
            .finish()
    }
}

/// Resolve every backup field.
///
/// Each field comes from the environment when set, else from the store at
/// `{base}/{db_name}/{db_env}/{field}`. `DB_ENV` and the store are only
/// required when at least one field is missing from the environment.
/// Lookups run in field order and the first failure aborts.
pub fn resolve_backup_settings(
    vars: &DatabaseVars,
    store: Option<&dyn ParameterStore>,
) -> Result<BackupSettings, WorkerError> {
    let db_name = vars.name.clone().ok_or_else(|| {
        WorkerError::MissingConfiguration(format!(
            "required parameter ({}) was not set, task aborted",
            env::DB_NAME
        ))
    })?;

    let mut lookup = StoreLookup {
        db_name: &db_name,
        db_env: vars.env.as_deref(),
        store,
        announced: false,
    };

    let host = lookup.or_env(&vars.host, "db_host")?;
    let port = lookup.or_env(&vars.port, "db_port")?;
    let user = lookup.or_env(&vars.user, "db_user")?;
    let pass = lookup.or_env(&vars.pass, "db_pass")?;
    let s3_bucket = lookup.or_env(&vars.s3_bucket, "s3_bucket")?;
    let s3_path = lookup.or_env(&vars.s3_path, "s3_path")?;

    Ok(BackupSettings {
        db_name,
        host,
        port,
        user,
        pass,
        s3_bucket,
        s3_path,
    })
}

struct StoreLookup<'a> {
    db_name: &'a str,
    db_env: Option<&'a str>,
    store: Option<&'a dyn ParameterStore>,
    announced: bool,
}

impl StoreLookup<'_> {
    fn or_env(&mut self, from_env: &Option<String>, field: &str) -> Result<String, WorkerError> {
        match from_env {
            Some(value) => Ok(value.clone()),
            None => self.get(field),
        }
    }

    fn get(&mut self, field: &str) -> Result<String, WorkerError> {
        if !self.announced {
            info!(db_name = %self.db_name, "database settings incomplete in environment, checking parameter store");
            self.announced = true;
        }
        let db_env = self.db_env.ok_or_else(|| {
            WorkerError::MissingConfiguration(format!(
                "required parameter ({}) was not set, task aborted",
                env::DB_ENV
            ))
        })?;
        let store = self.store.ok_or_else(|| {
            WorkerError::ConfigurationStore(crate::params::ParameterError::Unavailable(
                "no parameter store configured".to_string(),
            ))
        })?;

        let path = parameter_path(self.db_name, db_env, field);
        debug!(path = %path, "reading parameter");
        Ok(store.get(&path)?)
    }
}
