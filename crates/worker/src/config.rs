//! Worker configuration, parsed once from the environment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use opsflow_core::{CallbackToken, env};
use tracing::warn;

pub const BACKUP_SCRIPT: &str = "OPSFLOW_BACKUP_SCRIPT";
pub const PARAMETER_FILE: &str = "OPSFLOW_PARAMETER_FILE";
pub const HEARTBEAT_INTERVAL_SECS: &str = "OPSFLOW_HEARTBEAT_INTERVAL_SECS";

pub const DEFAULT_BACKUP_SCRIPT: &str = "./db_backup.sh";
pub const DEFAULT_CALLBACK_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Database and destination values as passed in the environment.
///
/// Every field is optional here; which ones are required is decided during
/// resolution, where the parameter store can fill the gaps.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DatabaseVars {
    pub name: Option<String>,
    pub env: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_path: Option<String>,
}

impl std::fmt::Debug for DatabaseVars {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseVars")
            .field("name", &self.name)
            .field("env", &self.env)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "<redacted>"))
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_path", &self.s3_path)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// `None` means the worker has nobody to report to.
    pub token: Option<CallbackToken>,
    pub job_name: Option<String>,
    pub database: DatabaseVars,
    pub callback_url: String,
    pub backup_script: PathBuf,
    pub parameter_file: Option<PathBuf>,
    /// `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Build from a variable map. Empty values count as unset.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let heartbeat_interval = match get(HEARTBEAT_INTERVAL_SECS) {
            None => Some(DEFAULT_HEARTBEAT_INTERVAL),
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(e) => {
                    warn!(key = HEARTBEAT_INTERVAL_SECS, value = %raw, error = %e, "ignoring unparsable heartbeat interval");
                    Some(DEFAULT_HEARTBEAT_INTERVAL)
                }
            },
        };

        Self {
            token: get(env::TASK_TOKEN).and_then(|t| CallbackToken::new(t).ok()),
            job_name: get(env::JOB_NAME),
            database: DatabaseVars {
                name: get(env::DB_NAME),
                env: get(env::DB_ENV),
                host: get(env::DB_HOST),
                port: get(env::DB_PORT),
                user: get(env::DB_USER),
                pass: get(env::DB_PASS),
                s3_bucket: get(env::S3_BUCKET),
                s3_path: get(env::S3_PATH),
            },
            callback_url: get(env::CALLBACK_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_CALLBACK_URL.to_string()),
            backup_script: get(BACKUP_SCRIPT)
                .unwrap_or_else(|| DEFAULT_BACKUP_SCRIPT.to_string())
                .into(),
            parameter_file: get(PARAMETER_FILE).map(PathBuf::from),
            heartbeat_interval,
        }
    }
}
