//! Environment variable names shared by the orchestrator (which sets them on
//! launch) and the worker (which reads them at start).

pub const TASK_TOKEN: &str = "TASK_TOKEN_ENV_VARIABLE";
pub const JOB_NAME: &str = "JOB_NAME";
pub const CALLBACK_URL: &str = "OPSFLOW_CALLBACK_URL";

pub const DB_NAME: &str = "DB_NAME";
pub const DB_ENV: &str = "DB_ENV";
pub const DB_HOST: &str = "DB_HOST";
pub const DB_PORT: &str = "DB_PORT";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASS: &str = "DB_PASS";
pub const S3_BUCKET: &str = "S3_BUCKET";
pub const S3_PATH: &str = "S3_PATH";

/// Job options a worker understands, paired with the variable each one is
/// exported under. Any other option never reaches the worker environment.
pub const JOB_OPTIONS: [(&str, &str); 8] = [
    ("db_name", DB_NAME),
    ("db_env", DB_ENV),
    ("db_host", DB_HOST),
    ("db_port", DB_PORT),
    ("db_user", DB_USER),
    ("db_pass", DB_PASS),
    ("s3_bucket", S3_BUCKET),
    ("s3_path", S3_PATH),
];

/// Environment name a job option is exported under (`db_name` → `DB_NAME`).
///
/// Returns `None` for keys outside [`JOB_OPTIONS`].
pub fn option_var_name(key: &str) -> Option<&'static str> {
    JOB_OPTIONS
        .iter()
        .find(|(option, _)| option.eq_ignore_ascii_case(key))
        .map(|(_, var)| *var)
}

/// Every variable a job option can set.
pub fn option_var_names() -> impl Iterator<Item = &'static str> {
    JOB_OPTIONS.iter().map(|(_, var)| *var)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_keys_map_to_upper_case() {
        assert_eq!(option_var_name("db_name"), Some(DB_NAME));
        assert_eq!(option_var_name("S3_PATH"), Some(S3_PATH));
        assert_eq!(option_var_name("bad-key"), None);
        assert_eq!(option_var_name(""), None);
    }

    #[test]
    fn only_known_options_are_exported() {
        for key in ["bash_env", "ld_preload", "path", "opsflow_backup_script", "job_name"] {
            assert_eq!(option_var_name(key), None, "{key} must not be exported");
        }
        assert_eq!(option_var_names().count(), 8);
        assert!(!option_var_names().any(|v| v == TASK_TOKEN || v == CALLBACK_URL));
    }
}
