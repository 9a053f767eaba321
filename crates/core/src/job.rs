//! Job submission types.

use std::collections::BTreeMap;

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Free-form option bag submitted with a job. Validated by the worker, not here.
pub type JobOptions = BTreeMap<String, String>;

/// Jobs a worker knows how to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    DbBackup,
    /// Recognized so it can be routed, but no worker implements it yet.
    DbRestore,
}

impl JobName {
    pub const ALL: [JobName; 2] = [JobName::DbBackup, JobName::DbRestore];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::DbBackup => "db_backup",
            JobName::DbRestore => "db_restore",
        }
    }

    /// Comma-separated list used in "valid values are" messages.
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|n| n.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for JobName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "db_backup" => Ok(JobName::DbBackup),
            "db_restore" => Ok(JobName::DbRestore),
            _ => Err(DomainError::InvalidJobName(s.to_string())),
        }
    }
}

impl core::fmt::Display for JobName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job submission as received from the front door.
///
/// `job_name` is kept raw: an unknown name must still produce a queryable
/// (FAILED) execution rather than a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_name: String,
    #[serde(default)]
    pub job_options: JobOptions,
}

impl JobRequest {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            job_options: JobOptions::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.job_options.insert(key.into(), value.into());
        self
    }

    pub fn parsed_job_name(&self) -> Result<JobName, DomainError> {
        self.job_name.parse()
    }
}
