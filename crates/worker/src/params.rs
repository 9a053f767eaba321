//! Parameter store: where database settings live when they are not passed
//! in the environment.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use tracing::debug;

pub const PARAMETER_BASE: &str = "/serverlessops/databases";

/// `/serverlessops/databases/{db}/{env}/{field}`
pub fn parameter_path(db_name: &str, db_env: &str, field: &str) -> String {
    format!("{PARAMETER_BASE}/{db_name}/{db_env}/{field}")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("parameter {0} not found")]
    NotFound(String),
    #[error("access denied reading parameter {0}")]
    AccessDenied(String),
    #[error("parameter store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to hierarchical, path-keyed values.
pub trait ParameterStore: Send + Sync {
    fn get(&self, path: &str) -> Result<String, ParameterError>;
}

/// Map-backed store.
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    values: RwLock<HashMap<String, String>>,
    deny: RwLock<Vec<String>>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.put(path, value);
        self
    }

    pub fn put(&self, path: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(path.into(), value.into());
        }
    }

    /// Make reads of `path` fail with `AccessDenied`.
    pub fn deny(self, path: impl Into<String>) -> Self {
        if let Ok(mut deny) = self.deny.write() {
            deny.push(path.into());
        }
        self
    }
}

impl ParameterStore for InMemoryParameterStore {
    fn get(&self, path: &str) -> Result<String, ParameterError> {
        let denied = self
            .deny
            .read()
            .map_err(|_| ParameterError::Unavailable("lock poisoned".to_string()))?
            .iter()
            .any(|p| p == path);
        if denied {
            return Err(ParameterError::AccessDenied(path.to_string()));
        }
        self.values
            .read()
            .map_err(|_| ParameterError::Unavailable("lock poisoned".to_string()))?
            .get(path)
            .cloned()
            .ok_or_else(|| ParameterError::NotFound(path.to_string()))
    }
}

/// Store backed by a flat JSON object of `path -> value`.
///
/// The file is read on every lookup so that edits are picked up without
/// restarting anything.
#[derive(Debug, Clone)]
pub struct JsonFileParameterStore {
    file: PathBuf,
}

impl JsonFileParameterStore {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    fn load(&self) -> Result<HashMap<String, String>, ParameterError> {
        let raw = std::fs::read_to_string(&self.file).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => {
                ParameterError::AccessDenied(self.file.display().to_string())
            }
            _ => ParameterError::Unavailable(format!("{}: {e}", self.file.display())),
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| ParameterError::Unavailable(format!("{}: {e}", self.file.display())))
    }
}

impl ParameterStore for JsonFileParameterStore {
    fn get(&self, path: &str) -> Result<String, ParameterError> {
        let mut values = self.load()?;
        debug!(path, file = %self.file.display(), "parameter lookup");
        values
            .remove(path)
            .ok_or_else(|| ParameterError::NotFound(path.to_string()))
    }
}

impl<T: ParameterStore + ?Sized> ParameterStore for std::sync::Arc<T> {
    fn get(&self, path: &str) -> Result<String, ParameterError> {
        (**self).get(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "opsflow-params-{}-{name}.json",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn path_follows_database_hierarchy() {
        assert_eq!(
            parameter_path("orders", "prod", "db_host"),
            "/serverlessops/databases/orders/prod/db_host"
        );
    }

    #[test]
    fn in_memory_store_reads_and_denies() {
        let store = InMemoryParameterStore::new()
            .with("/a", "1")
            .deny("/secret");

        assert_eq!(store.get("/a").unwrap(), "1");
        assert_eq!(store.get("/b"), Err(ParameterError::NotFound("/b".to_string())));
        assert_eq!(
            store.get("/secret"),
            Err(ParameterError::AccessDenied("/secret".to_string()))
        );
    }

    #[test]
    fn json_file_store_reads_values() {
        let file = temp_file(
            "reads",
            r#"{ "/serverlessops/databases/app/dev/db_host": "db.internal" }"#,
        );
        let store = JsonFileParameterStore::new(&file);

        assert_eq!(
            store.get("/serverlessops/databases/app/dev/db_host").unwrap(),
            "db.internal"
        );
        assert!(matches!(
            store.get("/serverlessops/databases/app/dev/db_port"),
            Err(ParameterError::NotFound(_))
        ));
        let _ = std::fs::remove_file(file);
    }

    #[test]
    fn json_file_store_reports_unavailable() {
        let missing = JsonFileParameterStore::new("/nonexistent/opsflow/params.json");
        assert!(matches!(missing.get("/x"), Err(ParameterError::Unavailable(_))));

        let file = temp_file("garbage", "not json");
        let garbage = JsonFileParameterStore::new(&file);
        assert!(matches!(garbage.get("/x"), Err(ParameterError::Unavailable(_))));
        let _ = std::fs::remove_file(file);
    }
}
