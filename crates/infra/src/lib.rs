//! Infrastructure layer: orchestration runtime, worker launching, config.

pub mod config;
pub mod executions;

pub use config::{ConfigError, OrchestratorConfig};
pub use executions::{Orchestrator, OrchestratorError};
