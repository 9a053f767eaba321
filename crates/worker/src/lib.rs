//! `opsflow-worker`: the out-of-process half of the callback protocol.
//!
//! A worker is launched with a callback token and a job name in its
//! environment. It resolves the job's settings (environment first, parameter
//! store second), runs the operation, and reports exactly one terminal
//! outcome through the token before exiting.

pub mod config;
pub mod error;
pub mod operation;
pub mod params;
pub mod reporter;
pub mod resolve;
pub mod run;

pub use config::WorkerConfig;
pub use error::WorkerError;
pub use run::{WorkerReport, run};
