//! HTTP front door: job submission, status queries and worker callbacks.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
