//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: orchestrator, launcher and timeout monitor wiring
//! - `routes/`: HTTP routes + handlers (one file per surface)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use opsflow_infra::Orchestrator;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Workers are launched as local child processes.
pub fn build_app(config: &ApiConfig) -> std::io::Result<Router> {
    let services = services::build_services(config)?;
    Ok(router_with(Arc::new(services)))
}

/// Build the router around an existing orchestrator (tests drive the worker
/// side by hand through a recording launcher).
pub fn build_app_with(orchestrator: Arc<Orchestrator>, stage: &str) -> std::io::Result<Router> {
    let services = services::AppServices::start(orchestrator, stage)?;
    Ok(router_with(Arc::new(services)))
}

fn router_with(services: Arc<services::AppServices>) -> Router {
    let context_state = middleware::ContextState {
        stage: services.stage().to_string(),
    };

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            context_state,
            middleware::request_context_middleware,
        ))
        .layer(ServiceBuilder::new())
}
