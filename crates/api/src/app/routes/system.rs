use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.orchestrator().stats() {
        Ok(executions) => Json(dto::HealthResponse {
            status: "ok",
            executions,
        })
        .into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}
