//! Worker callbacks. Each is keyed by the token handed to the worker at
//! launch.

use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn success(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::TaskSuccessRequest>,
) -> axum::response::Response {
    let token = match errors::parse_token(body.task_token) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match services.orchestrator().report_result(&token, body.output) {
        Ok(status) => Json(dto::TaskResponse {
            status: status.state.as_str(),
        })
        .into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}

pub async fn failure(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::TaskFailureRequest>,
) -> axum::response::Response {
    let token = match errors::parse_token(body.task_token) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match services
        .orchestrator()
        .report_failure(&token, &body.error, &body.cause)
    {
        Ok(status) => Json(dto::TaskResponse {
            status: status.state.as_str(),
        })
        .into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}

pub async fn heartbeat(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::TaskHeartbeatRequest>,
) -> axum::response::Response {
    let token = match errors::parse_token(body.task_token) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match services.orchestrator().heartbeat(&token) {
        Ok(record) => Json(dto::TaskResponse {
            status: record.status.state.as_str(),
        })
        .into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}
