use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use opsflow_core::CallbackToken;
use opsflow_infra::OrchestratorError;

pub fn orchestrator_error_to_response(err: OrchestratorError) -> axum::response::Response {
    match err {
        OrchestratorError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        OrchestratorError::InvalidToken => {
            json_error(StatusCode::BAD_REQUEST, "invalid_token", err.to_string())
        }
        OrchestratorError::DuplicateReport { .. } => {
            json_error(StatusCode::CONFLICT, "duplicate_report", err.to_string())
        }
        OrchestratorError::ExecutionFinished { .. } => {
            json_error(StatusCode::CONFLICT, "execution_finished", err.to_string())
        }
        OrchestratorError::Store(e) => {
            tracing::error!(error = %e, "execution store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_token(raw: String) -> Result<CallbackToken, axum::response::Response> {
    CallbackToken::new(raw).map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_token",
            "taskToken must be a non-empty string",
        )
    })
}
