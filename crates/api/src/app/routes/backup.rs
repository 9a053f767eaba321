use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use opsflow_core::{ExecutionId, JobRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/backup", post(start_backup))
        .route("/backup/status", post(describe_backup))
}

/// Submit a job. Always 200 once the execution is recorded, even when the
/// job name is unknown (the execution is then already FAILED).
pub async fn start_backup(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<JobRequest>,
) -> axum::response::Response {
    let orchestrator = services.orchestrator();

    let execution_id = match orchestrator.start(body) {
        Ok(id) => id,
        Err(e) => return errors::orchestrator_error_to_response(e),
    };
    let status = match orchestrator.describe_execution(execution_id) {
        Ok(s) => s,
        Err(e) => return errors::orchestrator_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(dto::StartExecutionResponse {
            execution_arn: execution_id.to_arn(),
            start_date: status.start_time,
        }),
    )
        .into_response()
}

pub async fn describe_backup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<CallerContext>,
    Json(body): Json<dto::DescribeExecutionRequest>,
) -> axum::response::Response {
    let execution_id = match ExecutionId::parse_handle(&body.execution_arn) {
        Ok(id) => id,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()),
    };

    match services.orchestrator().describe_execution(execution_id) {
        Ok(status) => Json(dto::DescribeExecutionResponse {
            status: status.into(),
            context,
        })
        .into_response(),
        Err(e) => errors::orchestrator_error_to_response(e),
    }
}
