use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opsflow_core::{ExecutionStatus, StatusPayload};
use opsflow_infra::executions::ExecutionStats;

use crate::context::CallerContext;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeExecutionRequest {
    /// An execution ARN or a bare execution id.
    #[serde(alias = "executionId")]
    pub execution_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSuccessRequest {
    pub task_token: String,
    #[serde(default)]
    pub output: StatusPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailureRequest {
    pub task_token: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub cause: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHeartbeatRequest {
    pub task_token: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExecutionResponse {
    pub execution_arn: String,
    pub start_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionView {
    pub execution_arn: String,
    pub output: Option<StatusPayload>,
    pub start_date: DateTime<Utc>,
    pub status: &'static str,
    pub stop_date: Option<DateTime<Utc>>,
}

impl From<ExecutionStatus> for ExecutionView {
    fn from(status: ExecutionStatus) -> Self {
        Self {
            execution_arn: status.execution_id.to_arn(),
            output: status.output,
            start_date: status.start_time,
            status: status.state.as_str(),
            stop_date: status.stop_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DescribeExecutionResponse {
    pub status: ExecutionView,
    pub context: CallerContext,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub executions: ExecutionStats,
}
