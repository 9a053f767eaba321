use serde::Serialize;

/// Caller metadata for a request, echoed in status responses.
///
/// Built by the request-context middleware and present for every route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CallerContext {
    pub http_method: String,
    pub resource_path: String,
    pub stage: String,
    pub source_ip: String,
    pub user_agent: String,
    pub request_id: String,
}
