use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::context::CallerContext;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct ContextState {
    pub stage: String,
}

/// Attach a [`CallerContext`] to the request and echo its request id.
pub async fn request_context_middleware(
    State(state): State<ContextState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let headers = req.headers();
    let request_id =
        header(headers, REQUEST_ID_HEADER).unwrap_or_else(|| Uuid::now_v7().to_string());

    let context = CallerContext {
        http_method: req.method().to_string(),
        resource_path: req.uri().path().to_string(),
        stage: state.stage.clone(),
        source_ip: source_ip(headers),
        user_agent: header(headers, "user-agent").unwrap_or_default(),
        request_id: request_id.clone(),
    };
    tracing::debug!(
        method = %context.http_method,
        path = %context.resource_path,
        request_id = %context.request_id,
        "request"
    );
    req.extensions_mut().insert(context);

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First hop of `x-forwarded-for`.
fn source_ip(headers: &HeaderMap) -> String {
    header(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(source_ip(&headers), "203.0.113.7");
        assert_eq!(source_ip(&HeaderMap::new()), "");
    }
}
