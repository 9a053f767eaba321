//! Delivery of the terminal report (and heartbeats) to the orchestrator.

use std::time::Duration;

use opsflow_core::{CallbackToken, FailureKind, StatusPayload};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("callback transport error: {0}")]
    Transport(String),
    #[error("orchestrator rejected callback with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// The three calls a token holder can make.
pub trait CallbackReporter {
    fn report_result(&self, token: &CallbackToken, output: &StatusPayload) -> Result<(), ReportError>;

    fn report_failure(
        &self,
        token: &CallbackToken,
        kind: FailureKind,
        cause: &str,
    ) -> Result<(), ReportError>;

    fn heartbeat(&self, token: &CallbackToken) -> Result<(), ReportError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBody<'a> {
    pub task_token: &'a str,
    pub output: &'a StatusPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureBody<'a> {
    pub task_token: &'a str,
    pub error: &'a str,
    pub cause: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatBody<'a> {
    pub task_token: &'a str,
}

/// Posts callbacks to the orchestrator's `/tasks/*` routes.
#[derive(Debug, Clone)]
pub struct HttpCallbackReporter {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpCallbackReporter {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ReportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReportError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn post<B: Serialize>(&self, route: &str, body: &B) -> Result<(), ReportError> {
        let url = format!("{}{route}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %url, "callback delivered");
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(ReportError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl CallbackReporter for HttpCallbackReporter {
    fn report_result(&self, token: &CallbackToken, output: &StatusPayload) -> Result<(), ReportError> {
        info!("sending success to orchestrator");
        self.post(
            "/tasks/success",
            &SuccessBody {
                task_token: token.as_str(),
                output,
            },
        )
    }

    fn report_failure(
        &self,
        token: &CallbackToken,
        kind: FailureKind,
        cause: &str,
    ) -> Result<(), ReportError> {
        warn!(error = %kind, cause, "sending failure to orchestrator");
        self.post(
            "/tasks/failure",
            &FailureBody {
                task_token: token.as_str(),
                error: kind.as_str(),
                cause,
            },
        )
    }

    fn heartbeat(&self, token: &CallbackToken) -> Result<(), ReportError> {
        self.post(
            "/tasks/heartbeat",
            &HeartbeatBody {
                task_token: token.as_str(),
            },
        )
    }
}

/// Reporter for the `localtest` token: logs what would have been sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTestReporter;

impl CallbackReporter for LocalTestReporter {
    fn report_result(&self, token: &CallbackToken, output: &StatusPayload) -> Result<(), ReportError> {
        info!(token = %token, ?output, "report skipped for local test token");
        Ok(())
    }

    fn report_failure(
        &self,
        token: &CallbackToken,
        kind: FailureKind,
        cause: &str,
    ) -> Result<(), ReportError> {
        warn!(token = %token, error = %kind, cause, "failure report skipped for local test token");
        Ok(())
    }

    fn heartbeat(&self, _token: &CallbackToken) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Pick the reporter for `token`.
pub fn reporter_for(
    token: &CallbackToken,
    callback_url: &str,
) -> Result<Box<dyn CallbackReporter>, ReportError> {
    if token.is_local_test() {
        Ok(Box::new(LocalTestReporter))
    } else {
        Ok(Box::new(HttpCallbackReporter::new(callback_url)?))
    }
}
