//! Execution lifecycle: the orchestrator-owned state machine.
//!
//! ```text
//! RUNNING ──report(success sentinel)──▶ SUCCEEDED
//!    │────report(anything else)──────▶ FAILED
//!    │────failure report─────────────▶ FAILED
//!    └────deadline passed────────────▶ TIMED_OUT
//! ```
//!
//! Terminal states never change; every further transition attempt yields
//! [`DomainError::DuplicateReport`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult, FailureKind};
use crate::id::ExecutionId;

/// Payload a worker reports on completion (`status`, `message`, ...).
pub type StatusPayload = BTreeMap<String, String>;

/// Status value a worker reports on success unless configured otherwise.
pub const DEFAULT_SUCCESS_STATUS: &str = "job complete";

/// Status value a worker may report to signal failure explicitly.
pub const FAILED_STATUS: &str = "FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Running => "RUNNING",
            ExecutionState::Succeeded => "SUCCEEDED",
            ExecutionState::Failed => "FAILED",
            ExecutionState::TimedOut => "TIMED_OUT",
        }
    }
}

impl core::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an execution ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(StatusPayload),
    Failed(StatusPayload),
    TimedOut,
}

impl Outcome {
    /// Interpret a worker's result payload.
    ///
    /// Only an exact match on `success_status` succeeds; `FAILED`, a missing
    /// status or any other value fails.
    pub fn from_report(payload: StatusPayload, success_status: &str) -> Self {
        match payload.get("status") {
            Some(status) if status == success_status => Outcome::Succeeded(payload),
            _ => Outcome::Failed(payload),
        }
    }

    pub fn failure(kind: FailureKind, cause: impl Into<String>) -> Self {
        Outcome::Failed(failure_payload(kind.as_str(), cause))
    }

    pub fn state(&self) -> ExecutionState {
        match self {
            Outcome::Succeeded(_) => ExecutionState::Succeeded,
            Outcome::Failed(_) => ExecutionState::Failed,
            Outcome::TimedOut => ExecutionState::TimedOut,
        }
    }
}

/// Output recorded for failure reports.
pub fn failure_payload(error: impl Into<String>, cause: impl Into<String>) -> StatusPayload {
    let mut payload = StatusPayload::new();
    payload.insert("error".to_string(), error.into());
    payload.insert("cause".to_string(), cause.into());
    payload
}

/// Snapshot of one execution, as returned by status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub execution_id: ExecutionId,
    pub state: ExecutionState,
    /// Present only once terminal, and never for TIMED_OUT.
    pub output: Option<StatusPayload>,
    pub start_time: DateTime<Utc>,
    pub stop_time: Option<DateTime<Utc>>,
}

impl ExecutionStatus {
    pub fn running(execution_id: ExecutionId, start_time: DateTime<Utc>) -> Self {
        Self {
            execution_id,
            state: ExecutionState::Running,
            output: None,
            start_time,
            stop_time: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply the single terminal transition.
    pub fn finish(&mut self, outcome: Outcome, at: DateTime<Utc>) -> DomainResult<ExecutionState> {
        if self.state.is_terminal() {
            return Err(DomainError::DuplicateReport {
                execution_id: self.execution_id,
                state: self.state,
            });
        }

        self.state = outcome.state();
        self.output = match outcome {
            Outcome::Succeeded(payload) | Outcome::Failed(payload) => Some(payload),
            Outcome::TimedOut => None,
        };
        self.stop_time = Some(at.max(self.start_time));
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn payload(status: Option<&str>) -> StatusPayload {
        let mut p = StatusPayload::new();
        if let Some(s) = status {
            p.insert("status".to_string(), s.to_string());
        }
        p.insert("message".to_string(), "m".to_string());
        p
    }

    #[test]
    fn success_sentinel_is_the_only_success() {
        let ok = Outcome::from_report(payload(Some("job complete")), DEFAULT_SUCCESS_STATUS);
        assert_eq!(ok.state(), ExecutionState::Succeeded);

        for status in [Some(FAILED_STATUS), Some("Job Complete"), Some("done"), None] {
            let outcome = Outcome::from_report(payload(status), DEFAULT_SUCCESS_STATUS);
            assert_eq!(outcome.state(), ExecutionState::Failed, "status {status:?}");
        }
    }

    #[test]
    fn finish_records_output_and_stop_time() {
        let start = Utc::now();
        let mut status = ExecutionStatus::running(ExecutionId::new(), start);
        assert!(status.stop_time.is_none());

        let state = status
            .finish(Outcome::failure(FailureKind::NotImplemented, "nope"), Utc::now())
            .unwrap();

        assert_eq!(state, ExecutionState::Failed);
        let output = status.output.as_ref().unwrap();
        assert_eq!(output["error"], "NotImplemented");
        assert_eq!(output["cause"], "nope");
        assert!(status.stop_time.unwrap() >= start);
    }

    #[test]
    fn timed_out_has_no_output() {
        let mut status = ExecutionStatus::running(ExecutionId::new(), Utc::now());
        status.finish(Outcome::TimedOut, Utc::now()).unwrap();
        assert_eq!(status.state, ExecutionState::TimedOut);
        assert!(status.output.is_none());
        assert!(status.stop_time.is_some());
    }

    #[test]
    fn second_transition_is_a_duplicate_report() {
        let mut status = ExecutionStatus::running(ExecutionId::new(), Utc::now());
        status
            .finish(Outcome::Succeeded(payload(Some("job complete"))), Utc::now())
            .unwrap();
        let before = status.clone();

        let err = status.finish(Outcome::TimedOut, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::DuplicateReport { state: ExecutionState::Succeeded, .. }
        ));
        assert_eq!(status, before);
    }

    fn outcome_strategy() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            prop::option::of("[a-zA-Z ]{0,12}")
                .prop_map(|s| Outcome::from_report(payload(s.as_deref()), DEFAULT_SUCCESS_STATUS)),
            Just(Outcome::Succeeded(payload(Some(DEFAULT_SUCCESS_STATUS)))),
            Just(Outcome::failure(FailureKind::OperationFailure, "exit 1")),
            Just(Outcome::TimedOut),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of reports, failures and timeouts hits an
        /// execution, it leaves RUNNING exactly once and never changes again.
        #[test]
        fn state_leaves_running_exactly_once(
            outcomes in prop::collection::vec(outcome_strategy(), 1..8)
        ) {
            let mut status = ExecutionStatus::running(ExecutionId::new(), Utc::now());
            let mut transitions = 0;
            let mut settled: Option<ExecutionStatus> = None;

            for outcome in outcomes {
                match status.finish(outcome, Utc::now()) {
                    Ok(_) => {
                        transitions += 1;
                        settled = Some(status.clone());
                    }
                    Err(DomainError::DuplicateReport { .. }) => {
                        prop_assert_eq!(Some(&status), settled.as_ref());
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
            }

            prop_assert_eq!(transitions, 1);
            prop_assert!(status.is_terminal());
        }
    }
}
