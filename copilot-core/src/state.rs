use serde::Serialize;

use crate::error::{CopilotError, Result};

/// Visible lifecycle of one request flow.
///
/// Every flow (analysis, chat, triage) owns one of these. The transition to
/// `Pending` happens synchronously on the trigger; the transition out only
/// when the external call settles. `begin` is the single in-flight guard:
/// a flow that is already `Pending` rejects a repeat trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum RequestState<T> {
    Idle,
    Pending,
    Succeeded(T),
    Failed(String),
}

impl<T> RequestState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }

    /// Move to `Pending`, discarding any previous outcome. Rejects the
    /// transition when a request is already in flight.
    pub fn begin(&mut self, flow: &'static str) -> Result<()> {
        if self.is_pending() {
            return Err(CopilotError::FlowBusy(flow));
        }
        *self = RequestState::Pending;
        Ok(())
    }

    pub fn succeed(&mut self, payload: T) {
        *self = RequestState::Succeeded(payload);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        *self = RequestState::Failed(reason.into());
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            RequestState::Succeeded(payload) => Some(payload),
            _ => None,
        }
    }
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        RequestState::Idle
    }
}
