use thiserror::Error;

use crate::prompt::MIN_NOTES_LEN;

/// Errors surfaced by the copilot core
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CopilotError {
    #[error("consultation notes too short: at least {MIN_NOTES_LEN} characters required")]
    NotesTooShort,

    #[error("chat message is empty")]
    EmptyMessage,

    #[error("a {0} request is already in flight")]
    FlowBusy(&'static str),

    #[error("patient not found: {0}")]
    PatientNotFound(String),
}

pub type Result<T> = std::result::Result<T, CopilotError>;
