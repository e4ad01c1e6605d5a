//! View region status
//!
//! Loading, error and success are mutually exclusive per region and reset at
//! the start of every attempt.

use serde::Serialize;

use super::error::ConsoleError;
use super::gateway::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum RegionStatus {
    #[default]
    Idle,
    Loading,
    Error(StatusError),
    Success,
}

impl RegionStatus {
    pub fn failed(err: &ConsoleError, message: impl Into<String>) -> Self {
        RegionStatus::Error(StatusError {
            kind: err.kind(),
            message: message.into(),
        })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RegionStatus::Loading)
    }

    pub fn error(&self) -> Option<&StatusError> {
        match self {
            RegionStatus::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error().map(|e| e.message.as_str())
    }
}
