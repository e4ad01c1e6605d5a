//! Console error handling
//!
//! Local rejections and gateway failures share one `ErrorKind` so every view
//! renders them the same way.

use super::decision::TransitionError;
use super::gateway::{ErrorKind, GatewayError};

pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("decision {0} is not in the loaded history")]
    UnknownDecision(String),

    #[error("conflicted decision {0} is already approved for learning")]
    AlreadyApproved(String),

    #[error("signal {0} is not part of the weights configuration")]
    UnknownSignal(String),
}

impl ConsoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::Gateway(e) => e.kind,
            ConsoleError::Transition(_) => ErrorKind::Validation,
            ConsoleError::UnknownDecision(_) => ErrorKind::NotFound,
            ConsoleError::AlreadyApproved(_) => ErrorKind::Validation,
            ConsoleError::UnknownSignal(_) => ErrorKind::Validation,
        }
    }

    /// Whether the failure happened before any request was sent.
    pub fn is_local(&self) -> bool {
        !matches!(self, ConsoleError::Gateway(_))
    }

    /// Most specific server-provided text, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ConsoleError::Gateway(e) if !e.message.is_empty() => Some(e.message.as_str()),
            _ => None,
        }
    }

    /// The service answered, but the view may no longer match it: a 502 means
    /// the write landed before a downstream step failed, and a server-side
    /// validation rejection usually means the local copy is stale.
    pub fn needs_reread(&self) -> bool {
        !self.is_local() && matches!(self.kind(), ErrorKind::UpstreamFailure | ErrorKind::Validation)
    }
}
