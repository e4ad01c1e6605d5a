//! Gateway error taxonomy
//!
//! Every failure is classified exactly once, here, into a closed `ErrorKind`.

use serde::{Deserialize, Serialize};

/// Closed classification of workflow service failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed request or a violated invariant (400-class)
    Validation,
    /// Referenced decision, review or endpoint absent (404)
    NotFound,
    /// A downstream integration of the service failed (502-class)
    UpstreamFailure,
    /// Transport failure, including timeouts
    Network,
    Unknown,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 409 | 422 => ErrorKind::Validation,
            404 => ErrorKind::NotFound,
            502..=504 => ErrorKind::UpstreamFailure,
            _ => ErrorKind::Unknown,
        }
    }
}

/// Error returned by every gateway call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
    /// Individual validation messages, when the service sent a list
    pub details: Vec<String>,
}

/// Error body shapes the service is known to send
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    DetailList { detail: Vec<serde_json::Value> },
    Detail { detail: String },
    Message { message: String },
    Error { error: String },
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Build from a non-success HTTP response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let kind = ErrorKind::from_status(status);
        let (message, details) = match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody::DetailList { detail }) => {
                let details: Vec<String> = detail.iter().map(detail_text).collect();
                (details.join("; "), details)
            }
            Ok(ErrorBody::Detail { detail }) => (detail.clone(), vec![detail]),
            Ok(ErrorBody::Message { message }) => (message, Vec::new()),
            Ok(ErrorBody::Error { error }) => (error, Vec::new()),
            Err(_) if body.trim().is_empty() => (format!("Request failed with status {}", status), Vec::new()),
            Err(_) => (body.trim().to_string(), Vec::new()),
        };

        Self {
            kind,
            status: Some(status),
            message,
            details,
        }
    }

    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::Network, format!("Network error: {}", err))
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::Unknown, format!("Unexpected response: {}", err))
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return GatewayError::decode(err);
        }
        match err.status() {
            Some(status) => GatewayError::new(ErrorKind::from_status(status.as_u16()), err.to_string())
                .with_status(status.as_u16()),
            None => GatewayError::network(err),
        }
    }
}

/// FastAPI-style validation entries carry a `msg`; anything else is shown raw.
fn detail_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("msg")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(502), ErrorKind::UpstreamFailure);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Unknown);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Unknown);
    }

    #[test]
    fn test_error_body_shapes() {
        let e = GatewayError::from_response(400, r#"{"detail": ["amount must be positive", {"msg": "currency missing"}]}"#);
        assert_eq!(e.kind, ErrorKind::Validation);
        assert_eq!(e.details, vec!["amount must be positive", "currency missing"]);

        let e = GatewayError::from_response(400, r#"{"detail": "already approved"}"#);
        assert_eq!(e.message, "already approved");
        assert_eq!(e.details, vec!["already approved"]);

        let e = GatewayError::from_response(404, r#"{"message": "no such review"}"#);
        assert_eq!(e.kind, ErrorKind::NotFound);
        assert_eq!(e.message, "no such review");

        let e = GatewayError::from_response(502, r#"{"error": "slack down", "status": 502}"#);
        assert_eq!(e.kind, ErrorKind::UpstreamFailure);
        assert_eq!(e.message, "slack down");

        let e = GatewayError::from_response(500, "");
        assert_eq!(e.message, "Request failed with status 500");
        assert_eq!(e.status, Some(500));
    }
}
