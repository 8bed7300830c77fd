//! Gateway error taxonomy
//!
//! Every request outcome that is not a 2xx response ends up here. Nothing in
//! the gateway panics or aborts on a failed call; callers decide whether to
//! retry, alert, or ignore.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No response within the client timeout.
    #[error("request to {path} timed out")]
    Timeout { path: String },

    /// Connection refused, DNS failure, reset, etc.
    #[error("transport error on {path}: {message}")]
    Transport { path: String, message: String },

    /// The backend answered with a non-2xx status.
    #[error("{path} returned HTTP {status}")]
    Status {
        status: StatusCode,
        path: String,
        body: String,
    },

    #[error("invalid response body from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("HTTP client construction failed: {0}")]
    Client(String),

    #[error("unknown auth mode: {0:?}")]
    UnknownAuthMode(String),

    #[error(transparent)]
    Identity(#[from] identity::Error),
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub(crate) fn from_reqwest(path: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout {
                path: path.to_string(),
            }
        } else {
            GatewayError::Transport {
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 or 403 from the backend.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::Transport { .. } => "transport",
            GatewayError::Status { .. } if self.is_auth_failure() => "unauthorized",
            GatewayError::Status { .. } => "status",
            GatewayError::Decode { .. } => "decode",
            GatewayError::InvalidHeader(_) => "invalid_header",
            GatewayError::Client(_) => "client",
            GatewayError::UnknownAuthMode(_) => "auth_mode",
            GatewayError::Identity(_) => "identity",
        }
    }

    /// Message suitable for an alert shown to the user.
    ///
    /// Plain-text bodies (and JSON string bodies) are what the backend writes
    /// for human consumption, so they are used verbatim. Structured or empty
    /// bodies fall back to a generic message.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Status { status, body, .. } => {
                let trimmed = body.trim();
                match serde_json::from_str::<serde_json::Value>(trimmed) {
                    Ok(serde_json::Value::String(text)) if !text.is_empty() => text,
                    Err(_) if !trimmed.is_empty() => trimmed.to_string(),
                    _ => format!("request failed with status {}", status.as_u16()),
                }
            }
            other => other.to_string(),
        }
    }
}
