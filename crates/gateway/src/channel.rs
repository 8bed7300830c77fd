//! Broadcast channel for request failures
//!
//! UI layers subscribe to show alerts; the gateway publishes failures of
//! the calls it makes on its own behalf (discovery, identity). Publishing
//! with no subscribers is not an error.

use reqwest::Method;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::GatewayError;

const CHANNEL_CAPACITY: usize = 64;

/// A failed API call, as seen by error-reporting subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorEvent {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub kind: &'static str,
    pub message: String,
}

impl ApiErrorEvent {
    pub fn new(method: &Method, path: &str, err: &GatewayError) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            status: err.status().map(|s| s.as_u16()),
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}

#[derive(Clone)]
pub struct ErrorChannel {
    tx: broadcast::Sender<ApiErrorEvent>,
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApiErrorEvent> {
        self.tx.subscribe()
    }

    /// Publish `event`; returns the number of subscribers that received it.
    pub fn publish(&self, event: ApiErrorEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!(path = %event.path, "no error subscribers");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let channel = ErrorChannel::new();
        let mut rx = channel.subscribe();
        let err = GatewayError::Status {
            status: StatusCode::CONFLICT,
            path: "/ui/project".into(),
            body: "Project exists".into(),
        };

        let delivered = channel.publish(ApiErrorEvent::new(&Method::POST, "/ui/project", &err));
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.method, "POST");
        assert_eq!(event.status, Some(409));
        assert_eq!(event.message, "Project exists");
        assert_eq!(event.kind, "status");
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let channel = ErrorChannel::new();
        let err = GatewayError::Timeout {
            path: "/ui/configuration".into(),
        };
        assert_eq!(
            channel.publish(ApiErrorEvent::new(&Method::GET, "/ui/configuration", &err)),
            0
        );
    }

    #[test]
    fn event_serializes_without_missing_status() {
        let err = GatewayError::Transport {
            path: "/public/auth".into(),
            message: "connection refused".into(),
        };
        let json = serde_json::to_value(ApiErrorEvent::new(&Method::GET, "/public/auth", &err))
            .unwrap();
        assert!(json.get("status").is_none());
        assert_eq!(json["kind"], "transport");
    }
}
