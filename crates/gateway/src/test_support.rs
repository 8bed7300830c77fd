//! Shared fixtures for gateway tests: a scriptable identity provider and a
//! loopback backend.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::Secret;
use identity::{IdentityProvider, TokenRefresh};
use tokio::net::TcpListener;
use tokio::sync::Barrier;

#[derive(Clone, Copy)]
pub enum RefreshBehavior {
    /// Rotate to `at_refreshed` and report `Refreshed`.
    Rotate,
    /// Keep the current token and report `StillValid`.
    StillValid,
    Fail,
    /// Never complete.
    Hang,
}

pub struct MockIdentityProvider {
    token: Mutex<String>,
    behavior: RefreshBehavior,
    calls: AtomicUsize,
    /// When set, every refresh waits here before completing.
    gate: Option<Arc<Barrier>>,
}

impl MockIdentityProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: Mutex::new(token.to_string()),
            behavior: RefreshBehavior::Rotate,
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn with_behavior(mut self, behavior: RefreshBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_gate(mut self, gate: Arc<Barrier>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn token(&self) -> Pin<Box<dyn Future<Output = Option<Secret<String>>> + Send + '_>> {
        let token = self.token.lock().unwrap().clone();
        Box::pin(async move { Some(Secret::new(token)) })
    }

    fn update_token(
        &self,
        _min_validity: Duration,
    ) -> Pin<Box<dyn Future<Output = identity::Result<TokenRefresh>> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.wait().await;
            }
            match self.behavior {
                RefreshBehavior::Rotate => {
                    *self.token.lock().unwrap() = "at_refreshed".to_string();
                    Ok(TokenRefresh::Refreshed)
                }
                RefreshBehavior::StillValid => Ok(TokenRefresh::StillValid),
                RefreshBehavior::Fail => Err(identity::Error::InvalidCredentials(
                    "refresh token expired".into(),
                )),
                RefreshBehavior::Hang => std::future::pending().await,
            }
        })
    }
}

/// Serve `app` on an ephemeral loopback port and return its base URL.
pub async fn start_backend(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
