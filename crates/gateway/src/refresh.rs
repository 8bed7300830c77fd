//! Response interceptor: refresh-and-retry on authorization failure
//!
//! Only the OpenID Connect strategy recovers from 401/403. For a request
//! that has not been retried yet the coordinator asks the identity provider
//! to renew its token (bounded by the refresh timeout), then resubmits the
//! request once through a freshly built client that has no response
//! interceptor, so a second 401 is returned to the caller instead of
//! triggering another refresh.
//!
//! Concurrent failures are not coalesced: each failing request runs its own
//! refresh. Whether those calls collapse into one is up to the identity
//! provider.

use std::sync::atomic::{AtomicU8, Ordering};

use identity::{TOKEN_MIN_VALIDITY, TokenRefresh};
use tracing::{info, warn};

use crate::client::{ClientSettings, build_http_client};
use crate::error::Result;
use crate::interceptor::dispatch;
use crate::metrics;
use crate::request::{ApiRequest, ApiResponse};
use crate::strategy::AuthStrategy;

/// Where the most recent refresh cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Active,
    Refreshing,
    Failed,
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RefreshState::Refreshing,
            2 => RefreshState::Failed,
            _ => RefreshState::Active,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RefreshState::Active => 0,
            RefreshState::Refreshing => 1,
            RefreshState::Failed => 2,
        }
    }
}

pub struct RefreshCoordinator {
    state: AtomicU8,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RefreshState::Active.as_u8()),
        }
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, next: RefreshState) {
        self.state.store(next.as_u8(), Ordering::SeqCst);
    }

    /// Inspect the outcome of `request` and recover from an auth failure if
    /// the strategy allows it. Successes and all other failures pass through.
    pub async fn on_response(
        &self,
        settings: &ClientSettings,
        strategy: &AuthStrategy,
        mut request: ApiRequest,
        outcome: Result<ApiResponse>,
    ) -> Result<ApiResponse> {
        let original = match outcome {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };
        if !original.is_auth_failure() || request.is_retried() {
            return Err(original);
        }
        let Some(provider) = strategy.refresher() else {
            return Err(original);
        };

        self.transition(RefreshState::Refreshing);
        info!(path = %request.path, status = ?original.status(), "authorization failed, refreshing token");

        match tokio::time::timeout(
            settings.refresh_timeout,
            provider.update_token(TOKEN_MIN_VALIDITY),
        )
        .await
        {
            Ok(Ok(outcome)) => {
                match outcome {
                    TokenRefresh::Refreshed => {
                        info!("token was refreshed");
                        metrics::record_refresh("refreshed");
                    }
                    TokenRefresh::StillValid => {
                        info!("token is still valid");
                        metrics::record_refresh("still_valid");
                    }
                }
                request.mark_retried();
                let result = match build_http_client(settings) {
                    Ok(retry_client) => dispatch(&retry_client, settings, strategy, &request).await,
                    Err(e) => Err(e),
                };
                self.transition(RefreshState::Active);
                result
            }
            Ok(Err(e)) => {
                warn!(error = %e, path = %request.path, "token refresh failed");
                metrics::record_refresh("failed");
                self.transition(RefreshState::Failed);
                Err(original)
            }
            Err(_) => {
                warn!(
                    timeout_secs = settings.refresh_timeout.as_secs(),
                    path = %request.path,
                    "token refresh timed out"
                );
                metrics::record_refresh("timeout");
                self.transition(RefreshState::Failed);
                Err(original)
            }
        }
    }
}
