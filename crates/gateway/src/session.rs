//! Per-application session context
//!
//! Holds everything that used to be process-wide mutable state: the auth
//! mode, the active strategy slot, the out-of-band credentials, and the
//! resolved identity. One context exists per logical application instance;
//! it is created at startup, shared by `Arc`, and reset on logout.

use std::sync::Arc;

use identity::{AnonymousIdentityStore, IdentityProvider, KeyValueStore, UserProfile};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::mode::AuthMode;
use crate::strategy::{AuthStrategy, BasicToken};

#[derive(Default)]
struct SessionState {
    mode: Option<AuthMode>,
    basic_token: Option<BasicToken>,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    profile: Option<UserProfile>,
}

impl SessionState {
    fn strategy(&self) -> AuthStrategy {
        match self.mode {
            None | Some(AuthMode::Public) => AuthStrategy::Public,
            Some(AuthMode::Basic) => AuthStrategy::Basic(
                self.basic_token
                    .clone()
                    .unwrap_or_else(|| BasicToken::new("")),
            ),
            Some(AuthMode::Oidc) => AuthStrategy::OpenIdConnect(self.identity_provider.clone()),
        }
    }
}

pub struct SessionContext {
    state: RwLock<SessionState>,
    anonymous: AnonymousIdentityStore,
}

impl SessionContext {
    /// Create a session whose anonymous id (public mode) lives in `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            anonymous: AnonymousIdentityStore::new(store),
        }
    }

    /// Select the auth mode. The strategy slot is rebuilt from scratch, so
    /// calling this repeatedly (with the same or a different mode) never
    /// accumulates credential or refresh behavior.
    pub async fn set_auth_mode(&self, mode: AuthMode) {
        let mut state = self.state.write().await;
        if state.mode == Some(mode) {
            debug!(%mode, "auth mode unchanged");
            return;
        }
        state.mode = Some(mode);
        match mode {
            AuthMode::Basic if state.basic_token.is_none() => {
                warn!("basic auth selected without a token; requests will be rejected");
            }
            AuthMode::Oidc if state.identity_provider.is_none() => {
                warn!("oidc auth selected without an identity provider session");
            }
            _ => {}
        }
        info!(%mode, "auth mode set");
    }

    /// Supply the Basic credential. Takes effect immediately if basic mode is active.
    pub async fn set_basic_token(&self, token: BasicToken) {
        self.state.write().await.basic_token = Some(token);
        debug!("basic token installed");
    }

    /// Supply the identity provider session used in oidc mode.
    pub async fn set_identity_provider(&self, provider: Arc<dyn IdentityProvider>) {
        self.state.write().await.identity_provider = Some(provider);
        debug!("identity provider session installed");
    }

    pub async fn auth_mode(&self) -> Option<AuthMode> {
        self.state.read().await.mode
    }

    /// Snapshot of the active strategy. Requests take one snapshot at send
    /// time and use it for their whole lifetime, including any retry.
    pub async fn strategy(&self) -> AuthStrategy {
        self.state.read().await.strategy()
    }

    pub async fn set_profile(&self, profile: UserProfile) {
        info!(user = %profile.user_name, "session identity resolved");
        self.state.write().await.profile = Some(profile);
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.state.read().await.profile.clone()
    }

    /// User id used to tag shared configuration and image pulls.
    ///
    /// Public mode returns the persisted anonymous id (created on first use).
    /// Other modes return the resolved profile's user name, or `None` if the
    /// profile has not been fetched yet.
    pub async fn user_id(&self) -> Result<Option<String>> {
        let (mode, user_name) = {
            let state = self.state.read().await;
            (
                state.mode,
                state.profile.as_ref().map(|p| p.user_name.clone()),
            )
        };
        match mode {
            Some(AuthMode::Public) => Ok(Some(self.anonymous.get_or_create().await?)),
            _ => {
                if user_name.is_none() {
                    debug!("user id requested before identity was resolved");
                }
                Ok(user_name)
            }
        }
    }

    /// Drop mode, credentials and identity (logout / re-login).
    pub async fn reset(&self) {
        *self.state.write().await = SessionState::default();
        info!("session reset");
    }
}
