//! Gateway operations
//!
//! `Gateway` is the context object every call site holds. It owns the
//! session, the client factory and the error channel; all operations go
//! through the same shared client and therefore the same interceptors.
//!
//! Discovery and identity calls used during startup live here. Resource
//! endpoints (projects, files, containers, ...) are thin wrappers callers
//! build on the generic verbs.

use std::sync::Arc;

use identity::{SsoConfig, UserProfile};
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::channel::{ApiErrorEvent, ErrorChannel};
use crate::client::{ClientFactory, ClientSettings, HttpClient};
use crate::error::Result;
use crate::mode::AuthMode;
use crate::request::{ApiRequest, ApiResponse};
use crate::session::SessionContext;

pub const READINESS_PATH: &str = "/public/readiness";
pub const SSO_CONFIG_PATH: &str = "/public/sso-config";
pub const AUTH_MODE_PATH: &str = "/public/auth";
pub const CURRENT_USER_PATH: &str = "/ui/users/me";
pub const CONFIGURATION_PATH: &str = "/ui/configuration";

pub struct Gateway {
    session: Arc<SessionContext>,
    factory: ClientFactory,
    errors: ErrorChannel,
}

impl Gateway {
    pub fn new(settings: ClientSettings, session: Arc<SessionContext>) -> Self {
        Self {
            factory: ClientFactory::new(settings, session.clone()),
            session,
            errors: ErrorChannel::new(),
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// The shared client handle (built on first use).
    pub async fn client(&self) -> Result<Arc<HttpClient>> {
        self.factory.get_client().await
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ApiErrorEvent> {
        self.errors.subscribe()
    }

    pub fn error_channel(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Send a request through the interceptor chain.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.client().await?.send(request).await
    }

    /// Like `execute`, but also publishes a failure on the error channel.
    async fn execute_reported(&self, request: ApiRequest) -> Result<ApiResponse> {
        let method = request.method.clone();
        let path = request.path.clone();
        self.execute(request).await.inspect_err(|e| {
            self.errors.publish(ApiErrorEvent::new(&method, &path, e));
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    /// GET with `Accept: text/plain`.
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let request =
            ApiRequest::get(path).header(ACCEPT, HeaderValue::from_static("text/plain"));
        Ok(self.execute(request).await?.text())
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::post(path).json(body)?)
            .await?
            .json()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::put(path).json(body)?).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Backend readiness document. `None` for a 2xx other than 200.
    pub async fn readiness(&self) -> Result<Option<serde_json::Value>> {
        let response = self
            .execute_reported(ApiRequest::get(READINESS_PATH))
            .await?;
        if response.status != reqwest::StatusCode::OK {
            return Ok(None);
        }
        response.json().map(Some)
    }

    pub async fn sso_config(&self) -> Result<SsoConfig> {
        self.execute_reported(ApiRequest::get(SSO_CONFIG_PATH))
            .await?
            .json()
    }

    /// Ask the backend which auth mode it runs and apply it to the session.
    pub async fn fetch_auth_mode(&self) -> Result<AuthMode> {
        let request = ApiRequest::get(AUTH_MODE_PATH)
            .header(ACCEPT, HeaderValue::from_static("text/plain"));
        let response = self.execute_reported(request).await?;
        let mode: AuthMode = response.text().parse().inspect_err(|e| {
            warn!(error = %e, "backend reported an unknown auth mode");
        })?;
        self.session.set_auth_mode(mode).await;
        info!(%mode, "auth mode discovered");
        Ok(mode)
    }

    /// Fetch the signed-in user's profile and store it in the session.
    pub async fn fetch_me(&self) -> Result<UserProfile> {
        let profile: UserProfile = self
            .execute_reported(ApiRequest::get(CURRENT_USER_PATH))
            .await?
            .json()?;
        self.session.set_profile(profile.clone()).await;
        Ok(profile)
    }

    pub async fn configuration(&self) -> Result<serde_json::Value> {
        self.execute_reported(ApiRequest::get(CONFIGURATION_PATH))
            .await?
            .json()
    }

    /// See `SessionContext::user_id`.
    pub async fn user_id(&self) -> Result<Option<String>> {
        self.session.user_id().await
    }
}
