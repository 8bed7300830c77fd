//! Shared HTTP client construction
//!
//! `ClientFactory` builds the one `HttpClient` a gateway uses, lazily on the
//! first call, and hands out the same `Arc` afterwards. The interceptor
//! chain (credential attachment + refresh coordinator) is part of the
//! `HttpClient` itself, so it is installed exactly once, at construction.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::{GatewayError, Result};
use crate::interceptor::dispatch;
use crate::refresh::{RefreshCoordinator, RefreshState};
use crate::request::{ApiRequest, ApiResponse};
use crate::session::SessionContext;

/// Request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single token refresh.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Backend origin, e.g. `http://127.0.0.1:8080`. Paths are appended verbatim.
    pub base_url: String,
    pub timeout: Duration,
    pub refresh_timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// JSON in both directions unless a call overrides it.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Build a bare reqwest client with the gateway defaults and no interceptors.
///
/// Also used by the refresh path for its one-off retry client.
pub(crate) fn build_http_client(settings: &ClientSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .default_headers(default_headers())
        .timeout(settings.timeout)
        .build()
        .map_err(|e| GatewayError::Client(e.to_string()))
}

/// The shared client handle: reqwest client plus the interceptor chain.
pub struct HttpClient {
    inner: reqwest::Client,
    settings: ClientSettings,
    session: Arc<SessionContext>,
    refresh: RefreshCoordinator,
}

impl HttpClient {
    fn build(settings: ClientSettings, session: Arc<SessionContext>) -> Result<Self> {
        let inner = build_http_client(&settings)?;
        info!(
            base_url = %settings.base_url,
            timeout_ms = settings.timeout.as_millis() as u64,
            "gateway HTTP client constructed"
        );
        Ok(Self {
            inner,
            settings,
            session,
            refresh: RefreshCoordinator::new(),
        })
    }

    /// Request interceptor → network call → response interceptor.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let strategy = self.session.strategy().await;
        let outcome = dispatch(&self.inner, &self.settings, &strategy, &request).await;
        self.refresh
            .on_response(&self.settings, &strategy, request, outcome)
            .await
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.refresh.state()
    }
}

/// Lazily constructs the single `HttpClient` for a gateway.
pub struct ClientFactory {
    settings: ClientSettings,
    session: Arc<SessionContext>,
    client: OnceCell<Arc<HttpClient>>,
}

impl ClientFactory {
    pub fn new(settings: ClientSettings, session: Arc<SessionContext>) -> Self {
        Self {
            settings,
            session,
            client: OnceCell::new(),
        }
    }

    /// Return the shared client, building it on first use.
    ///
    /// Concurrent first calls race to initialize the cell; only one build
    /// wins and every caller receives that instance.
    pub async fn get_client(&self) -> Result<Arc<HttpClient>> {
        self.client
            .get_or_try_init(|| async {
                HttpClient::build(self.settings.clone(), self.session.clone()).map(Arc::new)
            })
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }
}
