//! OpenID Connect session handle
//!
//! The gateway only needs two things from the identity provider: the current
//! access token, and a way to renew it after the backend rejects a request.
//! `IdentityProvider` is that seam. `OidcSession` implements it against a
//! realm's token endpoint using the refresh-token grant.
//!
//! `update_token` follows the usual OIDC client contract: a token that stays
//! valid for longer than `min_validity` is reported as `StillValid` without
//! contacting the endpoint. Concurrent callers are not coalesced; each one
//! that finds the token stale issues its own refresh request.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::constants::TOKEN_ENDPOINT_PATH;
use crate::error::{Error, Result};

/// Outcome of a successful `update_token` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRefresh {
    /// A new access token was obtained.
    Refreshed,
    /// The current token was still valid; nothing was requested.
    StillValid,
}

/// Source of bearer tokens for the OpenID Connect auth mode.
///
/// Boxed futures keep the trait dyn-compatible (`Arc<dyn IdentityProvider>`).
pub trait IdentityProvider: Send + Sync {
    /// Current access token, if the session holds one.
    fn token(&self) -> Pin<Box<dyn Future<Output = Option<Secret<String>>> + Send + '_>>;

    /// Renew the access token unless it stays valid for at least `min_validity`.
    fn update_token(
        &self,
        min_validity: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<TokenRefresh>> + Send + '_>>;
}

/// SSO settings published by the backend at `/public/sso-config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoConfig {
    pub url: String,
    pub realm: String,
    pub client_id: String,
}

impl SsoConfig {
    /// `{url}/realms/{realm}/protocol/openid-connect/token`
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/realms/{}/{}",
            self.url.trim_end_matches('/'),
            self.realm,
            TOKEN_ENDPOINT_PATH
        )
    }
}

/// Token endpoint response for the refresh-token grant.
///
/// `expires_in` is a delta in seconds. Some providers rotate the refresh
/// token on every call, others omit it; an absent value keeps the old one.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

struct SessionTokens {
    access: Option<Secret<String>>,
    refresh: Option<Secret<String>>,
    /// Unix milliseconds; 0 means unknown and is treated as expired.
    expires_at: u64,
}

/// Token-holding session for one signed-in user.
pub struct OidcSession {
    token_endpoint: String,
    client_id: String,
    http: reqwest::Client,
    tokens: RwLock<SessionTokens>,
}

impl OidcSession {
    pub fn new(token_endpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self::with_client(token_endpoint, client_id, reqwest::Client::new())
    }

    pub fn with_client(
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            http,
            tokens: RwLock::new(SessionTokens {
                access: None,
                refresh: None,
                expires_at: 0,
            }),
        }
    }

    pub fn from_sso_config(config: &SsoConfig) -> Self {
        Self::new(config.token_endpoint(), config.client_id.clone())
    }

    /// Install tokens obtained by a login flow that ran outside this crate.
    ///
    /// `expires_in` is the remaining lifetime of `access`; `None` marks the
    /// expiry as unknown, so the first `update_token` call refreshes.
    pub async fn set_tokens(
        &self,
        access: Option<Secret<String>>,
        refresh: Option<Secret<String>>,
        expires_in: Option<Duration>,
    ) {
        let mut tokens = self.tokens.write().await;
        tokens.access = access;
        tokens.refresh = refresh;
        tokens.expires_at = expires_in
            .map(|d| now_millis().saturating_add(duration_millis(d)))
            .unwrap_or(0);
        debug!(expires_at = tokens.expires_at, "installed session tokens");
    }

    async fn refresh(&self) -> Result<()> {
        let refresh = {
            let tokens = self.tokens.read().await;
            tokens
                .refresh
                .clone()
                .ok_or_else(|| Error::InvalidCredentials("session has no refresh token".into()))?
        };

        let response = refresh_token(
            &self.http,
            &self.token_endpoint,
            &self.client_id,
            refresh.expose(),
        )
        .await?;

        let mut tokens = self.tokens.write().await;
        tokens.access = Some(Secret::new(response.access_token));
        if let Some(rotated) = response.refresh_token {
            tokens.refresh = Some(Secret::new(rotated));
        }
        tokens.expires_at = now_millis()
            .saturating_add(response.expires_in.saturating_mul(1000));
        info!(expires_in = response.expires_in, "access token refreshed");
        Ok(())
    }
}

impl IdentityProvider for OidcSession {
    fn token(&self) -> Pin<Box<dyn Future<Output = Option<Secret<String>>> + Send + '_>> {
        Box::pin(async move { self.tokens.read().await.access.clone() })
    }

    fn update_token(
        &self,
        min_validity: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<TokenRefresh>> + Send + '_>> {
        Box::pin(async move {
            let still_valid = {
                let tokens = self.tokens.read().await;
                tokens.access.is_some()
                    && tokens.expires_at
                        > now_millis().saturating_add(duration_millis(min_validity))
            };
            if still_valid {
                debug!("access token still valid, skipping refresh");
                return Ok(TokenRefresh::StillValid);
            }

            self.refresh().await.inspect_err(|e| {
                warn!(error = %e, "access token refresh failed");
            })?;
            Ok(TokenRefresh::Refreshed)
        })
    }
}

/// POST a refresh-token grant to `endpoint`.
///
/// 401/403 means the refresh token is revoked or the session ended.
pub async fn refresh_token(
    client: &reqwest::Client,
    endpoint: &str,
    client_id: &str,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", client_id),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenRefresh(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenRefresh(format!("invalid refresh response: {e}")))
}

fn now_millis() -> u64 {
    duration_millis(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default(),
    )
}

/// Milliseconds in `d`, clamped to `u64::MAX`.
fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// Serve a token endpoint that counts calls and answers with `status`.
    async fn start_token_endpoint(status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        tokio::spawn(async move {
            let app = axum::Router::new().fallback(move |body: String| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    assert!(body.contains("grant_type=refresh_token"), "body: {body}");
                    let payload = serde_json::json!({
                        "access_token": format!("at_{n}"),
                        "refresh_token": format!("rt_{n}"),
                        "expires_in": 300,
                    });
                    (status, axum::Json(payload))
                }
            });
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/token"), calls)
    }

    #[test]
    fn token_endpoint_from_sso_config() {
        let config: SsoConfig = serde_json::from_str(
            r#"{"url":"https://sso.example.com/","realm":"karavan","clientId":"frontend"}"#,
        )
        .unwrap();
        assert_eq!(
            config.token_endpoint(),
            "https://sso.example.com/realms/karavan/protocol/openid-connect/token"
        );
        assert_eq!(config.client_id, "frontend");
    }

    #[test]
    fn token_response_without_refresh_token() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"at","expires_in":60}"#).unwrap();
        assert!(token.refresh_token.is_none());
        assert_eq!(token.expires_in, 60);
    }

    #[tokio::test]
    async fn valid_token_is_not_refreshed() {
        let (endpoint, calls) = start_token_endpoint(StatusCode::OK).await;
        let session = OidcSession::new(endpoint, "frontend");
        session
            .set_tokens(
                Some(Secret::new("at_0".into())),
                Some(Secret::new("rt_0".into())),
                Some(Duration::from_secs(600)),
            )
            .await;

        let outcome = session.update_token(Duration::from_secs(30)).await.unwrap();
        assert_eq!(outcome, TokenRefresh::StillValid);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.token().await.unwrap().expose(), "at_0");
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_and_rotated() {
        let (endpoint, calls) = start_token_endpoint(StatusCode::OK).await;
        let session = OidcSession::new(endpoint, "frontend");
        session
            .set_tokens(
                Some(Secret::new("at_0".into())),
                Some(Secret::new("rt_0".into())),
                Some(Duration::from_secs(5)),
            )
            .await;

        let outcome = session.update_token(Duration::from_secs(30)).await.unwrap();
        assert_eq!(outcome, TokenRefresh::Refreshed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.token().await.unwrap().expose(), "at_1");

        // New token is good for 300s, so the next call is a no-op.
        let outcome = session.update_token(Duration::from_secs(30)).await.unwrap();
        assert_eq!(outcome, TokenRefresh::StillValid);
    }

    #[tokio::test]
    async fn rejected_refresh_token_is_invalid_credentials() {
        let (endpoint, _calls) = start_token_endpoint(StatusCode::UNAUTHORIZED).await;
        let session = OidcSession::new(endpoint, "frontend");
        session
            .set_tokens(None, Some(Secret::new("rt_revoked".into())), None)
            .await;

        let result = session.update_token(Duration::from_secs(30)).await;
        assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn server_error_is_token_refresh_error() {
        let (endpoint, _calls) = start_token_endpoint(StatusCode::BAD_GATEWAY).await;
        let session = OidcSession::new(endpoint, "frontend");
        session
            .set_tokens(None, Some(Secret::new("rt".into())), None)
            .await;

        let result = session.update_token(Duration::from_secs(30)).await;
        assert!(matches!(result, Err(Error::TokenRefresh(_))));
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_request() {
        let (endpoint, calls) = start_token_endpoint(StatusCode::OK).await;
        let session = OidcSession::new(endpoint, "frontend");

        let result = session.update_token(Duration::from_secs(30)).await;
        assert!(matches!(result, Err(Error::InvalidCredentials(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn huge_expires_in_saturates_instead_of_overflowing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = axum::Router::new().fallback(|| async {
                axum::Json(serde_json::json!({
                    "access_token": "at_forever",
                    "expires_in": u64::MAX,
                }))
            });
            axum::serve(listener, app).await.unwrap();
        });

        let session = OidcSession::new(format!("http://{addr}/token"), "frontend");
        session
            .set_tokens(None, Some(Secret::new("rt".into())), None)
            .await;

        let outcome = session.update_token(Duration::from_secs(30)).await.unwrap();
        assert_eq!(outcome, TokenRefresh::Refreshed);
        assert_eq!(session.token().await.unwrap().expose(), "at_forever");

        // Saturated expiry reads as far in the future, not already passed.
        let outcome = session.update_token(Duration::from_secs(30)).await.unwrap();
        assert_eq!(outcome, TokenRefresh::StillValid);
        assert_eq!(session.tokens.read().await.expires_at, u64::MAX);
    }

    #[tokio::test]
    async fn huge_durations_do_not_overflow() {
        let session = OidcSession::new("http://127.0.0.1:9/token", "frontend");
        session
            .set_tokens(Some(Secret::new("at".into())), None, Some(Duration::MAX))
            .await;
        assert_eq!(session.tokens.read().await.expires_at, u64::MAX);

        // Nothing outlives a u64::MAX window, so this asks for a refresh and
        // fails for lack of a refresh token rather than panicking.
        let result = session.update_token(Duration::MAX).await;
        assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    }
}
