//! Authentication strategies
//!
//! One strategy is active per session, held in the session's strategy slot.
//! Switching modes replaces the slot wholesale, so credential attachment and
//! refresh behavior never stack up across repeated mode switches.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use identity::IdentityProvider;
use reqwest::header::HeaderValue;

use crate::error::{GatewayError, Result};
use crate::mode::AuthMode;

/// Pre-encoded Basic credential (`base64(user:password)`), without the
/// `Basic ` prefix.
#[derive(Clone, Debug)]
pub struct BasicToken(Secret<String>);

impl BasicToken {
    /// Wrap an already encoded token.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(Secret::new(encoded.into()))
    }

    /// Encode a user name and password.
    pub fn encode(user: &str, password: &str) -> Self {
        Self::new(STANDARD.encode(format!("{user}:{password}")))
    }

    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

/// The active credential strategy.
#[derive(Clone)]
pub enum AuthStrategy {
    /// No Authorization header.
    Public,
    /// `Authorization: Basic <token>`. An empty token is still sent; the
    /// backend rejects it like any other bad credential.
    Basic(BasicToken),
    /// `Authorization: Bearer <token>` from the identity provider session,
    /// plus refresh-and-retry on 401/403. Without a session the header carries
    /// an empty token and auth failures cannot be recovered.
    OpenIdConnect(Option<Arc<dyn IdentityProvider>>),
}

impl AuthStrategy {
    pub fn mode(&self) -> AuthMode {
        match self {
            AuthStrategy::Public => AuthMode::Public,
            AuthStrategy::Basic(_) => AuthMode::Basic,
            AuthStrategy::OpenIdConnect(_) => AuthMode::Oidc,
        }
    }

    /// The identity provider that can renew credentials, if this strategy has one.
    pub fn refresher(&self) -> Option<&Arc<dyn IdentityProvider>> {
        match self {
            AuthStrategy::OpenIdConnect(provider) => provider.as_ref(),
            _ => None,
        }
    }

    /// Authorization header value for the next outgoing request.
    pub async fn authorization(&self) -> Result<Option<HeaderValue>> {
        let raw = match self {
            AuthStrategy::Public => return Ok(None),
            AuthStrategy::Basic(token) => format!("Basic {}", token.expose()),
            AuthStrategy::OpenIdConnect(provider) => {
                let token = match provider {
                    Some(provider) => provider.token().await,
                    None => None,
                };
                match token {
                    Some(token) => format!("Bearer {}", token.expose()),
                    None => String::from("Bearer "),
                }
            }
        };
        let mut value = HeaderValue::from_str(&raw)
            .map_err(|e| GatewayError::InvalidHeader(format!("authorization: {e}")))?;
        value.set_sensitive(true);
        Ok(Some(value))
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::Public => f.write_str("Public"),
            AuthStrategy::Basic(_) => f.write_str("Basic([REDACTED])"),
            AuthStrategy::OpenIdConnect(Some(_)) => f.write_str("OpenIdConnect(session)"),
            AuthStrategy::OpenIdConnect(None) => f.write_str("OpenIdConnect(no session)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockIdentityProvider;

    #[test]
    fn encode_matches_rfc7617_example() {
        let token = BasicToken::encode("Aladdin", "open sesame");
        assert_eq!(token.expose(), "QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[tokio::test]
    async fn public_has_no_header() {
        assert!(AuthStrategy::Public.authorization().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn basic_header_uses_token_verbatim() {
        let strategy = AuthStrategy::Basic(BasicToken::new("dXNlcjpwYXNz"));
        let value = strategy.authorization().await.unwrap().unwrap();
        assert_eq!(value, "Basic dXNlcjpwYXNz");
        assert!(value.is_sensitive());
    }

    #[tokio::test]
    async fn basic_without_token_sends_empty_credential() {
        let strategy = AuthStrategy::Basic(BasicToken::new(""));
        let value = strategy.authorization().await.unwrap().unwrap();
        assert_eq!(value, "Basic ");
    }

    #[tokio::test]
    async fn oidc_header_uses_current_session_token() {
        let provider = Arc::new(MockIdentityProvider::new("at_1"));
        let strategy = AuthStrategy::OpenIdConnect(Some(provider.clone()));
        assert_eq!(
            strategy.authorization().await.unwrap().unwrap(),
            "Bearer at_1"
        );
        assert!(strategy.refresher().is_some());
    }

    #[tokio::test]
    async fn oidc_without_session_cannot_refresh() {
        let strategy = AuthStrategy::OpenIdConnect(None);
        assert_eq!(strategy.authorization().await.unwrap().unwrap(), "Bearer ");
        assert!(strategy.refresher().is_none());
    }

    #[test]
    fn debug_redacts_credentials() {
        let strategy = AuthStrategy::Basic(BasicToken::new("c2VjcmV0"));
        let debug = format!("{strategy:?}");
        assert!(!debug.contains("c2VjcmV0"), "got: {debug}");
    }
}
