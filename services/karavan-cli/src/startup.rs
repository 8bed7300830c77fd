//! Console bootstrap sequence
//!
//! readiness → auth mode → (oidc) identity provider session → (non-public)
//! current user → user id.

use std::sync::Arc;

use anyhow::{Context, Result};
use gateway::{AuthMode, Gateway};
use identity::{OidcSession, UserProfile};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AuthConfig;

/// What the backend told us during startup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupSummary {
    pub readiness: Option<serde_json::Value>,
    pub auth_mode: AuthMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    pub user_id: Option<String>,
}

pub async fn run(gateway: &Gateway, auth: &AuthConfig) -> Result<StartupSummary> {
    let readiness = gateway
        .readiness()
        .await
        .context("backend readiness check failed")?;
    if readiness.is_none() {
        warn!("backend answered readiness without a document");
    }

    let auth_mode = gateway
        .fetch_auth_mode()
        .await
        .context("failed to discover auth mode")?;

    if auth_mode == AuthMode::Oidc {
        install_oidc_session(gateway, auth).await?;
    }

    let user = match auth_mode {
        AuthMode::Public => None,
        AuthMode::Basic | AuthMode::Oidc => Some(
            gateway
                .fetch_me()
                .await
                .context("failed to fetch current user")?,
        ),
    };

    let user_id = gateway.user_id().await.context("failed to resolve user id")?;
    info!(%auth_mode, user_id = user_id.as_deref().unwrap_or("-"), "startup complete");

    Ok(StartupSummary {
        readiness,
        auth_mode,
        user,
        user_id,
    })
}

async fn install_oidc_session(gateway: &Gateway, auth: &AuthConfig) -> Result<()> {
    let sso = gateway
        .sso_config()
        .await
        .context("failed to fetch SSO configuration")?;
    info!(realm = %sso.realm, client_id = %sso.client_id, "using SSO configuration");

    if auth.oidc_refresh_token.is_none() {
        warn!("no OIDC refresh token configured; expired access tokens cannot be renewed");
    }

    let session = OidcSession::from_sso_config(&sso);
    session
        .set_tokens(
            auth.oidc_access_token.clone(),
            auth.oidc_refresh_token.clone(),
            None,
        )
        .await;
    gateway.session().set_identity_provider(Arc::new(session)).await;
    Ok(())
}
