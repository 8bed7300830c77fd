//! Request interceptor and single-attempt dispatch
//!
//! Every outgoing call passes through `prepare_request`, which asks the
//! active strategy for credentials and writes the Authorization header.
//! `dispatch` runs that step, sends the request once, and turns the outcome
//! into a `Result`: 2xx responses are `Ok`, everything else is a
//! `GatewayError`. The response interceptor (`refresh::RefreshCoordinator`)
//! sits on top of this.

use reqwest::header::{AUTHORIZATION, HeaderMap};
use tracing::{debug, instrument, warn};

use crate::client::ClientSettings;
use crate::error::{GatewayError, Result};
use crate::metrics;
use crate::request::{ApiRequest, ApiResponse};
use crate::strategy::AuthStrategy;

/// Attach the strategy's credentials to `headers`.
///
/// Any Authorization header supplied by the caller is replaced in basic and
/// oidc modes; in public mode the headers are left untouched.
pub async fn prepare_request(strategy: &AuthStrategy, headers: &mut HeaderMap) -> Result<()> {
    if let Some(value) = strategy.authorization().await? {
        headers.insert(AUTHORIZATION, value);
    }
    Ok(())
}

/// Send `request` once through `client` with credentials from `strategy`.
#[instrument(skip_all, fields(method = %request.method, path = %request.path, retried = request.is_retried()))]
pub(crate) async fn dispatch(
    client: &reqwest::Client,
    settings: &ClientSettings,
    strategy: &AuthStrategy,
    request: &ApiRequest,
) -> Result<ApiResponse> {
    let mut headers = request.headers.clone();
    prepare_request(strategy, &mut headers).await?;

    let mut builder = client
        .request(request.method.clone(), settings.url(&request.path))
        .headers(headers);
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let response = builder.send().await.map_err(|e| {
        let err = GatewayError::from_reqwest(&request.path, e);
        warn!(error = %err, "request failed without a response");
        metrics::record_error(err.kind());
        err
    })?;

    let status = response.status();
    let headers = response.headers().clone();
    metrics::record_request(request.method.as_str(), status.as_u16());

    let body = response.bytes().await.map_err(|e| {
        let err = GatewayError::from_reqwest(&request.path, e);
        metrics::record_error(err.kind());
        err
    })?;

    if !status.is_success() {
        debug!(%status, "backend returned failure status");
        let err = GatewayError::Status {
            status,
            path: request.path.clone(),
            body: String::from_utf8_lossy(&body).into_owned(),
        };
        metrics::record_error(err.kind());
        return Err(err);
    }

    Ok(ApiResponse {
        status,
        headers,
        body: body.to_vec(),
        path: request.path.clone(),
    })
}
