//! Authentication-aware request gateway for the Karavan console backend
//!
//! Call sites hold a `Gateway` and issue requests through it; they never
//! see how the HTTP client is built, which credentials are attached, or how
//! an expired token is recovered.
//!
//! Request lifecycle:
//! 1. `ClientFactory` builds the shared `HttpClient` on first use
//! 2. The request interceptor attaches credentials from the session's
//!    active `AuthStrategy` (`Public`, `Basic`, `OpenIdConnect`)
//! 3. The request is sent with JSON default headers and a fixed timeout
//! 4. The response interceptor (`RefreshCoordinator`) passes successes
//!    through and, in oidc mode, refreshes and retries once on 401/403
//! 5. The caller receives `Result<ApiResponse, GatewayError>`

pub mod channel;
pub mod client;
pub mod error;
pub mod gateway;
pub mod interceptor;
pub mod metrics;
pub mod mode;
pub mod refresh;
pub mod request;
pub mod session;
pub mod strategy;

#[cfg(test)]
mod test_support;

pub use channel::{ApiErrorEvent, ErrorChannel};
pub use client::{ClientFactory, ClientSettings, HttpClient};
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use mode::AuthMode;
pub use refresh::{RefreshCoordinator, RefreshState};
pub use request::{ApiRequest, ApiResponse};
pub use session::SessionContext;
pub use strategy::{AuthStrategy, BasicToken};
