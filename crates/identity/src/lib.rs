//! Identity handling for the Karavan console gateway
//!
//! Covers the two ways a session learns who it is talking as:
//! - public mode: a generated anonymous id persisted in a key-value store
//!   (`anonymous::AnonymousIdentityStore`)
//! - authenticated modes: the profile returned by the "current user" endpoint
//!   (`profile::UserProfile`), and for OpenID Connect the token-holding
//!   session handle that can refresh itself (`oidc::OidcSession`)
//!
//! Nothing here issues gateway requests; the `gateway` crate owns the HTTP
//! client and calls into this crate for tokens and ids.

pub mod anonymous;
pub mod constants;
pub mod error;
pub mod oidc;
pub mod profile;
pub mod store;

pub use anonymous::AnonymousIdentityStore;
pub use constants::*;
pub use error::{Error, Result};
pub use oidc::{IdentityProvider, OidcSession, SsoConfig, TokenRefresh, TokenResponse};
pub use profile::UserProfile;
pub use store::{FileStore, KeyValueStore, MemoryStore};
