//! Authentication mode reported by the backend

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Authentication scheme active for a session.
///
/// The backend reports it as plain text from `/public/auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Public,
    Basic,
    Oidc,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Public => "public",
            AuthMode::Basic => "basic",
            AuthMode::Oidc => "oidc",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(AuthMode::Public),
            "basic" => Ok(AuthMode::Basic),
            "oidc" => Ok(AuthMode::Oidc),
            _ => Err(GatewayError::UnknownAuthMode(s.to_string())),
        }
    }
}
