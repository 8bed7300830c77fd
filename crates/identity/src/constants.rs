//! Fixed names and budgets used by the identity layer

use std::time::Duration;

/// Storage key holding the anonymous user id in public mode.
pub const USER_ID_KEY: &str = "KARAVAN_USER_ID";

/// A token that stays valid for at least this long is not refreshed.
pub const TOKEN_MIN_VALIDITY: Duration = Duration::from_secs(30);

/// Path of the OpenID Connect token endpoint relative to a realm.
pub const TOKEN_ENDPOINT_PATH: &str = "protocol/openid-connect/token";
