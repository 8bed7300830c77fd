//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Credentials are never read from the TOML itself: the Basic token comes
//! from KARAVAN_BASIC_TOKEN, basic_token_file, or basic_user plus
//! KARAVAN_BASIC_PASSWORD; OIDC tokens come from KARAVAN_OIDC_ACCESS_TOKEN
//! and KARAVAN_OIDC_REFRESH_TOKEN.

use common::Secret;
use gateway::{BasicToken, ClientSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BASIC_TOKEN_ENV: &str = "KARAVAN_BASIC_TOKEN";
pub const BASIC_PASSWORD_ENV: &str = "KARAVAN_BASIC_PASSWORD";
pub const OIDC_ACCESS_TOKEN_ENV: &str = "KARAVAN_OIDC_ACCESS_TOKEN";
pub const OIDC_REFRESH_TOKEN_ENV: &str = "KARAVAN_OIDC_REFRESH_TOKEN";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend connection settings
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Credential sources and refresh budget
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// User name for Basic auth; the password comes from KARAVAN_BASIC_PASSWORD.
    #[serde(default)]
    pub basic_user: Option<String>,
    /// File holding a pre-encoded Basic token.
    #[serde(default)]
    pub basic_token_file: Option<PathBuf>,
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
    #[serde(skip)]
    pub basic_token: Option<BasicToken>,
    #[serde(skip)]
    pub oidc_access_token: Option<Secret<String>>,
    #[serde(skip)]
    pub oidc_refresh_token: Option<Secret<String>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            basic_user: None,
            basic_token_file: None,
            refresh_timeout_secs: default_refresh_timeout(),
            basic_token: None,
            oidc_access_token: None,
            oidc_refresh_token: None,
        }
    }
}

/// Where the anonymous user id and other flags are persisted
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

fn default_refresh_timeout() -> u64 {
    10
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("karavan-cli-state.json")
}

impl Config {
    /// Load configuration from a TOML file, then resolve credentials from the
    /// environment and secret files.
    ///
    /// Basic token resolution order:
    /// 1. KARAVAN_BASIC_TOKEN env var (pre-encoded)
    /// 2. basic_token_file contents (pre-encoded)
    /// 3. basic_user + KARAVAN_BASIC_PASSWORD (encoded here)
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.backend.base_url.starts_with("http://")
            && !config.backend.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.backend.base_url
            )));
        }

        if config.backend.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.auth.refresh_timeout_secs == 0 {
            return Err(common::Error::Config(
                "refresh_timeout_secs must be greater than 0".into(),
            ));
        }

        config.auth.basic_token = resolve_basic_token(&config.auth)?;
        config.auth.oidc_access_token = non_empty_env(OIDC_ACCESS_TOKEN_ENV).map(Secret::new);
        config.auth.oidc_refresh_token = non_empty_env(OIDC_REFRESH_TOKEN_ENV).map(Secret::new);

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("karavan-cli.toml")
    }

    pub fn client_settings(&self) -> ClientSettings {
        let mut settings = ClientSettings::new(self.backend.base_url.clone());
        settings.timeout = Duration::from_secs(self.backend.timeout_secs);
        settings.refresh_timeout = Duration::from_secs(self.auth.refresh_timeout_secs);
        settings
    }
}

fn resolve_basic_token(auth: &AuthConfig) -> common::Result<Option<BasicToken>> {
    if let Some(token) = non_empty_env(BASIC_TOKEN_ENV) {
        return Ok(Some(BasicToken::new(token)));
    }

    if let Some(ref token_file) = auth.basic_token_file {
        let token = std::fs::read_to_string(token_file).map_err(|e| {
            common::Error::Config(format!(
                "failed to read basic_token_file {}: {e}",
                token_file.display()
            ))
        })?;
        let token = token.trim();
        if !token.is_empty() {
            return Ok(Some(BasicToken::new(token)));
        }
    }

    if let Some(ref user) = auth.basic_user {
        let password = non_empty_env(BASIC_PASSWORD_ENV)
            .ok_or_else(|| common::Error::MissingSecret(BASIC_PASSWORD_ENV.into()))?;
        return Ok(Some(BasicToken::encode(user, &password)));
    }

    Ok(None)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
