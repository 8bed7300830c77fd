//! Karavan console client
//!
//! Connects to a Karavan backend through the auth-aware gateway:
//! 1. Checks backend readiness
//! 2. Discovers the auth mode (public, basic, oidc) and installs credentials
//! 3. Resolves the current user and the user id used to tag shared config
//! 4. Runs the requested command
//!
//! Usage: `karavan-cli [--config <path>] [status | user-id | get <path>]`

mod config;
mod startup;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use gateway::{Gateway, SessionContext};
use identity::FileStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Print the startup summary as JSON.
    Status,
    UserId,
    /// GET a backend path and print the JSON body.
    Get(String),
}

struct Args {
    config_path: Option<String>,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config_path = Some(path.clone());
        } else {
            positional.push(arg.as_str());
        }
    }

    let command = match positional.as_slice() {
        [] | ["status"] => Command::Status,
        ["user-id"] => Command::UserId,
        ["get", path] => Command::Get(path.to_string()),
        ["get"] => bail!("get requires a backend path, e.g. `get /ui/project`"),
        other => bail!("unknown command: {}", other.join(" ")),
    };

    Ok(Args {
        config_path,
        command,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let args = parse_args(&args)?;

    let config_path = Config::resolve_path(args.config_path.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.backend.base_url,
        timeout_secs = config.backend.timeout_secs,
        storage = %config.storage.path.display(),
        basic_token = config.auth.basic_token.is_some(),
        oidc_tokens = config.auth.oidc_access_token.is_some(),
        "configuration loaded"
    );

    let store = FileStore::load(config.storage.path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open state file {}",
                config.storage.path.display()
            )
        })?;
    let session = Arc::new(SessionContext::new(Arc::new(store)));
    if let Some(token) = config.auth.basic_token.clone() {
        session.set_basic_token(token).await;
    }

    let gateway = Gateway::new(config.client_settings(), session);

    let mut errors = gateway.subscribe_errors();
    tokio::spawn(async move {
        while let Ok(event) = errors.recv().await {
            warn!(
                method = %event.method,
                path = %event.path,
                status = event.status,
                kind = event.kind,
                message = %event.message,
                "backend request failed"
            );
        }
    });

    let summary = startup::run(&gateway, &config.auth).await?;

    match args.command {
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::UserId => match summary.user_id {
            Some(id) => println!("{id}"),
            None => bail!("no user id available for this session"),
        },
        Command::Get(path) => {
            let body: serde_json::Value = gateway
                .get_json(&path)
                .await
                .with_context(|| format!("GET {path} failed"))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("karavan-cli")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_to_status() {
        let parsed = parse_args(&args(&[])).unwrap();
        assert_eq!(parsed.command, Command::Status);
        assert!(parsed.config_path.is_none());
    }

    #[test]
    fn config_flag_anywhere() {
        let parsed = parse_args(&args(&["user-id", "--config", "/etc/karavan.toml"])).unwrap();
        assert_eq!(parsed.command, Command::UserId);
        assert_eq!(parsed.config_path.as_deref(), Some("/etc/karavan.toml"));
    }

    #[test]
    fn get_takes_a_path() {
        let parsed = parse_args(&args(&["get", "/ui/project"])).unwrap();
        assert_eq!(parsed.command, Command::Get("/ui/project".into()));
        assert!(parse_args(&args(&["get"])).is_err());
    }

    #[test]
    fn config_flag_without_value_is_rejected() {
        assert!(parse_args(&args(&["--config"])).is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = parse_args(&args(&["deploy", "now"])).err().unwrap();
        assert!(err.to_string().contains("deploy now"));
    }
}
