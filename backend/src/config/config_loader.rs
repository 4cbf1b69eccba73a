use anyhow::{Context, Result, bail};
use std::str::FromStr;

use super::config_model::{AdminSecret, Database, DotEnvyConfig, Server};

const DEFAULT_BODY_LIMIT_MIB: u64 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: required_or("SERVER_PORT", "PORT")?
            .trim()
            .parse()
            .context("SERVER_PORT is invalid")?,
        body_limit: optional("SERVER_BODY_LIMIT", DEFAULT_BODY_LIMIT_MIB)?,
        timeout: optional("SERVER_TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
    };

    server.body_limit_bytes()?;

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
    };

    Ok(DotEnvyConfig {
        server,
        database,
        admin: get_admin_secret()?,
    })
}

pub fn get_admin_secret() -> Result<AdminSecret> {
    dotenvy::dotenv().ok();

    let secret = required("SECRET_KEY")?;
    if secret.trim().is_empty() {
        bail!("SECRET_KEY must not be empty");
    }

    Ok(AdminSecret { secret })
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

/// `primary`, or `fallback` when `primary` is unset.
fn required_or(primary: &str, fallback: &str) -> Result<String> {
    required(primary).or_else(|_| {
        std::env::var(fallback).with_context(|| format!("{primary} (or {fallback}) is invalid"))
    })
}

fn optional<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid")),
        Err(_) => Ok(default),
    }
}
