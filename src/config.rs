//! Process configuration read from the environment.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use time::Duration;

use crate::identity::DEFAULT_USERINFO_URL;
use crate::token::DEFAULT_TOKEN_TTL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub token_ttl: Duration,
    /// Period of the expired-document sweep.
    pub cleanup_interval: std::time::Duration,
    pub identity_userinfo_url: String,
    pub db_max_connections: u32,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000)))?;
        let token_ttl_secs = parse_or(&lookup, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL.whole_seconds())?;
        if token_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_SECS",
                value: token_ttl_secs.to_string(),
                reason: "must be positive".into(),
            });
        }
        let cleanup_secs: u64 = parse_or(&lookup, "CLEANUP_INTERVAL_SECS", 60)?;
        if cleanup_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "CLEANUP_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            database_url,
            bind_addr,
            token_ttl: Duration::seconds(token_ttl_secs),
            cleanup_interval: std::time::Duration::from_secs(cleanup_secs),
            identity_userinfo_url: lookup("IDENTITY_USERINFO_URL")
                .unwrap_or_else(|| DEFAULT_USERINFO_URL.to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}
