//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::PrincipalId;
use domain::{Principal, Role};
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but its value cannot be used.
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A bearer token and the principal it authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    pub principal: Principal,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; when unset the server
///   runs on an in-memory store seeded with a demo catalog
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `ORDER_PLACEMENT_TIMEOUT_MS`: per-placement time limit, `0` disables
///   it (default: `5000`)
/// - `API_TOKENS`: comma-separated `token:principal-uuid:role` entries
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub placement_timeout: Option<Duration>,
    pub api_tokens: Vec<TokenGrant>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => defaults.log_format,
            Some(format) if format == "text" => LogFormat::Text,
            Some(format) if format == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "LOG_FORMAT",
                    reason: format!("expected 'text' or 'json', got '{other}'"),
                });
            }
        };

        let placement_timeout = match get("ORDER_PLACEMENT_TIMEOUT_MS") {
            None => defaults.placement_timeout,
            Some(raw) => match parse_number::<u64>("ORDER_PLACEMENT_TIMEOUT_MS", &raw)? {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: get("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: match get("DATABASE_MAX_CONNECTIONS") {
                Some(raw) => parse_number("DATABASE_MAX_CONNECTIONS", &raw)?,
                None => defaults.database_max_connections,
            },
            placement_timeout,
            api_tokens: match get("API_TOKENS") {
                Some(raw) => parse_tokens(&raw)?,
                None => Vec::new(),
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            placement_timeout: Some(Duration::from_millis(5000)),
            api_tokens: Vec::new(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        })
}

fn parse_tokens(raw: &str) -> Result<Vec<TokenGrant>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: "API_TOKENS",
        reason,
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let (Some(token), Some(id), Some(role)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(invalid(format!(
                    "expected token:principal-uuid:role, got '{entry}'"
                )));
            };
            if token.is_empty() {
                return Err(invalid("empty token".to_string()));
            }
            let id = PrincipalId::parse(id).map_err(|e| invalid(format!("'{id}': {e}")))?;
            let role: Role = role.parse().map_err(invalid)?;

            Ok(TokenGrant {
                token: token.to_string(),
                principal: Principal::new(id, role),
            })
        })
        .collect()
}
