use std::str::FromStr;

use turnstile_core::error::CoreError;

use crate::auth::jwt::JwtConfig;

/// Where users and sessions are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL at the given connection URL.
    Postgres { database_url: String },
    /// Process-local maps. Everything is lost on restart.
    Memory,
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(CoreError::Configuration(format!(
                "LOG_FORMAT must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Everything except the token secrets has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Per-call storage timeout in seconds (default: `5`).
    pub store_timeout_secs: u64,
    pub storage: StorageBackend,
    /// Adds the `Secure` attribute to the refresh cookie (default: `false`).
    pub cookie_secure: bool,
    pub log_format: LogFormat,
    /// JWT token configuration (secrets, expiry durations).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `5000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `STORE_TIMEOUT_SECS`   | `5`                        |
    /// | `STORAGE_BACKEND`      | `postgres`                 |
    /// | `DATABASE_URL`         | required for `postgres`    |
    /// | `COOKIE_SECURE`        | `false`                    |
    /// | `LOG_FORMAT`           | `pretty`                   |
    ///
    /// Token settings are read by [`JwtConfig::from_env`].
    pub fn from_env() -> Result<Self, CoreError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 5000)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", 30)?;
        let store_timeout_secs: u64 = env_or("STORE_TIMEOUT_SECS", 5)?;

        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "postgres".into());
        let storage = parse_storage(&backend, std::env::var("DATABASE_URL").ok())?;

        let cookie_secure: bool = env_or("COOKIE_SECURE", false)?;
        let log_format: LogFormat = env_or("LOG_FORMAT", LogFormat::Pretty)?;

        let jwt = JwtConfig::from_env()?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            store_timeout_secs,
            storage,
            cookie_secure,
            log_format,
            jwt,
        })
    }
}

fn parse_storage(
    backend: &str,
    database_url: Option<String>,
) -> Result<StorageBackend, CoreError> {
    match backend.to_ascii_lowercase().as_str() {
        "memory" => Ok(StorageBackend::Memory),
        "postgres" => match database_url {
            Some(database_url) if !database_url.is_empty() => {
                Ok(StorageBackend::Postgres { database_url })
            }
            _ => Err(CoreError::Configuration(
                "DATABASE_URL must be set when STORAGE_BACKEND=postgres".into(),
            )),
        },
        other => Err(CoreError::Configuration(format!(
            "STORAGE_BACKEND must be 'postgres' or 'memory', got '{other}'"
        ))),
    }
}

/// Read and parse `name`, falling back to `default` when unset.
pub(crate) fn env_or<T>(name: &str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            CoreError::Configuration(format!("{name} has an invalid value '{raw}': {e}"))
        }),
        Err(_) => Ok(default),
    }
}
