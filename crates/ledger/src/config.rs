//! Ledger configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LEDGER_DATABASE_URL` - `PostgreSQL` connection string
//!
//! ## Optional
//! - `LEDGER_DB_MAX_CONNECTIONS` - Pool size upper bound (default: 10)
//! - `LEDGER_DB_MIN_CONNECTIONS` - Idle connections kept open (default: 2)
//! - `LEDGER_DB_ACQUIRE_TIMEOUT_SECS` - Seconds to wait for a connection (default: 10)

use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 2;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Database configuration for the ledger.
///
/// `Debug` is safe to log: `SecretString` redacts the connection string.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Maximum number of pooled connections
    pub max_connections: u32,
    /// Minimum number of pooled connections
    pub min_connections: u32,
    /// Seconds to wait when acquiring a connection
    pub acquire_timeout_secs: u64,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database URL is missing or a numeric
    /// setting is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`LedgerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("LEDGER_DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("LEDGER_DATABASE_URL".to_owned()))?;

        let max_connections =
            parse_or(&lookup, "LEDGER_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let min_connections =
            parse_or(&lookup, "LEDGER_DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS)?;
        let acquire_timeout_secs = parse_or(
            &lookup,
            "LEDGER_DB_ACQUIRE_TIMEOUT_SECS",
            DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;

        if max_connections == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "LEDGER_DB_MAX_CONNECTIONS".to_owned(),
                "must be at least 1".to_owned(),
            ));
        }
        if min_connections > max_connections {
            return Err(ConfigError::InvalidEnvVar(
                "LEDGER_DB_MIN_CONNECTIONS".to_owned(),
                format!("must not exceed LEDGER_DB_MAX_CONNECTIONS ({max_connections})"),
            ));
        }

        Ok(Self {
            database_url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string())),
    }
}
