//! Command implementations.
//!
//! Every command loads [`LedgerConfig`] from the environment, opens a pool,
//! and prints its result to stdout as pretty JSON.

pub mod customer;
pub mod migrate;
pub mod order;
pub mod seed;

use serde::Serialize;
use thiserror::Error;

use customer_ledger::{ConfigError, EmailError, LedgerConfig, PgStore, RepositoryError, create_pool};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A repository operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The customer has no order with this ID.
    #[error("Customer {customer} has no order {order}")]
    UnknownOrder { customer: i32, order: i32 },

    /// Seed file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Seed file is not valid YAML for its target.
    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Seed file parsed but failed validation.
    #[error("{0} validation errors found")]
    Validation(usize),

    /// Output could not be serialized.
    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connect to the ledger database described by the environment.
async fn connect() -> Result<PgStore, CommandError> {
    let config = LedgerConfig::from_env()?;

    tracing::info!("Connecting to ledger database...");
    let pool = create_pool(&config).await?;
    Ok(PgStore::new(pool))
}

/// Print a value to stdout as pretty JSON.
fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let output = serde_json::to_string_pretty(value)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{output}");
    }
    Ok(())
}
