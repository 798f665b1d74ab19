//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! cl-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `LEDGER_DATABASE_URL` - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Migrations are embedded from `crates/ledger/migrations/`:
//! ```text
//! migrations/
//! └── 20260101000001_create_ledger_schema.sql
//! ```

use customer_ledger::{LedgerConfig, create_pool, run_migrations};

use super::CommandError;

/// Run the ledger database migrations.
///
/// # Errors
///
/// Returns an error if the configuration is missing, the database cannot be
/// reached, or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let config = LedgerConfig::from_env()?;

    tracing::info!("Connecting to ledger database...");
    let pool = create_pool(&config).await?;

    tracing::info!("Running ledger migrations...");
    run_migrations(&pool).await?;

    tracing::info!("Ledger migrations complete!");
    Ok(())
}
