//! `PostgreSQL` store adapter.
//!
//! # Database
//!
//! All tables live in the `ledger` schema:
//!
//! - `ledger.products` - product catalogue (unique name)
//! - `ledger.customers` - customers (unique email)
//! - `ledger.orders` - orders, foreign keys to customers and products
//!
//! # Migrations
//!
//! Migrations are stored in `crates/ledger/migrations/`, embedded at compile
//! time and run via:
//! ```bash
//! cargo run -p customer-ledger-cli -- migrate
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;

use super::{CustomerRow, OrderRow, ProductRow, RecordStore, Row, RowKind, Statement, StoreSession};
use crate::config::LedgerConfig;
use crate::error::RepositoryError;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Create a `PostgreSQL` connection pool from the ledger configuration.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &LedgerConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(config.database_url.expose_secret())
        .await
}

/// Apply every pending migration to the database behind `pool`.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the applied history diverges.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Store adapter backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgStore {
    type Session = PgSession;

    async fn begin(&self) -> Result<PgSession, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(PgSession { tx })
    }
}

/// A database transaction on a [`PgStore`].
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

/// Bind a statement's parameters in the order its SQL expects them.
fn build(statement: Statement<'_>) -> Query<'_, Postgres, PgArguments> {
    let query = sqlx::query(statement.sql());
    match statement {
        Statement::SelectCustomerById { id } | Statement::DeleteCustomer { id } => query.bind(id),
        Statement::SelectCustomerByEmail { email } => query.bind(email),
        Statement::SelectCustomers | Statement::SelectProducts => query,
        Statement::InsertCustomer { input } => query
            .bind(&input.email)
            .bind(input.first_name.as_str())
            .bind(input.last_name.as_str())
            .bind(input.birth_date),
        Statement::UpdateCustomer { customer } => query
            .bind(customer.id)
            .bind(&customer.email)
            .bind(customer.first_name.as_str())
            .bind(customer.last_name.as_str())
            .bind(customer.birth_date),
        Statement::SelectOrdersByCustomer { customer_id }
        | Statement::DeleteOrdersByCustomer { customer_id } => query.bind(customer_id),
        Statement::InsertOrder {
            customer_id,
            product_id,
            quantity,
        } => query.bind(customer_id).bind(product_id).bind(quantity),
        Statement::UpdateOrder {
            id,
            customer_id,
            product_id,
            quantity,
        } => query
            .bind(id)
            .bind(customer_id)
            .bind(product_id)
            .bind(quantity),
        Statement::DeleteOrder { id } => query.bind(id),
        Statement::SelectProductByName { name } | Statement::InsertProduct { name } => {
            query.bind(name)
        }
    }
}

fn decode(statement: Statement<'_>, row: &PgRow) -> Result<Row, RepositoryError> {
    match statement.row_kind() {
        RowKind::Customer => Ok(Row::Customer(CustomerRow::from_row(row)?)),
        RowKind::Order => Ok(Row::Order(OrderRow::from_row(row)?)),
        RowKind::Product => Ok(Row::Product(ProductRow::from_row(row)?)),
        RowKind::Nothing => Err(RepositoryError::Database(format!(
            "statement {} does not return rows",
            statement.name()
        ))),
    }
}

#[async_trait]
impl StoreSession for PgSession {
    async fn query_one(&mut self, statement: Statement<'_>) -> Result<Row, RepositoryError> {
        debug!(statement = statement.name(), "query_one");
        let row = build(statement)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        decode(statement, &row)
    }

    async fn query_many(&mut self, statement: Statement<'_>) -> Result<Vec<Row>, RepositoryError> {
        debug!(statement = statement.name(), "query_many");
        let rows = build(statement).fetch_all(&mut *self.tx).await?;
        rows.iter().map(|row| decode(statement, row)).collect()
    }

    async fn execute(&mut self, statement: Statement<'_>) -> Result<u64, RepositoryError> {
        debug!(statement = statement.name(), "execute");
        let result = build(statement).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn execute_returning_identity(
        &mut self,
        statement: Statement<'_>,
    ) -> Result<i32, RepositoryError> {
        debug!(statement = statement.name(), "execute_returning_identity");
        let row = build(statement).fetch_one(&mut *self.tx).await?;
        let id: i32 = sqlx::Row::try_get(&row, "id")?;
        Ok(id)
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
