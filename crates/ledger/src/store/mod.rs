//! Store adapter contract.
//!
//! The engine never talks to a database directly. Every read and write goes
//! through a [`StoreSession`] opened on a [`RecordStore`]; a session is a
//! scoped unit of work that is committed only when every statement in it
//! succeeded.
//!
//! Statements are a closed set ([`Statement`]): each variant carries its typed
//! parameters and its SQL text, so no caller-supplied value is ever spliced
//! into a query string. Results come back as typed [`Row`] records decoded
//! from explicit column lists.
//!
//! # Adapters
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, sessions are database transactions
//! - [`MemoryStore`] - in-process tables, used by tests and tooling

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use customer_ledger_core::{CustomerId, Email, OrderId, ProductId};

use crate::error::RepositoryError;
use crate::models::{CreateCustomerInput, Customer, Order, Product};

pub use memory::MemoryStore;
pub use postgres::PgStore;

// =============================================================================
// Statements
// =============================================================================

/// Every statement the engine issues, with its parameters.
#[derive(Debug, Clone, Copy)]
pub enum Statement<'a> {
    /// Point read of a customer by identity.
    SelectCustomerById { id: CustomerId },
    /// Point read of a customer by its unique email.
    SelectCustomerByEmail { email: &'a Email },
    /// Every customer, ascending by identity.
    SelectCustomers,
    /// Insert a customer, returning the stored row.
    InsertCustomer { input: &'a CreateCustomerInput },
    /// Overwrite a customer's scalar attributes and refresh `updated_at`.
    UpdateCustomer { customer: &'a Customer },
    /// Delete a customer row.
    DeleteCustomer { id: CustomerId },
    /// Every order of a customer, ascending by identity.
    SelectOrdersByCustomer { customer_id: CustomerId },
    /// Insert an order, returning the stored row.
    InsertOrder {
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: i32,
    },
    /// Overwrite an order's attributes and refresh `updated_at`.
    ///
    /// With `customer_id` set, only an order owned by that customer matches.
    UpdateOrder {
        id: OrderId,
        customer_id: Option<CustomerId>,
        product_id: ProductId,
        quantity: i32,
    },
    /// Delete an order row.
    DeleteOrder { id: OrderId },
    /// Delete every order of a customer.
    DeleteOrdersByCustomer { customer_id: CustomerId },
    /// Point read of a product by its unique name.
    SelectProductByName { name: &'a str },
    /// Every product, ascending by identity.
    SelectProducts,
    /// Insert a product, returning the stored row.
    InsertProduct { name: &'a str },
}

/// Shape of the rows a statement yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Customer,
    Order,
    Product,
    /// The statement only reports an affected-row count.
    Nothing,
}

impl Statement<'_> {
    /// Stable name used in logs and by test instrumentation.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SelectCustomerById { .. } => "select_customer_by_id",
            Self::SelectCustomerByEmail { .. } => "select_customer_by_email",
            Self::SelectCustomers => "select_customers",
            Self::InsertCustomer { .. } => "insert_customer",
            Self::UpdateCustomer { .. } => "update_customer",
            Self::DeleteCustomer { .. } => "delete_customer",
            Self::SelectOrdersByCustomer { .. } => "select_orders_by_customer",
            Self::InsertOrder { .. } => "insert_order",
            Self::UpdateOrder { .. } => "update_order",
            Self::DeleteOrder { .. } => "delete_order",
            Self::DeleteOrdersByCustomer { .. } => "delete_orders_by_customer",
            Self::SelectProductByName { .. } => "select_product_by_name",
            Self::SelectProducts => "select_products",
            Self::InsertProduct { .. } => "insert_product",
        }
    }

    /// Rows produced by this statement.
    #[must_use]
    pub const fn row_kind(&self) -> RowKind {
        match self {
            Self::SelectCustomerById { .. }
            | Self::SelectCustomerByEmail { .. }
            | Self::SelectCustomers
            | Self::InsertCustomer { .. } => RowKind::Customer,
            Self::SelectOrdersByCustomer { .. } | Self::InsertOrder { .. } => RowKind::Order,
            Self::SelectProductByName { .. } | Self::SelectProducts | Self::InsertProduct { .. } => {
                RowKind::Product
            }
            Self::UpdateCustomer { .. }
            | Self::DeleteCustomer { .. }
            | Self::UpdateOrder { .. }
            | Self::DeleteOrder { .. }
            | Self::DeleteOrdersByCustomer { .. } => RowKind::Nothing,
        }
    }

    /// Parameterized `PostgreSQL` text of this statement.
    #[must_use]
    pub fn sql(&self) -> &'static str {
        // Column lists are spelled out so row decoding never depends on
        // table layout.
        match self {
            Self::SelectCustomerById { .. } => {
                "SELECT id, email, first_name, last_name, birth_date, created_at, updated_at \
                 FROM ledger.customers WHERE id = $1"
            }
            Self::SelectCustomerByEmail { .. } => {
                "SELECT id, email, first_name, last_name, birth_date, created_at, updated_at \
                 FROM ledger.customers WHERE email = $1"
            }
            Self::SelectCustomers => {
                "SELECT id, email, first_name, last_name, birth_date, created_at, updated_at \
                 FROM ledger.customers ORDER BY id ASC"
            }
            Self::InsertCustomer { .. } => {
                "INSERT INTO ledger.customers (email, first_name, last_name, birth_date) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, email, first_name, last_name, birth_date, created_at, updated_at"
            }
            Self::UpdateCustomer { .. } => {
                "UPDATE ledger.customers \
                 SET email = $2, first_name = $3, last_name = $4, birth_date = $5, \
                     updated_at = NOW() \
                 WHERE id = $1"
            }
            Self::DeleteCustomer { .. } => "DELETE FROM ledger.customers WHERE id = $1",
            Self::SelectOrdersByCustomer { .. } => {
                "SELECT id, customer_id, product_id, quantity, created_at, updated_at \
                 FROM ledger.orders WHERE customer_id = $1 ORDER BY id ASC"
            }
            Self::InsertOrder { .. } => {
                "INSERT INTO ledger.orders (customer_id, product_id, quantity) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, customer_id, product_id, quantity, created_at, updated_at"
            }
            Self::UpdateOrder { .. } => {
                "UPDATE ledger.orders \
                 SET product_id = $3, quantity = $4, updated_at = NOW() \
                 WHERE id = $1 AND ($2::INTEGER IS NULL OR customer_id = $2)"
            }
            Self::DeleteOrder { .. } => "DELETE FROM ledger.orders WHERE id = $1",
            Self::DeleteOrdersByCustomer { .. } => {
                "DELETE FROM ledger.orders WHERE customer_id = $1"
            }
            Self::SelectProductByName { .. } => {
                "SELECT id, name FROM ledger.products WHERE name = $1"
            }
            Self::SelectProducts => "SELECT id, name FROM ledger.products ORDER BY id ASC",
            Self::InsertProduct { .. } => {
                "INSERT INTO ledger.products (name) VALUES ($1) RETURNING id, name"
            }
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// Stored customer columns.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: CustomerId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored order columns.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderRow {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored product columns.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: String,
}

/// A row returned by a [`StoreSession`] query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Customer(CustomerRow),
    Order(OrderRow),
    Product(ProductRow),
}

impl Row {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Customer(_) => "customer",
            Self::Order(_) => "order",
            Self::Product(_) => "product",
        }
    }

    fn mismatch(&self, expected: &str) -> RepositoryError {
        RepositoryError::DataCorruption(format!(
            "expected a {expected} row, store returned a {} row",
            self.kind()
        ))
    }

    /// Decode this row as a customer with no orders loaded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the row is not a customer row.
    pub fn into_customer(self) -> Result<Customer, RepositoryError> {
        match self {
            Self::Customer(row) => Ok(Customer {
                id: row.id,
                email: row.email,
                first_name: row.first_name,
                last_name: row.last_name,
                birth_date: row.birth_date,
                orders: Vec::new(),
                created_at: row.created_at,
                updated_at: row.updated_at,
            }),
            other => Err(other.mismatch("customer")),
        }
    }

    /// Decode this row as a persisted order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the row is not an order row.
    pub fn into_order(self) -> Result<Order, RepositoryError> {
        match self {
            Self::Order(row) => Ok(Order {
                id: Some(row.id),
                customer_id: Some(row.customer_id),
                product_id: row.product_id,
                quantity: row.quantity,
                created_at: Some(row.created_at),
                updated_at: Some(row.updated_at),
            }),
            other => Err(other.mismatch("order")),
        }
    }

    /// Decode this row as a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the row is not a product row.
    pub fn into_product(self) -> Result<Product, RepositoryError> {
        match self {
            Self::Product(row) => Ok(Product {
                id: row.id,
                name: row.name,
            }),
            other => Err(other.mismatch("product")),
        }
    }
}

// =============================================================================
// Adapter traits
// =============================================================================

/// A relational backend that can open sessions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Session type produced by [`RecordStore::begin`].
    type Session: StoreSession;

    /// Open a new session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::StoreUnavailable` if the backend cannot be reached.
    async fn begin(&self) -> Result<Self::Session, RepositoryError>;
}

/// A scoped unit of work on a [`RecordStore`].
///
/// Nothing written through a session is visible to other sessions until
/// [`StoreSession::commit`] succeeds. Dropping a session without committing
/// discards its writes.
#[async_trait]
pub trait StoreSession: Send {
    /// Run a query expected to match exactly one row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row matched.
    async fn query_one(&mut self, statement: Statement<'_>) -> Result<Row, RepositoryError>;

    /// Run a query returning rows in statement order.
    ///
    /// # Errors
    ///
    /// Returns the backend failure classified as a `RepositoryError`.
    async fn query_many(&mut self, statement: Statement<'_>) -> Result<Vec<Row>, RepositoryError>;

    /// Run a write, returning the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ConstraintViolation` if the store rejected the write.
    async fn execute(&mut self, statement: Statement<'_>) -> Result<u64, RepositoryError>;

    /// Run an insert, returning the identity the store assigned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ConstraintViolation` if the store rejected the write.
    async fn execute_returning_identity(
        &mut self,
        statement: Statement<'_>,
    ) -> Result<i32, RepositoryError>;

    /// Make every write of this session durable.
    ///
    /// # Errors
    ///
    /// Returns the backend failure if the commit itself failed.
    async fn commit(self) -> Result<(), RepositoryError>;

    /// Discard every write of this session.
    ///
    /// # Errors
    ///
    /// Returns the backend failure if the rollback itself failed.
    async fn rollback(self) -> Result<(), RepositoryError>;
}

/// Commit `session` if `result` is a success, roll it back otherwise.
///
/// A failed rollback is logged; the original failure is what the caller sees.
pub(crate) async fn finish<S, T>(
    session: S,
    result: Result<T, RepositoryError>,
) -> Result<T, RepositoryError>
where
    S: StoreSession,
{
    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                warn!(error = %rollback_err, "rollback failed after {err}");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn customer_row() -> CustomerRow {
        let now = Utc::now();
        CustomerRow {
            id: CustomerId::new(3),
            email: Email::parse("row@example.com").unwrap(),
            first_name: "Row".to_owned(),
            last_name: "Decoder".to_owned(),
            birth_date: NaiveDate::from_ymd_opt(1980, 2, 29).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_customer_row_keeps_typed_columns() {
        let row = customer_row();
        let customer = Row::Customer(row.clone()).into_customer().unwrap();

        assert_eq!(customer.id, row.id);
        assert_eq!(customer.email, row.email);
        assert_eq!(customer.birth_date, row.birth_date);
        assert!(customer.orders.is_empty());
    }

    #[test]
    fn test_order_row_is_persisted_order() {
        let now = Utc::now();
        let order = Row::Order(OrderRow {
            id: OrderId::new(9),
            customer_id: CustomerId::new(3),
            product_id: ProductId::new(2),
            quantity: 4,
            created_at: now,
            updated_at: now,
        })
        .into_order()
        .unwrap();

        assert_eq!(order.persisted_id(), Some(OrderId::new(9)));
        assert_eq!(order.customer_id, Some(CustomerId::new(3)));
        assert_eq!(order.created_at, Some(now));
    }

    #[test]
    fn test_row_kind_mismatch_is_data_corruption() {
        let err = Row::Customer(customer_row()).into_product().unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }

    #[test]
    fn test_write_statements_return_no_rows() {
        let statement = Statement::DeleteOrder {
            id: OrderId::new(1),
        };
        assert_eq!(statement.row_kind(), RowKind::Nothing);
        assert_eq!(statement.name(), "delete_order");
    }
}
