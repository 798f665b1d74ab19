//! In-process store adapter.
//!
//! Keeps the three ledger tables in ordered maps behind a mutex and enforces
//! the same constraints the `PostgreSQL` schema declares: unique customer
//! email, unique product name, order foreign keys and non-negative
//! quantities. Identities come from store-wide sequences that are never
//! rewound, so a rolled-back insert does not hand its identity out again.
//!
//! Sessions are serialized: [`RecordStore::begin`] waits until the previous
//! session committed or was dropped. A session works on a private copy of the
//! tables and publishes it on commit, which is safe because no other session
//! can write in between. A task must not open a second session while it
//! still holds one.
//!
//! The store also records the names of the most recent statements and can be
//! told to fail a given statement, which lets tests observe statement order
//! and exercise rollback paths.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use customer_ledger_core::{CustomerId, OrderId, ProductId};

use super::{CustomerRow, OrderRow, ProductRow, RecordStore, Row, Statement, StoreSession};
use crate::error::RepositoryError;

/// Number of statement names kept by [`MemoryStore::statements`].
const STATEMENT_LOG_LIMIT: usize = 1024;

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: BTreeMap<CustomerId, CustomerRow>,
    orders: BTreeMap<OrderId, OrderRow>,
    products: BTreeMap<ProductId, ProductRow>,
}

#[derive(Debug, Default)]
struct Sequences {
    customer: i32,
    order: i32,
    product: i32,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Tables,
    sequences: Sequences,
    statements: VecDeque<&'static str>,
    failures: Vec<&'static str>,
}

/// Store adapter holding every table in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
    gate: Arc<AsyncMutex<()>>,
}

fn lock(shared: &Mutex<Shared>) -> Result<MutexGuard<'_, Shared>, RepositoryError> {
    shared
        .lock()
        .map_err(|_| RepositoryError::StoreUnavailable("memory store lock poisoned".to_owned()))
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a product directly, outside of any session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ConstraintViolation` if the name is taken.
    /// Returns `RepositoryError::StoreUnavailable` while a session is open.
    pub fn seed_product(&self, name: &str) -> Result<ProductId, RepositoryError> {
        let _gate = self.gate.try_lock().map_err(|_| {
            RepositoryError::StoreUnavailable("cannot seed while a session is open".to_owned())
        })?;
        let mut shared = lock(&self.shared)?;
        let Shared {
            tables, sequences, ..
        } = &mut *shared;
        let row = insert_product(tables, sequences, name)?;
        Ok(row.id)
    }

    /// Make the next statement with this name fail with
    /// `RepositoryError::StoreUnavailable`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::StoreUnavailable` if the store lock is poisoned.
    pub fn fail_on(&self, statement: &'static str) -> Result<(), RepositoryError> {
        lock(&self.shared)?.failures.push(statement);
        Ok(())
    }

    /// Names of the most recent statements, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::StoreUnavailable` if the store lock is poisoned.
    pub fn statements(&self) -> Result<Vec<&'static str>, RepositoryError> {
        Ok(lock(&self.shared)?.statements.iter().copied().collect())
    }

    /// Forget the recorded statement names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::StoreUnavailable` if the store lock is poisoned.
    pub fn clear_statements(&self) -> Result<(), RepositoryError> {
        lock(&self.shared)?.statements.clear();
        Ok(())
    }

    /// Number of committed order rows across all customers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::StoreUnavailable` if the store lock is poisoned.
    pub fn order_count(&self) -> Result<usize, RepositoryError> {
        Ok(lock(&self.shared)?.tables.orders.len())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    type Session = MemorySession;

    async fn begin(&self) -> Result<MemorySession, RepositoryError> {
        let gate = Arc::clone(&self.gate).lock_owned().await;
        let working = lock(&self.shared)?.tables.clone();
        Ok(MemorySession {
            shared: Arc::clone(&self.shared),
            working,
            _gate: gate,
        })
    }
}

/// A session on a [`MemoryStore`].
///
/// Holds the store's session gate until it is committed or dropped.
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<Mutex<Shared>>,
    working: Tables,
    _gate: OwnedMutexGuard<()>,
}

/// Everything a statement produced; each session method picks its part.
#[derive(Debug, Default)]
struct Outcome {
    rows: Vec<Row>,
    affected: u64,
}

fn violation(constraint: &str, detail: &str) -> RepositoryError {
    RepositoryError::ConstraintViolation(format!("{constraint}: {detail}"))
}

fn insert_product(
    tables: &mut Tables,
    sequences: &mut Sequences,
    name: &str,
) -> Result<ProductRow, RepositoryError> {
    if tables.products.values().any(|p| p.name == name) {
        return Err(violation("products_name_key", "duplicate product name"));
    }
    sequences.product += 1;
    let row = ProductRow {
        id: ProductId::new(sequences.product),
        name: name.to_owned(),
    };
    tables.products.insert(row.id, row.clone());
    Ok(row)
}

fn check_order_refs(
    tables: &Tables,
    customer_id: Option<CustomerId>,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    if let Some(customer_id) = customer_id
        && !tables.customers.contains_key(&customer_id)
    {
        return Err(violation("orders_customer_id_fkey", "customer does not exist"));
    }
    if !tables.products.contains_key(&product_id) {
        return Err(violation("orders_product_id_fkey", "product does not exist"));
    }
    if quantity < 0 {
        return Err(violation("orders_quantity_check", "quantity must not be negative"));
    }
    Ok(())
}

impl Tables {
    #[allow(clippy::too_many_lines)]
    fn run(
        &mut self,
        statement: Statement<'_>,
        sequences: &mut Sequences,
    ) -> Result<Outcome, RepositoryError> {
        let now = Utc::now();
        let mut outcome = Outcome::default();

        match statement {
            Statement::SelectCustomerById { id } => {
                outcome
                    .rows
                    .extend(self.customers.get(&id).cloned().map(Row::Customer));
            }
            Statement::SelectCustomerByEmail { email } => {
                outcome.rows.extend(
                    self.customers
                        .values()
                        .filter(|c| &c.email == email)
                        .cloned()
                        .map(Row::Customer),
                );
            }
            Statement::SelectCustomers => {
                outcome
                    .rows
                    .extend(self.customers.values().cloned().map(Row::Customer));
            }
            Statement::InsertCustomer { input } => {
                if self.customers.values().any(|c| c.email == input.email) {
                    return Err(violation("customers_email_key", "duplicate email"));
                }
                sequences.customer += 1;
                let row = CustomerRow {
                    id: CustomerId::new(sequences.customer),
                    email: input.email.clone(),
                    first_name: input.first_name.clone(),
                    last_name: input.last_name.clone(),
                    birth_date: input.birth_date,
                    created_at: now,
                    updated_at: now,
                };
                self.customers.insert(row.id, row.clone());
                outcome.rows.push(Row::Customer(row));
                outcome.affected = 1;
            }
            Statement::UpdateCustomer { customer } => {
                if self
                    .customers
                    .values()
                    .any(|c| c.id != customer.id && c.email == customer.email)
                {
                    return Err(violation("customers_email_key", "duplicate email"));
                }
                if let Some(row) = self.customers.get_mut(&customer.id) {
                    row.email.clone_from(&customer.email);
                    row.first_name.clone_from(&customer.first_name);
                    row.last_name.clone_from(&customer.last_name);
                    row.birth_date = customer.birth_date;
                    row.updated_at = now;
                    outcome.affected = 1;
                }
            }
            Statement::DeleteCustomer { id } => {
                if self.orders.values().any(|o| o.customer_id == id) {
                    return Err(violation(
                        "orders_customer_id_fkey",
                        "customer is still referenced by orders",
                    ));
                }
                outcome.affected = u64::from(self.customers.remove(&id).is_some());
            }
            Statement::SelectOrdersByCustomer { customer_id } => {
                outcome.rows.extend(
                    self.orders
                        .values()
                        .filter(|o| o.customer_id == customer_id)
                        .cloned()
                        .map(Row::Order),
                );
            }
            Statement::InsertOrder {
                customer_id,
                product_id,
                quantity,
            } => {
                check_order_refs(self, Some(customer_id), product_id, quantity)?;
                sequences.order += 1;
                let row = OrderRow {
                    id: OrderId::new(sequences.order),
                    customer_id,
                    product_id,
                    quantity,
                    created_at: now,
                    updated_at: now,
                };
                self.orders.insert(row.id, row.clone());
                outcome.rows.push(Row::Order(row));
                outcome.affected = 1;
            }
            Statement::UpdateOrder {
                id,
                customer_id,
                product_id,
                quantity,
            } => {
                let matches = self
                    .orders
                    .get(&id)
                    .is_some_and(|o| customer_id.is_none_or(|owner| owner == o.customer_id));
                if matches {
                    check_order_refs(self, None, product_id, quantity)?;
                    if let Some(row) = self.orders.get_mut(&id) {
                        row.product_id = product_id;
                        row.quantity = quantity;
                        row.updated_at = now;
                        outcome.affected = 1;
                    }
                }
            }
            Statement::DeleteOrder { id } => {
                outcome.affected = u64::from(self.orders.remove(&id).is_some());
            }
            Statement::DeleteOrdersByCustomer { customer_id } => {
                let before = self.orders.len();
                self.orders.retain(|_, o| o.customer_id != customer_id);
                outcome.affected = (before - self.orders.len()) as u64;
            }
            Statement::SelectProductByName { name } => {
                outcome.rows.extend(
                    self.products
                        .values()
                        .filter(|p| p.name == name)
                        .cloned()
                        .map(Row::Product),
                );
            }
            Statement::SelectProducts => {
                outcome
                    .rows
                    .extend(self.products.values().cloned().map(Row::Product));
            }
            Statement::InsertProduct { name } => {
                let row = insert_product(self, sequences, name)?;
                outcome.rows.push(Row::Product(row));
                outcome.affected = 1;
            }
        }

        Ok(outcome)
    }
}

impl MemorySession {
    fn run(&mut self, statement: Statement<'_>) -> Result<Outcome, RepositoryError> {
        let name = statement.name();
        debug!(statement = name, "memory store");

        let mut shared = lock(&self.shared)?;
        if shared.statements.len() == STATEMENT_LOG_LIMIT {
            shared.statements.pop_front();
        }
        shared.statements.push_back(name);
        if let Some(pos) = shared.failures.iter().position(|f| *f == name) {
            shared.failures.remove(pos);
            return Err(RepositoryError::StoreUnavailable(format!(
                "injected failure on {name}"
            )));
        }

        self.working.run(statement, &mut shared.sequences)
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn query_one(&mut self, statement: Statement<'_>) -> Result<Row, RepositoryError> {
        self.run(statement)?
            .rows
            .into_iter()
            .next()
            .ok_or(RepositoryError::NotFound)
    }

    async fn query_many(&mut self, statement: Statement<'_>) -> Result<Vec<Row>, RepositoryError> {
        Ok(self.run(statement)?.rows)
    }

    async fn execute(&mut self, statement: Statement<'_>) -> Result<u64, RepositoryError> {
        Ok(self.run(statement)?.affected)
    }

    async fn execute_returning_identity(
        &mut self,
        statement: Statement<'_>,
    ) -> Result<i32, RepositoryError> {
        let name = statement.name();
        match self.run(statement)?.rows.into_iter().next() {
            Some(Row::Customer(row)) => Ok(row.id.as_i32()),
            Some(Row::Order(row)) => Ok(row.id.as_i32()),
            Some(Row::Product(row)) => Ok(row.id.as_i32()),
            None => Err(RepositoryError::Database(format!(
                "statement {name} did not return an identity"
            ))),
        }
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        lock(&self.shared)?.tables = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
