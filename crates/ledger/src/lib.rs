//! Customer Ledger - aggregate persistence for customers and their orders.
//!
//! A [`Customer`] owns an ordered list of [`Order`]s. Callers edit that list
//! freely in memory and hand the whole aggregate to
//! [`CustomerRepository::commit`], which diffs it against what is stored and
//! issues the minimal deletes, updates and inserts inside one transaction.
//!
//! # Architecture
//!
//! - [`differ`] - pure child-set reconciliation, no I/O
//! - [`sync`] - create/refresh/commit/delete of whole aggregates
//! - [`lookup`] - hydrated reads by ID, by email, and of every customer
//! - [`orders`] / [`products`] - single-row operations outside the aggregate
//! - [`store`] - the adapter contract plus `PostgreSQL` and in-memory adapters
//!
//! # Example
//!
//! ```rust,ignore
//! let store = PgStore::new(create_pool(&LedgerConfig::from_env()?).await?);
//! let repo = CustomerRepository::new(&store);
//!
//! let mut customer = repo.create(&input).await?;
//! customer.orders.push(Order::new(product.id, 3));
//! repo.commit(&mut customer).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod differ;
pub mod error;
pub mod lookup;
pub mod models;
pub mod orders;
pub mod products;
pub mod store;
pub mod sync;

pub use config::{ConfigError, LedgerConfig};
pub use differ::{OrderDiff, diff_orders};
pub use error::RepositoryError;
pub use lookup::CustomerLookup;
pub use models::{CreateCustomerInput, Customer, Order, Product};
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use store::postgres::{MIGRATOR, create_pool, run_migrations};
pub use store::{MemoryStore, PgStore, RecordStore, StoreSession};
pub use sync::{CommitSummary, CustomerRepository};

pub use customer_ledger_core::{CustomerId, Email, EmailError, OrderId, ProductId};
