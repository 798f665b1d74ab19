//! Customer lookups.
//!
//! Every lookup returns fully hydrated aggregates: the customer row plus its
//! orders, read with the same ordered query `refresh` uses.

use tracing::{debug, instrument};

use customer_ledger_core::{CustomerId, Email};

use crate::error::RepositoryError;
use crate::models::Customer;
use crate::store::{RecordStore, Row, Statement, StoreSession, finish};
use crate::sync::{hydrate, load_orders};

/// Read-only access to customer aggregates.
pub struct CustomerLookup<'a, S> {
    store: &'a S,
}

impl<'a, S: RecordStore> CustomerLookup<'a, S> {
    /// Create a new customer lookup.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Get a customer and its orders by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no customer has this ID.
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: CustomerId) -> Result<Customer, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = hydrate(&mut session, id).await;
        finish(session, result).await
    }

    /// Get a customer and its orders by email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no customer has this email.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    #[instrument(skip(self, email), fields(email = %email))]
    pub async fn find_by_email(&self, email: &Email) -> Result<Customer, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = by_email(&mut session, email).await;
        finish(session, result).await
    }

    /// List every customer ascending by ID, each with its orders.
    ///
    /// Orders are read with one query per customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Customer>, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = all(&mut session).await;
        let customers = finish(session, result).await?;

        debug!(count = customers.len(), "listed customers");
        Ok(customers)
    }
}

async fn by_email<S>(session: &mut S, email: &Email) -> Result<Customer, RepositoryError>
where
    S: StoreSession,
{
    let mut customer = session
        .query_one(Statement::SelectCustomerByEmail { email })
        .await?
        .into_customer()?;
    customer.orders = load_orders(session, customer.id).await?;
    Ok(customer)
}

async fn all<S>(session: &mut S) -> Result<Vec<Customer>, RepositoryError>
where
    S: StoreSession,
{
    let rows = session.query_many(Statement::SelectCustomers).await?;

    let mut customers = Vec::with_capacity(rows.len());
    for row in rows {
        let mut customer = Row::into_customer(row)?;
        customer.orders = load_orders(session, customer.id).await?;
        customers.push(customer);
    }
    Ok(customers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{CreateCustomerInput, Order};
    use crate::store::MemoryStore;
    use crate::sync::CustomerRepository;

    fn input(email: &str) -> CreateCustomerInput {
        CreateCustomerInput {
            email: Email::parse(email).unwrap(),
            first_name: "Test".to_owned(),
            last_name: "User".to_owned(),
            birth_date: NaiveDate::from_ymd_opt(1985, 6, 15).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_missing_email_is_not_found() {
        let store = MemoryStore::new();
        let lookup = CustomerLookup::new(&store);

        let email = Email::parse("missing@example.com").unwrap();
        let err = lookup.find_by_email(&email).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_missing_id_is_not_found() {
        let store = MemoryStore::new();
        let lookup = CustomerLookup::new(&store);

        let err = lookup.find_by_id(CustomerId::new(1)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_list_all_on_empty_store() {
        let store = MemoryStore::new();
        let lookup = CustomerLookup::new(&store);

        assert!(lookup.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookups_hydrate_orders() {
        let store = MemoryStore::new();
        let product = store.seed_product("Pineapple").unwrap();
        let repo = CustomerRepository::new(&store);

        let mut customer = repo.create(&input("orders@example.com")).await.unwrap();
        customer.orders = vec![Order::new(product, 1), Order::new(product, 2)];
        repo.commit(&mut customer).await.unwrap();

        let lookup = CustomerLookup::new(&store);
        let by_id = lookup.find_by_id(customer.id).await.unwrap();
        let by_email = lookup.find_by_email(&customer.email).await.unwrap();

        assert_eq!(by_id, by_email);
        assert_eq!(by_id.orders.len(), 2);
        assert_eq!(by_id.orders[0].quantity, 1);
        assert_eq!(by_id.orders[1].quantity, 2);
    }

    #[tokio::test]
    async fn test_list_all_reads_orders_per_customer() {
        let store = MemoryStore::new();
        let product = store.seed_product("Mango").unwrap();
        let repo = CustomerRepository::new(&store);

        let mut first = repo.create(&input("first@example.com")).await.unwrap();
        let second = repo.create(&input("second@example.com")).await.unwrap();
        first.orders.push(Order::new(product, 10));
        repo.commit(&mut first).await.unwrap();

        store.clear_statements().unwrap();
        let customers = CustomerLookup::new(&store).list_all().await.unwrap();

        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0].id, first.id);
        assert_eq!(customers[1].id, second.id);
        assert_eq!(customers[0].orders.len(), 1);
        assert!(customers[1].orders.is_empty());
        assert_eq!(
            store.statements().unwrap(),
            vec![
                "select_customers",
                "select_orders_by_customer",
                "select_orders_by_customer",
            ]
        );
    }
}
