//! Aggregate synchronizer.
//!
//! Moves whole customer aggregates between memory and the store:
//! [`CustomerRepository::refresh`] pulls a customer and its orders,
//! [`CustomerRepository::commit`] pushes scalar attributes and reconciles the
//! order collection through the [differ](crate::differ).
//!
//! `commit` and `delete` run inside a single store session. The session is
//! committed only after every statement succeeded; on any failure it is
//! rolled back and the store keeps its previous state.

use serde::Serialize;
use tracing::{info, instrument};

use customer_ledger_core::{CustomerId, OrderId};

use crate::differ::diff_orders;
use crate::error::RepositoryError;
use crate::models::{CreateCustomerInput, Customer, Order};
use crate::store::{RecordStore, Row, Statement, StoreSession, finish};

/// What a [`CustomerRepository::commit`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    /// Persisted orders removed because they were no longer desired.
    pub deleted: usize,
    /// Persisted orders rewritten from memory.
    pub updated: usize,
    /// Orders inserted with a freshly assigned identity.
    pub inserted: usize,
}

/// Read every order of `customer_id`, ascending by identity.
pub(crate) async fn load_orders<S>(
    session: &mut S,
    customer_id: CustomerId,
) -> Result<Vec<Order>, RepositoryError>
where
    S: StoreSession,
{
    session
        .query_many(Statement::SelectOrdersByCustomer { customer_id })
        .await?
        .into_iter()
        .map(Row::into_order)
        .collect()
}

/// Repository for whole-aggregate customer operations.
pub struct CustomerRepository<'a, S> {
    store: &'a S,
}

impl<'a, S: RecordStore> CustomerRepository<'a, S> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Insert a new customer and return it with no orders.
    ///
    /// Identity and timestamps come back from the insert itself.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ConstraintViolation` if the email already exists.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: &CreateCustomerInput) -> Result<Customer, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = session
            .query_one(Statement::InsertCustomer { input })
            .await
            .and_then(Row::into_customer);
        let customer = finish(session, result).await?;

        info!(customer_id = %customer.id, "created customer");
        Ok(customer)
    }

    /// Overwrite `customer` with its persisted state.
    ///
    /// Unsaved order edits are discarded; commit first to keep them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer no longer exists.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn refresh(&self, customer: &mut Customer) -> Result<(), RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = hydrate(&mut session, customer.id).await;
        *customer = finish(session, result).await?;
        Ok(())
    }

    /// Make the store match `customer`: scalar attributes, then orders.
    ///
    /// Orders absent from `customer.orders` are deleted, matched ones are
    /// updated and pending ones inserted, in that order. On success the new
    /// identities are written back into `customer.orders` and orders that
    /// lost to a later duplicate of their identity are removed from it, so
    /// committing the same aggregate again inserts nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Inconsistent` if the customer or a matched
    /// order vanished, `RepositoryError::ConstraintViolation` if the store
    /// rejected a write. Nothing is persisted on error.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id, orders = customer.orders.len()))]
    pub async fn commit(&self, customer: &mut Customer) -> Result<CommitSummary, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = reconcile(&mut session, customer).await;
        let Reconciled {
            summary,
            assigned,
            dropped,
        } = finish(session, result).await?;

        for (position, id) in assigned {
            if let Some(order) = customer.orders.get_mut(position) {
                order.id = Some(id);
            }
        }
        if !dropped.is_empty() {
            let mut position = 0;
            customer.orders.retain(|_| {
                let keep = !dropped.contains(&position);
                position += 1;
                keep
            });
        }
        for order in &mut customer.orders {
            if !order.is_pending() {
                order.customer_id = Some(customer.id);
            }
        }

        info!(
            deleted = summary.deleted,
            updated = summary.updated,
            inserted = summary.inserted,
            "committed customer"
        );
        Ok(summary)
    }

    /// Delete a customer and all of its orders.
    ///
    /// Returns `false` when no customer with this identity existed; deleting
    /// an absent customer is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::StoreUnavailable` or another store failure;
    /// nothing is deleted on error.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CustomerId) -> Result<bool, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = remove(&mut session, id).await;
        let deleted = finish(session, result).await?;

        if deleted {
            info!("deleted customer");
        }
        Ok(deleted)
    }
}

/// Load a customer and its orders within `session`.
pub(crate) async fn hydrate<S>(session: &mut S, id: CustomerId) -> Result<Customer, RepositoryError>
where
    S: StoreSession,
{
    let mut customer = session
        .query_one(Statement::SelectCustomerById { id })
        .await?
        .into_customer()?;
    customer.orders = load_orders(session, customer.id).await?;
    Ok(customer)
}

/// Result of a reconciliation, applied to memory once the session commits.
struct Reconciled {
    summary: CommitSummary,
    /// Identities assigned to inserted orders, by position.
    assigned: Vec<(usize, OrderId)>,
    /// Positions of orders that lost to a later duplicate.
    dropped: Vec<usize>,
}

async fn reconcile<S>(session: &mut S, customer: &Customer) -> Result<Reconciled, RepositoryError>
where
    S: StoreSession,
{
    let updated = session
        .execute(Statement::UpdateCustomer { customer })
        .await?;
    if updated == 0 {
        return Err(RepositoryError::stale_customer(customer.id.as_i32()));
    }

    let persisted = load_orders(session, customer.id).await?;
    let diff = diff_orders(&persisted, &customer.orders);

    for order in &diff.to_delete {
        let Some(id) = order.persisted_id() else {
            continue;
        };
        if session.execute(Statement::DeleteOrder { id }).await? == 0 {
            return Err(RepositoryError::stale_order(id.as_i32()));
        }
    }

    for order in &diff.to_update {
        let Some(id) = order.persisted_id() else {
            continue;
        };
        let statement = Statement::UpdateOrder {
            id,
            customer_id: Some(customer.id),
            product_id: order.product_id,
            quantity: order.quantity,
        };
        if session.execute(statement).await? == 0 {
            return Err(RepositoryError::stale_order(id.as_i32()));
        }
    }

    let mut assigned = Vec::with_capacity(diff.to_insert.len());
    for (position, order) in &diff.to_insert {
        let statement = Statement::InsertOrder {
            customer_id: customer.id,
            product_id: order.product_id,
            quantity: order.quantity,
        };
        let id = session.execute_returning_identity(statement).await?;
        assigned.push((*position, OrderId::new(id)));
    }

    let summary = CommitSummary {
        deleted: diff.to_delete.len(),
        updated: diff.to_update.len(),
        inserted: assigned.len(),
    };
    Ok(Reconciled {
        summary,
        assigned,
        dropped: diff.dropped,
    })
}

async fn remove<S>(session: &mut S, id: CustomerId) -> Result<bool, RepositoryError>
where
    S: StoreSession,
{
    session
        .execute(Statement::DeleteOrdersByCustomer { customer_id: id })
        .await?;
    let deleted = session.execute(Statement::DeleteCustomer { id }).await?;
    Ok(deleted > 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::NaiveDate;

    use customer_ledger_core::{Email, ProductId};

    use super::*;
    use crate::lookup::CustomerLookup;
    use crate::orders::OrderRepository;
    use crate::store::MemoryStore;

    fn store_with_products() -> MemoryStore {
        let store = MemoryStore::new();
        for name in ["Pineapple", "Mango", "Papaya", "Guava"] {
            store.seed_product(name).unwrap();
        }
        store
    }

    fn input(email: &str) -> CreateCustomerInput {
        CreateCustomerInput {
            email: Email::parse(email).unwrap(),
            first_name: "TestFirstName".to_owned(),
            last_name: "TestLastName".to_owned(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        }
    }

    /// Customer P1 with four committed orders for products 1..=4.
    async fn customer_with_four_orders(store: &MemoryStore) -> Customer {
        let repo = CustomerRepository::new(store);
        let mut customer = repo.create(&input("p1@example.com")).await.unwrap();
        customer.orders = (1..=4)
            .map(|product| Order::new(ProductId::new(product), 100))
            .collect();
        repo.commit(&mut customer).await.unwrap();
        repo.refresh(&mut customer).await.unwrap();
        customer
    }

    fn order_ids(customer: &Customer) -> Vec<OrderId> {
        customer
            .orders
            .iter()
            .map(|o| o.persisted_id().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_create_then_refresh_round_trip() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let attrs = input("test@domain.com");

        let mut customer = repo.create(&attrs).await.unwrap();
        assert!(customer.id.is_assigned());
        assert!(customer.orders.is_empty());

        repo.refresh(&mut customer).await.unwrap();
        assert_eq!(customer.attributes(), attrs);
        assert!(customer.orders.is_empty());
        assert!(customer.created_at <= customer.updated_at);
    }

    #[tokio::test]
    async fn test_create_duplicate_email_is_rejected() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        repo.create(&input("dup@example.com")).await.unwrap();

        let err = repo.create(&input("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_four_new_orders_are_persisted_in_order() {
        let store = store_with_products();
        let customer = customer_with_four_orders(&store).await;

        assert_eq!(customer.orders.len(), 4);
        let ids = order_ids(&customer);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        for (index, order) in customer.orders.iter().enumerate() {
            assert_eq!(order.product_id, ProductId::new(i32::try_from(index).unwrap() + 1));
            assert_eq!(order.quantity, 100);
            assert_eq!(order.customer_id, Some(customer.id));
            assert!(order.created_at.is_some());
            assert!(order.updated_at.is_some());
        }
    }

    #[tokio::test]
    async fn test_replacing_orders_removes_originals() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = customer_with_four_orders(&store).await;
        let originals = order_ids(&customer);

        customer.orders = vec![
            Order::new(ProductId::new(1), 5),
            Order::new(ProductId::new(2), 6),
        ];
        let summary = repo.commit(&mut customer).await.unwrap();
        assert_eq!(
            summary,
            CommitSummary {
                deleted: 4,
                updated: 0,
                inserted: 2
            }
        );

        repo.refresh(&mut customer).await.unwrap();
        assert_eq!(customer.orders.len(), 2);
        let current = order_ids(&customer);
        assert!(current.iter().all(|id| !originals.contains(id)));

        let orders = OrderRepository::new(&store);
        for id in originals {
            let err = orders.delete(id).await.unwrap_err();
            assert!(err.is_missing());
        }
    }

    #[tokio::test]
    async fn test_mutate_and_append() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = customer_with_four_orders(&store).await;
        let before = order_ids(&customer);

        customer.orders[0].quantity = 1000;
        customer.orders[0].product_id = ProductId::new(4);
        customer.orders.push(Order::new(ProductId::new(2), 3));
        repo.commit(&mut customer).await.unwrap();

        // New identity is visible before any refresh.
        let fresh = customer.orders[4].persisted_id().unwrap();
        assert!(!before.contains(&fresh));

        repo.refresh(&mut customer).await.unwrap();
        assert_eq!(customer.orders.len(), 5);
        assert_eq!(customer.orders[0].persisted_id(), Some(before[0]));
        assert_eq!(customer.orders[0].quantity, 1000);
        assert_eq!(customer.orders[0].product_id, ProductId::new(4));
        assert_eq!(customer.orders[4].persisted_id(), Some(fresh));
        assert!(fresh > before[3]);
    }

    #[tokio::test]
    async fn test_double_commit_is_idempotent() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = repo.create(&input("twice@example.com")).await.unwrap();
        customer.orders = vec![
            Order::new(ProductId::new(1), 1),
            Order::new(ProductId::new(2), 2),
        ];

        let first = repo.commit(&mut customer).await.unwrap();
        assert_eq!(first.inserted, 2);
        let after_first = customer.clone();

        let second = repo.commit(&mut customer).await.unwrap();
        assert_eq!(
            second,
            CommitSummary {
                deleted: 0,
                updated: 2,
                inserted: 0
            }
        );
        assert_eq!(store.order_count().unwrap(), 2);

        repo.refresh(&mut customer).await.unwrap();
        assert_eq!(order_ids(&customer), order_ids(&after_first));
    }

    #[tokio::test]
    async fn test_duplicate_identities_commit_twice_without_new_rows() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = repo.create(&input("dupes@example.com")).await.unwrap();
        let stale = |product, quantity| Order {
            id: Some(OrderId::new(42)),
            ..Order::new(ProductId::new(product), quantity)
        };
        customer.orders = vec![stale(1, 1), stale(2, 2)];

        let first = repo.commit(&mut customer).await.unwrap();
        assert_eq!(first.inserted, 1);
        assert_eq!(customer.orders.len(), 1);
        assert_eq!(customer.orders[0].product_id, ProductId::new(2));
        assert_eq!(store.order_count().unwrap(), 1);

        let second = repo.commit(&mut customer).await.unwrap();
        assert_eq!(
            second,
            CommitSummary {
                deleted: 0,
                updated: 1,
                inserted: 0
            }
        );
        assert_eq!(store.order_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_of_persisted_order_is_removed_from_memory() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = customer_with_four_orders(&store).await;
        let mut copy = customer.orders[0].clone();
        copy.quantity = 7;
        customer.orders.insert(0, copy);

        let summary = repo.commit(&mut customer).await.unwrap();
        assert_eq!(summary.updated, 4);
        assert_eq!(summary.inserted, 0);
        assert_eq!(customer.orders.len(), 4);

        repo.refresh(&mut customer).await.unwrap();
        assert_eq!(customer.orders[0].quantity, 100);
        assert_eq!(store.order_count().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_commit_statement_order() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = customer_with_four_orders(&store).await;

        customer.orders.remove(1);
        customer.orders.push(Order::new(ProductId::new(3), 1));
        store.clear_statements().unwrap();
        repo.commit(&mut customer).await.unwrap();

        assert_eq!(
            store.statements().unwrap(),
            vec![
                "update_customer",
                "select_orders_by_customer",
                "delete_order",
                "update_order",
                "update_order",
                "update_order",
                "insert_order",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_store_untouched() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = customer_with_four_orders(&store).await;
        let snapshot = customer.clone();

        customer.first_name = "Changed".to_owned();
        customer.orders.truncate(1);
        customer.orders.push(Order::new(ProductId::new(2), 7));
        store.fail_on("insert_order").unwrap();

        let err = repo.commit(&mut customer).await.unwrap_err();
        assert!(matches!(err, RepositoryError::StoreUnavailable(_)));
        assert!(customer.orders[1].is_pending());

        let mut reloaded = snapshot.clone();
        repo.refresh(&mut reloaded).await.unwrap();
        assert_eq!(reloaded, snapshot);
    }

    #[tokio::test]
    async fn test_commit_with_unknown_product_is_rejected() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = repo.create(&input("fk@example.com")).await.unwrap();
        customer.orders.push(Order::new(ProductId::new(99), 1));

        let err = repo.commit(&mut customer).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ConstraintViolation(_)));
        assert_eq!(store.order_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_discards_unsaved_orders() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = customer_with_four_orders(&store).await;

        customer.orders.clear();
        repo.refresh(&mut customer).await.unwrap();
        assert_eq!(customer.orders.len(), 4);
    }

    #[tokio::test]
    async fn test_delete_then_refresh_is_not_found() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);
        let mut customer = customer_with_four_orders(&store).await;
        let former = customer.orders.clone();

        assert!(repo.delete(customer.id).await.unwrap());
        assert_eq!(store.order_count().unwrap(), 0);

        let err = repo.refresh(&mut customer).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        let err = repo.commit(&mut customer).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Inconsistent { entity: "customer", .. }));

        let orders = OrderRepository::new(&store);
        for order in &former {
            let err = orders.update(order).await.unwrap_err();
            assert!(err.is_missing());
        }
    }

    #[tokio::test]
    async fn test_delete_absent_customer_is_noop() {
        let store = store_with_products();
        let repo = CustomerRepository::new(&store);

        assert!(!repo.delete(CustomerId::new(12345)).await.unwrap());

        let lookup = CustomerLookup::new(&store);
        assert!(lookup.list_all().await.unwrap().is_empty());
    }
}
