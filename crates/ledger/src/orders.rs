//! Single-order operations.
//!
//! These bypass the aggregate: they write one order row without reading or
//! reconciling the rest of the customer's orders. Use
//! [`CustomerRepository::commit`](crate::sync::CustomerRepository::commit)
//! to edit a customer's orders as a whole.

use tracing::{info, instrument};

use customer_ledger_core::{CustomerId, OrderId, ProductId};

use crate::error::RepositoryError;
use crate::models::Order;
use crate::store::{RecordStore, Row, Statement, StoreSession, finish};

/// Repository for individual order rows.
pub struct OrderRepository<'a, S> {
    store: &'a S,
}

impl<'a, S: RecordStore> OrderRepository<'a, S> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Insert an order for a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ConstraintViolation` if the customer or the
    /// product does not exist, or the quantity is negative.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Order, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = session
            .query_one(Statement::InsertOrder {
                customer_id,
                product_id,
                quantity,
            })
            .await
            .and_then(Row::into_order);
        let order = finish(session, result).await?;

        info!(order_id = ?order.id, "created order");
        Ok(order)
    }

    /// Write an order's product and quantity.
    ///
    /// When the order carries its customer, only that customer's order matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Inconsistent` if the order is pending or no
    /// longer exists.
    #[instrument(skip(self, order), fields(order_id = ?order.id))]
    pub async fn update(&self, order: &Order) -> Result<(), RepositoryError> {
        let Some(id) = order.persisted_id() else {
            return Err(RepositoryError::stale_order(
                order.id.map_or(0, |id| id.as_i32()),
            ));
        };

        let mut session = self.store.begin().await?;
        let result = session
            .execute(Statement::UpdateOrder {
                id,
                customer_id: order.customer_id,
                product_id: order.product_id,
                quantity: order.quantity,
            })
            .await;
        let affected = finish(session, result).await?;

        if affected == 0 {
            return Err(RepositoryError::stale_order(id.as_i32()));
        }
        Ok(())
    }

    /// Remove an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Inconsistent` if no order has this ID.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = session.execute(Statement::DeleteOrder { id }).await;
        let affected = finish(session, result).await?;

        if affected == 0 {
            return Err(RepositoryError::stale_order(id.as_i32()));
        }
        Ok(())
    }
}
