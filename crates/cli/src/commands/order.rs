//! Order management commands.
//!
//! Every command edits the customer aggregate: the customer is loaded with
//! its orders, the order list is changed in memory, and the whole aggregate
//! is committed in one transaction.
//!
//! # Usage
//!
//! ```bash
//! cl-cli order add -c 1 -p Pineapple -q 3
//! cl-cli order set-quantity -c 1 -o 7 -q 10
//! cl-cli order remove -c 1 -o 7
//! ```

use serde_json::json;

use customer_ledger::{
    Customer, CustomerId, CustomerLookup, CustomerRepository, Order, OrderId, PgStore,
    ProductRepository,
};

use super::{CommandError, connect, print_json};

async fn commit_and_print(store: &PgStore, customer: &mut Customer) -> Result<(), CommandError> {
    let summary = CustomerRepository::new(store).commit(customer).await?;
    print_json(&json!({ "summary": summary, "customer": customer }))
}

/// Append an order for a product to a customer.
///
/// # Errors
///
/// Returns an error if the customer or the product does not exist.
pub async fn add(customer_id: i32, product: &str, quantity: i32) -> Result<(), CommandError> {
    let store = connect().await?;
    let product = ProductRepository::new(&store).find_by_name(product).await?;
    let mut customer = CustomerLookup::new(&store)
        .find_by_id(CustomerId::new(customer_id))
        .await?;

    customer.orders.push(Order::new(product.id, quantity));
    commit_and_print(&store, &mut customer).await
}

/// Change the quantity of one of a customer's orders.
///
/// # Errors
///
/// Returns an error if the customer does not exist or has no such order.
pub async fn set_quantity(
    customer_id: i32,
    order_id: i32,
    quantity: i32,
) -> Result<(), CommandError> {
    let store = connect().await?;
    let mut customer = CustomerLookup::new(&store)
        .find_by_id(CustomerId::new(customer_id))
        .await?;

    let order = customer
        .order_mut(OrderId::new(order_id))
        .ok_or(CommandError::UnknownOrder {
            customer: customer_id,
            order: order_id,
        })?;
    order.quantity = quantity;

    commit_and_print(&store, &mut customer).await
}

/// Remove one of a customer's orders.
///
/// # Errors
///
/// Returns an error if the customer does not exist or has no such order.
pub async fn remove(customer_id: i32, order_id: i32) -> Result<(), CommandError> {
    let store = connect().await?;
    let mut customer = CustomerLookup::new(&store)
        .find_by_id(CustomerId::new(customer_id))
        .await?;

    let before = customer.orders.len();
    let target = OrderId::new(order_id);
    customer
        .orders
        .retain(|order| order.persisted_id() != Some(target));
    if customer.orders.len() == before {
        return Err(CommandError::UnknownOrder {
            customer: customer_id,
            order: order_id,
        });
    }

    commit_and_print(&store, &mut customer).await
}
