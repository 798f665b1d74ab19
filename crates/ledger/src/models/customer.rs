//! Customer aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use customer_ledger_core::{CustomerId, Email, OrderId};

use super::Order;

/// A customer together with the orders it owns.
///
/// Scalar attributes are written by `commit`; the timestamps are only ever
/// set by the store. `orders` is the *desired* child set: whatever it holds
/// when the customer is committed becomes the persisted set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Unique customer ID.
    pub id: CustomerId,
    /// Unique email address.
    pub email: Email,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    pub birth_date: NaiveDate,
    /// Orders owned by this customer, ascending by identity after a refresh.
    pub orders: Vec<Order>,
    /// When the customer was created.
    pub created_at: DateTime<Utc>,
    /// When the customer was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Scalar attributes of this customer as creation input.
    #[must_use]
    pub fn attributes(&self) -> CreateCustomerInput {
        CreateCustomerInput {
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date: self.birth_date,
        }
    }

    /// Find an order by its persisted identity.
    #[must_use]
    pub fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders
            .iter_mut()
            .find(|order| order.persisted_id() == Some(id))
    }
}

/// Input for creating a new customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCustomerInput {
    /// Unique email address.
    pub email: Email,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    pub birth_date: NaiveDate,
}
