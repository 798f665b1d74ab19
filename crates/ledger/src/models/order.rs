//! Order records owned by a customer aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use customer_ledger_core::{CustomerId, OrderId, ProductId};

/// An order owned by a [`Customer`](super::Customer).
///
/// An order without an assigned identity is *pending*: it only exists in
/// memory and is inserted by the next commit of its customer. Persisted
/// orders carry the identity and timestamps the store assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned identity; `None` while pending.
    pub id: Option<OrderId>,
    /// Owning customer; set by the engine when the order is persisted.
    pub customer_id: Option<CustomerId>,
    /// Ordered product.
    pub product_id: ProductId,
    /// Number of units ordered.
    pub quantity: i32,
    /// When the order was inserted (store-managed).
    pub created_at: Option<DateTime<Utc>>,
    /// When the order was last written (store-managed).
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a pending order to append to a customer's collection.
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            id: None,
            customer_id: None,
            product_id,
            quantity,
            created_at: None,
            updated_at: None,
        }
    }

    /// Identity of this order if it names a persisted row.
    ///
    /// Zero or negative identities are treated the same as no identity.
    #[must_use]
    pub fn persisted_id(&self) -> Option<OrderId> {
        self.id.filter(OrderId::is_assigned)
    }

    /// Whether this order still has to be inserted.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.persisted_id().is_none()
    }
}
