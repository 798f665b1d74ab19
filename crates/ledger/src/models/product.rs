//! Product catalogue entries referenced by orders.

use serde::{Deserialize, Serialize};

use customer_ledger_core::ProductId;

/// A product that orders can reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Unique product name.
    pub name: String,
}
