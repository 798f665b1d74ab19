//! Domain models for the ledger.
//!
//! A [`Customer`] is the aggregate root: it owns an ordered collection of
//! [`Order`] records that the engine reconciles against the store on commit.

pub mod customer;
pub mod order;
pub mod product;

pub use customer::{CreateCustomerInput, Customer};
pub use order::Order;
pub use product::Product;
