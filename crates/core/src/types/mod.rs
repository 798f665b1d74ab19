//! Core types for the customer ledger.
//!
//! This module provides type-safe wrappers for ledger identities and the
//! customer's unique email attribute.

pub mod email;
pub mod id;

pub use email::{Email, EmailError};
pub use id::*;
