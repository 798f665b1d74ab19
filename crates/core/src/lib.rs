//! Customer Ledger Core - Shared types library.
//!
//! This crate provides the identity and value types shared by the ledger
//! engine (`customer-ledger`) and the command-line tools (`customer-ledger-cli`).
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access. Enable
//! the `postgres` feature to get sqlx encode/decode support for the newtypes.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and email addresses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
