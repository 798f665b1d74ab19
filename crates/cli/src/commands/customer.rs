//! Customer management commands.
//!
//! # Usage
//!
//! ```bash
//! cl-cli customer create -e jane@example.com --first-name Jane --last-name Doe --birth-date 1990-01-01
//! cl-cli customer show --id 1
//! cl-cli customer show --email jane@example.com
//! cl-cli customer list
//! cl-cli customer delete --id 1
//! ```

use chrono::NaiveDate;
use serde_json::json;

use customer_ledger::{
    CreateCustomerInput, CustomerId, CustomerLookup, CustomerRepository, Email,
};

use super::{CommandError, connect, print_json};

/// Create a new customer.
///
/// # Errors
///
/// Returns an error if the email is invalid or already taken.
pub async fn create(
    email: &str,
    first_name: String,
    last_name: String,
    birth_date: NaiveDate,
) -> Result<(), CommandError> {
    let input = CreateCustomerInput {
        email: Email::parse(email)?,
        first_name,
        last_name,
        birth_date,
    };

    let store = connect().await?;
    let customer = CustomerRepository::new(&store).create(&input).await?;

    tracing::info!(customer_id = %customer.id, "Customer created");
    print_json(&customer)
}

/// Show a customer by ID.
///
/// # Errors
///
/// Returns an error if no customer has this ID.
pub async fn show_by_id(id: i32) -> Result<(), CommandError> {
    let store = connect().await?;
    let customer = CustomerLookup::new(&store)
        .find_by_id(CustomerId::new(id))
        .await?;
    print_json(&customer)
}

/// Show a customer by email address.
///
/// # Errors
///
/// Returns an error if the email is invalid or no customer has it.
pub async fn show_by_email(email: &str) -> Result<(), CommandError> {
    let email = Email::parse(email)?;

    let store = connect().await?;
    let customer = CustomerLookup::new(&store).find_by_email(&email).await?;
    print_json(&customer)
}

/// List every customer.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub async fn list() -> Result<(), CommandError> {
    let store = connect().await?;
    let customers = CustomerLookup::new(&store).list_all().await?;
    print_json(&customers)
}

/// Delete a customer and their orders.
///
/// Deleting an absent customer is not an error; the output reports
/// whether a row was removed.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub async fn delete(id: i32) -> Result<(), CommandError> {
    let store = connect().await?;
    let deleted = CustomerRepository::new(&store)
        .delete(CustomerId::new(id))
        .await?;

    if !deleted {
        tracing::warn!(customer_id = id, "No customer with this ID");
    }
    print_json(&json!({ "id": id, "deleted": deleted }))
}
