//! Customer Ledger CLI - migrations, seeding and aggregate management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cl-cli migrate
//!
//! # Load the product catalogue
//! cl-cli seed products --file seed/products.yaml
//!
//! # Create a customer and give them an order
//! cl-cli customer create --email jane@example.com --first-name Jane \
//!     --last-name Doe --birth-date 1990-01-01
//! cl-cli order add --customer 1 --product Pineapple --quantity 3
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed products` - Insert products listed in a YAML file
//! - `customer` - Create, show, list and delete customers
//! - `order` - Add, change and remove a customer's orders
//!
//! Results are printed to stdout as JSON; logs go to stderr.

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "cl-cli")]
#[command(author, version, about = "Customer ledger CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage customers
    Customer {
        #[command(subcommand)]
        action: CustomerAction,
    },
    /// Manage a customer's orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert the products listed in a YAML file, skipping existing names
    Products {
        /// Path to the YAML product list
        #[arg(short, long, default_value = "seed/products.yaml")]
        file: String,
    },
}

#[derive(Subcommand)]
enum CustomerAction {
    /// Create a new customer with no orders
    Create {
        /// Customer email address
        #[arg(short, long)]
        email: String,

        /// Customer first name
        #[arg(long)]
        first_name: String,

        /// Customer last name
        #[arg(long)]
        last_name: String,

        /// Birth date as YYYY-MM-DD
        #[arg(long)]
        birth_date: NaiveDate,
    },
    /// Show a customer and their orders
    Show {
        /// Customer ID
        #[arg(long, conflicts_with = "email", required_unless_present = "email")]
        id: Option<i32>,

        /// Customer email address
        #[arg(short, long)]
        email: Option<String>,
    },
    /// List every customer with their orders
    List,
    /// Delete a customer and all of their orders
    Delete {
        /// Customer ID
        #[arg(long)]
        id: i32,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Append an order for a product
    Add {
        /// Customer ID
        #[arg(short, long)]
        customer: i32,

        /// Product name
        #[arg(short, long)]
        product: String,

        /// Number of units, zero or more
        #[arg(short, long, value_parser = clap::value_parser!(i32).range(0..))]
        quantity: i32,
    },
    /// Change the quantity of an existing order
    SetQuantity {
        /// Customer ID
        #[arg(short, long)]
        customer: i32,

        /// Order ID
        #[arg(short, long)]
        order: i32,

        /// Number of units, zero or more
        #[arg(short, long, value_parser = clap::value_parser!(i32).range(0..))]
        quantity: i32,
    },
    /// Remove an order from a customer
    Remove {
        /// Customer ID
        #[arg(short, long)]
        customer: i32,

        /// Order ID
        #[arg(short, long)]
        order: i32,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays parseable JSON.
    // LEDGER_LOG_FORMAT=json switches to structured output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let is_json = std::env::var("LEDGER_LOG_FORMAT").is_ok_and(|v| v == "json");
    let json_layer = is_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!is_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
        Commands::Customer { action } => match action {
            CustomerAction::Create {
                email,
                first_name,
                last_name,
                birth_date,
            } => {
                commands::customer::create(&email, first_name, last_name, birth_date).await?;
            }
            CustomerAction::Show { id, email } => match (id, email) {
                (Some(id), _) => commands::customer::show_by_id(id).await?,
                (None, Some(email)) => commands::customer::show_by_email(&email).await?,
                (None, None) => return Err("either --id or --email is required".into()),
            },
            CustomerAction::List => commands::customer::list().await?,
            CustomerAction::Delete { id } => commands::customer::delete(id).await?,
        },
        Commands::Order { action } => match action {
            OrderAction::Add {
                customer,
                product,
                quantity,
            } => commands::order::add(customer, &product, quantity).await?,
            OrderAction::SetQuantity {
                customer,
                order,
                quantity,
            } => commands::order::set_quantity(customer, order, quantity).await?,
            OrderAction::Remove { customer, order } => {
                commands::order::remove(customer, order).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_every_argument_has_help() {
        fn check(command: &clap::Command) {
            for arg in command.get_arguments() {
                if arg.is_positional() || arg.get_id() == "help" || arg.get_id() == "version" {
                    continue;
                }
                assert!(
                    arg.get_help().is_some(),
                    "{} --{} has no help text",
                    command.get_name(),
                    arg.get_id()
                );
            }
            for sub in command.get_subcommands() {
                check(sub);
            }
        }
        check(&Cli::command());
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        let parsed = Cli::try_parse_from([
            "cl-cli", "order", "add", "-c", "1", "-p", "Mango", "-q", "-1",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_show_needs_id_or_email() {
        assert!(Cli::try_parse_from(["cl-cli", "customer", "show"]).is_err());
        assert!(Cli::try_parse_from(["cl-cli", "customer", "show", "--id", "3"]).is_ok());
    }
}
