//! Seed the product catalogue from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Pineapple
//!   - name: Mango
//! ```
//!
//! Products whose name already exists are skipped, so seeding is safe to
//! repeat.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use customer_ledger::{ProductRepository, RepositoryError};

use super::{CommandError, connect, print_json};

/// Contents of a product seed file.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub products: Vec<SeedProduct>,
}

/// One product entry in a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
}

/// Outcome of a seeding run.
#[derive(Debug, Default, Serialize)]
pub struct SeedResult {
    pub inserted: usize,
    pub skipped: usize,
}

/// Check a seed file for blank and repeated names.
#[must_use]
pub fn validate(seed: &ProductSeed) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, product) in seed.products.iter().enumerate() {
        let name = product.name.trim();
        if name.is_empty() {
            errors.push(format!("products[{index}]: name is empty"));
        } else if name != product.name {
            errors.push(format!("products[{index}]: name has surrounding whitespace"));
        } else if !seen.insert(name) {
            errors.push(format!("products[{index}]: duplicate name {name:?}"));
        }
    }
    errors
}

/// Seed products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, or a
/// database operation fails.
pub async fn products(file_path: &str) -> Result<(), CommandError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading products from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let seed: ProductSeed = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CommandError::Validation(errors.len()));
    }

    let store = connect().await?;
    let repo = ProductRepository::new(&store);

    let mut result = SeedResult::default();
    for product in &seed.products {
        match repo.find_by_name(&product.name).await {
            Ok(_) => result.skipped += 1,
            Err(RepositoryError::NotFound) => {
                repo.create(&product.name).await?;
                result.inserted += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        inserted = result.inserted,
        skipped = result.skipped,
        "Seeding complete!"
    );
    print_json(&result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ProductSeed {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_valid_seed() {
        let seed = parse("products:\n  - name: Pineapple\n  - name: Mango\n");
        assert_eq!(seed.products.len(), 2);
        assert!(validate(&seed).is_empty());
    }

    #[test]
    fn test_blank_and_duplicate_names() {
        let seed = parse(
            "products:\n  - name: Pineapple\n  - name: ''\n  - name: ' Mango'\n  - name: Pineapple\n",
        );
        let errors = validate(&seed);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("products[1]"));
        assert!(errors[1].starts_with("products[2]"));
        assert!(errors[2].contains("duplicate"));
    }

    #[test]
    fn test_missing_products_key() {
        assert!(serde_yaml::from_str::<ProductSeed>("items: []\n").is_err());
    }
}
