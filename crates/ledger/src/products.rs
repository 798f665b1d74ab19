//! Product catalogue access.

use tracing::instrument;

use crate::error::RepositoryError;
use crate::models::Product;
use crate::store::{RecordStore, Row, Statement, StoreSession, finish};

/// Repository for products referenced by orders.
pub struct ProductRepository<'a, S> {
    store: &'a S,
}

impl<'a, S: RecordStore> ProductRepository<'a, S> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Get a product by its exact name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this name.
    #[instrument(skip(self))]
    pub async fn find_by_name(&self, name: &str) -> Result<Product, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = session
            .query_one(Statement::SelectProductByName { name })
            .await
            .and_then(Row::into_product);
        finish(session, result).await
    }

    /// Add a product to the catalogue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ConstraintViolation` if the name is taken.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str) -> Result<Product, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = session
            .query_one(Statement::InsertProduct { name })
            .await
            .and_then(Row::into_product);
        finish(session, result).await
    }

    /// List every product ascending by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let mut session = self.store.begin().await?;
        let result = session
            .query_many(Statement::SelectProducts)
            .await
            .and_then(|rows| rows.into_iter().map(Row::into_product).collect());
        finish(session, result).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_find_by_name() {
        let store = MemoryStore::new();
        let products = ProductRepository::new(&store);
        let created = products.create("Pineapple").await.unwrap();

        assert_eq!(products.find_by_name("Pineapple").await.unwrap(), created);
        assert!(matches!(
            products.find_by_name("pineapple").await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let store = MemoryStore::new();
        let products = ProductRepository::new(&store);
        products.create("Mango").await.unwrap();

        assert!(matches!(
            products.create("Mango").await,
            Err(RepositoryError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_all_ascending() {
        let store = MemoryStore::new();
        let products = ProductRepository::new(&store);
        for name in ["Papaya", "Guava", "Mango"] {
            products.create(name).await.unwrap();
        }

        let names: Vec<String> = products
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Papaya", "Guava", "Mango"]);
        assert_eq!(
            store.statements().unwrap(),
            vec![
                "insert_product",
                "insert_product",
                "insert_product",
                "select_products"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_all_failure_is_reported() {
        let store = MemoryStore::new();
        store.fail_on("select_products").unwrap();

        assert!(matches!(
            ProductRepository::new(&store).list_all().await,
            Err(RepositoryError::StoreUnavailable(_))
        ));
    }
}
