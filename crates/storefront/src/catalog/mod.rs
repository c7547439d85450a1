//! Read-through cached access to the catalog.
//!
//! Every read first looks in the key-value cache under a [`CacheKey`]
//! derived from its parameters. On a miss it queries the [`CatalogStore`],
//! writes the result back with the entity's TTL, and returns it.
//!
//! Entries are never invalidated; staleness is bounded by the TTL. Lookups
//! that find nothing are not cached.
//!
//! Cache failures never fail a request: reads fall back to the database and
//! failed writes are logged and dropped.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use atelier_core::{Collection, Product, ProductSort};

use crate::cache::{CacheClient, CacheKey};
use crate::db::{CatalogStore, ProductPage, RepositoryError, SearchParams};

/// Maximum number of search suggestions.
pub const SUGGESTION_LIMIT: i64 = 8;

/// Errors from catalog reads. Cache problems never surface here.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A page of products with the total across all pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub total: i64,
}

/// A collection with every product in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionWithProducts {
    pub collection: Collection,
    pub products: Vec<Product>,
}

/// Cached catalog service.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn CatalogStore>,
    cache: CacheClient,
}

impl Catalog {
    #[must_use]
    pub fn new(store: Arc<dyn CatalogStore>, cache: CacheClient) -> Self {
        Self { store, cache }
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get one page of products and the total count.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the database query fails.
    #[instrument(skip(self))]
    pub async fn get_products(&self, page: &ProductPage) -> Result<ProductList, CatalogError> {
        self.read_through(CacheKey::Products(page), || async {
            let products = self.store.list_products(page).await?;
            let total = self.store.count_products(page).await?;
            Ok(ProductList { products, total })
        })
        .await
    }

    /// Get a product by its handle.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the database query fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn get_product_by_handle(&self, handle: &str) -> Result<Option<Product>, CatalogError> {
        self.read_through_optional(CacheKey::Product { handle }, || {
            self.store.product_by_handle(handle)
        })
        .await
    }

    // =========================================================================
    // Collection Methods
    // =========================================================================

    /// Get every collection.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the database query fails.
    #[instrument(skip(self))]
    pub async fn get_collections(&self) -> Result<Vec<Collection>, CatalogError> {
        self.read_through(CacheKey::Collections, || self.store.collections())
            .await
    }

    /// Get a collection and all of its products, sorted and brand-filtered.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if a database query fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn get_collection(
        &self,
        handle: &str,
        sort: ProductSort,
        brand: Option<&str>,
    ) -> Result<Option<CollectionWithProducts>, CatalogError> {
        let key = CacheKey::Collection {
            handle,
            sort,
            brand,
        };
        self.read_through_optional(key, || async {
            let Some(collection) = self.store.collection_by_handle(handle).await? else {
                return Ok(None);
            };
            let products = self
                .store
                .collection_products(collection.id, sort, brand.map(str::to_string))
                .await?;
            Ok(Some(CollectionWithProducts {
                collection,
                products,
            }))
        })
        .await
    }

    // =========================================================================
    // Search Methods
    // =========================================================================

    /// Search products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the database query fails.
    #[instrument(skip(self), fields(query = %params.query))]
    pub async fn search(&self, params: &SearchParams) -> Result<ProductList, CatalogError> {
        self.read_through(CacheKey::Search(params), || async {
            let products = self.store.search_products(params).await?;
            let total = self.store.count_search(params).await?;
            Ok(ProductList { products, total })
        })
        .await
    }

    /// Product titles containing `query`, at most [`SUGGESTION_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the database query fails.
    #[instrument(skip(self))]
    pub async fn suggestions(&self, query: &str) -> Result<Vec<String>, CatalogError> {
        self.read_through(CacheKey::Suggestions { query }, || {
            self.store.suggestions(query, SUGGESTION_LIMIT)
        })
        .await
    }

    /// Check that the database answers.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the database is unreachable.
    pub async fn ping(&self) -> Result<(), CatalogError> {
        Ok(self.store.ping().await?)
    }

    // =========================================================================
    // Read-through Helpers
    // =========================================================================

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get_json::<T>(key).await {
            Ok(Some(hit)) => {
                debug!(key, "Cache hit");
                Some(hit)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, querying database");
                None
            }
        }
    }

    async fn store_cached<T: Serialize + Sync>(&self, key: &str, value: &T, entry: &CacheKey<'_>) {
        if let Err(e) = self.cache.put_json(key, value, entry.ttl()).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    async fn read_through<T, F, Fut>(&self, entry: CacheKey<'_>, load: F) -> Result<T, CatalogError>
    where
        T: Serialize + DeserializeOwned + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let key = entry.to_string();
        if let Some(hit) = self.cached(&key).await {
            return Ok(hit);
        }
        let value = load().await?;
        self.store_cached(&key, &value, &entry).await;
        Ok(value)
    }

    async fn read_through_optional<T, F, Fut>(
        &self,
        entry: CacheKey<'_>,
        load: F,
    ) -> Result<Option<T>, CatalogError>
    where
        T: Serialize + DeserializeOwned + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, RepositoryError>>,
    {
        let key = entry.to_string();
        if let Some(hit) = self.cached(&key).await {
            return Ok(Some(hit));
        }
        let value = load().await?;
        if let Some(found) = &value {
            self.store_cached(&key, found, &entry).await;
        }
        Ok(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use mockall::predicate::eq;

    use atelier_core::{CollectionId, Price, ProductId};

    use super::*;
    use crate::cache::{CacheError, MemoryStore, MockKvStore};
    use crate::db::MockCatalogStore;

    fn product(handle: &str) -> Product {
        Product {
            id: ProductId::new(7),
            handle: handle.to_string(),
            title: "Silk Slip Dress".to_string(),
            description: "Bias cut".to_string(),
            brand: Some("Maison Vert".to_string()),
            category: Some("Dresses".to_string()),
            price: Price::from_minor(18_000),
            compare_at_price: None,
            inventory_quantity: 3,
            options: None,
            material: Some("Silk".to_string()),
            variants: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn memory_cache() -> CacheClient {
        CacheClient::new(Some(Arc::new(MemoryStore::new())))
    }

    fn failing_cache() -> CacheClient {
        let mut kv = MockKvStore::new();
        kv.expect_get().returning(|_| {
            Err(CacheError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))))
        });
        kv.expect_put().returning(|_, _, _| {
            Err(CacheError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))))
        });
        CacheClient::new(Some(Arc::new(kv)))
    }

    fn page() -> ProductPage {
        ProductPage {
            brand: None,
            limit: 20,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn test_product_by_handle_hits_store_once_within_ttl() {
        let mut store = MockCatalogStore::new();
        store
            .expect_product_by_handle()
            .with(eq("silk-slip-dress"))
            .times(1)
            .returning(|handle| Ok(Some(product(handle))));

        let catalog = Catalog::new(Arc::new(store), memory_cache());
        let first = catalog.get_product_by_handle("silk-slip-dress").await.unwrap();
        let second = catalog.get_product_by_handle("silk-slip-dress").await.unwrap();

        assert!(first.is_some());
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_product_is_not_cached() {
        let mut store = MockCatalogStore::new();
        store
            .expect_product_by_handle()
            .times(2)
            .returning(|_| Ok(None));

        let catalog = Catalog::new(Arc::new(store), memory_cache());
        assert!(catalog.get_product_by_handle("nope").await.unwrap().is_none());
        assert!(catalog.get_product_by_handle("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_products_without_cache_query_store_each_time() {
        let mut store = MockCatalogStore::new();
        store
            .expect_list_products()
            .times(2)
            .returning(|_| Ok(vec![product("silk-slip-dress")]));
        store.expect_count_products().times(2).returning(|_| Ok(41));

        let catalog = Catalog::new(Arc::new(store), CacheClient::disabled());
        for _ in 0..2 {
            let list = catalog.get_products(&page()).await.unwrap();
            assert_eq!(list.total, 41);
            assert_eq!(list.products.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_cache_failures_fall_back_to_store() {
        let mut store = MockCatalogStore::new();
        store
            .expect_list_products()
            .times(1)
            .returning(|_| Ok(Vec::new()));
        store.expect_count_products().times(1).returning(|_| Ok(0));

        let catalog = Catalog::new(Arc::new(store), failing_cache());
        let list = catalog.get_products(&page()).await.unwrap();
        assert_eq!(list.total, 0);
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let mut store = MockCatalogStore::new();
        store
            .expect_collections()
            .returning(|| Err(RepositoryError::DataCorruption("bad row".to_string())));

        let catalog = Catalog::new(Arc::new(store), memory_cache());
        assert!(matches!(
            catalog.get_collections().await,
            Err(CatalogError::Repository(_))
        ));
    }

    #[tokio::test]
    async fn test_collection_loads_products_for_found_collection() {
        let mut store = MockCatalogStore::new();
        store.expect_collection_by_handle().times(1).returning(|handle| {
            Ok(Some(Collection {
                id: CollectionId::new(3),
                handle: handle.to_string(),
                title: "Summer Edit".to_string(),
                description: None,
                image_url: None,
                product_count: 1,
            }))
        });
        store
            .expect_collection_products()
            .withf(|id, sort, brand| {
                *id == CollectionId::new(3)
                    && *sort == ProductSort::PriceAsc
                    && brand.as_deref() == Some("maison-vert")
            })
            .times(1)
            .returning(|_, _, _| Ok(vec![product("silk-slip-dress")]));

        let catalog = Catalog::new(Arc::new(store), memory_cache());
        for _ in 0..2 {
            let page = catalog
                .get_collection("summer-edit", ProductSort::PriceAsc, Some("maison-vert"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(page.collection.title, "Summer Edit");
            assert_eq!(page.products.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_unknown_collection_skips_product_query() {
        let mut store = MockCatalogStore::new();
        store
            .expect_collection_by_handle()
            .returning(|_| Ok(None));
        store.expect_collection_products().never();

        let catalog = Catalog::new(Arc::new(store), memory_cache());
        let page = catalog
            .get_collection("nope", ProductSort::Newest, None)
            .await
            .unwrap();
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn test_suggestions_use_fixed_limit() {
        let mut store = MockCatalogStore::new();
        store
            .expect_suggestions()
            .with(eq("sil"), eq(SUGGESTION_LIMIT))
            .times(1)
            .returning(|_, _| Ok(vec!["Silk Slip Dress".to_string()]));

        let catalog = Catalog::new(Arc::new(store), memory_cache());
        assert_eq!(catalog.suggestions("sil").await.unwrap().len(), 1);
        assert_eq!(catalog.suggestions("sil").await.unwrap().len(), 1);
    }
}
