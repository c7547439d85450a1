//! Database operations for the storefront catalog.
//!
//! # Database: `atelier`
//!
//! The catalog lives in the `catalog` schema and is read-only from the
//! storefront's point of view. It is written by `atelier-cli seed` or by an
//! external import job.
//!
//! ## Tables
//!
//! - `catalog.product` - Products, with options and variants as JSONB
//! - `catalog.collection` - Merchandised collections
//! - `catalog.collection_product` - Collection membership and manual position
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p atelier-cli -- migrate
//! ```

mod catalog;
pub mod seed;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use atelier_core::{Collection, CollectionId, Price, Product, ProductSort};

pub use catalog::PgCatalogStore;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Errors from catalog queries.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Query or connection failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row could not be turned into a domain value.
    #[error("Data corruption: {0}")]
    DataCorruption(String),
}

// =============================================================================
// Query Parameters
// =============================================================================

/// One page of the unfiltered product list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    /// Only products from this brand (case-insensitive).
    pub brand: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Full-text-ish product search over title, description, brand and category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// Trimmed, lower-cased search text. Empty matches everything.
    pub query: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub sort: ProductSort,
    pub limit: i64,
    pub offset: i64,
}

// =============================================================================
// CatalogStore
// =============================================================================

/// Read access to the relational catalog.
///
/// Lists are ordered by `created_at DESC` unless a sort says otherwise.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// One page of products.
    async fn list_products(&self, page: &ProductPage) -> Result<Vec<Product>, RepositoryError>;

    /// Total products matching the page's brand filter.
    async fn count_products(&self, page: &ProductPage) -> Result<i64, RepositoryError>;

    async fn product_by_handle(&self, handle: &str) -> Result<Option<Product>, RepositoryError>;

    /// All collections with their product counts, ordered by title.
    async fn collections(&self) -> Result<Vec<Collection>, RepositoryError>;

    async fn collection_by_handle(&self, handle: &str)
    -> Result<Option<Collection>, RepositoryError>;

    /// Every product in a collection. `Relevance` means the manual position.
    async fn collection_products(
        &self,
        collection: CollectionId,
        sort: ProductSort,
        brand: Option<String>,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// One page of search results.
    async fn search_products(&self, params: &SearchParams)
    -> Result<Vec<Product>, RepositoryError>;

    /// Total search results, ignoring limit and offset.
    async fn count_search(&self, params: &SearchParams) -> Result<i64, RepositoryError>;

    /// Distinct product titles containing `query`.
    async fn suggestions(&self, query: &str, limit: i64) -> Result<Vec<String>, RepositoryError>;

    /// Round-trip to the database (readiness check).
    async fn ping(&self) -> Result<(), RepositoryError>;
}
