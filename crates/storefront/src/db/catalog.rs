//! `PostgreSQL` implementation of [`CatalogStore`].
//!
//! Queries are built at runtime: the sort order is interpolated from a
//! closed set of `ORDER BY` clauses and every user value is a bind
//! parameter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use atelier_core::{
    Collection, CollectionId, Price, Product, ProductId, ProductOption, ProductSort, Variant,
};

use super::{CatalogStore, ProductPage, RepositoryError, SearchParams};

const PRODUCT_COLUMNS: &str = "p.id, p.handle, p.title, p.description, p.brand, p.category, \
     p.price, p.compare_at_price, p.inventory_quantity, p.options, p.material, p.variants, \
     p.created_at";

const SEARCH_PREDICATE: &str = "(p.title ILIKE $1 OR p.description ILIKE $1 \
     OR p.brand ILIKE $1 OR p.category ILIKE $1) \
     AND ($2::text IS NULL OR lower(p.brand) = lower($2)) \
     AND ($3::text IS NULL OR lower(p.category) = lower($3)) \
     AND ($4::bigint IS NULL OR p.price >= $4) \
     AND ($5::bigint IS NULL OR p.price <= $5)";

/// `ORDER BY` clause for a sort. `relevance` is the clause used for
/// [`ProductSort::Relevance`], which differs between search and collections.
fn order_by(sort: ProductSort, relevance: &str) -> String {
    let clause = match sort {
        ProductSort::Relevance => relevance,
        ProductSort::Newest => "p.created_at DESC, p.id DESC",
        ProductSort::PriceAsc => "p.price ASC, p.id ASC",
        ProductSort::PriceDesc => "p.price DESC, p.id DESC",
        ProductSort::TitleAsc => "p.title ASC, p.id ASC",
    };
    format!("ORDER BY {clause}")
}

/// Wrap `query` in `%..%` with LIKE metacharacters escaped.
fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    handle: String,
    title: String,
    description: String,
    brand: Option<String>,
    category: Option<String>,
    price: i64,
    compare_at_price: Option<i64>,
    inventory_quantity: i32,
    options: Option<Json<Vec<ProductOption>>>,
    material: Option<String>,
    variants: Json<Vec<Variant>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        if row.price < 0 {
            return Err(RepositoryError::DataCorruption(format!(
                "negative price for product {}",
                row.handle
            )));
        }
        Ok(Self {
            id: row.id,
            handle: row.handle,
            title: row.title,
            description: row.description,
            brand: row.brand,
            category: row.category,
            price: Price::from_minor(row.price),
            compare_at_price: row.compare_at_price.map(Price::from_minor),
            inventory_quantity: row.inventory_quantity,
            options: row.options.map(|Json(options)| options),
            material: row.material,
            variants: row.variants.0,
            created_at: row.created_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: CollectionId,
    handle: String,
    title: String,
    description: Option<String>,
    image_url: Option<String>,
    product_count: i64,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: row.id,
            handle: row.handle,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            product_count: row.product_count,
        }
    }
}

// =============================================================================
// PgCatalogStore
// =============================================================================

/// Catalog reads against the `catalog` schema.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_products(&self, page: &ProductPage) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p \
             WHERE ($1::text IS NULL OR lower(p.brand) = lower($1)) \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(page.brand.as_deref())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;
        into_products(rows)
    }

    async fn count_products(&self, page: &ProductPage) -> Result<i64, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM catalog.product p \
             WHERE ($1::text IS NULL OR lower(p.brand) = lower($1))",
        )
        .bind(page.brand.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn product_by_handle(&self, handle: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM catalog.product p WHERE p.handle = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn collections(&self) -> Result<Vec<Collection>, RepositoryError> {
        let rows = sqlx::query_as::<_, CollectionRow>(
            r"
            SELECT c.id, c.handle, c.title, c.description, c.image_url,
                   COUNT(cp.product_id) AS product_count
            FROM catalog.collection c
            LEFT JOIN catalog.collection_product cp ON cp.collection_id = c.id
            GROUP BY c.id
            ORDER BY c.title ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Collection::from).collect())
    }

    async fn collection_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Collection>, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(
            r"
            SELECT c.id, c.handle, c.title, c.description, c.image_url,
                   COUNT(cp.product_id) AS product_count
            FROM catalog.collection c
            LEFT JOIN catalog.collection_product cp ON cp.collection_id = c.id
            WHERE c.handle = $1
            GROUP BY c.id
            ",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Collection::from))
    }

    async fn collection_products(
        &self,
        collection: CollectionId,
        sort: ProductSort,
        brand: Option<String>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p \
             JOIN catalog.collection_product cp ON cp.product_id = p.id \
             WHERE cp.collection_id = $1 \
             AND ($2::text IS NULL OR lower(p.brand) = lower($2)) \
             {}",
            order_by(sort, "cp.position ASC, p.created_at DESC")
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(collection)
            .bind(brand)
            .fetch_all(&self.pool)
            .await?;
        into_products(rows)
    }

    async fn search_products(
        &self,
        params: &SearchParams,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p WHERE {SEARCH_PREDICATE} {} \
             LIMIT $6 OFFSET $7",
            order_by(params.sort, "(p.title ILIKE $1) DESC, p.created_at DESC")
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(contains_pattern(&params.query))
            .bind(params.brand.as_deref())
            .bind(params.category.as_deref())
            .bind(params.min_price.map(Price::minor))
            .bind(params.max_price.map(Price::minor))
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await?;
        into_products(rows)
    }

    async fn count_search(&self, params: &SearchParams) -> Result<i64, RepositoryError> {
        let sql = format!("SELECT COUNT(*) FROM catalog.product p WHERE {SEARCH_PREDICATE}");
        let total: i64 = sqlx::query_scalar(&sql)
            .bind(contains_pattern(&params.query))
            .bind(params.brand.as_deref())
            .bind(params.category.as_deref())
            .bind(params.min_price.map(Price::minor))
            .bind(params.max_price.map(Price::minor))
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn suggestions(&self, query: &str, limit: i64) -> Result<Vec<String>, RepositoryError> {
        let titles: Vec<String> = sqlx::query_scalar(
            r"
            SELECT DISTINCT p.title
            FROM catalog.product p
            WHERE p.title ILIKE $1
            ORDER BY p.title ASC
            LIMIT $2
            ",
        )
        .bind(contains_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(titles)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
