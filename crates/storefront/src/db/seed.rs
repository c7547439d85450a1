//! Catalog seeding from a declarative file.
//!
//! Used by `atelier-cli seed`. Products and collections are upserted by
//! handle inside a single transaction, so re-running a seed file updates the
//! catalog in place. Collection membership is replaced wholesale.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::info;

use atelier_core::{
    CollectionId, Price, ProductId, ProductOption, SelectedOption, Variant, VariantId,
};

use super::RepositoryError;

/// Variant ids are `product id * VARIANT_ID_STRIDE + position`.
const VARIANT_ID_STRIDE: i64 = 1000;

/// A catalog seed file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSeed {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub collections: Vec<SeedCollection>,
}

/// A product entry. Prices are decimal strings such as `"49.00"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedProduct {
    pub handle: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: String,
    pub compare_at_price: Option<String>,
    #[serde(default)]
    pub inventory_quantity: i32,
    pub options: Option<Vec<ProductOption>>,
    pub material: Option<String>,
    #[serde(default)]
    pub variants: Vec<SeedVariant>,
}

/// A variant entry. A missing price inherits the product price.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedVariant {
    pub sku: Option<String>,
    pub title: String,
    pub price: Option<String>,
    #[serde(default)]
    pub inventory_quantity: i32,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

/// A collection entry listing member product handles in display order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedCollection {
    pub handle: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub products: Vec<String>,
}

/// Counts from a completed seed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub products: usize,
    pub variants: usize,
    pub collections: usize,
}

fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !handle.starts_with('-')
        && !handle.ends_with('-')
}

fn parse_price(raw: &str, what: &str) -> Result<Price, String> {
    raw.parse::<Price>().map_err(|e| format!("{what}: {e}"))
}

impl CatalogSeed {
    /// Check the file before touching the database.
    ///
    /// # Errors
    ///
    /// Returns every problem found, one message per problem.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let mut handles = HashSet::new();

        for product in &self.products {
            let handle = &product.handle;
            if !is_valid_handle(handle) {
                errors.push(format!("product handle {handle:?} is not a lowercase slug"));
            }
            if !handles.insert(handle.as_str()) {
                errors.push(format!("product {handle} is defined twice"));
            }
            if product.title.trim().is_empty() {
                errors.push(format!("product {handle}: title is empty"));
            }
            if let Err(e) = parse_price(&product.price, &format!("product {handle} price")) {
                errors.push(e);
            }
            if let Some(compare) = &product.compare_at_price
                && let Err(e) = parse_price(compare, &format!("product {handle} compareAtPrice"))
            {
                errors.push(e);
            }
            for variant in &product.variants {
                if let Some(price) = &variant.price
                    && let Err(e) =
                        parse_price(price, &format!("product {handle} variant {}", variant.title))
                {
                    errors.push(e);
                }
            }
        }

        let mut collection_handles = HashSet::new();
        for collection in &self.collections {
            let handle = &collection.handle;
            if !is_valid_handle(handle) {
                errors.push(format!("collection handle {handle:?} is not a lowercase slug"));
            }
            if !collection_handles.insert(handle.as_str()) {
                errors.push(format!("collection {handle} is defined twice"));
            }
            for member in &collection.products {
                if !handles.contains(member.as_str()) {
                    errors.push(format!("collection {handle}: unknown product {member}"));
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Upsert every product and collection in `seed`.
///
/// Call [`CatalogSeed::validate`] first; invalid prices found here are
/// reported as `RepositoryError::DataCorruption`.
///
/// # Errors
///
/// Returns `RepositoryError` if any statement fails. Nothing is committed in
/// that case.
pub async fn seed_catalog(pool: &PgPool, seed: &CatalogSeed) -> Result<SeedReport, RepositoryError> {
    let mut tx = pool.begin().await?;
    let mut report = SeedReport::default();
    let mut product_ids: HashMap<&str, ProductId> = HashMap::new();

    for product in &seed.products {
        let price = parse_price(&product.price, &product.handle)
            .map_err(RepositoryError::DataCorruption)?;
        let compare_at_price = product
            .compare_at_price
            .as_deref()
            .map(|raw| parse_price(raw, &product.handle))
            .transpose()
            .map_err(RepositoryError::DataCorruption)?;

        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO catalog.product
                (handle, title, description, brand, category, price, compare_at_price,
                 inventory_quantity, options, material)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (handle) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                brand = EXCLUDED.brand,
                category = EXCLUDED.category,
                price = EXCLUDED.price,
                compare_at_price = EXCLUDED.compare_at_price,
                inventory_quantity = EXCLUDED.inventory_quantity,
                options = EXCLUDED.options,
                material = EXCLUDED.material
            RETURNING id
            ",
        )
        .bind(&product.handle)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.brand.as_deref())
        .bind(product.category.as_deref())
        .bind(price.minor())
        .bind(compare_at_price.map(Price::minor))
        .bind(product.inventory_quantity)
        .bind(product.options.as_ref().map(Json))
        .bind(product.material.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let mut variants = Vec::with_capacity(product.variants.len());
        for (position, variant) in (1_i64..).zip(&product.variants) {
            let variant_price = match variant.price.as_deref() {
                Some(raw) => parse_price(raw, &product.handle)
                    .map_err(RepositoryError::DataCorruption)?,
                None => price,
            };
            variants.push(Variant {
                id: VariantId::new(id.as_i64() * VARIANT_ID_STRIDE + position),
                sku: variant.sku.clone(),
                title: variant.title.clone(),
                price: variant_price,
                inventory_quantity: variant.inventory_quantity,
                selected_options: variant.selected_options.clone(),
            });
        }

        sqlx::query("UPDATE catalog.product SET variants = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(&variants))
            .execute(&mut *tx)
            .await?;

        report.products += 1;
        report.variants += variants.len();
        product_ids.insert(product.handle.as_str(), id);
    }

    for collection in &seed.collections {
        let id: CollectionId = sqlx::query_scalar(
            r"
            INSERT INTO catalog.collection (handle, title, description, image_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (handle) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                image_url = EXCLUDED.image_url
            RETURNING id
            ",
        )
        .bind(&collection.handle)
        .bind(&collection.title)
        .bind(collection.description.as_deref())
        .bind(collection.image_url.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM catalog.collection_product WHERE collection_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for (position, handle) in (0_i32..).zip(&collection.products) {
            let Some(product_id) = product_ids.get(handle.as_str()) else {
                return Err(RepositoryError::DataCorruption(format!(
                    "collection {} references unknown product {handle}",
                    collection.handle
                )));
            };
            sqlx::query(
                "INSERT INTO catalog.collection_product (collection_id, product_id, position) \
                 VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(*product_id)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        report.collections += 1;
    }

    tx.commit().await?;
    info!(
        products = report.products,
        variants = report.variants,
        collections = report.collections,
        "Catalog seeded"
    );
    Ok(report)
}
