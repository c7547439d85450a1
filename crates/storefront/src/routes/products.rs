//! Product route handlers.

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use crate::db::ProductPage;
use crate::error::{AppError, Result};
use crate::routes::query::{
    MAX_LIMIT, PRODUCT_CACHE, PRODUCT_LIST_CACHE, ValidatedQuery, cached_json, empty_as_none,
    non_empty,
};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 20;

/// Product listing query parameters.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductsQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 0, message = "must be 0 or greater"))]
    pub offset: Option<i64>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub brand: Option<String>,
}

/// `GET /api/products`
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<ProductsQuery>,
) -> Result<Response> {
    let page = ProductPage {
        brand: non_empty(query.brand.as_deref()),
        limit: query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        offset: query.offset.unwrap_or(0),
    };

    let list = state.catalog().get_products(&page).await?;
    cached_json(PRODUCT_LIST_CACHE, list)
}

/// `GET /api/products/{handle}`
#[instrument(skip(state), fields(handle = %handle))]
pub async fn show(State(state): State<AppState>, Path(handle): Path<String>) -> Result<Response> {
    let product = state
        .catalog()
        .get_product_by_handle(&handle)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    cached_json(PRODUCT_CACHE, product)
}

/// `GET /api/products/{handle}/variant?Size=M&Color=Sand`
///
/// Every query pair is an option name and value; the first variant matching
/// all of them is returned.
#[instrument(skip(state, selection), fields(handle = %handle))]
pub async fn variant(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Query(selection): Query<Vec<(String, String)>>,
) -> Result<Response> {
    if selection.is_empty() {
        return Err(AppError::Validation(
            "options: at least one option is required".to_string(),
        ));
    }

    let product = state
        .catalog()
        .get_product_by_handle(&handle)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let variant = product
        .find_variant(&selection)
        .ok_or_else(|| AppError::NotFound("Variant not found".to_string()))?;

    cached_json(PRODUCT_CACHE, variant)
}
