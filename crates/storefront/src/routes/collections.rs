//! Collection route handlers.
//!
//! A collection page loads every product in the collection (cached per
//! handle, sort and brand), derives the facet list from that full set, and
//! then applies the built-in and dynamic filters and pagination in memory.

use axum::{
    extract::{Path, RawQuery, State},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use validator::Validate;

use atelier_core::facets::{
    BuiltinFilters, FilterFacet, SelectedFilters, Selection, apply_dynamic_filters,
    extract_dynamic_filters,
};
use atelier_core::{Collection, Price, Product, ProductSort};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::routes::query::{
    COLLECTION_CACHE, MAX_LIMIT, ValidatedQuery, cached_json, empty_as_none, non_empty,
    parse_field, total_pages, validate_price, validate_sort,
};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 24;

/// Query keys with this prefix select dynamic facet values.
const FILTER_PREFIX: &str = "filter.";

#[derive(Debug, Serialize)]
pub struct CollectionsResponse {
    pub collections: Vec<Collection>,
    pub count: usize,
}

/// Collection page query parameters. Facet selections are read separately
/// from the raw query string.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CollectionQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 1, message = "must be 1 or greater"))]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub limit: Option<i64>,
    #[validate(custom(function = "validate_sort"))]
    pub sort: Option<String>,
    pub brand: Option<String>,
    /// Comma-separated category names.
    pub categories: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub min_price: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub max_price: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub in_stock: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub on_sale: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    pub collection: Collection,
    pub products: Vec<Product>,
    pub total_products: usize,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub filters: Vec<FilterFacet>,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Collect `filter.<facet>=v1,v2` pairs from the raw query string.
///
/// Repeated keys accumulate. A single value becomes `Selection::One`,
/// several become `Selection::Many`.
fn selected_filters(raw: Option<&str>) -> SelectedFilters {
    let mut values: Vec<(String, Vec<String>)> = Vec::new();

    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        let Some(facet_id) = key.strip_prefix(FILTER_PREFIX) else {
            continue;
        };
        let parsed = split_list(&value);
        match values.iter_mut().find(|(id, _)| id == facet_id) {
            Some((_, existing)) => existing.extend(parsed),
            None => values.push((facet_id.to_string(), parsed)),
        }
    }

    values
        .into_iter()
        .map(|(id, mut selected)| {
            let selection = if selected.len() == 1 {
                Selection::One(selected.pop())
            } else {
                Selection::Many(selected)
            };
            (id, selection)
        })
        .collect()
}

fn paginate(products: Vec<Product>, page: i64, limit: i64) -> Vec<Product> {
    let skip = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
    let take = usize::try_from(limit).unwrap_or(0);
    products.into_iter().skip(skip).take(take).collect()
}

/// `GET /api/collections`
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Response> {
    let collections = state.catalog().get_collections().await?;
    cached_json(
        COLLECTION_CACHE,
        CollectionsResponse {
            count: collections.len(),
            collections,
        },
    )
}

/// `GET /api/collections/{handle}`
#[instrument(skip(state, query, raw_query), fields(handle = %handle))]
pub async fn show(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    ValidatedQuery(query): ValidatedQuery<CollectionQuery>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let sort = parse_field::<ProductSort>("sort", query.sort.as_deref())?
        .unwrap_or(ProductSort::Relevance);
    let brand = non_empty(query.brand.as_deref());

    let listing = state
        .catalog()
        .get_collection(&handle, sort, brand.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound("Collection not found".to_string()))?;

    let filters = extract_dynamic_filters(&listing.products);

    let mut selected = selected_filters(raw_query.as_deref());
    let dropped = selected.retain_known(&filters);
    if !dropped.is_empty() {
        debug!(?dropped, "Ignoring filters not offered by this collection");
    }

    let builtin = BuiltinFilters {
        price_min: parse_field::<Price>("minPrice", query.min_price.as_deref())?,
        price_max: parse_field::<Price>("maxPrice", query.max_price.as_deref())?,
        categories: query.categories.as_deref().map(split_list).unwrap_or_default(),
        in_stock: query.in_stock.unwrap_or(false),
        on_sale: query.on_sale.unwrap_or(false),
    };

    if !selected.is_empty() || !builtin.is_empty() {
        add_breadcrumb("catalog", "Collection filtered", &[("handle", handle.as_str())]);
    }

    let matching = apply_dynamic_filters(builtin.apply(listing.products), &selected);
    let total_products = matching.len();

    cached_json(
        COLLECTION_CACHE,
        CollectionResponse {
            collection: listing.collection,
            products: paginate(matching, page, limit),
            total_products,
            page,
            limit,
            total_pages: total_pages(i64::try_from(total_products).unwrap_or(i64::MAX), limit),
            filters,
        },
    )
}
