//! Search route handlers.

use axum::{extract::State, response::Response};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use atelier_core::{Price, Product, ProductSort};

use crate::db::SearchParams;
use crate::error::{Result, add_breadcrumb};
use crate::routes::query::{
    MAX_LIMIT, SEARCH_CACHE, ValidatedQuery, cached_json, empty_as_none, non_empty, parse_field,
    total_pages, validate_price, validate_sort,
};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 24;

/// Queries shorter than this get no suggestions.
const MIN_SUGGESTION_QUERY_LEN: usize = 2;

/// Search query parameters.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub q: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 1, message = "must be 1 or greater"))]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub limit: Option<i64>,
    #[validate(custom(function = "validate_sort"))]
    pub sort: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub min_price: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub max_price: Option<String>,
    /// Return title suggestions instead of results.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub suggestions: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub products: Vec<Product>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// `GET /api/search`
#[instrument(skip(state, query), fields(q = %query.q))]
pub async fn search(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<SearchQuery>,
) -> Result<Response> {
    let text = query.q.trim().to_lowercase();

    if query.suggestions.unwrap_or(false) {
        let suggestions = if text.chars().count() < MIN_SUGGESTION_QUERY_LEN {
            Vec::new()
        } else {
            state.catalog().suggestions(&text).await?
        };
        return cached_json(SEARCH_CACHE, SuggestionsResponse { suggestions });
    }

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let params = SearchParams {
        query: text,
        brand: non_empty(query.brand.as_deref()),
        category: non_empty(query.category.as_deref()),
        min_price: parse_field::<Price>("minPrice", query.min_price.as_deref())?,
        max_price: parse_field::<Price>("maxPrice", query.max_price.as_deref())?,
        sort: parse_field::<ProductSort>("sort", query.sort.as_deref())?
            .unwrap_or(ProductSort::Relevance),
        limit,
        offset: (page - 1).saturating_mul(limit),
    };

    add_breadcrumb(
        "search",
        "Product search",
        &[("query", params.query.as_str()), ("sort", params.sort.as_str())],
    );

    let list = state.catalog().search(&params).await?;
    cached_json(
        SEARCH_CACHE,
        SearchResponse {
            total_pages: total_pages(list.total, limit),
            products: list.products,
            total: list.total,
            page,
            limit,
        },
    )
}
