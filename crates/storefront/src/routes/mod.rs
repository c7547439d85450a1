//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                             - Liveness check
//! GET  /health/ready                       - Readiness check (catalog store)
//!
//! # Products
//! GET  /api/products                       - Product listing (limit, offset, brand)
//! GET  /api/products/{handle}              - Product detail
//! GET  /api/products/{handle}/variant      - Variant for ?Option=Value pairs
//!
//! # Search
//! GET  /api/search                         - Search results or ?suggestions=true
//!
//! # Collections
//! GET  /api/collections                    - Collection listing
//! GET  /api/collections/{handle}           - Collection page with facets
//! ```

pub mod collections;
pub mod products;
pub mod query;
pub mod search;

use axum::{Router, routing::get};

use crate::error::AppError;
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{handle}", get(products::show))
        .route("/{handle}/variant", get(products::variant))
}

/// Create the collection routes router.
pub fn collection_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(collections::index))
        .route("/{handle}", get(collections::show))
}

/// Create all API routes, with a JSON 404 for anything unmatched.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/products", product_routes())
        .route("/api/search", get(search::search))
        .nest("/api/collections", collection_routes())
        .fallback(not_found)
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}
