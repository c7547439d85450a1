//! Cache keys and their TTLs.
//!
//! Keys are built from the logical query parameters only, so two requests
//! asking for the same data always share an entry and two different queries
//! never do. Every user-supplied part is form-urlencoded, so it can contain
//! neither `:` nor `~`; unset optional parameters are written as `~`.
//! Brand and category are lower-cased, matching the case-insensitive SQL.

use std::fmt;
use std::time::Duration;

use url::form_urlencoded::byte_serialize;

use atelier_core::{Price, ProductSort};

use crate::db::{ProductPage, SearchParams};

/// TTL for product lists and product detail.
pub const PRODUCT_TTL: Duration = Duration::from_secs(1800);
/// TTL for collection lists and collection pages.
pub const COLLECTION_TTL: Duration = Duration::from_secs(3600);
/// TTL for search results and suggestions.
pub const SEARCH_TTL: Duration = Duration::from_secs(600);

/// A catalog cache entry.
#[derive(Debug, Clone, Copy)]
pub enum CacheKey<'a> {
    Products(&'a ProductPage),
    Product { handle: &'a str },
    Collections,
    Collection {
        handle: &'a str,
        sort: ProductSort,
        brand: Option<&'a str>,
    },
    Search(&'a SearchParams),
    Suggestions { query: &'a str },
}

impl CacheKey<'_> {
    /// How long the entry lives.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        match self {
            Self::Products(_) | Self::Product { .. } => PRODUCT_TTL,
            Self::Collections | Self::Collection { .. } => COLLECTION_TTL,
            Self::Search(_) | Self::Suggestions { .. } => SEARCH_TTL,
        }
    }
}

/// Marker for an unset optional part. Encoded values never contain it.
const UNSET: &str = "~";

/// A user-supplied part with separators escaped.
fn encoded(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// An optional filter value, lower-cased and encoded, or [`UNSET`].
fn filter(value: Option<&str>) -> String {
    value.map_or_else(|| UNSET.to_string(), |v| encoded(&v.to_lowercase()))
}

fn bound(value: Option<Price>) -> String {
    value.map_or_else(|| UNSET.to_string(), |price| price.minor().to_string())
}

impl fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Products(page) => write!(
                f,
                "products:{}:{}:{}",
                filter(page.brand.as_deref()),
                page.limit,
                page.offset
            ),
            Self::Product { handle } => write!(f, "product:{}", encoded(handle)),
            Self::Collections => f.write_str("collections:all"),
            Self::Collection {
                handle,
                sort,
                brand,
            } => write!(
                f,
                "collection:{}:{sort}:{}",
                encoded(handle),
                filter(*brand)
            ),
            Self::Search(params) => write!(
                f,
                "search:{}:{}:{}:{}:{}:{}:{}:{}",
                encoded(&params.query),
                filter(params.brand.as_deref()),
                filter(params.category.as_deref()),
                bound(params.min_price),
                bound(params.max_price),
                params.sort,
                params.limit,
                params.offset
            ),
            Self::Suggestions { query } => write!(f, "search:suggest:{}", encoded(query)),
        }
    }
}
