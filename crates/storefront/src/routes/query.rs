//! Query-string extraction and response helpers shared by the API handlers.

use std::fmt::Display;
use std::str::FromStr;

use axum::{
    extract::{FromRequestParts, Query},
    http::{HeaderValue, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use atelier_core::{Price, ProductSort};

use crate::error::AppError;

pub const PRODUCT_LIST_CACHE: &str = "public, max-age=60, s-maxage=1800";
pub const PRODUCT_CACHE: &str = "public, max-age=300, s-maxage=1800";
pub const SEARCH_CACHE: &str = "public, max-age=60, s-maxage=600";
pub const COLLECTION_CACHE: &str = "public, max-age=300, s-maxage=3600";

/// Largest page size any listing accepts.
pub const MAX_LIMIT: i64 = 100;

// =============================================================================
// Extractor
// =============================================================================

/// Query-string extractor that runs `validator` checks.
///
/// Deserialization and validation failures both become
/// `AppError::Validation`, rendered as a 400 with `field: message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| AppError::Validation(describe(&errors)))?;
        Ok(Self(value))
    }
}

/// `snake_case` field name to the camelCase used on the wire.
fn wire_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Render the first failing field (by name) as `field: message`.
fn describe(errors: &ValidationErrors) -> String {
    let fields = errors.field_errors();
    let mut names: Vec<_> = fields.keys().collect();
    names.sort();

    names
        .first()
        .and_then(|name| {
            let error = fields.get(*name)?.first()?;
            let message = error.message.as_deref().unwrap_or(error.code.as_ref());
            Some(format!("{}: {message}", wire_name(name)))
        })
        .unwrap_or_else(|| errors.to_string())
}

// =============================================================================
// Field Helpers
// =============================================================================

/// Deserialize empty strings as `None` for optional parsed fields.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

pub fn validate_price(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    value
        .trim()
        .parse::<Price>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("price").with_message("must be a non-negative amount".into()))
}

pub fn validate_sort(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    value.trim().parse::<ProductSort>().map(|_| ()).map_err(|_| {
        ValidationError::new("sort")
            .with_message("must be one of relevance, newest, price-asc, price-desc, title-asc".into())
    })
}

/// Parse an already-validated optional field, reporting failures as 400s.
pub fn parse_field<T>(field: &str, value: Option<&str>) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| AppError::Validation(format!("{field}: {e}")))
        })
        .transpose()
}

/// Trimmed, non-empty copy of an optional string parameter.
#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Number of pages needed for `total` items.
#[must_use]
pub const fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    total.saturating_add(limit - 1) / limit
}

/// A JSON response carrying a `Cache-Control` header.
///
/// # Errors
///
/// Returns `AppError::Internal` if `body` cannot be encoded.
pub fn cached_json<T: Serialize>(cache_control: &'static str, body: T) -> Result<Response, AppError> {
    let encoded = serde_json::to_vec(&body)
        .map_err(|e| AppError::Internal(format!("Failed to encode response: {e}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CACHE_CONTROL, HeaderValue::from_static(cache_control)),
        ],
        encoded,
    )
        .into_response())
}
