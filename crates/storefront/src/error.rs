//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error renders as a JSON body:
//!
//! ```json
//! {"error": "Product not found", "statusCode": 404, "timestamp": "2026-10-16T09:30:00Z"}
//! ```

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::catalog::CatalogError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Catalog read failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Query parameters failed validation; carries `field: message`.
    #[error("Invalid parameters: {0}")]
    Validation(String),

    /// Resource not found; carries the client-facing message.
    #[error("{0}")]
    NotFound(String),

    /// Rate limited; retry after the given number of seconds.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status_code: u16,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    #[must_use]
    pub fn new(status: StatusCode, error: impl Into<String>, message: Option<String>) -> Self {
        Self {
            error: error.into(),
            message,
            status_code: status.as_u16(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            retry_after: None,
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Catalog(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(self, Self::Catalog(_) | Self::Internal(_))
    }

    fn body(&self) -> ErrorBody {
        let status = self.status();
        match self {
            // Don't expose internal error details to clients in release builds
            Self::Catalog(_) | Self::Internal(_) => {
                let detail = cfg!(debug_assertions).then(|| self.to_string());
                ErrorBody::new(status, "Internal server error", detail)
            }
            Self::Validation(message) => {
                ErrorBody::new(status, "Invalid parameters", Some(message.clone()))
            }
            Self::NotFound(message) => ErrorBody::new(status, message.clone(), None),
            Self::RateLimited(seconds) => ErrorBody {
                retry_after: Some(*seconds),
                ..ErrorBody::new(
                    status,
                    "Too many requests",
                    Some(format!("Rate limit exceeded. Try again in {seconds} seconds.")),
                )
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut response = (self.status(), Json(self.body())).into_response();
        if let Self::RateLimited(seconds) = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for catalog activity.
///
/// Breadcrumbs appear in Sentry error reports to show what the request was
/// doing before it failed.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
