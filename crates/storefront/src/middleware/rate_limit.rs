//! Fixed-window rate limiting backed by the key-value cache.
//!
//! Each client gets one counter per route prefix, stored under
//! `ratelimit:{client}:{prefix}` as a JSON [`RateLimitRecord`]. The first
//! request in a window creates the record; later ones increment it until the
//! window's `resetAt` passes, at which point the next request starts a fresh
//! window.
//!
//! The read-then-write against the store is not atomic, so concurrent
//! requests from one client can under-count. Limits are best-effort.
//!
//! The limiter fails open: without a store, or when the store errors, the
//! request goes through without rate-limit headers.

use std::net::IpAddr;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CacheClient;
use crate::error::AppError;
use crate::state::AppState;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

// =============================================================================
// Policies
// =============================================================================

/// Request budget for one route prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// Path prefix, matched on segment boundaries. Also part of the key.
    pub prefix: &'static str,
    pub window_ms: i64,
    pub max_requests: u32,
}

/// Per-prefix policies. The longest matching prefix wins.
pub const POLICIES: &[RatePolicy] = &[
    RatePolicy {
        prefix: "/api/search",
        window_ms: 60_000,
        max_requests: 30,
    },
    RatePolicy {
        prefix: "/api/products",
        window_ms: 60_000,
        max_requests: 60,
    },
    RatePolicy {
        prefix: "/api/collections",
        window_ms: 60_000,
        max_requests: 60,
    },
];

/// Policy for paths no prefix matches. All such paths share one counter.
pub const DEFAULT_POLICY: RatePolicy = RatePolicy {
    prefix: "default",
    window_ms: 60_000,
    max_requests: 100,
};

const STATIC_PREFIXES: &[&str] = &["/static/", "/assets/"];
const STATIC_FILES: &[&str] = &["/favicon.ico", "/robots.txt"];
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "woff",
    "woff2", "ttf", "otf", "txt", "xml", "webmanifest",
];

/// Whether `path` equals `prefix` or continues it with a new segment.
fn matches_segment_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Select the policy for a request path.
#[must_use]
pub fn policy_for(path: &str) -> &'static RatePolicy {
    POLICIES
        .iter()
        .filter(|policy| matches_segment_prefix(path, policy.prefix))
        .max_by_key(|policy| policy.prefix.len())
        .unwrap_or(&DEFAULT_POLICY)
}

/// Whether `path` is a static asset that is never rate limited.
#[must_use]
pub fn is_static_path(path: &str) -> bool {
    if STATIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || STATIC_FILES.contains(&path)
    {
        return true;
    }
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    last_segment
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| {
            !stem.is_empty() && STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
}

// =============================================================================
// Client Identification
// =============================================================================

fn header_ip(headers: &HeaderMap, name: &str, first_of_list: bool) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    let candidate = if first_of_list {
        value.split(',').next()?
    } else {
        value
    };
    candidate.trim().parse::<IpAddr>().ok()
}

/// Resolve the client address from proxy headers.
///
/// Checks Cloudflare's `CF-Connecting-IP` first, then the first entry of
/// `X-Forwarded-For`, then `X-Real-IP`. Returns `"unknown"` if none parse.
#[must_use]
pub fn client_id(headers: &HeaderMap) -> String {
    header_ip(headers, "cf-connecting-ip", false)
        .or_else(|| header_ip(headers, "x-forwarded-for", true))
        .or_else(|| header_ip(headers, "x-real-ip", false))
        .map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
}

// =============================================================================
// Rate Limiter
// =============================================================================

/// Counter state for one client and route prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    pub count: u32,
    /// End of the window, epoch milliseconds.
    pub reset_at: i64,
}

/// Values reported in the `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds.
    pub reset_at: i64,
}

impl RateLimitStatus {
    fn apply(self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_at));
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Not checked (static path, development, or store unavailable).
    Bypass,
    Allowed(RateLimitStatus),
    Limited {
        status: RateLimitStatus,
        retry_after_secs: u64,
    },
}

/// Whole seconds until `reset_at`, rounded up, at least 1.
fn seconds_until(reset_at: i64, now_ms: i64) -> u64 {
    let remaining_ms = u64::try_from(reset_at.saturating_sub(now_ms)).unwrap_or(0);
    remaining_ms.div_ceil(1000).max(1)
}

/// Fixed-window limiter over the shared cache.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    cache: CacheClient,
    enabled: bool,
}

impl RateLimiter {
    /// Create a limiter. A disabled limiter bypasses every request.
    #[must_use]
    pub const fn new(cache: CacheClient, enabled: bool) -> Self {
        Self { cache, enabled }
    }

    /// Check a request at the current time.
    pub async fn check(&self, client: &str, path: &str) -> Decision {
        self.check_at(client, path, Utc::now().timestamp_millis()).await
    }

    /// Check a request at `now_ms` (epoch milliseconds).
    pub async fn check_at(&self, client: &str, path: &str, now_ms: i64) -> Decision {
        if !self.enabled || is_static_path(path) {
            return Decision::Bypass;
        }
        if !self.cache.is_enabled() {
            warn!(path, "No cache store configured, skipping rate limit");
            return Decision::Bypass;
        }

        let policy = policy_for(path);
        let key = format!("ratelimit:{client}:{}", policy.prefix);

        let existing = match self.cache.get_json::<RateLimitRecord>(&key).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(key, error = %e, "Rate limit lookup failed, allowing request");
                return Decision::Bypass;
            }
        };

        let record = match existing {
            Some(record) if now_ms < record.reset_at => RateLimitRecord {
                count: record.count.saturating_add(1),
                reset_at: record.reset_at,
            },
            _ => RateLimitRecord {
                count: 1,
                reset_at: now_ms + policy.window_ms,
            },
        };

        let status = RateLimitStatus {
            limit: policy.max_requests,
            remaining: policy.max_requests.saturating_sub(record.count),
            reset_at: record.reset_at,
        };

        if record.count > policy.max_requests {
            let retry_after_secs = seconds_until(record.reset_at, now_ms);
            debug!(client, prefix = policy.prefix, retry_after_secs, "Rate limit exceeded");
            return Decision::Limited {
                status,
                retry_after_secs,
            };
        }

        let ttl = Duration::from_secs(seconds_until(record.reset_at, now_ms));
        if let Err(e) = self.cache.put_json(&key, &record, ttl).await {
            warn!(key, error = %e, "Rate limit write failed");
        }

        Decision::Allowed(status)
    }
}

/// Middleware applying [`RateLimiter`] to every request.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_id(request.headers());
    let decision = state
        .rate_limiter()
        .check(&client, request.uri().path())
        .await;

    match decision {
        Decision::Bypass => next.run(request).await,
        Decision::Allowed(status) => {
            let mut response = next.run(request).await;
            status.apply(response.headers_mut());
            response
        }
        Decision::Limited {
            status,
            retry_after_secs,
        } => {
            let mut response = AppError::RateLimited(retry_after_secs).into_response();
            status.apply(response.headers_mut());
            response
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::{CacheError, MemoryStore, MockKvStore};

    const NOW: i64 = 1_790_000_000_000;

    fn limiter() -> RateLimiter {
        RateLimiter::new(CacheClient::new(Some(Arc::new(MemoryStore::new()))), true)
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_longest_prefix_on_segment_boundary() {
        assert_eq!(policy_for("/api/search").max_requests, 30);
        assert_eq!(policy_for("/api/search/suggest").max_requests, 30);
        assert_eq!(policy_for("/api/products/linen-shirt").max_requests, 60);
        assert_eq!(policy_for("/api/searches"), &DEFAULT_POLICY);
        assert_eq!(policy_for("/"), &DEFAULT_POLICY);
    }

    #[test]
    fn test_static_paths() {
        assert!(is_static_path("/static/css/main.css"));
        assert!(is_static_path("/assets/logo"));
        assert!(is_static_path("/favicon.ico"));
        assert!(is_static_path("/robots.txt"));
        assert!(is_static_path("/images/hero.WEBP"));
        assert!(!is_static_path("/api/products/linen-shirt"));
        assert!(!is_static_path("/api/products/v1.2"));
        assert!(!is_static_path("/.css"));
    }

    #[test]
    fn test_client_id_header_order() {
        let all = headers(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.1, 10.0.0.1"),
            ("x-real-ip", "192.0.2.9"),
        ]);
        assert_eq!(client_id(&all), "203.0.113.7");

        let forwarded = headers(&[
            ("x-forwarded-for", " 198.51.100.1 , 10.0.0.1"),
            ("x-real-ip", "192.0.2.9"),
        ]);
        assert_eq!(client_id(&forwarded), "198.51.100.1");

        let bogus_cf = headers(&[("cf-connecting-ip", "garbage"), ("x-real-ip", "192.0.2.9")]);
        assert_eq!(client_id(&bogus_cf), "192.0.2.9");

        assert_eq!(client_id(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn test_seconds_until_rounds_up() {
        assert_eq!(seconds_until(NOW + 60_000, NOW), 60);
        assert_eq!(seconds_until(NOW + 1_001, NOW), 2);
        assert_eq!(seconds_until(NOW + 10, NOW), 1);
        assert_eq!(seconds_until(NOW - 10, NOW), 1);
    }

    #[tokio::test]
    async fn test_search_allows_thirty_then_limits() {
        let limiter = limiter();
        for n in 1..=30_u32 {
            match limiter.check_at("203.0.113.7", "/api/search", NOW + i64::from(n)).await {
                Decision::Allowed(status) => {
                    assert_eq!(status.limit, 30);
                    assert_eq!(status.remaining, 30 - n);
                    assert_eq!(status.reset_at, NOW + 60_000);
                }
                other => panic!("request {n} should be allowed, got {other:?}"),
            }
        }

        match limiter.check_at("203.0.113.7", "/api/search", NOW + 500).await {
            Decision::Limited {
                status,
                retry_after_secs,
            } => {
                assert_eq!(status.remaining, 0);
                assert!((1..=60).contains(&retry_after_secs));
            }
            other => panic!("request 31 should be limited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_window_resets_after_reset_at() {
        let limiter = limiter();
        for _ in 0..=30 {
            limiter.check_at("203.0.113.7", "/api/search", NOW).await;
        }
        assert!(matches!(
            limiter.check_at("203.0.113.7", "/api/search", NOW + 59_999).await,
            Decision::Limited { .. }
        ));

        match limiter.check_at("203.0.113.7", "/api/search", NOW + 60_000).await {
            Decision::Allowed(status) => {
                assert_eq!(status.remaining, 29);
                assert_eq!(status.reset_at, NOW + 120_000);
            }
            other => panic!("new window should allow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_counters_are_per_client_and_prefix() {
        let limiter = limiter();
        for _ in 0..30 {
            limiter.check_at("203.0.113.7", "/api/search", NOW).await;
        }
        assert!(matches!(
            limiter.check_at("198.51.100.1", "/api/search", NOW).await,
            Decision::Allowed(_)
        ));
        assert!(matches!(
            limiter.check_at("203.0.113.7", "/api/products", NOW).await,
            Decision::Allowed(_)
        ));
    }

    #[tokio::test]
    async fn test_disabled_limiter_and_static_paths_bypass() {
        let dev = RateLimiter::new(CacheClient::new(Some(Arc::new(MemoryStore::new()))), false);
        assert_eq!(dev.check_at("c", "/api/search", NOW).await, Decision::Bypass);
        assert_eq!(
            limiter().check_at("c", "/static/app.js", NOW).await,
            Decision::Bypass
        );
    }

    #[tokio::test]
    async fn test_fails_open_without_store() {
        let limiter = RateLimiter::new(CacheClient::disabled(), true);
        for _ in 0..50 {
            assert_eq!(
                limiter.check_at("c", "/api/search", NOW).await,
                Decision::Bypass
            );
        }
    }

    #[tokio::test]
    async fn test_fails_open_on_store_error() {
        let mut kv = MockKvStore::new();
        kv.expect_get().returning(|_| {
            Err(CacheError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "timeout",
            ))))
        });
        kv.expect_put().never();

        let limiter = RateLimiter::new(CacheClient::new(Some(Arc::new(kv))), true);
        assert_eq!(
            limiter.check_at("c", "/api/search", NOW).await,
            Decision::Bypass
        );
    }

    #[tokio::test]
    async fn test_write_failure_still_allows() {
        let mut kv = MockKvStore::new();
        kv.expect_get().returning(|_| Ok(None));
        kv.expect_put().times(1).returning(|_, _, _| {
            Err(CacheError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "read only replica",
            ))))
        });

        let limiter = RateLimiter::new(CacheClient::new(Some(Arc::new(kv))), true);
        assert!(matches!(
            limiter.check_at("c", "/api/products", NOW).await,
            Decision::Allowed(_)
        ));
    }

    #[tokio::test]
    async fn test_record_ttl_covers_remaining_window() {
        let mut kv = MockKvStore::new();
        kv.expect_get().returning(|_| {
            Ok(Some(
                serde_json::to_string(&RateLimitRecord {
                    count: 4,
                    reset_at: NOW + 12_500,
                })
                .unwrap(),
            ))
        });
        kv.expect_put()
            .withf(|key, value, ttl| {
                key == "ratelimit:c:/api/collections"
                    && value.contains("\"count\":5")
                    && *ttl == Duration::from_secs(13)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let limiter = RateLimiter::new(CacheClient::new(Some(Arc::new(kv))), true);
        limiter.check_at("c", "/api/collections/summer", NOW).await;
    }
}
