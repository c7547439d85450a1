//! Key-value cache shared by the catalog and the rate limiter.
//!
//! # Backends
//!
//! - [`RedisStore`] - shared Redis instance, used in production
//! - [`MemoryStore`] - per-process `moka` store, used in development and tests
//!
//! Running without a store is a supported mode: [`CacheClient`] then reports
//! every lookup as a miss and drops every write.
//!
//! # Failure Policy
//!
//! Every operation returns `Result<_, CacheError>`, but callers treat the
//! error as recoverable: the catalog falls back to the database and the rate
//! limiter lets the request through.

mod keys;
mod memory;
mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{CacheBackend, StorefrontConfig};

pub use keys::{COLLECTION_TTL, CacheKey, PRODUCT_TTL, SEARCH_TTL};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Errors from the key-value store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis command or connection failed.
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// Stored payload could not be encoded or decoded.
    #[error("Cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A string key-value store with per-entry expiry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the raw value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

/// JSON cache client over an optional [`KvStore`].
#[derive(Clone, Default)]
pub struct CacheClient {
    store: Option<Arc<dyn KvStore>>,
}

impl CacheClient {
    /// Create a client over `store`; `None` disables caching.
    #[must_use]
    pub fn new(store: Option<Arc<dyn KvStore>>) -> Self {
        Self { store }
    }

    /// A client with no backing store.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether a store is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Fetch and decode a JSON value.
    ///
    /// Returns `Ok(None)` on a miss and when no store is configured.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store fails or the payload does not decode
    /// as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and store a JSON value. A no-op when no store is configured.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if encoding or the store write fails.
    pub async fn put_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let raw = serde_json::to_string(value)?;
        store.put(key, raw, ttl).await
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Open the key-value store selected by `config`.
///
/// An unreachable Redis is logged and treated as "no store", so the service
/// still starts and serves uncached, unlimited traffic.
pub async fn open_store(config: &StorefrontConfig) -> Option<Arc<dyn KvStore>> {
    match config.cache_backend {
        CacheBackend::Redis => {
            let url = config.redis_url.as_ref()?;
            match RedisStore::connect(url).await {
                Ok(store) => {
                    info!("Connected to Redis");
                    Some(Arc::new(store))
                }
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, running without cache");
                    None
                }
            }
        }
        CacheBackend::Memory => {
            info!("Using in-process cache");
            Some(Arc::new(MemoryStore::new()))
        }
        CacheBackend::None => {
            warn!("No cache backend configured; caching and rate limiting are disabled");
            None
        }
    }
}
