//! Application state shared across handlers.

use std::sync::Arc;

use crate::cache::{CacheClient, KvStore};
use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::db::CatalogStore;
use crate::middleware::RateLimiter;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the cached catalog, the rate limiter and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Catalog,
    rate_limiter: RateLimiter,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Catalog store (`PostgreSQL` in production)
    /// * `kv` - Key-value store shared by the catalog cache and the rate
    ///   limiter, or `None` to run without caching or rate limiting
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn CatalogStore>,
        kv: Option<Arc<dyn KvStore>>,
    ) -> Self {
        let cache = CacheClient::new(kv);
        let rate_limiter = RateLimiter::new(cache.clone(), !config.environment.is_development());
        let catalog = Catalog::new(store, cache);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                rate_limiter,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cached catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Get a reference to the rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }
}
