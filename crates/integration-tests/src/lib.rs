//! Integration tests for Atelier.
//!
//! # Running Tests
//!
//! ```bash
//! # Router-level tests (no external services)
//! cargo test -p atelier-integration-tests
//!
//! # Include the PostgreSQL-backed tests
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p atelier-integration-tests -- --ignored
//! ```
//!
//! # Test Harness
//!
//! [`TestApp`] assembles the real storefront router over an
//! [`InMemoryCatalog`] and, optionally, the in-process `moka` key-value
//! store. The catalog counts every store call so tests can assert cache
//! behavior from the outside.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use secrecy::SecretString;
use tower::ServiceExt;

use atelier_core::{
    Collection, CollectionId, OptionValue, Price, Product, ProductId, ProductOption, ProductSort,
    SelectedOption, Variant, VariantId,
};
use atelier_storefront::cache::{KvStore, MemoryStore};
use atelier_storefront::config::{CacheBackend, Environment, StorefrontConfig};
use atelier_storefront::db::{CatalogStore, ProductPage, RepositoryError, SearchParams};
use atelier_storefront::state::AppState;

// ============================================================================
// In-memory Catalog
// ============================================================================

/// A [`CatalogStore`] over fixed vectors that counts its calls.
pub struct InMemoryCatalog {
    products: Vec<Product>,
    collections: Vec<(Collection, Vec<String>)>,
    queries: AtomicUsize,
    healthy: AtomicBool,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new(products: Vec<Product>, collections: Vec<(Collection, Vec<String>)>) -> Self {
        Self {
            products,
            collections,
            queries: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    /// Number of store calls so far.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Make `ping` fail (or succeed again).
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn record(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }

    fn newest_first(&self) -> Vec<Product> {
        let mut products = self.products.clone();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products
    }

    fn matching_page(&self, page: &ProductPage) -> Vec<Product> {
        self.newest_first()
            .into_iter()
            .filter(|p| brand_matches(p, page.brand.as_deref()))
            .collect()
    }

    fn matching_search(&self, params: &SearchParams) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .newest_first()
            .into_iter()
            .filter(|p| {
                let haystack = [
                    Some(p.title.as_str()),
                    Some(p.description.as_str()),
                    p.brand.as_deref(),
                    p.category.as_deref(),
                ];
                params.query.is_empty()
                    || haystack
                        .iter()
                        .flatten()
                        .any(|field| field.to_lowercase().contains(&params.query))
            })
            .filter(|p| brand_matches(p, params.brand.as_deref()))
            .filter(|p| {
                params.category.as_deref().is_none_or(|category| {
                    p.category
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(category))
                })
            })
            .filter(|p| params.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| params.max_price.is_none_or(|max| p.price <= max))
            .collect();
        sort_products(&mut products, params.sort);
        products
    }
}

fn brand_matches(product: &Product, brand: Option<&str>) -> bool {
    brand.is_none_or(|brand| {
        product
            .brand
            .as_deref()
            .is_some_and(|b| b.eq_ignore_ascii_case(brand))
    })
}

/// Order `products` like the SQL store; `Relevance` keeps the input order.
fn sort_products(products: &mut [Product], sort: ProductSort) {
    match sort {
        ProductSort::Relevance => {}
        ProductSort::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        ProductSort::PriceAsc => products.sort_by_key(|p| p.price),
        ProductSort::PriceDesc => products.sort_by(|a, b| b.price.cmp(&a.price)),
        ProductSort::TitleAsc => products.sort_by(|a, b| a.title.cmp(&b.title)),
    }
}

fn page_of(products: Vec<Product>, limit: i64, offset: i64) -> Vec<Product> {
    products
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(0))
        .take(usize::try_from(limit).unwrap_or(0))
        .collect()
}

fn count(products: &[Product]) -> i64 {
    i64::try_from(products.len()).unwrap_or(i64::MAX)
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list_products(&self, page: &ProductPage) -> Result<Vec<Product>, RepositoryError> {
        self.record();
        Ok(page_of(self.matching_page(page), page.limit, page.offset))
    }

    async fn count_products(&self, page: &ProductPage) -> Result<i64, RepositoryError> {
        self.record();
        Ok(count(&self.matching_page(page)))
    }

    async fn product_by_handle(&self, handle: &str) -> Result<Option<Product>, RepositoryError> {
        self.record();
        Ok(self.products.iter().find(|p| p.handle == handle).cloned())
    }

    async fn collections(&self) -> Result<Vec<Collection>, RepositoryError> {
        self.record();
        let mut collections: Vec<Collection> =
            self.collections.iter().map(|(c, _)| c.clone()).collect();
        collections.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(collections)
    }

    async fn collection_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Collection>, RepositoryError> {
        self.record();
        Ok(self
            .collections
            .iter()
            .find(|(c, _)| c.handle == handle)
            .map(|(c, _)| c.clone()))
    }

    async fn collection_products(
        &self,
        collection: CollectionId,
        sort: ProductSort,
        brand: Option<String>,
    ) -> Result<Vec<Product>, RepositoryError> {
        self.record();
        let Some((_, members)) = self.collections.iter().find(|(c, _)| c.id == collection) else {
            return Ok(Vec::new());
        };
        let mut products: Vec<Product> = members
            .iter()
            .filter_map(|handle| self.products.iter().find(|p| &p.handle == handle))
            .filter(|p| brand_matches(p, brand.as_deref()))
            .cloned()
            .collect();
        sort_products(&mut products, sort);
        Ok(products)
    }

    async fn search_products(
        &self,
        params: &SearchParams,
    ) -> Result<Vec<Product>, RepositoryError> {
        self.record();
        Ok(page_of(
            self.matching_search(params),
            params.limit,
            params.offset,
        ))
    }

    async fn count_search(&self, params: &SearchParams) -> Result<i64, RepositoryError> {
        self.record();
        Ok(count(&self.matching_search(params)))
    }

    async fn suggestions(&self, query: &str, limit: i64) -> Result<Vec<String>, RepositoryError> {
        self.record();
        let mut titles: Vec<String> = self
            .products
            .iter()
            .filter(|p| p.title.to_lowercase().contains(query))
            .map(|p| p.title.clone())
            .collect();
        titles.sort();
        titles.dedup();
        titles.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(titles)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn option(title: &str, values: &[&str]) -> ProductOption {
    ProductOption {
        title: title.to_string(),
        values: values.iter().map(|v| OptionValue::new(*v)).collect(),
    }
}

fn variant(id: i64, price: i64, size: &str, color: &str) -> Variant {
    Variant {
        id: VariantId::new(id),
        sku: Some(format!("SKU-{id}")),
        title: format!("{size} / {color}"),
        price: Price::from_minor(price),
        inventory_quantity: 3,
        selected_options: vec![
            SelectedOption {
                name: "Size".to_string(),
                value: size.to_string(),
            },
            SelectedOption {
                name: "Color".to_string(),
                value: color.to_string(),
            },
        ],
    }
}

struct ProductSpec {
    id: i64,
    handle: &'static str,
    title: &'static str,
    brand: &'static str,
    category: &'static str,
    price: i64,
    compare_at: Option<i64>,
    stock: i32,
    colors: &'static [&'static str],
    material: Option<&'static str>,
}

fn build(spec: &ProductSpec) -> Product {
    let variants = spec
        .colors
        .iter()
        .zip(1_i64..)
        .flat_map(|(color, n)| {
            [
                variant(spec.id * 1000 + n * 2 - 1, spec.price, "S", color),
                variant(spec.id * 1000 + n * 2, spec.price, "M", color),
            ]
        })
        .collect();

    Product {
        id: ProductId::new(spec.id),
        handle: spec.handle.to_string(),
        title: spec.title.to_string(),
        description: format!("{} by {}", spec.title, spec.brand),
        brand: Some(spec.brand.to_string()),
        category: Some(spec.category.to_string()),
        price: Price::from_minor(spec.price),
        compare_at_price: spec.compare_at.map(Price::from_minor),
        inventory_quantity: spec.stock,
        options: (!spec.colors.is_empty()).then(|| {
            vec![
                option("Size", &["S", "M"]),
                option("Color", spec.colors),
            ]
        }),
        material: spec.material.map(str::to_string),
        variants,
        created_at: Utc::now() - TimeDelta::days(spec.id),
    }
}

/// Fashion catalog used by the router tests.
///
/// Collection `summer-edit` holds the shirt, dress, trouser and tote;
/// `knitwear` holds the sweater.
#[must_use]
pub fn fixture_catalog() -> InMemoryCatalog {
    let specs = [
        ProductSpec {
            id: 1,
            handle: "linen-camp-shirt",
            title: "Linen Camp Shirt",
            brand: "Maison Vert",
            category: "Shirts",
            price: 8900,
            compare_at: Some(12_000),
            stock: 14,
            colors: &["Sand", "Sage"],
            material: Some("Linen"),
        },
        ProductSpec {
            id: 2,
            handle: "silk-slip-dress",
            title: "Silk Slip Dress",
            brand: "Atelier Nord",
            category: "Dresses",
            price: 18_000,
            compare_at: None,
            stock: 6,
            colors: &["Black", "Sand"],
            material: Some("Silk"),
        },
        ProductSpec {
            id: 3,
            handle: "merino-crew-sweater",
            title: "Merino Crew Sweater",
            brand: "Maison Vert",
            category: "Knitwear",
            price: 14_000,
            compare_at: None,
            stock: 0,
            colors: &["Navy"],
            material: Some("Merino Wool"),
        },
        ProductSpec {
            id: 4,
            handle: "wide-leg-trouser",
            title: "Wide Leg Trouser",
            brand: "Atelier Nord",
            category: "Trousers",
            price: 15_000,
            compare_at: None,
            stock: 9,
            colors: &["Sand"],
            material: Some("Linen"),
        },
        ProductSpec {
            id: 5,
            handle: "canvas-tote",
            title: "Canvas Tote",
            brand: "Maison Vert",
            category: "Accessories",
            price: 4500,
            compare_at: None,
            stock: 30,
            colors: &[],
            material: Some("Cotton"),
        },
    ];
    let products = specs.iter().map(build).collect();

    let collection = |id: i64, handle: &str, title: &str, members: &[&str]| {
        (
            Collection {
                id: CollectionId::new(id),
                handle: handle.to_string(),
                title: title.to_string(),
                description: None,
                image_url: None,
                product_count: i64::try_from(members.len()).unwrap_or(0),
            },
            members.iter().map(|m| (*m).to_string()).collect(),
        )
    };

    InMemoryCatalog::new(
        products,
        vec![
            collection(
                1,
                "summer-edit",
                "Summer Edit",
                &[
                    "linen-camp-shirt",
                    "silk-slip-dress",
                    "wide-leg-trouser",
                    "canvas-tote",
                ],
            ),
            collection(2, "knitwear", "Knitwear", &["merino-crew-sweater"]),
        ],
    )
}

// ============================================================================
// Test App
// ============================================================================

/// Storefront config for tests. Nothing in it is dialed.
#[must_use]
pub fn test_config(environment: Environment) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/atelier_test"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        environment,
        cache_backend: CacheBackend::Memory,
        redis_url: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A response with its body decoded as JSON (`Value::Null` if it isn't).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
    pub text: String,
}

impl TestResponse {
    /// Header value as a string, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The assembled storefront router over an [`InMemoryCatalog`].
pub struct TestApp {
    router: Router,
    pub store: Arc<InMemoryCatalog>,
}

impl TestApp {
    /// Production environment with the in-process KV store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(Environment::Production, true)
    }

    /// Production environment with no KV store.
    #[must_use]
    pub fn without_cache() -> Self {
        Self::with_options(Environment::Production, false)
    }

    #[must_use]
    pub fn with_options(environment: Environment, with_kv: bool) -> Self {
        let store = Arc::new(fixture_catalog());
        let kv: Option<Arc<dyn KvStore>> = if with_kv {
            Some(Arc::new(MemoryStore::new()))
        } else {
            None
        };
        let state = AppState::new(
            test_config(environment),
            Arc::clone(&store) as Arc<dyn CatalogStore>,
            kv,
        );
        Self {
            router: atelier_storefront::app(state),
            store,
        }
    }

    /// `GET uri` from a fixed client address.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.get_with(uri, &[("cf-connecting-ip", "203.0.113.7")])
            .await
    }

    /// `GET uri` with extra request headers.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn get_with(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut request = Request::builder().uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = request.body(Body::empty()).expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body is readable")
            .to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
