//! Collection pages: facets, filters and pagination.

#![allow(clippy::indexing_slicing)]

use serde_json::Value;

use atelier_integration_tests::TestApp;

fn handles(body: &Value) -> Vec<&str> {
    body["products"]
        .as_array()
        .expect("products array")
        .iter()
        .filter_map(|p| p["handle"].as_str())
        .collect()
}

fn facet<'a>(body: &'a Value, id: &str) -> Option<&'a Value> {
    body["filters"]
        .as_array()
        .expect("filters array")
        .iter()
        .find(|f| f["id"] == id)
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_collection_index() {
    let app = TestApp::new();
    let resp = app.get("/api/collections").await;

    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.header("cache-control"),
        Some("public, max-age=300, s-maxage=3600")
    );
    assert_eq!(resp.body["count"], 2);
    assert_eq!(resp.body["collections"][0]["handle"], "knitwear");
    assert_eq!(resp.body["collections"][1]["productCount"], 4);
}

#[tokio::test]
async fn test_unknown_collection_is_404() {
    let app = TestApp::new();
    let resp = app.get("/api/collections/winter-sale").await;
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body["error"], "Collection not found");
}

// ============================================================================
// Facets
// ============================================================================

#[tokio::test]
async fn test_collection_facets() {
    let app = TestApp::new();
    let resp = app.get("/api/collections/summer-edit").await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["totalProducts"], 4);
    assert_eq!(
        handles(&resp.body),
        ["linen-camp-shirt", "silk-slip-dress", "wide-leg-trouser", "canvas-tote"]
    );

    let filters = resp.body["filters"].as_array().expect("filters array");
    assert_eq!(filters[0]["id"], "color");
    assert_eq!(filters[0]["type"], "color-swatch");
    assert!(facet(&resp.body, "size").is_none());

    let colors = filters[0]["values"].as_array().expect("values");
    assert_eq!(colors[0]["value"], "Sand");
    assert_eq!(colors[0]["count"], 3);
    assert!(colors[0]["colorHex"].is_string());
    assert_eq!(colors[1]["value"], "Sage");
    assert_eq!(colors[2]["value"], "Black");

    let material = facet(&resp.body, "material").expect("material facet");
    assert_eq!(material["type"], "multi-select");
    assert_eq!(material["values"][0]["value"], "Linen");
    assert_eq!(material["values"][0]["count"], 2);
}

#[tokio::test]
async fn test_facets_describe_whole_collection_not_filtered_page() {
    let app = TestApp::new();
    let resp = app
        .get("/api/collections/summer-edit?filter.color=Black")
        .await;

    assert_eq!(handles(&resp.body), ["silk-slip-dress"]);
    let colors = facet(&resp.body, "color").expect("color facet");
    assert_eq!(colors["values"].as_array().map(Vec::len), Some(3));
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test]
async fn test_dynamic_filters_are_conjunctive() {
    let app = TestApp::new();

    let sand = app.get("/api/collections/summer-edit?filter.color=sand").await;
    assert_eq!(
        handles(&sand.body),
        ["linen-camp-shirt", "silk-slip-dress", "wide-leg-trouser"]
    );

    let sand_silk = app
        .get("/api/collections/summer-edit?filter.color=Sand&filter.material=Silk")
        .await;
    assert_eq!(handles(&sand_silk.body), ["silk-slip-dress"]);

    let any_of = app
        .get("/api/collections/summer-edit?filter.material=Silk,Cotton")
        .await;
    assert_eq!(handles(&any_of.body), ["silk-slip-dress", "canvas-tote"]);
}

#[tokio::test]
async fn test_unknown_filters_are_ignored() {
    let app = TestApp::new();
    let resp = app
        .get("/api/collections/summer-edit?filter.pattern=floral&filter.size=M")
        .await;
    assert_eq!(resp.body["totalProducts"], 4);
}

#[tokio::test]
async fn test_builtin_filters() {
    let app = TestApp::new();

    let on_sale = app.get("/api/collections/summer-edit?onSale=true").await;
    assert_eq!(handles(&on_sale.body), ["linen-camp-shirt"]);

    let cheap = app.get("/api/collections/summer-edit?maxPrice=100").await;
    assert_eq!(handles(&cheap.body), ["linen-camp-shirt", "canvas-tote"]);

    let in_stock = app.get("/api/collections/knitwear?inStock=true").await;
    assert_eq!(in_stock.body["totalProducts"], 0);

    let categories = app
        .get("/api/collections/summer-edit?categories=dresses,trousers")
        .await;
    assert_eq!(
        handles(&categories.body),
        ["silk-slip-dress", "wide-leg-trouser"]
    );
}

#[tokio::test]
async fn test_invalid_price_is_400() {
    let app = TestApp::new();
    let resp = app.get("/api/collections/summer-edit?minPrice=-5").await;
    assert_eq!(resp.status, 400);
    assert!(
        resp.body["message"]
            .as_str()
            .is_some_and(|m| m.starts_with("minPrice:"))
    );
}

// ============================================================================
// Sorting and Pagination
// ============================================================================

#[tokio::test]
async fn test_pagination_after_filtering() {
    let app = TestApp::new();
    let resp = app
        .get("/api/collections/summer-edit?sort=price-asc&limit=3&page=2")
        .await;

    assert_eq!(resp.body["totalProducts"], 4);
    assert_eq!(resp.body["totalPages"], 2);
    assert_eq!(resp.body["page"], 2);
    assert_eq!(handles(&resp.body), ["silk-slip-dress"]);
}

#[tokio::test]
async fn test_collection_products_are_cached_per_sort() {
    let app = TestApp::new();

    app.get("/api/collections/summer-edit?filter.color=Sand").await;
    app.get("/api/collections/summer-edit?filter.color=Sage").await;
    // collection_by_handle + collection_products once
    assert_eq!(app.store.queries(), 2);

    app.get("/api/collections/summer-edit?sort=title-asc").await;
    assert_eq!(app.store.queries(), 4);
}
