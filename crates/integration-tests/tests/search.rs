//! Product search and title suggestions.

#![allow(clippy::indexing_slicing)]

use serde_json::{Value, json};

use atelier_integration_tests::TestApp;

fn handles(body: &Value) -> Vec<&str> {
    body["products"]
        .as_array()
        .expect("products array")
        .iter()
        .filter_map(|p| p["handle"].as_str())
        .collect()
}

// ============================================================================
// Results
// ============================================================================

#[tokio::test]
async fn test_search_matches_title() {
    let app = TestApp::new();
    let resp = app.get("/api/search?q=Linen").await;

    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.header("cache-control"),
        Some("public, max-age=60, s-maxage=600")
    );
    assert_eq!(resp.body["total"], 1);
    assert_eq!(resp.body["page"], 1);
    assert_eq!(resp.body["limit"], 24);
    assert_eq!(resp.body["totalPages"], 1);
    assert_eq!(handles(&resp.body), ["linen-camp-shirt"]);
}

#[tokio::test]
async fn test_search_sorted_by_price() {
    let app = TestApp::new();
    let resp = app.get("/api/search?q=maison&sort=price-asc").await;

    assert_eq!(resp.body["total"], 3);
    assert_eq!(
        handles(&resp.body),
        ["canvas-tote", "linen-camp-shirt", "merino-crew-sweater"]
    );
}

#[tokio::test]
async fn test_search_price_range_and_paging() {
    let app = TestApp::new();
    let resp = app
        .get("/api/search?q=&minPrice=100&maxPrice=160&sort=price-desc&limit=1&page=2")
        .await;

    assert_eq!(resp.body["total"], 2);
    assert_eq!(resp.body["totalPages"], 2);
    assert_eq!(handles(&resp.body), ["merino-crew-sweater"]);
}

#[tokio::test]
async fn test_search_results_are_cached() {
    let app = TestApp::new();
    app.get("/api/search?q=silk").await;
    app.get("/api/search?q=SILK").await;
    // search + count, once
    assert_eq!(app.store.queries(), 2);
}

// ============================================================================
// Suggestions
// ============================================================================

#[tokio::test]
async fn test_suggestions() {
    let app = TestApp::new();
    let resp = app.get("/api/search?q=sh&suggestions=true").await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, json!({ "suggestions": ["Linen Camp Shirt"] }));
}

#[tokio::test]
async fn test_short_query_gets_no_suggestions() {
    let app = TestApp::new();
    let resp = app.get("/api/search?q=s&suggestions=true").await;

    assert_eq!(resp.body["suggestions"], json!([]));
    assert_eq!(app.store.queries(), 0);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_unknown_sort_is_400() {
    let app = TestApp::new();
    let resp = app.get("/api/search?q=linen&sort=cheapest").await;

    assert_eq!(resp.status, 400);
    assert!(
        resp.body["message"]
            .as_str()
            .is_some_and(|m| m.starts_with("sort:"))
    );
}

#[tokio::test]
async fn test_unparseable_price_is_400() {
    let app = TestApp::new();
    let resp = app.get("/api/search?q=linen&minPrice=abc").await;

    assert_eq!(resp.status, 400);
    assert_eq!(resp.body["message"], "minPrice: must be a non-negative amount");
    assert!(resp.header("cache-control").is_none());
}
