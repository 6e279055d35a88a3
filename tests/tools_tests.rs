use reviewmind::tool_protocol::{ToolProtocol, ToolRegistry};
use reviewmind::tool_protocols::{ProductSearchProtocol, ReviewCatalogProtocol};
use reviewmind::tools::{ProductSearch, ReviewCatalog};
use serde_json::json;
use std::sync::Arc;

/// The document shape the server accepts via `REVIEWMIND_REVIEWS_PATH`.
const SEED_JSON: &str = r#"{
  "products": [
    {"id": 1, "name": "Solar Lantern", "description": "Collapsible solar-charged camping lantern", "category": "Outdoor", "price_cents": 3499},
    {"id": 2, "name": "Cast Iron Skillet", "description": "Pre-seasoned 12-inch skillet", "category": "Kitchen", "price_cents": 2999}
  ],
  "reviews": [
    {"id": 1, "product_id": 1, "author": "Femi", "rating": 5, "title": "Bright", "body": "Lights the whole tent.", "language": "en", "submitted_at": "2026-07-01T10:00:00Z"},
    {"id": 2, "product_id": 1, "author": "Greta", "rating": 3, "title": "Solide", "body": "Haelt, was es verspricht.", "language": "de", "submitted_at": "2026-07-15T09:30:00Z"},
    {"id": 3, "product_id": 2, "author": "Ines", "rating": 4, "title": "Peso ideal", "body": "Distribuye el calor muy bien.", "language": "es", "submitted_at": "2026-06-20T18:45:00Z"}
  ]
}"#;

const BAD_SEED_JSON: &str = r#"{
  "products": [
    {"id": 7, "name": "Desk Fan", "description": "Quiet USB desk fan", "category": "Office", "price_cents": 1899}
  ],
  "reviews": [
    {"id": 1, "product_id": 7, "author": "Omar", "rating": 4, "title": "Quiet", "body": "Barely audible.", "language": "en", "submitted_at": "2026-05-02T08:00:00Z"},
    {"id": 2, "product_id": 7, "author": "Lena", "rating": 9, "title": "Broken scale", "body": "This should not load.", "language": "en", "submitted_at": "2026-05-03T08:00:00Z"}
  ]
}"#;

#[test]
fn test_catalog_loads_seed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reviews.json");
    std::fs::write(&path, SEED_JSON).unwrap();

    let catalog = ReviewCatalog::new();
    let json = std::fs::read_to_string(&path).unwrap();
    let loaded = catalog.load_from_json(&json).unwrap();

    assert_eq!(loaded, 3);
    assert_eq!(catalog.products().len(), 2);
    assert_eq!(catalog.review_count(), 3);

    let reviews = catalog.reviews_for(1).unwrap();
    assert_eq!(reviews.len(), 2);
    // Newest first: the July 15th review outranks the July 1st one.
    assert_eq!(reviews[0].id, 2);
    assert_eq!(reviews[1].id, 1);

    let stats = catalog.stats_for(1).unwrap();
    assert_eq!(stats.review_count, 2);
    assert_eq!(stats.languages, vec!["de", "en"]);
    assert!((stats.average_rating - 4.0).abs() < f64::EPSILON);
}

#[test]
fn test_seed_load_aborts_on_invalid_review() {
    let catalog = ReviewCatalog::new();
    let err = catalog.load_from_json(BAD_SEED_JSON).unwrap_err();
    assert!(err.to_string().contains("Invalid rating"));

    // Products land before reviews, and the valid review before the bad
    // entry has already been accepted when the load stops.
    assert!(catalog.product_exists(7));
    assert_eq!(catalog.review_count(), 1);
}

#[tokio::test]
async fn test_reviews_tool_honors_limit() {
    let protocol = ReviewCatalogProtocol::new(Arc::new(ReviewCatalog::with_demo_data()));
    let result = protocol
        .execute(
            "get_product_reviews",
            json!({"product_id": 1001, "limit": 2}),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.output["review_count"], 2);
    assert_eq!(result.output["reviews"].as_array().unwrap().len(), 2);
    assert_eq!(result.output["product_name"], "AeroSound Max Wireless Headphones");
}

#[tokio::test]
async fn test_stats_tool_reports_aggregates() {
    let protocol = ReviewCatalogProtocol::new(Arc::new(ReviewCatalog::with_demo_data()));
    let result = protocol
        .execute("get_review_stats", json!({"product_id": 1002}))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.output["product_id"], 1002);
    assert_eq!(result.output["review_count"], 4);
    assert_eq!(result.output["languages"], json!(["en", "it", "pt"]));

    let histogram = result.output["rating_histogram"].as_array().unwrap();
    assert_eq!(histogram.len(), 5);
    let total: u64 = histogram.iter().map(|v| v.as_u64().unwrap()).sum();
    assert_eq!(total, 4);
}

#[tokio::test]
async fn test_search_tool_ranks_best_match_first() {
    let catalog = Arc::new(ReviewCatalog::with_demo_data());
    let protocol = ProductSearchProtocol::new(Arc::new(ProductSearch::new(catalog)));
    let result = protocol
        .execute("hybrid_search_products", json!({"query": "espresso machine"}))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.output["query"], "espresso machine");
    assert!(result.output["hit_count"].as_u64().unwrap() >= 1);
    assert_eq!(result.output["hits"][0]["product"]["id"], 1002);
}

#[tokio::test]
async fn test_compare_tool_reports_unknown_products_as_soft_failure() {
    let catalog = Arc::new(ReviewCatalog::with_demo_data());
    let protocol = ProductSearchProtocol::new(Arc::new(ProductSearch::new(catalog)));
    let result = protocol
        .execute("compare_products", json!({"product_ids": [1001, 9999]}))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Unknown product: 9999"));
}

#[tokio::test]
async fn test_compare_tool_rejects_non_integer_ids() {
    let catalog = Arc::new(ReviewCatalog::with_demo_data());
    let protocol = ProductSearchProtocol::new(Arc::new(ProductSearch::new(catalog)));
    let err = protocol
        .execute(
            "compare_products",
            json!({"product_ids": [1001, "first-one"]}),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("must be integers"));
}

#[tokio::test]
async fn test_registry_serves_both_protocols() {
    let catalog = Arc::new(ReviewCatalog::with_demo_data());
    let mut registry = ToolRegistry::empty();
    registry
        .add_protocol(
            "review-catalog",
            Arc::new(ReviewCatalogProtocol::new(Arc::clone(&catalog))),
        )
        .await
        .unwrap();
    registry
        .add_protocol(
            "product-search",
            Arc::new(ProductSearchProtocol::new(Arc::new(ProductSearch::new(
                catalog,
            )))),
        )
        .await
        .unwrap();

    assert_eq!(registry.list_tools().len(), 4);

    let reviews = registry
        .execute_tool("get_product_reviews", json!({"product_id": 1003}))
        .await
        .unwrap();
    assert!(reviews.success);
    assert_eq!(reviews.output["review_count"], 4);

    let comparison = registry
        .execute_tool("compare_products", json!({"product_ids": [1001, 1003]}))
        .await
        .unwrap();
    assert!(comparison.success);
    assert_eq!(comparison.output["products"].as_array().unwrap().len(), 2);

    let err = registry
        .execute_tool("get_price_history", json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Tool not found"));

    // Dropping one protocol must not disturb the other's tools.
    registry.remove_protocol("product-search");
    assert_eq!(registry.list_tools().len(), 2);
    assert!(registry.get_tool("get_product_reviews").is_some());
    assert!(registry.get_tool("hybrid_search_products").is_none());
}
