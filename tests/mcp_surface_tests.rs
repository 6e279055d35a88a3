//! MCP surface tests.
//!
//! The ungated tests cover `McpClientProtocol` construction and offline
//! failure behavior. The `live` module (feature `server`) starts a real
//! builder-configured server on a loopback ephemeral port and drives it end
//! to end through the client adapter, so the wire format is checked against
//! the implementation actually serving it.

use reviewmind::tool_protocol::ToolProtocol;
use reviewmind::tool_protocols::McpClientProtocol;

#[tokio::test]
async fn client_builders_chain() {
    let client = McpClientProtocol::new("http://localhost:8080".to_string())
        .with_auth_token("secret")
        .with_timeout(5)
        .with_cache_ttl(60);
    assert_eq!(client.protocol_name(), "mcp");
}

#[tokio::test]
async fn initialize_fails_when_server_unreachable() {
    // Port 9 (discard) has no listener; connect is refused immediately.
    let mut client = McpClientProtocol::new("http://127.0.0.1:9".to_string()).with_timeout(2);
    assert!(client.initialize().await.is_err());
}

#[tokio::test]
async fn listing_fails_without_reachable_server() {
    let client = McpClientProtocol::new("http://127.0.0.1:9".to_string()).with_timeout(2);
    assert!(client.list_tools().await.is_err());
    assert!(client.get_tool_metadata("hybrid_search_products").await.is_err());
}

#[cfg(feature = "server")]
mod live {
    use super::*;
    use reviewmind::mcp_http_adapter::HttpServerInstance;
    use reviewmind::mcp_server_builder::McpServerBuilder;
    use reviewmind::tools::{ProductSearch, ReviewCatalog};
    use std::sync::Arc;

    async fn start_demo_server() -> HttpServerInstance {
        let catalog = Arc::new(ReviewCatalog::with_demo_data());
        let search = Arc::new(ProductSearch::new(Arc::clone(&catalog)));

        McpServerBuilder::new()
            .with_search_tools(search)
            .await
            .with_catalog_tools(catalog)
            .await
            .allow_localhost_only()
            .start_on(0)
            .await
            .expect("MCP server failed to start")
    }

    fn endpoint_of(server: &HttpServerInstance) -> String {
        format!("http://{}", server.addr())
    }

    #[tokio::test]
    async fn discovery_round_trips_all_registered_tools() {
        let server = start_demo_server().await;
        let mut client = McpClientProtocol::new(endpoint_of(&server));
        client.initialize().await.unwrap();

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 4);

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"hybrid_search_products"));
        assert!(names.contains(&"compare_products"));
        assert!(names.contains(&"get_product_reviews"));
        assert!(names.contains(&"get_review_stats"));

        let metadata = client
            .get_tool_metadata("hybrid_search_products")
            .await
            .unwrap();
        assert!(metadata.parameters.iter().any(|p| p.name == "query"));
    }

    #[tokio::test]
    async fn search_executes_over_the_wire() {
        let server = start_demo_server().await;
        let client = McpClientProtocol::new(endpoint_of(&server));

        let result = client
            .execute(
                "hybrid_search_products",
                serde_json::json!({"query": "espresso machine", "limit": 3}),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output["hits"][0]["product"]["id"], 1002);
    }

    #[tokio::test]
    async fn soft_failures_survive_serialization() {
        let server = start_demo_server().await;
        let client = McpClientProtocol::new(endpoint_of(&server));

        let result = client
            .execute("get_review_stats", serde_json::json!({"product_id": 4242}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("ERR:PRODUCT_NOT_FOUND"));
    }

    #[tokio::test]
    async fn unknown_tools_come_back_as_transport_errors() {
        let server = start_demo_server().await;
        let client = McpClientProtocol::new(endpoint_of(&server));

        let err = client
            .execute("get_price_history", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn bearer_token_gates_every_route() {
        let catalog = Arc::new(ReviewCatalog::with_demo_data());
        let server = McpServerBuilder::new()
            .with_catalog_tools(catalog)
            .await
            .with_bearer_token("reviews-secret")
            .start_on(0)
            .await
            .expect("MCP server failed to start");

        let mut anonymous = McpClientProtocol::new(endpoint_of(&server));
        assert!(anonymous.initialize().await.is_err());

        let mut authed =
            McpClientProtocol::new(endpoint_of(&server)).with_auth_token("reviews-secret");
        authed.initialize().await.unwrap();
        assert_eq!(authed.list_tools().await.unwrap().len(), 2);

        let result = authed
            .execute(
                "get_product_reviews",
                serde_json::json!({"product_id": 1001, "limit": 1}),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output["review_count"], 1);
    }
}
