//! MCP Tool Server
//!
//! A concrete MCP server implementation that aggregates tool protocols and
//! implements [`ToolProtocol`] itself, routing each call to the protocol that
//! advertises the requested tool. Deployed over HTTP it gives remote agents
//! (the recommendation agent in particular) one place to reach
//! `hybrid_search_products` and `compare_products`.
//!
//! # Architecture
//!
//! ```text
//! ProductSearchProtocol, ReviewCatalogProtocol, ...
//!         ↓
//! McpToolServer (implements ToolProtocol, routes by tool name)
//!         ↓
//! HTTP endpoints (POST /tools/list, POST /tools/execute)
//!         ↓
//! Remote agents (via McpClientProtocol)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use reviewmind::mcp_server::McpToolServer;
//! use reviewmind::tool_protocol::ToolProtocol;
//! use reviewmind::tool_protocols::ProductSearchProtocol;
//! use reviewmind::tools::{ProductSearch, ReviewCatalog};
//! use std::sync::Arc;
//!
//! # async {
//! let catalog = Arc::new(ReviewCatalog::with_demo_data());
//! let search = Arc::new(ProductSearch::new(catalog));
//!
//! let mut server = McpToolServer::new();
//! server
//!     .register_protocol(Arc::new(ProductSearchProtocol::new(search)))
//!     .await
//!     .unwrap();
//!
//! // hybrid_search_products and compare_products are now routable.
//! let tools = server.list_tools().await.unwrap();
//! # };
//! ```

use crate::reviewmind::tool_protocol::{ToolError, ToolMetadata, ToolProtocol, ToolResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Tool-name-routed aggregation of [`ToolProtocol`] implementations.
///
/// One protocol may advertise several tools;
/// [`register_protocol`](McpToolServer::register_protocol) discovers them and
/// maps each advertised name to the protocol, so routing stays a single
/// lookup at execution time.
///
/// # Thread Safety
///
/// The routing table lives behind `Arc<RwLock<..>>`; clones share it, and the
/// lock is released before any tool executes so slow tools never serialize
/// the server.
#[derive(Clone)]
pub struct McpToolServer {
    tools: Arc<RwLock<HashMap<String, Arc<dyn ToolProtocol>>>>,
}

impl McpToolServer {
    /// Create a server with no tools registered.
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register every tool a protocol advertises.
    ///
    /// Queries the protocol's [`list_tools`](ToolProtocol::list_tools) and
    /// binds each advertised name to it, returning the names bound. A name
    /// already present is rebound to the new protocol.
    pub async fn register_protocol(
        &mut self,
        protocol: Arc<dyn ToolProtocol>,
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        let advertised = protocol.list_tools().await?;
        let mut names = Vec::with_capacity(advertised.len());
        let mut tools = self.tools.write().await;
        for metadata in advertised {
            tools.insert(metadata.name.clone(), Arc::clone(&protocol));
            names.push(metadata.name);
        }
        Ok(names)
    }

    /// Bind a single tool name to a protocol without discovery.
    pub async fn register_tool(&mut self, tool_name: &str, protocol: Arc<dyn ToolProtocol>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool_name.to_string(), protocol);
    }

    /// Remove a tool binding.
    pub async fn unregister_tool(&mut self, tool_name: &str) {
        let mut tools = self.tools.write().await;
        tools.remove(tool_name);
    }

    /// Whether a tool name is routable.
    pub async fn has_tool(&self, tool_name: &str) -> bool {
        let tools = self.tools.read().await;
        tools.contains_key(tool_name)
    }

    /// Number of routable tool names.
    pub async fn tool_count(&self) -> usize {
        let tools = self.tools.read().await;
        tools.len()
    }
}

impl Default for McpToolServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProtocol for McpToolServer {
    /// Route a call to the protocol bound to the tool name.
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let tools = self.tools.read().await;
        let protocol = tools.get(tool_name).cloned().ok_or_else(|| {
            Box::new(ToolError::NotFound(tool_name.to_string())) as Box<dyn Error + Send + Sync>
        })?;
        // Execution happens outside the lock so concurrent calls don't queue.
        drop(tools);

        protocol.execute(tool_name, parameters).await
    }

    /// Aggregate metadata for every routable tool.
    ///
    /// Walks the routing table entry by entry rather than asking each
    /// protocol for its full list, so a protocol registered under several
    /// names contributes each tool exactly once.
    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        let tools = self.tools.read().await;
        let entries: Vec<(String, Arc<dyn ToolProtocol>)> = tools
            .iter()
            .map(|(name, protocol)| (name.clone(), Arc::clone(protocol)))
            .collect();
        drop(tools);

        let mut all_tools = Vec::with_capacity(entries.len());
        for (name, protocol) in entries {
            match protocol.get_tool_metadata(&name).await {
                Ok(metadata) => all_tools.push(metadata),
                Err(e) => {
                    // Keep serving the rest of the table.
                    log::warn!("tool '{}' refused to describe itself: {}", name, e);
                }
            }
        }
        Ok(all_tools)
    }

    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
        let tools = self.tools.read().await;
        let protocol = tools.get(tool_name).cloned().ok_or_else(|| {
            Box::new(ToolError::NotFound(tool_name.to_string())) as Box<dyn Error + Send + Sync>
        })?;
        drop(tools);

        protocol.get_tool_metadata(tool_name).await
    }

    fn protocol_name(&self) -> &str {
        "mcp-tool-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fake protocol advertising a fixed set of tools, like
    /// `ProductSearchProtocol` advertises its two.
    struct FakeSearchProtocol {
        tool_names: Vec<String>,
    }

    impl FakeSearchProtocol {
        fn with_tools(names: &[&str]) -> Self {
            Self {
                tool_names: names.iter().map(|n| n.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl ToolProtocol for FakeSearchProtocol {
        async fn execute(
            &self,
            tool_name: &str,
            _parameters: serde_json::Value,
        ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
            if self.tool_names.iter().any(|n| n == tool_name) {
                Ok(ToolResult::success(serde_json::json!({
                    "tool": tool_name
                })))
            } else {
                Err(Box::new(ToolError::NotFound(tool_name.to_string())))
            }
        }

        async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
            Ok(self
                .tool_names
                .iter()
                .map(|n| ToolMetadata::new(n, "a fake search tool"))
                .collect())
        }

        async fn get_tool_metadata(
            &self,
            tool_name: &str,
        ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
            if self.tool_names.iter().any(|n| n == tool_name) {
                Ok(ToolMetadata::new(tool_name, "a fake search tool"))
            } else {
                Err(Box::new(ToolError::NotFound(tool_name.to_string())))
            }
        }

        fn protocol_name(&self) -> &str {
            "fake-search"
        }
    }

    #[tokio::test]
    async fn starts_empty() {
        let server = McpToolServer::new();
        assert_eq!(server.tool_count().await, 0);
        assert_eq!(server.protocol_name(), "mcp-tool-server");
    }

    #[tokio::test]
    async fn register_protocol_discovers_every_tool() {
        let mut server = McpToolServer::new();
        let protocol = Arc::new(FakeSearchProtocol::with_tools(&[
            "hybrid_search_products",
            "compare_products",
        ]));

        let mut names = server.register_protocol(protocol).await.unwrap();
        names.sort();
        assert_eq!(names, vec!["compare_products", "hybrid_search_products"]);
        assert!(server.has_tool("hybrid_search_products").await);
        assert!(server.has_tool("compare_products").await);
    }

    #[tokio::test]
    async fn routes_execution_by_tool_name() {
        let mut server = McpToolServer::new();
        server
            .register_protocol(Arc::new(FakeSearchProtocol::with_tools(&[
                "hybrid_search_products",
            ])))
            .await
            .unwrap();

        let result = server
            .execute("hybrid_search_products", serde_json::json!({"query": "headphones"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output["tool"], "hybrid_search_products");
    }

    #[tokio::test]
    async fn unknown_tools_are_not_found() {
        let server = McpToolServer::new();
        let err = server
            .execute("no_such_tool", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn listing_never_duplicates_multi_tool_protocols() {
        let mut server = McpToolServer::new();
        server
            .register_protocol(Arc::new(FakeSearchProtocol::with_tools(&[
                "hybrid_search_products",
                "compare_products",
            ])))
            .await
            .unwrap();

        let tools = server.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert!(tools.iter().any(|t| t.name == "hybrid_search_products"));
        assert!(tools.iter().any(|t| t.name == "compare_products"));
    }

    #[tokio::test]
    async fn manual_binding_and_removal() {
        let mut server = McpToolServer::new();
        let protocol = Arc::new(FakeSearchProtocol::with_tools(&["hybrid_search_products"]));

        server.register_tool("hybrid_search_products", protocol).await;
        assert_eq!(server.tool_count().await, 1);

        server.unregister_tool("hybrid_search_products").await;
        assert_eq!(server.tool_count().await, 0);
        assert!(!server.has_tool("hybrid_search_products").await);
    }

    #[tokio::test]
    async fn metadata_lookup_routes_to_owner() {
        let mut server = McpToolServer::new();
        server
            .register_protocol(Arc::new(FakeSearchProtocol::with_tools(&["compare_products"])))
            .await
            .unwrap();

        let metadata = server.get_tool_metadata("compare_products").await.unwrap();
        assert_eq!(metadata.name, "compare_products");
        assert!(server.get_tool_metadata("absent").await.is_err());
    }
}
