//! Tool Protocol Implementations
//!
//! This module provides concrete implementations of the ToolProtocol trait
//! for various tool communication standards and transports.
//!
//! Each struct is a complete implementation of ToolProtocol, representing a different
//! way to communicate with tools. These implementations can be used individually or
//! combined in a multi-protocol setup via ToolRegistry.
//!
//! # Available Implementations
//!
//! - **CustomToolProtocol**: Direct Rust function calls (sync and async)
//! - **McpClientProtocol**: HTTP client for remote MCP servers
//! - **ReviewCatalogProtocol**: Review lookups and statistics over a [`ReviewCatalog`](crate::tools::ReviewCatalog)
//! - **ProductSearchProtocol**: Hybrid catalog search and product comparison
//!
//! # Usage Patterns
//!
//! ## Single Protocol
//!
//! ```ignore
//! let protocol = Arc::new(CustomToolProtocol::new());
//! let registry = ToolRegistry::new(protocol);
//! ```
//!
//! ## Multiple Protocols
//!
//! ```ignore
//! let mut registry = ToolRegistry::empty();
//! registry.add_protocol("catalog", Arc::new(ReviewCatalogProtocol::new(catalog))).await?;
//! registry.add_protocol("search", Arc::new(McpClientProtocol::new(url))).await?;
//! ```

use crate::reviewmind::tool_protocol::{
    ToolError, ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolResult,
};
use crate::reviewmind::tools::{ProductSearch, ReviewCatalog};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Type alias for synchronous tool functions exposed via the custom adapter.
pub type ToolFunction =
    Arc<dyn Fn(JsonValue) -> Result<ToolResult, Box<dyn Error + Send + Sync>> + Send + Sync>;

/// Type alias for asynchronous tool functions exposed via the custom adapter.
pub type AsyncToolFunction = Arc<
    dyn Fn(
            JsonValue,
        ) -> std::pin::Pin<
            Box<
                dyn std::future::Future<Output = Result<ToolResult, Box<dyn Error + Send + Sync>>>
                    + Send,
            >,
        > + Send
        + Sync,
>;

/// Custom function-calling tool adapter
///
/// This adapter allows you to register Rust functions as tools that agents can use.
/// It's useful for quick prototyping and simple tool implementations.
///
/// # Example
///
/// ```rust,no_run
/// use reviewmind::tool_protocols::CustomToolProtocol;
/// use reviewmind::tool_protocol::{ToolResult, ToolMetadata, ToolParameter, ToolParameterType};
/// use std::sync::Arc;
///
/// # async {
/// let adapter = CustomToolProtocol::new();
///
/// // Register a synchronous tool
/// adapter.register_tool(
///     ToolMetadata::new("count_words", "Counts words in a review text")
///         .with_parameter(
///             ToolParameter::new("text", ToolParameterType::String).required()
///         ),
///     Arc::new(|params| {
///         let text = params["text"].as_str().unwrap_or("");
///         let count = text.split_whitespace().count();
///         Ok(ToolResult::success(serde_json::json!({"words": count})))
///     })
/// ).await;
/// # };
/// ```
pub struct CustomToolProtocol {
    tools: Arc<RwLock<HashMap<String, ToolMetadata>>>,
    sync_functions: Arc<RwLock<HashMap<String, ToolFunction>>>,
    async_functions: Arc<RwLock<HashMap<String, AsyncToolFunction>>>,
}

impl CustomToolProtocol {
    /// Create an empty adapter ready to accept new tool registrations.
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
            sync_functions: Arc::new(RwLock::new(HashMap::new())),
            async_functions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a synchronous tool function.
    ///
    /// Subsequent calls will overwrite any existing tool with the same name.
    pub async fn register_tool(&self, metadata: ToolMetadata, function: ToolFunction) {
        let name = metadata.name.clone();
        self.tools.write().await.insert(name.clone(), metadata);
        self.sync_functions.write().await.insert(name, function);
    }

    /// Register an asynchronous tool function.
    pub async fn register_async_tool(&self, metadata: ToolMetadata, function: AsyncToolFunction) {
        let name = metadata.name.clone();
        self.tools.write().await.insert(name.clone(), metadata);
        self.async_functions.write().await.insert(name, function);
    }

    /// Remove a tool from the adapter.
    pub async fn unregister_tool(&self, name: &str) {
        self.tools.write().await.remove(name);
        self.sync_functions.write().await.remove(name);
        self.async_functions.write().await.remove(name);
    }
}

impl Default for CustomToolProtocol {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProtocol for CustomToolProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: JsonValue,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        // Try async functions first
        {
            let async_funcs = self.async_functions.read().await;
            if let Some(func) = async_funcs.get(tool_name) {
                return func(parameters).await;
            }
        }

        // Then try sync functions
        {
            let sync_funcs = self.sync_functions.read().await;
            if let Some(func) = sync_funcs.get(tool_name) {
                return func(parameters);
            }
        }

        Err(Box::new(ToolError::NotFound(tool_name.to_string())))
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        let tools = self.tools.read().await;
        Ok(tools.values().cloned().collect())
    }

    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
        let tools = self.tools.read().await;
        tools.get(tool_name).cloned().ok_or_else(|| {
            Box::new(ToolError::NotFound(tool_name.to_string())) as Box<dyn Error + Send + Sync>
        })
    }

    fn protocol_name(&self) -> &str {
        "custom"
    }
}

/// MCP (Model Context Protocol) client adapter
///
/// This adapter lets agents call tools hosted on a remote MCP server over
/// HTTP. The recommendation agent uses it to reach the product-search tools
/// when they run in a separate process; the same wire format is served by
/// [`McpServerBuilder`](crate::mcp_server_builder::McpServerBuilder).
///
/// # Wire Protocol
///
/// - `POST {endpoint}/tools/list` → `{"tools": [ToolMetadata, ...]}`
/// - `POST {endpoint}/tools/execute` with `{"tool": name, "parameters": {...}}`
///   → `{"result": ToolResult}`
///
/// Tool metadata is cached with a TTL to avoid a discovery round-trip on
/// every agent turn.
///
/// # Example
///
/// ```rust,no_run
/// use reviewmind::tool_protocols::McpClientProtocol;
/// use reviewmind::tool_protocol::ToolProtocol;
///
/// # async {
/// let mut adapter = McpClientProtocol::new("http://localhost:8080".to_string())
///     .with_auth_token("secret-token");
/// adapter.initialize().await.unwrap();
/// # };
/// ```
pub struct McpClientProtocol {
    endpoint: String,
    client: reqwest::Client,
    auth_token: Option<String>,
    tools_cache: Arc<RwLock<Option<Vec<ToolMetadata>>>>,
    cache_ttl_secs: u64,
    last_cache_refresh: Arc<RwLock<Option<std::time::Instant>>>,
}

impl McpClientProtocol {
    /// Create an adapter that fetches tool metadata and executes calls against a remote MCP server.
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            auth_token: None,
            tools_cache: Arc::new(RwLock::new(None)),
            cache_ttl_secs: 300, // 5 minutes
            last_cache_refresh: Arc::new(RwLock::new(None)),
        }
    }

    /// Attach a bearer token sent with every request.
    ///
    /// Pair with the auth token configured on the server side.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Override the default request timeout for subsequent HTTP calls.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");
        self
    }

    /// Override the cache TTL (in seconds) for the tool metadata snapshot.
    pub fn with_cache_ttl(mut self, ttl_secs: u64) -> Self {
        self.cache_ttl_secs = ttl_secs;
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(format!("{}{}", self.endpoint, path));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    async fn should_refresh_cache(&self) -> bool {
        let last_refresh = self.last_cache_refresh.read().await;
        match *last_refresh {
            None => true,
            Some(instant) => instant.elapsed().as_secs() > self.cache_ttl_secs,
        }
    }

    async fn refresh_cache(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let response = self
            .post("/tools/list")
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Box::new(ToolError::ProtocolError(format!(
                "MCP server returned status: {}",
                response.status()
            ))));
        }

        let body: JsonValue = response.json().await?;
        let tools: Vec<ToolMetadata> = serde_json::from_value(body["tools"].clone())?;
        *self.tools_cache.write().await = Some(tools);
        *self.last_cache_refresh.write().await = Some(std::time::Instant::now());

        Ok(())
    }
}

#[async_trait]
impl ToolProtocol for McpClientProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: JsonValue,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let response = self
            .post("/tools/execute")
            .json(&serde_json::json!({
                "tool": tool_name,
                "parameters": parameters
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Box::new(ToolError::ExecutionFailed(format!(
                "MCP server returned status: {}",
                response.status()
            ))));
        }

        let body: JsonValue = response.json().await?;
        let result: ToolResult = serde_json::from_value(body["result"].clone())?;
        Ok(result)
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        if self.should_refresh_cache().await {
            self.refresh_cache().await?;
        }

        let cache = self.tools_cache.read().await;
        cache.as_ref().cloned().ok_or_else(|| {
            Box::new(ToolError::ProtocolError(
                "Tools cache not initialized".to_string(),
            )) as Box<dyn Error + Send + Sync>
        })
    }

    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
        let tools = self.list_tools().await?;
        tools
            .into_iter()
            .find(|t| t.name == tool_name)
            .ok_or_else(|| {
                Box::new(ToolError::NotFound(tool_name.to_string())) as Box<dyn Error + Send + Sync>
            })
    }

    fn protocol_name(&self) -> &str {
        "mcp"
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        // Test connection and load initial tool list
        self.refresh_cache().await
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        // Clear cache
        *self.tools_cache.write().await = None;
        *self.last_cache_refresh.write().await = None;
        Ok(())
    }
}

/// Review Catalog Tool Adapter
///
/// Exposes a [`ReviewCatalog`] to agents as two tools:
///
/// - **`get_product_reviews`**: fetch the reviews for a product, optionally
///   filtered by language and capped with a limit
/// - **`get_review_stats`**: fetch aggregated statistics (count, average
///   rating, per-star histogram, language mix)
///
/// Unknown products come back as a failed [`ToolResult`] with an
/// `ERR:PRODUCT_NOT_FOUND` message so the agent can recover in-conversation;
/// malformed parameters are hard errors.
///
/// # Example
///
/// ```ignore
/// use reviewmind::tools::ReviewCatalog;
/// use reviewmind::tool_protocols::ReviewCatalogProtocol;
/// use std::sync::Arc;
///
/// let catalog = Arc::new(ReviewCatalog::with_demo_data());
/// let protocol = Arc::new(ReviewCatalogProtocol::new(catalog));
/// let result = protocol.execute("get_product_reviews",
///     serde_json::json!({"product_id": 1001, "language": "es"})).await?;
/// ```
pub struct ReviewCatalogProtocol {
    catalog: Arc<ReviewCatalog>,
}

impl ReviewCatalogProtocol {
    /// Create a new adapter bound to a shared catalog instance.
    pub fn new(catalog: Arc<ReviewCatalog>) -> Self {
        Self { catalog }
    }

    fn reviews_tool_metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "get_product_reviews",
            "Fetch customer reviews for a product. Returns author, star rating (1-5), \
             title, body, language code, and submission date, newest first.",
        )
        .with_parameter(
            ToolParameter::new("product_id", ToolParameterType::Integer)
                .with_description("Identifier of the product whose reviews to fetch")
                .required(),
        )
        .with_parameter(
            ToolParameter::new("language", ToolParameterType::String)
                .with_description("Optional ISO 639-1 filter; only reviews in this language"),
        )
        .with_parameter(
            ToolParameter::new("limit", ToolParameterType::Integer)
                .with_description("Maximum number of reviews to return (default: all)"),
        )
    }

    fn stats_tool_metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "get_review_stats",
            "Fetch aggregated review statistics for a product: review count, average \
             rating, per-star histogram, and the languages reviews were written in.",
        )
        .with_parameter(
            ToolParameter::new("product_id", ToolParameterType::Integer)
                .with_description("Identifier of the product to aggregate")
                .required(),
        )
    }

    fn product_id_param(parameters: &JsonValue) -> Result<u64, Box<dyn Error + Send + Sync>> {
        parameters
            .get("product_id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                Box::new(ToolError::InvalidParameters(
                    "Missing or non-integer 'product_id' field".to_string(),
                )) as Box<dyn Error + Send + Sync>
            })
    }
}

#[async_trait]
impl ToolProtocol for ReviewCatalogProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: JsonValue,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        match tool_name {
            "get_product_reviews" => {
                let product_id = Self::product_id_param(&parameters)?;
                let language = parameters.get("language").and_then(|v| v.as_str());
                let limit = parameters.get("limit").and_then(|v| v.as_u64());

                let mut reviews = match self.catalog.reviews_for(product_id) {
                    Some(reviews) => reviews,
                    None => {
                        return Ok(ToolResult::failure(format!(
                            "ERR:PRODUCT_NOT_FOUND {}",
                            product_id
                        )))
                    }
                };

                if let Some(lang) = language {
                    reviews.retain(|r| r.language == lang);
                }
                if let Some(limit) = limit {
                    reviews.truncate(limit as usize);
                }

                let product_name = self
                    .catalog
                    .product(product_id)
                    .map(|p| p.name)
                    .unwrap_or_default();

                Ok(ToolResult::success(serde_json::json!({
                    "product_id": product_id,
                    "product_name": product_name,
                    "review_count": reviews.len(),
                    "reviews": serde_json::to_value(&reviews)?,
                })))
            }
            "get_review_stats" => {
                let product_id = Self::product_id_param(&parameters)?;
                match self.catalog.stats_for(product_id) {
                    Some(stats) => Ok(ToolResult::success(serde_json::to_value(&stats)?)),
                    None => Ok(ToolResult::failure(format!(
                        "ERR:PRODUCT_NOT_FOUND {}",
                        product_id
                    ))),
                }
            }
            _ => Err(Box::new(ToolError::NotFound(tool_name.to_string()))),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(vec![
            self.reviews_tool_metadata(),
            self.stats_tool_metadata(),
        ])
    }

    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
        match tool_name {
            "get_product_reviews" => Ok(self.reviews_tool_metadata()),
            "get_review_stats" => Ok(self.stats_tool_metadata()),
            _ => Err(Box::new(ToolError::NotFound(tool_name.to_string()))),
        }
    }

    fn protocol_name(&self) -> &str {
        "review-catalog"
    }
}

/// Product Search Tool Adapter
///
/// Exposes [`ProductSearch`] to agents and MCP clients as two tools:
///
/// - **`hybrid_search_products`**: keyword + token-overlap search over the
///   catalog, returning scored hits
/// - **`compare_products`**: side-by-side comparison of two or more products
///   backed by their review statistics
///
/// `compare_products` rejects fewer than two product ids with an
/// invalid-parameters error; the MCP server surfaces that as a 400.
///
/// # Example
///
/// ```ignore
/// use reviewmind::tools::{ProductSearch, ReviewCatalog};
/// use reviewmind::tool_protocols::ProductSearchProtocol;
/// use std::sync::Arc;
///
/// let catalog = Arc::new(ReviewCatalog::with_demo_data());
/// let search = Arc::new(ProductSearch::new(catalog));
/// let protocol = Arc::new(ProductSearchProtocol::new(search));
/// let result = protocol.execute("hybrid_search_products",
///     serde_json::json!({"query": "wireless headphones", "limit": 3})).await?;
/// ```
pub struct ProductSearchProtocol {
    search: Arc<ProductSearch>,
}

impl ProductSearchProtocol {
    /// Default number of hits returned when the caller omits `limit`.
    const DEFAULT_LIMIT: usize = 5;

    /// Create a new adapter bound to a search engine.
    pub fn new(search: Arc<ProductSearch>) -> Self {
        Self { search }
    }

    fn search_tool_metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "hybrid_search_products",
            "Search the product catalog with a free-text query. Combines exact keyword \
             matching with word-overlap similarity and returns scored hits, best first.",
        )
        .with_parameter(
            ToolParameter::new("query", ToolParameterType::String)
                .with_description("Free-text search query (e.g. 'noise cancelling headphones')")
                .required(),
        )
        .with_parameter(
            ToolParameter::new("limit", ToolParameterType::Integer)
                .with_description("Maximum number of hits to return (default: 5)")
                .with_default(serde_json::json!(Self::DEFAULT_LIMIT)),
        )
    }

    fn compare_tool_metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "compare_products",
            "Compare two or more products side by side using their review statistics \
             (average rating, review count, price, language mix).",
        )
        .with_parameter(
            ToolParameter::new("product_ids", ToolParameterType::Array)
                .with_description("Ids of the products to compare; at least two are required")
                .with_items(ToolParameterType::Integer)
                .required(),
        )
    }
}

#[async_trait]
impl ToolProtocol for ProductSearchProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: JsonValue,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        match tool_name {
            "hybrid_search_products" => {
                let query = parameters
                    .get("query")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ToolError::InvalidParameters("Missing 'query' field".to_string())
                    })?;
                let limit = parameters
                    .get("limit")
                    .and_then(|v| v.as_u64())
                    .map(|l| l as usize)
                    .unwrap_or(Self::DEFAULT_LIMIT);

                let hits = self.search.hybrid_search(query, limit);
                Ok(ToolResult::success(serde_json::json!({
                    "query": query,
                    "hit_count": hits.len(),
                    "hits": serde_json::to_value(&hits)?,
                })))
            }
            "compare_products" => {
                let raw_ids = parameters
                    .get("product_ids")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| {
                        ToolError::InvalidParameters(
                            "Missing or non-array 'product_ids' field".to_string(),
                        )
                    })?;

                let mut product_ids = Vec::with_capacity(raw_ids.len());
                for id in raw_ids {
                    match id.as_u64() {
                        Some(id) => product_ids.push(id),
                        None => {
                            return Err(Box::new(ToolError::InvalidParameters(
                                "'product_ids' entries must be integers".to_string(),
                            )))
                        }
                    }
                }

                if product_ids.len() < 2 {
                    return Err(Box::new(ToolError::InvalidParameters(
                        "compare_products requires at least two product ids".to_string(),
                    )));
                }

                match self.search.compare(&product_ids) {
                    Ok(entries) => Ok(ToolResult::success(serde_json::json!({
                        "products": serde_json::to_value(&entries)?,
                    }))),
                    Err(e) => Ok(ToolResult::failure(format!("ERR:{}", e))),
                }
            }
            _ => Err(Box::new(ToolError::NotFound(tool_name.to_string()))),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(vec![
            self.search_tool_metadata(),
            self.compare_tool_metadata(),
        ])
    }

    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
        match tool_name {
            "hybrid_search_products" => Ok(self.search_tool_metadata()),
            "compare_products" => Ok(self.compare_tool_metadata()),
            _ => Err(Box::new(ToolError::NotFound(tool_name.to_string()))),
        }
    }

    fn protocol_name(&self) -> &str {
        "product-search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_protocol() -> ReviewCatalogProtocol {
        ReviewCatalogProtocol::new(Arc::new(ReviewCatalog::with_demo_data()))
    }

    fn search_protocol() -> ProductSearchProtocol {
        let catalog = Arc::new(ReviewCatalog::with_demo_data());
        ProductSearchProtocol::new(Arc::new(ProductSearch::new(catalog)))
    }

    #[tokio::test]
    async fn catalog_returns_reviews_with_language_filter() {
        let protocol = catalog_protocol();
        let result = protocol
            .execute(
                "get_product_reviews",
                serde_json::json!({"product_id": 1001, "language": "es"}),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output["review_count"], 1);
        assert_eq!(result.output["reviews"][0]["language"], "es");
    }

    #[tokio::test]
    async fn catalog_reports_unknown_product_as_soft_failure() {
        let protocol = catalog_protocol();
        let result = protocol
            .execute("get_product_reviews", serde_json::json!({"product_id": 4242}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("ERR:PRODUCT_NOT_FOUND"));
    }

    #[tokio::test]
    async fn catalog_rejects_missing_product_id() {
        let protocol = catalog_protocol();
        let err = protocol
            .execute("get_product_reviews", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("product_id"));
    }

    #[tokio::test]
    async fn compare_rejects_single_product() {
        let protocol = search_protocol();
        let err = protocol
            .execute("compare_products", serde_json::json!({"product_ids": [1001]}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least two"));
    }

    #[tokio::test]
    async fn compare_returns_entries_for_valid_request() {
        let protocol = search_protocol();
        let result = protocol
            .execute(
                "compare_products",
                serde_json::json!({"product_ids": [1001, 1004]}),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output["products"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn search_protocol_lists_both_tools() {
        let protocol = search_protocol();
        let tools = protocol.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();

        assert!(names.contains(&"hybrid_search_products"));
        assert!(names.contains(&"compare_products"));
    }

    #[tokio::test]
    async fn custom_adapter_runs_registered_function() {
        let adapter = CustomToolProtocol::new();
        adapter
            .register_tool(
                ToolMetadata::new("count_words", "Counts words in a review body").with_parameter(
                    ToolParameter::new("text", ToolParameterType::String).required(),
                ),
                Arc::new(|params| {
                    let text = params["text"].as_str().unwrap_or("");
                    Ok(ToolResult::success(
                        serde_json::json!({"words": text.split_whitespace().count()}),
                    ))
                }),
            )
            .await;

        let result = adapter
            .execute(
                "count_words",
                serde_json::json!({"text": "great battery but muddy bass"}),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output["words"], 5);
        assert_eq!(adapter.protocol_name(), "custom");
    }

    #[tokio::test]
    async fn custom_adapter_runs_async_functions() {
        let adapter = CustomToolProtocol::new();
        adapter
            .register_async_tool(
                ToolMetadata::new("detect_language", "Guesses the language of a review"),
                Arc::new(|params| {
                    Box::pin(async move {
                        let text = params["text"].as_str().unwrap_or("");
                        let lang = if text.contains("excelente") { "es" } else { "en" };
                        Ok(ToolResult::success(serde_json::json!({"language": lang})))
                    })
                }),
            )
            .await;

        let result = adapter
            .execute(
                "detect_language",
                serde_json::json!({"text": "Producto excelente, lo recomiendo"}),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output["language"], "es");
    }

    #[tokio::test]
    async fn custom_adapter_unregister_removes_tool() {
        let adapter = CustomToolProtocol::new();
        adapter
            .register_tool(
                ToolMetadata::new("echo", "Returns its parameters unchanged"),
                Arc::new(|params| Ok(ToolResult::success(params))),
            )
            .await;
        assert_eq!(adapter.list_tools().await.unwrap().len(), 1);

        adapter.unregister_tool("echo").await;

        assert!(adapter.list_tools().await.unwrap().is_empty());
        let err = adapter
            .execute("echo", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Tool not found"));
    }
}

