//! MCP Server Builder
//!
//! Fluent construction of the platform's MCP tool server: product-search
//! tools, access control, and the HTTP adapter, started with one call.
//!
//! # Example
//!
//! ```rust,ignore
//! use reviewmind::mcp_server_builder::McpServerBuilder;
//! use reviewmind::tools::{ProductSearch, ReviewCatalog};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(ReviewCatalog::with_demo_data());
//!     let search = Arc::new(ProductSearch::new(catalog));
//!
//!     let server = McpServerBuilder::new()
//!         .with_search_tools(search)
//!         .await
//!         .allow_localhost_only()
//!         .with_bearer_token("my-secret-token")
//!         .start_on(8080)
//!         .await?;
//!     println!("MCP tools at {}", server.addr());
//!
//!     Ok(())
//! }
//! ```

use crate::reviewmind::event::EventHandler;
use crate::reviewmind::mcp_http_adapter::{
    HttpServerAdapter, HttpServerConfig, HttpServerInstance,
};
use crate::reviewmind::mcp_server::McpToolServer;
use crate::reviewmind::server_auth::{AuthConfig, IpFilter};
use crate::reviewmind::tool_protocol::ToolProtocol;
use crate::reviewmind::tool_protocols::{ProductSearchProtocol, ReviewCatalogProtocol};
use crate::reviewmind::tools::{ProductSearch, ReviewCatalog};
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

/// Builder for the MCP tool server.
///
/// Defaults: no tools, no IP restrictions, no authentication, axum adapter
/// (feature `server`). Without the feature, supply an adapter via
/// [`with_adapter`](McpServerBuilder::with_adapter) or
/// [`start_at`](McpServerBuilder::start_at) will refuse to start.
pub struct McpServerBuilder {
    server: McpToolServer,
    ip_filter: IpFilter,
    auth: AuthConfig,
    adapter: Arc<dyn HttpServerAdapter>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl McpServerBuilder {
    /// Start an empty builder with default settings.
    pub fn new() -> Self {
        Self {
            server: McpToolServer::new(),
            ip_filter: IpFilter::new(),
            auth: AuthConfig::None,
            adapter: Self::default_adapter(),
            event_handler: None,
        }
    }

    #[cfg(feature = "server")]
    fn default_adapter() -> Arc<dyn HttpServerAdapter> {
        use crate::reviewmind::mcp_http_adapter::AxumServerAdapter;
        Arc::new(AxumServerAdapter)
    }

    #[cfg(not(feature = "server"))]
    fn default_adapter() -> Arc<dyn HttpServerAdapter> {
        Arc::new(UnconfiguredAdapter)
    }

    /// Expose `hybrid_search_products` and `compare_products` over a
    /// catalog-backed search engine.
    pub async fn with_search_tools(mut self, search: Arc<ProductSearch>) -> Self {
        let protocol = Arc::new(ProductSearchProtocol::new(search));
        if let Err(e) = self.server.register_protocol(protocol).await {
            log::warn!("search tools skipped: {}", e);
        }
        self
    }

    /// Expose `get_product_reviews` and `get_review_stats` over a shared
    /// review catalog.
    pub async fn with_catalog_tools(mut self, catalog: Arc<ReviewCatalog>) -> Self {
        let protocol = Arc::new(ReviewCatalogProtocol::new(catalog));
        if let Err(e) = self.server.register_protocol(protocol).await {
            log::warn!("catalog tools skipped: {}", e);
        }
        self
    }

    /// Register every tool an arbitrary protocol advertises.
    ///
    /// Protocols whose discovery fails are skipped with a warning, keeping
    /// the builder fluent.
    pub async fn with_protocol(mut self, protocol: Arc<dyn ToolProtocol>) -> Self {
        if let Err(e) = self.server.register_protocol(protocol).await {
            log::warn!("protocol skipped: {}", e);
        }
        self
    }

    /// Bind a single tool name to a protocol without discovery.
    pub async fn with_tool(mut self, tool_name: &str, protocol: Arc<dyn ToolProtocol>) -> Self {
        self.server.register_tool(tool_name, protocol).await;
        self
    }

    /// Require `Authorization: Bearer <token>` on every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthConfig::bearer(token);
        self
    }

    /// Require `Authorization: Basic <base64(username:password)>` on every request.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = AuthConfig::basic(username, password);
        self
    }

    /// Allow a specific client address (e.g. `"127.0.0.1"`, `"::1"`).
    pub fn allow_ip(mut self, ip: &str) -> Result<Self, String> {
        self.ip_filter.allow(ip)?;
        Ok(self)
    }

    /// Allow a CIDR block (e.g. `"192.168.1.0/24"`, `"2001:db8::/32"`).
    pub fn allow_cidr(mut self, cidr: &str) -> Result<Self, String> {
        self.ip_filter.allow(cidr)?;
        Ok(self)
    }

    /// Allow only loopback clients, IPv4 and IPv6.
    pub fn allow_localhost_only(mut self) -> Self {
        self.ip_filter.allow_localhost();
        self
    }

    /// Swap the HTTP framework serving the surface.
    pub fn with_adapter(mut self, adapter: Arc<dyn HttpServerAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Observe server lifecycle and request events
    /// ([`ServerEvent`](crate::event::ServerEvent)).
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Start on `127.0.0.1:<port>`.
    pub async fn start_on(
        self,
        port: u16,
    ) -> Result<HttpServerInstance, Box<dyn Error + Send + Sync>> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        self.start_at(addr).await
    }

    /// Start at an explicit socket address.
    pub async fn start_at(
        self,
        addr: SocketAddr,
    ) -> Result<HttpServerInstance, Box<dyn Error + Send + Sync>> {
        let config = HttpServerConfig {
            addr,
            auth: self.auth,
            ip_filter: self.ip_filter,
            event_handler: self.event_handler,
        };
        log::debug!(
            "starting MCP tool server via {} adapter at {}",
            self.adapter.name(),
            addr
        );
        self.adapter.start(config, Arc::new(self.server)).await
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder adapter used when the crate is built without the `server`
/// feature; starting it reports the missing feature instead of binding.
#[cfg(not(feature = "server"))]
struct UnconfiguredAdapter;

#[cfg(not(feature = "server"))]
#[async_trait::async_trait]
impl HttpServerAdapter for UnconfiguredAdapter {
    async fn start(
        &self,
        _config: HttpServerConfig,
        _protocol: Arc<dyn ToolProtocol>,
    ) -> Result<HttpServerInstance, Box<dyn Error + Send + Sync>> {
        Err("built without the 'server' feature; enable it or supply an adapter \
             with with_adapter()"
            .into())
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}
