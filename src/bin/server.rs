//! ReviewMind Server
//!
//! Binds all three network surfaces onto one process:
//!
//! - REST: `POST /api/v1/reviews/{product_id}/analyze` (default port 8080)
//! - A2A: `/reviews`, `/summarize`, `/sentiment` plus their discovery cards
//!   (same port as REST)
//! - MCP: `POST /tools/list`, `POST /tools/execute` (default port 8008,
//!   localhost clients only)
//!
//! # Running
//!
//! ```bash
//! OPEN_AI_SECRET=sk-... cargo run --bin reviewmind-server --features server
//! ```
//!
//! # Environment
//!
//! - `OPEN_AI_SECRET` (required): API key for the LLM provider
//! - `REVIEWMIND_MODEL`, `REVIEWMIND_API_BASE`, `REVIEWMIND_RUN_TIMEOUT_SECS`,
//!   `REVIEWMIND_MAX_INVOCATIONS`, `REVIEWMIND_MAX_TOKENS`: see
//!   `ReviewMindConfig::from_env`
//! - `REVIEWMIND_HTTP_PORT` (default 8080), `REVIEWMIND_MCP_PORT` (default 8008)
//! - `REVIEWMIND_REVIEWS_PATH`: optional JSON file seeding the catalog; the
//!   built-in demo dataset is used when unset
//!
//! Both listeners bind `127.0.0.1`. Put a reverse proxy in front for anything
//! internet-facing and configure auth there or via `RestServerConfig`.

use async_trait::async_trait;
use reviewmind::a2a::{a2a_router, A2aServerConfig};
use reviewmind::clients::openai::OpenAIClient;
use reviewmind::event::{EventHandler, OrchestrationEvent, ServerEvent};
use reviewmind::mcp_server_builder::McpServerBuilder;
use reviewmind::rest_api::{rest_router, RestServerConfig};
use reviewmind::service::ReviewAnalysisService;
use reviewmind::tools::{ProductSearch, ReviewCatalog};
use reviewmind::ReviewMindConfig;
use std::net::SocketAddr;
use std::sync::Arc;

/// Forwards orchestration and server events to the standard logger.
struct LogHandler;

#[async_trait]
impl EventHandler for LogHandler {
    async fn on_orchestration_event(&self, event: &OrchestrationEvent) {
        log::debug!("orchestration: {:?}", event);
    }

    async fn on_server_event(&self, event: &ServerEvent) {
        log::info!("server: {:?}", event);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    reviewmind::init_logger();

    let config = ReviewMindConfig::from_env();
    let api_key = std::env::var("OPEN_AI_SECRET")
        .map_err(|_| "OPEN_AI_SECRET must be set to reach the LLM provider")?;

    let client = match &config.api_base_url {
        Some(base) => Arc::new(OpenAIClient::new_with_base_url(
            &api_key,
            &config.model,
            base,
        )),
        None => Arc::new(OpenAIClient::new_with_model_string(&api_key, &config.model)),
    };

    let catalog = match std::env::var("REVIEWMIND_REVIEWS_PATH") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)?;
            let catalog = ReviewCatalog::new();
            let loaded = catalog.load_from_json(&json)?;
            log::info!("Seeded catalog with {} reviews from {}", loaded, path);
            Arc::new(catalog)
        }
        Err(_) => {
            log::info!("REVIEWMIND_REVIEWS_PATH not set, using the demo dataset");
            Arc::new(ReviewCatalog::with_demo_data())
        }
    };

    let handler: Arc<dyn EventHandler> = Arc::new(LogHandler);
    let service = Arc::new(
        ReviewAnalysisService::new(client, Arc::clone(&catalog), config.clone())
            .await?
            .with_event_handler(Arc::clone(&handler)),
    );

    let http_port = env_port("REVIEWMIND_HTTP_PORT", 8080);
    let mcp_port = env_port("REVIEWMIND_MCP_PORT", 8008);

    // REST + A2A share one listener.
    let rest = rest_router(
        Arc::clone(&service),
        RestServerConfig {
            event_handler: Some(Arc::clone(&handler)),
            ..RestServerConfig::default()
        },
    );
    let a2a = a2a_router(
        Arc::clone(&service),
        A2aServerConfig {
            base_url: format!("http://localhost:{}", http_port),
            event_handler: Some(Arc::clone(&handler)),
            ..A2aServerConfig::default()
        },
    );
    let app = rest
        .merge(a2a)
        .into_make_service_with_connect_info::<SocketAddr>();

    let http_addr = SocketAddr::from(([127, 0, 0, 1], http_port));
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_addr = listener.local_addr()?;
    log::info!("REST and A2A surfaces listening on {}", http_addr);
    tokio::spawn(async move { axum::serve(listener, app).await });

    // The MCP tool server gets its own port and stays localhost-only.
    let search = Arc::new(ProductSearch::new(Arc::clone(&catalog)));
    let mcp = McpServerBuilder::new()
        .with_search_tools(search)
        .await
        .with_catalog_tools(Arc::clone(&catalog))
        .await
        .with_event_handler(Arc::clone(&handler))
        .allow_localhost_only()
        .start_on(mcp_port)
        .await?;

    println!("ReviewMind server is up.");
    println!("  REST    http://{}/api/v1/reviews/{{product_id}}/analyze", http_addr);
    println!("  A2A     http://{}/reviews | /summarize | /sentiment", http_addr);
    println!("  Cards   http://{}/reviews/.well-known/agent-card.json", http_addr);
    println!("  MCP     http://{}/tools/list", mcp.addr());
    println!("  Model   {}", config.model);
    println!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");
    Ok(())
}

fn env_port(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
