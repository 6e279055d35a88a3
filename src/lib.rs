//! # ReviewMind
//!
//! ReviewMind is the review-intelligence engine of the storefront: a team of
//! LLM agents that fetches a product's customer reviews, translates the
//! non-English ones, classifies sentiment, and synthesizes an actionable
//! report, then serves the whole pipeline over REST, A2A, and MCP.
//!
//! The crate provides carefully layered abstractions for:
//!
//! * **Agents with Tools**: [`Agent`] abstractions that connect to LLMs and execute actions
//!   through a flexible, multi-protocol tool system via [`tool_protocol::ToolRegistry`]
//! * **Tool Routing**: the review catalog, hybrid product search, remote MCP servers, or custom
//!   protocols all accessible through a unified interface
//! * **Multi-Agent Orchestration**: [`orchestration`] module for coordinating the review team
//!   with Sequential, HandOff, or GroupChat patterns, driven by a phase-aware chat manager
//! * **Analysis as a Service**: [`service::ReviewAnalysisService`] wraps catalog lookup,
//!   team assembly, deadlines, and report extraction behind one `analyze()` call
//! * **Server Deployment**: REST analysis endpoint, JSON-RPC agent endpoints with discovery
//!   cards, and an MCP tool server (all on the `server` feature) with authentication and
//!   IP filtering
//! * **Stateful Conversations**: [`LLMSession`] for maintaining rolling conversation history
//!   with context trimming and token accounting
//! * **Provider Flexibility**: [`ClientWrapper`] trait implemented for OpenAI and any
//!   OpenAI-compatible endpoint
//!
//! The crate aims to provide documentation-quality examples for every public API.  These
//! examples are kept up to date and are written to compile under `cargo test --doc`.
//!
//! ## Core Concepts
//!
//! ### LLMSession: Stateful Conversations (The Foundation)
//!
//! [`LLMSession`] is the foundational abstraction: it wraps a client to maintain a rolling
//! conversation history with automatic context trimming and token accounting:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reviewmind::{LLMSession, Role};
//! use reviewmind::clients::openai::{Model, OpenAIClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = Arc::new(OpenAIClient::new_with_model_enum(
//!         &std::env::var("OPEN_AI_SECRET")?,
//!         Model::GPT4oMini,
//!     ));
//!
//!     let mut session = LLMSession::new(client, "You are a review analyst.".into(), 8_192);
//!
//!     let reply = session
//!         .send_message(Role::User, "Summarize: the shoes run small but look great.".into())
//!         .await?;
//!
//!     println!("Assistant: {}", reply.content);
//!     println!("Tokens used: {:?}", session.token_usage());
//!     Ok(())
//! }
//! ```
//!
//! ### Agents: The Review Team
//!
//! [`Agent`] extends [`LLMSession`] by adding identity, expertise, and optional tools. The
//! [`review_team`] module ships the four specialists the analysis pipeline runs on (data
//! collector, translator, sentiment analyst, insights synthesizer) plus the standalone
//! summarizer and recommender; custom agents follow the same builder pattern:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reviewmind::Agent;
//! use reviewmind::clients::openai::{Model, OpenAIClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(OpenAIClient::new_with_model_enum(
//!         &std::env::var("OPEN_AI_SECRET")?,
//!         Model::GPT4oMini,
//!     ));
//!
//!     let agent = Agent::new("pricing-analyst", "Pricing Analyst", client)
//!         .with_expertise("Price-to-value signals in customer reviews")
//!         .with_personality("Blunt and numbers-first");
//!
//!     // Agent is now ready to join an orchestration or answer on its own.
//!     Ok(())
//! }
//! ```
//!
//! ### Tool Registry: Multi-Protocol Tool Access
//!
//! Agents access tools through the [`tool_protocol::ToolRegistry`], which supports **multiple
//! simultaneous protocols**. Register tools from different sources (the built-in review
//! catalog, hybrid product search, remote MCP servers, local closures) and agents access
//! them transparently:
//!
//! - **Catalog Tools**: product/review lookups via [`tool_protocols::ReviewCatalogProtocol`]
//! - **Search Tools**: `hybrid_search_products` and `compare_products` via
//!   [`tool_protocols::ProductSearchProtocol`]
//! - **Local Tools**: Rust closures and async functions via [`tool_protocols::CustomToolProtocol`]
//! - **Remote Tools**: HTTP-based MCP servers via [`tool_protocols::McpClientProtocol`]
//! - **Custom Protocols**: Implement [`tool_protocol::ToolProtocol`] for any system
//!
//! ```rust
//! use std::sync::Arc;
//! use reviewmind::tool_protocol::ToolRegistry;
//! use reviewmind::tool_protocols::ReviewCatalogProtocol;
//! use reviewmind::tools::ReviewCatalog;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let catalog = Arc::new(ReviewCatalog::with_demo_data());
//!
//! let mut registry = ToolRegistry::empty();
//! let protocol = Arc::new(ReviewCatalogProtocol::new(catalog));
//! registry.add_protocol("catalog", protocol).await?;
//!
//! // Every agent sharing this registry can now fetch products and reviews.
//! # Ok(())
//! # }
//! ```
//!
//! ### Multi-Agent Orchestration
//!
//! The [`orchestration`] module coordinates the team through one of three patterns:
//! - **Sequential**: one pass through the roster in insertion order
//! - **HandOff**: agents route control with explicit hand-off markers, the phase machine
//!   stepping in when they don't (this is the platform's `Normal` mode)
//! - **GroupChat**: the chat manager picks every speaker from the completed analysis phases
//!   and decides when the conversation is done
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reviewmind::clients::openai::{Model, OpenAIClient};
//! use reviewmind::orchestration::{Orchestration, OrchestrationMode};
//! use reviewmind::review_team::ReviewTeam;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = Arc::new(OpenAIClient::new_with_model_enum(
//!         &std::env::var("OPEN_AI_SECRET")?,
//!         Model::GPT4oMini,
//!     ));
//!
//!     let team = ReviewTeam::new(client);
//!     let mut orchestration = Orchestration::new("run-1", "Trail Runner 3 review analysis")
//!         .with_mode(OrchestrationMode::GroupChat);
//!     for agent in team.into_agents() {
//!         orchestration.add_agent(agent)?;
//!     }
//!
//!     let run = orchestration
//!         .run("Analyze the customer reviews for product 1001.")
//!         .await?;
//!     println!("{} turns, complete: {}", run.turns, run.is_complete);
//!     Ok(())
//! }
//! ```
//!
//! ### The Analysis Service
//!
//! [`service::ReviewAnalysisService`] is what the HTTP surfaces call into: it looks the
//! product up, builds the task prompt, forks a fresh team per run, enforces the deadline,
//! and extracts the final report:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reviewmind::clients::openai::{Model, OpenAIClient};
//! use reviewmind::orchestration::OrchestrationMode;
//! use reviewmind::service::ReviewAnalysisService;
//! use reviewmind::tools::ReviewCatalog;
//! use reviewmind::ReviewMindConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     reviewmind::init_logger();
//!
//!     let client = Arc::new(OpenAIClient::new_with_model_enum(
//!         &std::env::var("OPEN_AI_SECRET")?,
//!         Model::GPT4oMini,
//!     ));
//!     let catalog = Arc::new(ReviewCatalog::with_demo_data());
//!
//!     let service =
//!         ReviewAnalysisService::new(client, catalog, ReviewMindConfig::default()).await?;
//!
//!     let report = service.analyze(1001, OrchestrationMode::HandOff).await?;
//!     println!("{}", report.analysis);
//!     Ok(())
//! }
//! ```
//!
//! ### Serving the Pipeline
//!
//! With the `server` feature enabled the crate exposes three network surfaces, all sharing
//! the same IP-filter and `Authorization` policies:
//!
//! - `POST /api/v1/reviews/{product_id}/analyze`: the REST surface ([`rest_api`])
//! - `/reviews`, `/summarize`, `/sentiment`: JSON-RPC agent endpoints, each publishing a
//!   discovery card at `{path}/.well-known/agent-card.json` ([`a2a`])
//! - `POST /tools/list` and `POST /tools/execute`: the MCP tool server, deployed through
//!   [`mcp_server_builder::McpServerBuilder`]
//!
//! The `reviewmind-server` binary wires all three onto one process; see `src/bin/server.rs`
//! for the complete setup including demo data, event logging, and graceful shutdown.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use reviewmind::client_wrapper::{ClientWrapper, Message, Role};
//! use reviewmind::clients::openai::{Model, OpenAIClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     reviewmind::init_logger();
//!
//!     let api_key = std::env::var("OPEN_AI_SECRET")?;
//!     let client = OpenAIClient::new_with_model_enum(&api_key, Model::GPT4oMini);
//!
//!     let response = client
//!         .send_message(&[
//!             Message { role: Role::System, content: "You are terse.".into() },
//!             Message { role: Role::User, content: "Rate this review: 'arrived broken'".into() },
//!         ])
//!         .await?;
//!
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```
//!
//! Continue exploring the modules re-exported from the crate root for progressively richer
//! interaction patterns.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// The helper is intentionally lightweight so that applications embedding ReviewMind can
/// opt-in to simple `RUST_LOG` driven diagnostics without having to choose a specific
/// logging backend upfront.
///
/// ```rust
/// reviewmind::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `reviewmind` module.
pub mod reviewmind;

// Re-exporting key items for easier external access.
pub use reviewmind::agent::Agent;
pub use reviewmind::client_wrapper;
pub use reviewmind::client_wrapper::{
    ClientWrapper, Message, MessageChunk, MessageChunkStream, Role, SendError, TokenUsage,
};
pub use reviewmind::clients;
pub use reviewmind::config;
pub use reviewmind::config::ReviewMindConfig;
pub use reviewmind::llm_session::LLMSession;

// Re-export the analysis pipeline and tool functionality
pub use reviewmind::agent_card;
pub use reviewmind::chat_manager;
pub use reviewmind::event;
pub use reviewmind::event::{AgentEvent, EventHandler, OrchestrationEvent, ServerEvent};
pub use reviewmind::mcp_http_adapter;
pub use reviewmind::mcp_server;
pub use reviewmind::mcp_server_builder;
pub use reviewmind::orchestration;
pub use reviewmind::review_team;
pub use reviewmind::server_auth;
pub use reviewmind::service;
pub use reviewmind::tool_protocol;
pub use reviewmind::tool_protocols;
pub use reviewmind::tools;

// The HTTP surfaces only exist with the `server` feature.
#[cfg(feature = "server")]
pub use reviewmind::a2a;
#[cfg(feature = "server")]
pub use reviewmind::rest_api;
