// src/reviewmind/mod.rs

pub mod agent;
pub mod agent_card;
pub mod chat_manager;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod event;
pub mod llm_session;
pub mod mcp_http_adapter;
pub mod mcp_server;
pub mod mcp_server_builder;
pub mod orchestration;
pub mod review_team;
pub mod server_auth;
pub mod service;
pub mod tool_protocol;
pub mod tool_protocols;
pub mod tools;

// The network surfaces need axum; everything above works without it.
#[cfg(feature = "server")]
pub mod a2a;
#[cfg(feature = "server")]
pub mod rest_api;

// Let's explicitly export LLMSession so we don't have to access it via
// reviewmind::llm_session::LLMSession and instead as reviewmind::LLMSession
pub use llm_session::LLMSession;
