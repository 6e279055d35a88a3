//! A2A Agent Endpoints
//!
//! Exposes three agents as remotely callable services speaking JSON-RPC 2.0:
//!
//! | Path         | Agent                 | Backing call                                  |
//! |--------------|-----------------------|-----------------------------------------------|
//! | `/reviews`   | Review Data Collector | [`ReviewAnalysisService::collect`]            |
//! | `/summarize` | Review Summarizer     | [`ReviewAnalysisService::summarize`]          |
//! | `/sentiment` | Sentiment Analyst     | [`ReviewAnalysisService::sentiment`]          |
//!
//! Each path also serves its discovery card at
//! `{path}/.well-known/agent-card.json` (cards are public; the RPC posts go
//! through the shared IP filter and auth policy).
//!
//! The only supported method is `message/send`: the text parts of the
//! incoming message are joined, handed to the backing agent, and the reply
//! comes back as an agent message with a fresh `messageId`. RPC-level
//! failures use the standard codes: −32700 parse, −32600 invalid request,
//! −32601 method not found, −32602 invalid params, −32000 execution error.

use crate::reviewmind::agent_card::{
    self, AGENT_CARD_WELL_KNOWN, REVIEWS_PATH, SENTIMENT_PATH, SUMMARIZE_PATH,
};
use crate::reviewmind::event::{EventHandler, ServerEvent};
use crate::reviewmind::server_auth::{AuthConfig, IpFilter, SurfaceGuard};
use crate::reviewmind::service::{ReviewAnalysisService, ServiceError};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Settings for the A2A router.
pub struct A2aServerConfig {
    /// Public base URL advertised in the agent cards,
    /// e.g. `"http://localhost:8080"`.
    pub base_url: String,
    /// `Authorization` policy for the RPC endpoints.
    pub auth: AuthConfig,
    /// Client allow-list for the RPC endpoints.
    pub ip_filter: IpFilter,
    /// Optional observer for RPC traffic events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl Default for A2aServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            auth: AuthConfig::None,
            ip_filter: IpFilter::new(),
            event_handler: None,
        }
    }
}

/// Which exposed agent a request landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum A2aEndpoint {
    Reviews,
    Summarize,
    Sentiment,
}

impl A2aEndpoint {
    fn path(self) -> &'static str {
        match self {
            A2aEndpoint::Reviews => REVIEWS_PATH,
            A2aEndpoint::Summarize => SUMMARIZE_PATH,
            A2aEndpoint::Sentiment => SENTIMENT_PATH,
        }
    }
}

struct A2aState {
    service: Arc<ReviewAnalysisService>,
    guard: SurfaceGuard,
}

/// Build the axum router serving all three agent endpoints and their cards.
///
/// The returned router is self-contained; merge it with other routers (the
/// REST surface, typically) and serve with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn a2a_router(service: Arc<ReviewAnalysisService>, config: A2aServerConfig) -> Router {
    let state = Arc::new(A2aState {
        service,
        guard: SurfaceGuard::new(config.auth, config.ip_filter, config.event_handler),
    });

    let endpoints = [
        (
            A2aEndpoint::Reviews,
            agent_card::reviews_card(&config.base_url),
        ),
        (
            A2aEndpoint::Summarize,
            agent_card::summarize_card(&config.base_url),
        ),
        (
            A2aEndpoint::Sentiment,
            agent_card::sentiment_card(&config.base_url),
        ),
    ];

    let mut router = Router::new();
    for (endpoint, card) in endpoints {
        let card_path = format!("{}{}", endpoint.path(), AGENT_CARD_WELL_KNOWN);
        let card_json = serde_json::to_value(&card).unwrap_or_default();
        let rpc_state = Arc::clone(&state);

        router = router
            .route(
                &card_path,
                get(move || {
                    let card = card_json.clone();
                    async move { Json(card) }
                }),
            )
            .route(
                endpoint.path(),
                post(
                    move |ConnectInfo(addr): ConnectInfo<SocketAddr>,
                          headers: HeaderMap,
                          body: String| {
                        let state = Arc::clone(&rpc_state);
                        async move {
                            if let Err(refusal) = state.guard.admit(&addr, &headers).await {
                                return refusal;
                            }
                            let started = std::time::Instant::now();
                            let (method, response) =
                                process(&state.service, endpoint, &body).await;
                            state
                                .guard
                                .emit(&ServerEvent::RpcReceived {
                                    client_addr: addr.ip().to_string(),
                                    endpoint: endpoint.path().to_string(),
                                    method,
                                })
                                .await;
                            state
                                .guard
                                .emit(&ServerEvent::RpcAnswered {
                                    client_addr: addr.ip().to_string(),
                                    endpoint: endpoint.path().to_string(),
                                    duration_ms: started.elapsed().as_millis() as u64,
                                })
                                .await;
                            (StatusCode::OK, Json(response)).into_response()
                        }
                    },
                ),
            );
    }
    router
}

/// Handle one JSON-RPC request body for an endpoint.
///
/// Returns the method name seen (best effort, for events) and the full
/// JSON-RPC response object. RPC-level failures are encoded in the response,
/// never as transport errors.
async fn process(
    service: &ReviewAnalysisService,
    endpoint: A2aEndpoint,
    body: &str,
) -> (String, serde_json::Value) {
    let request: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            return (
                String::new(),
                rpc_error(serde_json::Value::Null, -32700, "Parse error"),
            );
        }
    };

    let id = request.get("id").cloned().unwrap_or(serde_json::Value::Null);
    let method = request
        .get("method")
        .and_then(|m| m.as_str())
        .unwrap_or("")
        .to_string();

    let version_ok = request
        .get("jsonrpc")
        .and_then(|v| v.as_str())
        .map(|v| v == "2.0")
        .unwrap_or(false);
    if !version_ok || method.is_empty() {
        return (method, rpc_error(id, -32600, "Invalid Request"));
    }
    if method != "message/send" {
        return (method, rpc_error(id, -32601, "Method not found"));
    }

    let params = request.get("params").cloned().unwrap_or_default();
    let text = match extract_text(&params) {
        Some(text) => text,
        None => {
            return (
                method,
                rpc_error(id, -32602, "Invalid params: no text parts in message"),
            );
        }
    };

    let outcome = match endpoint {
        A2aEndpoint::Reviews => service.collect(&text).await,
        A2aEndpoint::Summarize => service.summarize(&text).await,
        A2aEndpoint::Sentiment => service.sentiment(&text).await,
    };
    match outcome {
        Ok(reply) => (method, rpc_result(id, agent_reply(&reply))),
        Err(ServiceError::Timeout) => (method, rpc_error(id, -32000, "Agent timed out")),
        Err(e) => (method, rpc_error(id, -32000, &e.to_string())),
    }
}

/// Join the text parts of an incoming A2A message.
///
/// Parts carrying an explicit non-text `kind` are skipped; parts without a
/// `kind` count as text when they have a `text` field.
fn extract_text(params: &serde_json::Value) -> Option<String> {
    let parts = params.get("message")?.get("parts")?.as_array()?;
    let texts: Vec<&str> = parts
        .iter()
        .filter(|part| {
            part.get("kind")
                .and_then(|k| k.as_str())
                .map(|k| k == "text")
                .unwrap_or(true)
        })
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

/// Wrap an agent's reply text as an A2A message object.
fn agent_reply(text: &str) -> serde_json::Value {
    json!({
        "kind": "message",
        "role": "agent",
        "messageId": uuid::Uuid::new_v4().to_string(),
        "parts": [{"kind": "text", "text": text}],
    })
}

fn rpc_result(id: serde_json::Value, result: serde_json::Value) -> serde_json::Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn rpc_error(id: serde_json::Value, code: i64, message: &str) -> serde_json::Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}
