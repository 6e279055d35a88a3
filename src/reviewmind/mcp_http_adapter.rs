//! HTTP Server Adapter for the MCP Surface
//!
//! A pluggable interface between [`McpServerBuilder`](crate::mcp_server_builder::McpServerBuilder)
//! and the HTTP framework actually serving requests. The default
//! implementation uses axum (feature `server`); deployments preferring
//! another framework implement [`HttpServerAdapter`] themselves and pass it
//! to the builder.
//!
//! # Design
//!
//! ```text
//! McpServerBuilder
//!        ↓ (configures)
//! HttpServerAdapter (trait)
//!        ↓ (implements)
//! AxumServerAdapter: POST /tools/list, POST /tools/execute
//! ```
//!
//! Every route is gated by the configured [`IpFilter`] and [`AuthConfig`]
//! before the tool protocol is touched; rejections surface to the event
//! handler as [`ServerEvent::RequestRejected`](crate::event::ServerEvent).

use crate::reviewmind::event::EventHandler;
#[cfg(feature = "server")]
use crate::reviewmind::event::ServerEvent;
use crate::reviewmind::server_auth::{AuthConfig, IpFilter};
use crate::reviewmind::tool_protocol::ToolProtocol;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

/// Everything an adapter needs to serve one MCP tool surface.
#[derive(Clone)]
pub struct HttpServerConfig {
    /// Socket address to bind to.
    pub addr: SocketAddr,
    /// `Authorization` header policy, enforced on every route.
    pub auth: AuthConfig,
    /// Client allow-list, enforced on every route.
    pub ip_filter: IpFilter,
    /// Optional observer for lifecycle and request events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl std::fmt::Debug for HttpServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServerConfig")
            .field("addr", &self.addr)
            .field("auth", &self.auth)
            .field("ip_filter", &self.ip_filter)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// A running HTTP server.
pub struct HttpServerInstance {
    addr: SocketAddr,
    /// Type-erased so different frameworks can hand back their own task or
    /// shutdown handle.
    shutdown_handle: Box<dyn std::any::Any + Send + Sync>,
}

impl HttpServerInstance {
    /// Wrap a bound address and a framework-specific shutdown handle.
    pub fn new(addr: SocketAddr, shutdown_handle: Box<dyn std::any::Any + Send + Sync>) -> Self {
        Self {
            addr,
            shutdown_handle,
        }
    }

    /// The address the server actually bound (useful with port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Mutable access to the framework-specific shutdown handle.
    pub fn shutdown_handle_mut(&mut self) -> &mut Box<dyn std::any::Any + Send + Sync> {
        &mut self.shutdown_handle
    }
}

/// An HTTP framework binding for the MCP tool surface.
///
/// Implementations must serve:
/// - `POST /tools/list` → `{"tools": [..]}`
/// - `POST /tools/execute` with `{"tool", "parameters"}` → `{"result": ..}`
///
/// and apply the config's IP filter and auth policy to both.
#[async_trait::async_trait]
pub trait HttpServerAdapter: Send + Sync {
    /// Bind and start serving the given protocol. Returns once the listener
    /// is accepting; serving continues in the background.
    async fn start(
        &self,
        config: HttpServerConfig,
        protocol: Arc<dyn ToolProtocol>,
    ) -> Result<HttpServerInstance, Box<dyn Error + Send + Sync>>;

    /// Adapter name for logs.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Per-route state shared by the axum handlers.
#[cfg(feature = "server")]
struct RouteState {
    guard: crate::reviewmind::server_auth::SurfaceGuard,
    protocol: Arc<dyn ToolProtocol>,
}

/// Default axum-based adapter (feature `server`).
#[cfg(feature = "server")]
pub struct AxumServerAdapter;

#[cfg(feature = "server")]
#[async_trait::async_trait]
impl HttpServerAdapter for AxumServerAdapter {
    async fn start(
        &self,
        config: HttpServerConfig,
        protocol: Arc<dyn ToolProtocol>,
    ) -> Result<HttpServerInstance, Box<dyn Error + Send + Sync>> {
        use axum::extract::ConnectInfo;
        use axum::http::{HeaderMap, StatusCode};
        use axum::response::IntoResponse;
        use axum::routing::post;
        use axum::{Json, Router};
        use serde_json::json;
        use tokio::net::TcpListener;

        let state = Arc::new(RouteState {
            guard: crate::reviewmind::server_auth::SurfaceGuard::new(
                config.auth.clone(),
                config.ip_filter.clone(),
                config.event_handler.clone(),
            ),
            protocol,
        });
        let state_list = Arc::clone(&state);
        let state_exec = Arc::clone(&state);

        let app = Router::new()
            .route(
                "/tools/list",
                post(
                    move |ConnectInfo(addr): ConnectInfo<SocketAddr>, headers: HeaderMap| {
                        let state = Arc::clone(&state_list);
                        async move {
                            if let Err(refusal) = state.guard.admit(&addr, &headers).await {
                                return refusal;
                            }
                            state.guard
                                .emit(&ServerEvent::ToolListRequested {
                                    client_addr: addr.ip().to_string(),
                                })
                                .await;

                            match state.protocol.list_tools().await {
                                Ok(tools) => {
                                    state.guard
                                        .emit(&ServerEvent::ToolListReturned {
                                            client_addr: addr.ip().to_string(),
                                            tool_count: tools.len(),
                                        })
                                        .await;
                                    (StatusCode::OK, Json(json!({"tools": tools}))).into_response()
                                }
                                Err(e) => (
                                    StatusCode::INTERNAL_SERVER_ERROR,
                                    Json(json!({"error": e.to_string()})),
                                )
                                    .into_response(),
                            }
                        }
                    },
                ),
            )
            .route(
                "/tools/execute",
                post(
                    move |ConnectInfo(addr): ConnectInfo<SocketAddr>,
                          headers: HeaderMap,
                          Json(payload): Json<serde_json::Value>| {
                        let state = Arc::clone(&state_exec);
                        async move {
                            if let Err(refusal) = state.guard.admit(&addr, &headers).await {
                                return refusal;
                            }

                            let tool_name = payload["tool"].as_str().unwrap_or("").to_string();
                            let params = payload
                                .get("parameters")
                                .cloned()
                                .unwrap_or(serde_json::Value::Null);
                            state.guard
                                .emit(&ServerEvent::ToolCallReceived {
                                    client_addr: addr.ip().to_string(),
                                    tool_name: tool_name.clone(),
                                    parameters: params.clone(),
                                })
                                .await;

                            let started = std::time::Instant::now();
                            match state.protocol.execute(&tool_name, params).await {
                                Ok(result) => {
                                    state.guard
                                        .emit(&ServerEvent::ToolCallCompleted {
                                            client_addr: addr.ip().to_string(),
                                            tool_name: tool_name.clone(),
                                            success: result.success,
                                            error: result.error.clone(),
                                            duration_ms: started.elapsed().as_millis() as u64,
                                        })
                                        .await;
                                    (StatusCode::OK, Json(json!({"result": result})))
                                        .into_response()
                                }
                                Err(e) => {
                                    let message = e.to_string();
                                    state.guard
                                        .emit(&ServerEvent::ToolCallFailed {
                                            client_addr: addr.ip().to_string(),
                                            tool_name: tool_name.clone(),
                                            error: message.clone(),
                                            duration_ms: started.elapsed().as_millis() as u64,
                                        })
                                        .await;
                                    (StatusCode::BAD_REQUEST, Json(json!({"error": message})))
                                        .into_response()
                                }
                            }
                        }
                    },
                ),
            )
            .into_make_service_with_connect_info::<SocketAddr>();

        let listener = TcpListener::bind(config.addr).await?;
        let addr = listener.local_addr()?;
        log::info!("MCP tool server listening on {}", addr);

        if let Some(handler) = &config.event_handler {
            handler
                .on_server_event(&ServerEvent::ServerStarted {
                    addr: addr.to_string(),
                })
                .await;
        }

        let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });
        Ok(HttpServerInstance::new(addr, Box::new(server_handle)))
    }

    fn name(&self) -> &str {
        "axum"
    }
}
