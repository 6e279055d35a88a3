//! REST Analysis API
//!
//! A single route drives the full review pipeline:
//!
//! ```text
//! POST /api/v1/reviews/{product_id}/analyze?AgentOrchestrationType=GroupChat
//! ```
//!
//! The `AgentOrchestrationType` query parameter is matched case-insensitively
//! and defaults to `Normal` (the hand-off topology) when absent. Outcomes map
//! to statuses as follows:
//!
//! | Outcome                     | Status |
//! |-----------------------------|--------|
//! | report produced             | 200    |
//! | unknown product             | 404    |
//! | unrecognized mode value     | 400    |
//! | analysis hit the deadline   | 504    |
//! | model or orchestration loss | 500    |
//!
//! Failure bodies are `{"error": "..."}` with the [`ServiceError`] message.

use crate::reviewmind::event::{EventHandler, ServerEvent};
use crate::reviewmind::orchestration::OrchestrationMode;
use crate::reviewmind::server_auth::{AuthConfig, IpFilter, SurfaceGuard};
use crate::reviewmind::service::{ReviewAnalysisService, ServiceError};
use axum::extract::{ConnectInfo, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Settings for the REST router.
pub struct RestServerConfig {
    /// `Authorization` policy for the analysis endpoint.
    pub auth: AuthConfig,
    /// Client allow-list for the analysis endpoint.
    pub ip_filter: IpFilter,
    /// Optional observer for request traffic events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl Default for RestServerConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::None,
            ip_filter: IpFilter::new(),
            event_handler: None,
        }
    }
}

struct RestState {
    service: Arc<ReviewAnalysisService>,
    guard: SurfaceGuard,
}

/// Build the axum router serving the analysis endpoint.
///
/// Merge it with the A2A router and serve the combined app with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn rest_router(service: Arc<ReviewAnalysisService>, config: RestServerConfig) -> Router {
    let state = Arc::new(RestState {
        service,
        guard: SurfaceGuard::new(config.auth, config.ip_filter, config.event_handler),
    });

    Router::new().route(
        "/api/v1/reviews/{product_id}/analyze",
        post(
            move |ConnectInfo(addr): ConnectInfo<SocketAddr>,
                  Path(product_id): Path<u64>,
                  Query(query): Query<HashMap<String, String>>,
                  headers: HeaderMap| {
                let state = Arc::clone(&state);
                async move {
                    if let Err(refusal) = state.guard.admit(&addr, &headers).await {
                        return refusal;
                    }

                    let raw_mode = orchestration_type_param(&query);
                    let mode = match OrchestrationMode::from_query_value(&raw_mode) {
                        Some(mode) => mode,
                        None => {
                            let error = ServiceError::UnsupportedMode(raw_mode);
                            return (
                                StatusCode::BAD_REQUEST,
                                Json(json!({"error": error.to_string()})),
                            )
                                .into_response();
                        }
                    };

                    state
                        .guard
                        .emit(&ServerEvent::AnalysisRequested {
                            client_addr: addr.ip().to_string(),
                            product_id,
                            mode: mode.to_string(),
                        })
                        .await;

                    let started = std::time::Instant::now();
                    let outcome = state.service.analyze(product_id, mode).await;
                    state
                        .guard
                        .emit(&ServerEvent::AnalysisCompleted {
                            product_id,
                            success: outcome.is_ok(),
                            duration_ms: started.elapsed().as_millis() as u64,
                        })
                        .await;

                    match outcome {
                        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
                        Err(error) => (
                            status_for(&error),
                            Json(json!({"error": error.to_string()})),
                        )
                            .into_response(),
                    }
                }
            },
        ),
    )
}

/// Pull the `AgentOrchestrationType` value out of the query string,
/// tolerating any casing of the key. Absent means `Normal`; a present but
/// unrecognized value is the caller's mistake and stays as-is so the 400
/// body can echo it.
fn orchestration_type_param(query: &HashMap<String, String>) -> String {
    query
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("agentorchestrationtype"))
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| "Normal".to_string())
}

/// Map a service failure to the HTTP status the route answers with.
fn status_for(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::UnsupportedMode(_) => StatusCode::BAD_REQUEST,
        ServiceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::Orchestration(_) | ServiceError::Agent(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn mode_param_is_found_case_insensitively() {
        assert_eq!(
            orchestration_type_param(&query(&[("AgentOrchestrationType", "GroupChat")])),
            "GroupChat"
        );
        assert_eq!(
            orchestration_type_param(&query(&[("AGENTORCHESTRATIONTYPE", "sequential")])),
            "sequential"
        );
    }

    #[test]
    fn missing_mode_param_defaults_to_normal() {
        assert_eq!(orchestration_type_param(&query(&[])), "Normal");
        assert_eq!(
            orchestration_type_param(&query(&[("other", "GroupChat")])),
            "Normal"
        );
    }

    #[test]
    fn default_mode_value_parses_to_hand_off() {
        let raw = orchestration_type_param(&HashMap::new());
        assert_eq!(
            OrchestrationMode::from_query_value(&raw),
            Some(OrchestrationMode::HandOff)
        );
    }

    #[test]
    fn statuses_match_failure_categories() {
        assert_eq!(
            status_for(&ServiceError::ProductNotFound(9)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ServiceError::UnsupportedMode("Chaotic".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ServiceError::Timeout),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&ServiceError::Orchestration("roster empty".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&ServiceError::Agent("model unavailable".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
