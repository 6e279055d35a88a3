//! Server Access Control
//!
//! Shared request-gating primitives for every HTTP surface the crate serves
//! (MCP tool server, REST analysis API, A2A agents): an allow-list IP filter
//! with CIDR support and an `Authorization` header validator. Both are plain
//! data, cheap to clone into per-route closures.

use sha2::{Digest, Sha256};
use std::net::IpAddr;
use std::str::FromStr;
use subtle::ConstantTimeEq;

#[cfg(feature = "server")]
pub use self::guard::SurfaceGuard;

/// Allow-list of client addresses.
///
/// An empty filter admits everyone; adding the first entry switches the
/// filter to deny-by-default.
#[derive(Debug, Clone, Default)]
pub struct IpFilter {
    allowed: Vec<FilterRule>,
}

#[derive(Debug, Clone)]
enum FilterRule {
    Exact(IpAddr),
    Subnet { network: IpAddr, prefix_len: u8 },
}

impl IpFilter {
    /// Create an empty filter (admits all clients).
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a single address or a CIDR block.
    ///
    /// Accepts plain addresses (`"127.0.0.1"`, `"::1"`) and CIDR notation
    /// (`"10.0.0.0/8"`, `"2001:db8::/32"`).
    pub fn allow(&mut self, ip_or_cidr: &str) -> Result<(), String> {
        match ip_or_cidr.split_once('/') {
            Some((network_part, prefix_part)) => {
                let network = IpAddr::from_str(network_part)
                    .map_err(|e| format!("bad network address '{}': {}", network_part, e))?;
                let prefix_len: u8 = prefix_part
                    .parse()
                    .map_err(|_| format!("bad CIDR prefix '{}'", prefix_part))?;
                let max_prefix = match network {
                    IpAddr::V4(_) => 32,
                    IpAddr::V6(_) => 128,
                };
                if prefix_len > max_prefix {
                    return Err(format!(
                        "CIDR prefix /{} too long for {}",
                        prefix_len, network
                    ));
                }
                self.allowed.push(FilterRule::Subnet {
                    network,
                    prefix_len,
                });
                Ok(())
            }
            None => {
                let ip = IpAddr::from_str(ip_or_cidr)
                    .map_err(|e| format!("bad IP address '{}': {}", ip_or_cidr, e))?;
                self.allowed.push(FilterRule::Exact(ip));
                Ok(())
            }
        }
    }

    /// Allow loopback clients, both IPv4 and IPv6.
    pub fn allow_localhost(&mut self) {
        self.allowed
            .push(FilterRule::Exact(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)));
        self.allowed
            .push(FilterRule::Exact(IpAddr::V6(std::net::Ipv6Addr::LOCALHOST)));
    }

    /// Whether a client address passes the filter.
    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        self.allowed.iter().any(|rule| match rule {
            FilterRule::Exact(allowed) => ip == *allowed,
            FilterRule::Subnet {
                network,
                prefix_len,
            } => ip_in_subnet(ip, *network, *prefix_len),
        })
    }
}

fn ip_in_subnet(ip: IpAddr, network: IpAddr, prefix_len: u8) -> bool {
    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u32::MAX << (32 - prefix_len)
            };
            (u32::from(ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u128::MAX << (128 - prefix_len)
            };
            (u128::from(ip) & mask) == (u128::from(net) & mask)
        }
        // A v4 client never matches a v6 rule, and vice versa.
        _ => false,
    }
}

/// `Authorization` header policy for a served surface.
#[derive(Debug, Clone)]
pub enum AuthConfig {
    /// No authentication required.
    None,
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `Authorization: Basic <base64(user:password)>`.
    Basic { username: String, password: String },
}

impl AuthConfig {
    /// Bearer-token policy.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// Basic-credentials policy.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Validate a raw `Authorization` header value.
    ///
    /// Pass the empty string when the header is absent; only
    /// [`AuthConfig::None`] accepts that.
    pub fn validate(&self, header: &str) -> bool {
        match self {
            AuthConfig::None => true,
            AuthConfig::Bearer(token) => header
                .strip_prefix("Bearer ")
                .map(|presented| secrets_match(token, presented))
                .unwrap_or(false),
            AuthConfig::Basic { username, password } => header
                .strip_prefix("Basic ")
                .and_then(|encoded| decode_base64(encoded).ok())
                .map(|presented| {
                    let expected = format!("{}:{}", username, password);
                    secrets_match(&expected, &presented)
                })
                .unwrap_or(false),
        }
    }
}

/// Constant-time secret comparison.
///
/// Compares SHA-256 digests with `subtle`; a plain `==` on the strings would
/// short-circuit at the first differing byte and leak a timing signal.
fn secrets_match(expected: &str, presented: &str) -> bool {
    let expected_hash = Sha256::digest(expected.as_bytes());
    let presented_hash = Sha256::digest(presented.as_bytes());
    expected_hash.ct_eq(&presented_hash).into()
}

/// Decode standard base64 into a UTF-8 string.
///
/// Only needed for the Basic scheme's credential blob, so the crate carries
/// no base64 dependency.
fn decode_base64(input: &str) -> Result<String, String> {
    const ALPHABET: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut reverse = [255u8; 256];
    for (value, &symbol) in ALPHABET.iter().enumerate() {
        reverse[symbol as usize] = value as u8;
    }

    let trimmed = input.trim_end_matches('=');
    let mut bytes = Vec::with_capacity(trimmed.len() * 3 / 4);
    for group in trimmed.as_bytes().chunks(4) {
        if group.len() < 2 {
            return Err("truncated base64 group".to_string());
        }
        let mut sextets = [0u8; 4];
        for (i, &symbol) in group.iter().enumerate() {
            let value = reverse[symbol as usize];
            if value == 255 {
                return Err(format!("invalid base64 character '{}'", symbol as char));
            }
            sextets[i] = value;
        }
        bytes.push((sextets[0] << 2) | (sextets[1] >> 4));
        if group.len() > 2 {
            bytes.push((sextets[1] << 4) | (sextets[2] >> 2));
        }
        if group.len() > 3 {
            bytes.push((sextets[2] << 6) | sextets[3]);
        }
    }
    String::from_utf8(bytes).map_err(|e| format!("base64 payload is not UTF-8: {}", e))
}

#[cfg(feature = "server")]
mod guard {
    use super::{AuthConfig, IpFilter};
    use crate::reviewmind::event::{EventHandler, ServerEvent};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::Json;
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::Arc;

    /// Admission control shared by every served surface.
    ///
    /// Bundles the IP filter, the auth policy, and rejection reporting so the
    /// REST, A2A, and MCP routes all refuse requests the same way.
    pub struct SurfaceGuard {
        auth: AuthConfig,
        ip_filter: IpFilter,
        event_handler: Option<Arc<dyn EventHandler>>,
    }

    impl SurfaceGuard {
        pub fn new(
            auth: AuthConfig,
            ip_filter: IpFilter,
            event_handler: Option<Arc<dyn EventHandler>>,
        ) -> Self {
            Self {
                auth,
                ip_filter,
                event_handler,
            }
        }

        /// Forward an event to the configured handler, if any.
        pub async fn emit(&self, event: &ServerEvent) {
            if let Some(handler) = &self.event_handler {
                handler.on_server_event(event).await;
            }
        }

        /// Admit or refuse one request. On refusal, a
        /// [`ServerEvent::RequestRejected`] is emitted and the response to
        /// send back is returned.
        pub async fn admit(
            &self,
            addr: &SocketAddr,
            headers: &HeaderMap,
        ) -> Result<(), axum::response::Response> {
            if !self.ip_filter.is_allowed(addr.ip()) {
                self.emit(&ServerEvent::RequestRejected {
                    client_addr: addr.ip().to_string(),
                    reason: "IP not allowed".to_string(),
                })
                .await;
                return Err((
                    StatusCode::FORBIDDEN,
                    Json(json!({"error": "Access denied"})),
                )
                    .into_response());
            }

            let presented = headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("");
            if !self.auth.validate(presented) {
                self.emit(&ServerEvent::RequestRejected {
                    client_addr: addr.ip().to_string(),
                    reason: "Authorization failed".to_string(),
                })
                .await;
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "Unauthorized"})),
                )
                    .into_response());
            }

            Ok(())
        }
    }
}
