//! Configuration for ReviewMind.
//!
//! Provides the [`ReviewMindConfig`] struct consumed by the analysis service
//! and the server binary. Users construct it manually or from environment
//! variables; no config-file parsing dependencies are introduced.
//!
//! # Example
//!
//! ```rust
//! use reviewmind::ReviewMindConfig;
//! use std::time::Duration;
//!
//! // Use the defaults (gpt-4o-mini, 60 s run deadline, 20-turn cap)
//! let config = ReviewMindConfig::default();
//! assert_eq!(config.run_timeout, Duration::from_secs(60));
//!
//! // Or override selectively
//! let config = ReviewMindConfig {
//!     model: "gpt-4o".into(),
//!     ..ReviewMindConfig::default()
//! };
//! ```

use crate::reviewmind::chat_manager::MAX_INVOCATIONS;
use std::time::Duration;

/// Runtime configuration for the review-analysis service.
///
/// The LLM API key is deliberately not part of this struct; it is read from
/// `OPEN_AI_SECRET` at the point where the client is constructed, so the
/// config can be logged and cloned freely.
#[derive(Debug, Clone)]
pub struct ReviewMindConfig {
    /// Model identifier passed to the LLM client (e.g. `"gpt-4o-mini"`).
    pub model: String,

    /// Base URL of an OpenAI-compatible endpoint, or `None` for the default
    /// OpenAI API.
    pub api_base_url: Option<String>,

    /// Wall-clock deadline for one orchestration run. The service enforces
    /// it both through the run context's turn-boundary checks and with an
    /// outer `tokio::time::timeout`.
    pub run_timeout: Duration,

    /// Hard cap on agent turns per run.
    pub max_invocations: usize,

    /// Token budget handed to each agent's session for context trimming.
    pub max_tokens: usize,
}

impl Default for ReviewMindConfig {
    /// The platform defaults: `gpt-4o-mini`, the public OpenAI endpoint, a
    /// 60-second run deadline, the 20-turn cap, and a 128k token budget.
    fn default() -> Self {
        Self {
            model: String::from("gpt-4o-mini"),
            api_base_url: None,
            run_timeout: Duration::from_secs(60),
            max_invocations: MAX_INVOCATIONS,
            max_tokens: 128_000,
        }
    }
}

impl ReviewMindConfig {
    /// Build a config from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `REVIEWMIND_MODEL` | `model` |
    /// | `REVIEWMIND_API_BASE` | `api_base_url` |
    /// | `REVIEWMIND_RUN_TIMEOUT_SECS` | `run_timeout` |
    /// | `REVIEWMIND_MAX_INVOCATIONS` | `max_invocations` |
    /// | `REVIEWMIND_MAX_TOKENS` | `max_tokens` |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("REVIEWMIND_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }
        if let Ok(base) = std::env::var("REVIEWMIND_API_BASE") {
            if !base.is_empty() {
                config.api_base_url = Some(base);
            }
        }
        if let Some(secs) = read_env_number("REVIEWMIND_RUN_TIMEOUT_SECS") {
            config.run_timeout = Duration::from_secs(secs as u64);
        }
        if let Some(cap) = read_env_number("REVIEWMIND_MAX_INVOCATIONS") {
            config.max_invocations = cap;
        }
        if let Some(budget) = read_env_number("REVIEWMIND_MAX_TOKENS") {
            config.max_tokens = budget;
        }

        config
    }
}

fn read_env_number(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_settings() {
        let config = ReviewMindConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.api_base_url.is_none());
        assert_eq!(config.run_timeout, Duration::from_secs(60));
        assert_eq!(config.max_invocations, MAX_INVOCATIONS);
        assert_eq!(config.max_tokens, 128_000);
    }

    #[test]
    fn from_env_overrides_and_ignores_garbage() {
        std::env::set_var("REVIEWMIND_MODEL", "gpt-4o");
        std::env::set_var("REVIEWMIND_RUN_TIMEOUT_SECS", "90");
        std::env::set_var("REVIEWMIND_MAX_INVOCATIONS", "not-a-number");

        let config = ReviewMindConfig::from_env();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.run_timeout, Duration::from_secs(90));
        assert_eq!(config.max_invocations, MAX_INVOCATIONS);

        std::env::remove_var("REVIEWMIND_MODEL");
        std::env::remove_var("REVIEWMIND_RUN_TIMEOUT_SECS");
        std::env::remove_var("REVIEWMIND_MAX_INVOCATIONS");
    }
}
