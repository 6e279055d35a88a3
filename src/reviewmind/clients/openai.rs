//! The `OpenAIClient` struct implements `ClientWrapper` for OpenAI's Chat API,
//! capturing both the assistant response and detailed token usage (input vs
//! output) for cost tracking.
//!
//! # Key Features
//!
//! - **send_message(...)**: returns the assistant's reply as a `Message`.
//! - **Automatic Usage Capture**: stores the latest `TokenUsage` internally.
//! - **Inspect Usage**: call `get_last_usage()` after `send_message()`.
//! - **Custom Endpoints**: `new_with_base_url` targets any OpenAI-compatible
//!   deployment (Azure-style gateways, self-hosted inference, proxies).
//!
//! # Example
//!
//! ```rust,no_run
//! use reviewmind::clients::openai::{Model, OpenAIClient};
//! use reviewmind::client_wrapper::{ClientWrapper, Message, Role};
//!
//! #[tokio::main]
//! async fn main() {
//!     let secret_key: String = std::env::var("OPEN_AI_SECRET").expect("OPEN_AI_SECRET not set");
//!     let client = OpenAIClient::new_with_model_enum(&secret_key, Model::GPT4oMini);
//!
//!     let resp = client
//!         .send_message(&[
//!             Message { role: Role::System, content: "You are an assistant.".into() },
//!             Message { role: Role::User, content: "Hello!".into() },
//!         ])
//!         .await
//!         .unwrap();
//!     println!("Assistant: {}", resp.content);
//!
//!     if let Some(usage) = client.get_last_usage().await {
//!         println!(
//!             "Tokens used: input {}, output {}, total {}",
//!             usage.input_tokens, usage.output_tokens, usage.total_tokens
//!         );
//!     }
//! }
//! ```

use async_trait::async_trait;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use tokio::sync::Mutex;

use crate::reviewmind::client_wrapper::{
    ClientWrapper, Message, MessageChunkStream, Role, SendError, TokenUsage,
};
use crate::reviewmind::clients::common::{
    get_shared_http_client, send_and_track, send_and_track_stream,
};

/// Model identifiers supported by OpenAI's Chat Completions API that the
/// platform deploys against.
#[allow(non_camel_case_types)]
pub enum Model {
    /// `gpt-5` – high reasoning, medium latency.
    GPT5,
    /// `gpt-5-mini` – fast GPT-5 variant with balanced cost and quality.
    GPT5Mini,
    /// `gpt-4o` – Omni model with text + image inputs.
    GPT4o,
    /// `gpt-4o-mini` – cost effective GPT-4o derivative; the default for
    /// review analysis.
    GPT4oMini,
    /// `gpt-4.1` – general availability GPT-4.1.
    GPT41,
    /// `gpt-4.1-mini` – reduced cost GPT-4.1 tier.
    GPT41Mini,
    /// `gpt-4.1-nano` – ultra low cost GPT-4.1 derivative.
    GPT41Nano,
}

/// Convert a [`Model`] variant into the string identifier expected by the REST API.
pub fn model_to_string(model: Model) -> String {
    match model {
        Model::GPT5 => "gpt-5".to_string(),
        Model::GPT5Mini => "gpt-5-mini".to_string(),
        Model::GPT4o => "gpt-4o".to_string(),
        Model::GPT4oMini => "gpt-4o-mini".to_string(),
        Model::GPT41 => "gpt-4.1".to_string(),
        Model::GPT41Mini => "gpt-4.1-mini".to_string(),
        Model::GPT41Nano => "gpt-4.1-nano".to_string(),
    }
}

/// Client wrapper for OpenAI's Chat Completions API.
///
/// The wrapper maintains the selected model identifier plus an internal
/// [`TokenUsage`] slot so callers can inspect how many tokens each request
/// consumed. It reuses the shared HTTP client configured in
/// [`crate::reviewmind::clients::common`].
pub struct OpenAIClient {
    /// Underlying SDK client pointing at the REST endpoint.
    client: openai_rust::Client,
    /// Model name that will be injected into each request.
    model: String,
    /// Storage for the token usage returned by the most recent request.
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    /// Construct a new client using the provided API key and [`Model`] variant.
    pub fn new_with_model_enum(secret_key: &str, model: Model) -> Self {
        Self::new_with_model_string(secret_key, &model_to_string(model))
    }

    /// Construct a new client using the provided API key and explicit model name.
    ///
    /// This is the most general constructor and can be used for unofficial
    /// model identifiers (e.g. OpenAI-compatible self-hosted deployments).
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new_with_client(
                secret_key,
                get_shared_http_client().clone(),
            ),
            model: model_name.to_string(),
            token_usage: Mutex::new(None),
        }
    }

    /// Construct a client targeting a custom OpenAI-compatible base URL.
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new_with_client_and_base_url(
                secret_key,
                get_shared_http_client().clone(),
                base_url,
            ),
            model: model_name.to_string(),
            token_usage: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(&self, messages: &[Message]) -> Result<Message, SendError> {
        // Convert the provided messages into the format expected by openai_rust
        let mut formatted_messages = Vec::with_capacity(messages.len());
        for msg in messages {
            formatted_messages.push(chat::Message {
                role: match msg.role {
                    Role::System => "system".to_owned(),
                    Role::User => "user".to_owned(),
                    Role::Assistant => "assistant".to_owned(),
                },
                content: msg.content.to_string(),
            });
        }

        let url_path_string = "/v1/chat/completions".to_string();

        let content = send_and_track(
            &self.client,
            &self.model,
            formatted_messages,
            Some(url_path_string),
            &self.token_usage,
        )
        .await?;

        Ok(Message {
            role: Role::Assistant,
            content: content.into(),
        })
    }

    async fn send_message_stream(
        &self,
        messages: &[Message],
    ) -> Result<MessageChunkStream, SendError> {
        let mut formatted_messages = Vec::with_capacity(messages.len());
        for msg in messages {
            formatted_messages.push(chat::Message {
                role: match msg.role {
                    Role::System => "system".to_owned(),
                    Role::User => "user".to_owned(),
                    Role::Assistant => "assistant".to_owned(),
                },
                content: msg.content.to_string(),
            });
        }

        let url_path_string = "/v1/chat/completions".to_string();

        send_and_track_stream(
            &self.client,
            &self.model,
            formatted_messages,
            Some(url_path_string),
        )
        .await
    }

    async fn get_last_usage(&self) -> Option<TokenUsage> {
        self.token_usage.lock().await.clone()
    }
}
