//! Shared plumbing for chat-completion clients: a pooled HTTP client and the
//! send/track helpers that capture token usage.

use crate::reviewmind::client_wrapper::{MessageChunk, MessageChunkStream, SendError, TokenUsage};
use futures_util::StreamExt;
use lazy_static::lazy_static;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use std::time::Duration;
use tokio::sync::Mutex;

lazy_static! {
    /// One `reqwest::Client` shared by every wrapper so TCP/TLS connections are
    /// reused across requests instead of being re-established per call.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .build()
        .expect("Failed to build HTTP client");
}

/// Borrow the process-wide HTTP client used by all chat-completion wrappers.
pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

/// Send a chat request, record its usage in `usage_slot`, and return the
/// assistant's content.
pub async fn send_and_track(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    usage_slot: &Mutex<Option<TokenUsage>>,
) -> Result<String, SendError> {
    let chat_arguments = chat::ChatArguments::new(model, formatted_msgs);

    let response = api.create_chat(chat_arguments, url_path).await;

    match response {
        Ok(response) => {
            let usage = TokenUsage {
                input_tokens: response.usage.prompt_tokens as usize,
                output_tokens: response.usage.completion_tokens as usize,
                total_tokens: response.usage.total_tokens as usize,
            };

            // Store it for get_last_usage()
            *usage_slot.lock().await = Some(usage);

            Ok(response.choices[0].message.content.clone())
        }
        Err(err) => {
            log::error!(
                "reviewmind::clients::common::send_and_track(...): chat API error: {}",
                err
            );
            Err(format!("chat API error: {}", err).into())
        }
    }
}

/// Send a streaming chat request and return a stream of message chunks.
/// Token usage tracking is not available for streaming responses.
pub async fn send_and_track_stream(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
) -> Result<MessageChunkStream, SendError> {
    let chat_arguments = chat::ChatArguments::new(model, formatted_msgs);

    let chunk_stream = api
        .create_chat_stream(chat_arguments, url_path)
        .await
        .map_err(|err| -> SendError { format!("chat API error: {}", err).into() })?;

    let message_stream = chunk_stream.map(|chunk_result| match chunk_result {
        Ok(chunk) => {
            let content = chunk.choices[0].delta.content.clone().unwrap_or_default();
            let is_final = chunk.choices[0].finish_reason.is_some();

            Ok(MessageChunk { content, is_final })
        }
        Err(err) => Err(format!("Stream error: {}", err).into()),
    });

    Ok(Box::pin(message_stream))
}
