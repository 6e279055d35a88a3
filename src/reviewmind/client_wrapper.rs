use async_trait::async_trait;
use futures_util::Stream;
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;

/// A ClientWrapper is a wrapper around a specific LLM chat-completion service.
/// It provides a common interface to interact with the model. It does not keep
/// track of the conversation; for that we use an [`LLMSession`](crate::LLMSession),
/// which maintains the history and uses a ClientWrapper to talk to the model.

/// Represents the possible roles for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Set by the developer to steer the model's responses.
    System,
    /// A message sent by a human user (or app user).
    User,
    /// Content the model generated in response to a user message.
    Assistant,
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// Represents a generic message to be sent to an LLM.
#[derive(Clone, Debug)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message. `Arc<str>` keeps clones cheap when
    /// the same content is routed into several agent sessions.
    pub content: Arc<str>,
}

/// Represents a chunk of a streaming message response.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    /// The incremental content in this chunk.
    pub content: String,
    /// Whether this is the final chunk in the stream.
    pub is_final: bool,
}

/// Type alias for a Send-able error box.
pub type SendError = Box<dyn Error + Send + Sync>;

/// Type alias for the chunk stream returned by streaming-capable clients.
/// The stream is not guaranteed to be `Send` and must be consumed in the task
/// that created it.
pub type MessageChunkStream = Pin<Box<dyn Stream<Item = Result<MessageChunk, SendError>>>>;

/// Trait defining the interface to interact with an LLM chat-completion service.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// The model identifier requests are routed to (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str {
        "unknown"
    }

    /// Send the given messages to the LLM and return the assistant's reply.
    async fn send_message(&self, messages: &[Message]) -> Result<Message, SendError>;

    /// Send the given messages and get a streaming response.
    ///
    /// Returns a stream of [`MessageChunk`] items so tokens can be processed as
    /// they arrive. The default implementation returns an error; clients that
    /// support streaming should override it.
    async fn send_message_stream(
        &self,
        _messages: &[Message],
    ) -> Result<MessageChunkStream, SendError> {
        Err("Streaming not supported by this client".into())
    }

    /// Usage reported by the *last* `send_message()` call, if the provider
    /// returned any. The default implementation returns `None` so wrappers
    /// without usage accounting don't have to care.
    async fn get_last_usage(&self) -> Option<TokenUsage> {
        None
    }
}
