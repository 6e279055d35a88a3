//! The `llm_session` module manages a conversational session with an LLM,
//! handling not just message history and context pruning, but also
//! real token accounting (input vs. output) for cost estimates.
//!
//! **Key features:**
//! - **Automatic context trimming**: never exceed your `max_tokens` window.
//! - **Token tracking**: accumulates `input_tokens` & `output_tokens` per call.
//! - **Hub injection**: `inject_message` adds context without an LLM round-trip,
//!   which is how orchestration routes other agents' responses into a session.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reviewmind::client_wrapper::Role;
//! use reviewmind::clients::openai::{Model, OpenAIClient};
//! use reviewmind::LLMSession;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let client = OpenAIClient::new_with_model_enum("YOUR_OPENAI_KEY", Model::GPT4oMini);
//! let mut session = LLMSession::new(
//!     Arc::new(client),
//!     "You are a bilingual product-review analyst.".into(),
//!     8_192, // max context window
//! );
//!
//! let reply = session.send_message(Role::User, "Hola, ¿cómo estás?".into()).await?;
//! println!("Assistant: {}", reply.content);
//!
//! let usage = session.token_usage();
//! println!(
//!     "Input: {} tokens, Output: {} tokens, Total: {} tokens",
//!     usage.input_tokens, usage.output_tokens, usage.total_tokens
//! );
//! # Ok(())
//! # }
//! ```
//!
//! The session automatically prunes oldest messages when cumulative tokens
//! exceed the configured window.

use crate::reviewmind::client_wrapper::{
    ClientWrapper, Message, Role, SendError, TokenUsage,
};
use std::sync::Arc;

/// A conversation session with an LLM:
///
/// - `client`: your `ClientWrapper` (e.g. `OpenAIClient`).
/// - `system_prompt`: the context-steering system message.
/// - `conversation_history`: all user & assistant messages (excluding system prompt).
/// - `max_tokens`: your configured context window size.
pub struct LLMSession {
    client: Arc<dyn ClientWrapper>,
    system_prompt: Message,
    conversation_history: Vec<Message>,
    max_tokens: usize,
    total_input_tokens: usize,
    total_output_tokens: usize,
    total_token_count: usize,
}

impl LLMSession {
    /// Creates a new `LLMSession` with the given client and system prompt.
    pub fn new(client: Arc<dyn ClientWrapper>, system_prompt: String, max_tokens: usize) -> Self {
        let system_prompt_message = Message {
            role: Role::System,
            content: system_prompt.into(),
        };
        LLMSession {
            client,
            system_prompt: system_prompt_message,
            conversation_history: Vec::new(),
            max_tokens,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_token_count: 0,
        }
    }

    /// Sends a user/system message, receives the assistant's reply, and
    /// automatically:
    /// 1. Adds the message to history and pins the system prompt at index 0
    /// 2. Calls into your client's `send_message(...)`
    /// 3. Pulls real token usage via `client.get_last_usage()`
    /// 4. Updates the cumulative token totals
    /// 5. Prunes oldest messages if the total exceeds `max_tokens`
    ///
    /// Returns the assistant's `Message`; call `session.token_usage()` to see
    /// your cumulative usage.
    pub async fn send_message(&mut self, role: Role, content: String) -> Result<Message, SendError> {
        let message = Message {
            role,
            content: content.into(),
        };

        // Add the new message to the conversation history
        self.conversation_history.push(message);

        // Temporarily add the system prompt to the start of the conversation history
        self.conversation_history
            .insert(0, self.system_prompt.clone());

        let response = self.client.send_message(&self.conversation_history).await;

        // Remove the system prompt again whether the call succeeded or not
        self.conversation_history.remove(0);

        let response = response?;

        if let Some(usage) = self.client.get_last_usage().await {
            self.total_input_tokens += usage.input_tokens;
            self.total_output_tokens += usage.output_tokens;
            self.total_token_count = self.total_input_tokens + self.total_output_tokens;

            // Trim oldest messages until we're back under the window
            if usage.total_tokens > self.max_tokens {
                let mut excess = usage.total_tokens - self.max_tokens;
                while excess > 0 && !self.conversation_history.is_empty() {
                    let msg = self.conversation_history.remove(0);
                    let removed = estimate_message_token_count(&msg);
                    excess = excess.saturating_sub(removed);
                }
            }
        }

        // Add the LLM's response to the conversation history
        self.conversation_history.push(response.clone());

        Ok(response)
    }

    /// Sets a new system prompt for the session.
    pub fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = Message {
            role: Role::System,
            content: prompt.into(),
        };
    }

    /// The current system prompt text.
    pub fn system_prompt_text(&self) -> &str {
        &self.system_prompt.content
    }

    /// Append a message to the history without calling the LLM.
    ///
    /// Used by orchestration hub-routing to feed other agents' responses into
    /// this session before the next `send_message` call.
    pub fn inject_message(&mut self, role: Role, content: String) {
        self.conversation_history.push(Message {
            role,
            content: content.into(),
        });
    }

    /// Borrow the accumulated conversation history (system prompt excluded).
    pub fn get_conversation_history(&self) -> &[Message] {
        &self.conversation_history
    }

    /// Drop all accumulated history, keeping the system prompt and client.
    pub fn clear_history(&mut self) {
        self.conversation_history.clear();
    }

    /// Returns the cumulative token usage statistics for this session.
    pub fn token_usage(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.total_input_tokens,
            output_tokens: self.total_output_tokens,
            total_tokens: self.total_token_count,
        }
    }

    /// The configured context window size.
    pub fn get_max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Borrow the underlying client.
    pub fn client(&self) -> &Arc<dyn ClientWrapper> {
        &self.client
    }
}

/// Estimates the number of tokens in a string.
/// Uses an approximate formula: one token per 4 characters.
fn estimate_token_count(text: &str) -> usize {
    (text.len() / 4).max(1)
}

/// Estimates the number of tokens in a Message, including role annotations.
fn estimate_message_token_count(message: &Message) -> usize {
    // The role itself costs roughly one token
    let role_token_count = 1;
    let content_token_count = estimate_token_count(&message.content);
    role_token_count + content_token_count
}
