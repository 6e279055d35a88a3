//! Agent System
//!
//! This module provides the core [`Agent`] struct that represents an LLM-powered agent
//! with identity, expertise, personality, optional tool access, and real-time event
//! observability.
//!
//! Agents are the building blocks of the review analysis pipeline and can be used:
//! - Standalone for single-agent interactions (the A2A summarize/sentiment endpoints)
//! - In orchestrations for the multi-agent analysis topologies
//!
//! # Core Components
//!
//! - **Agent**: Represents an LLM agent with identity and capabilities
//! - **LLMSession**: Each agent wraps its own session with rolling history and token tracking
//! - **Tool Access**: Agents can be granted access to local or remote tools via [`ToolRegistry`](crate::tool_protocol::ToolRegistry)
//! - **EventHandler**: Optional callback for real-time observability of LLM calls, tool usage, and lifecycle events
//! - **Expertise & Personality**: Optional attributes for behavior customization
//! - **Metadata**: Arbitrary key-value pairs for domain-specific extensions (agent card fields live here)
//!
//! # Event System
//!
//! Agents emit [`AgentEvent`](crate::event::AgentEvent)s during their lifecycle. Attach
//! an [`EventHandler`](crate::event::EventHandler) via [`with_event_handler`](Agent::with_event_handler)
//! or [`set_event_handler`](Agent::set_event_handler) to receive real-time notifications
//! about LLM round-trips, tool calls, and session changes. See the
//! [`event`](crate::event) module for the full list of events and examples.
//!
//! # Example
//!
//! ```rust,no_run
//! use reviewmind::Agent;
//! use reviewmind::clients::openai::OpenAIClient;
//! use std::sync::Arc;
//!
//! # async {
//! let agent = Agent::new(
//!     "sentiment-analyst",
//!     "Sentiment Analyst",
//!     Arc::new(OpenAIClient::new_with_model_string("key", "gpt-4o-mini"))
//! )
//! .with_expertise("Customer sentiment and emotional tone analysis")
//! .with_personality("Measured and evidence-driven");
//!
//! // Use agent in your application...
//! # };
//! ```

use crate::reviewmind::client_wrapper::{ClientWrapper, Role, TokenUsage};
use crate::reviewmind::event::{AgentEvent, EventHandler};
use crate::reviewmind::llm_session::LLMSession;
use crate::reviewmind::tool_protocol::ToolRegistry;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Internal representation of a parsed tool call extracted from an LLM response.
///
/// The agent's `parse_tool_call()` method scans LLM output for JSON fragments
/// matching `{"tool_call": {"name": "...", "parameters": {...}}}` and returns
/// this struct. The `name` is used to route the call through the
/// [`ToolRegistry`](crate::tool_protocol::ToolRegistry), and `parameters` is
/// the raw JSON payload forwarded to the tool protocol's `execute()` method.
#[derive(Debug, Clone)]
struct ToolCall {
    /// Name of the tool to execute (e.g. `"get_product_reviews"`).
    name: String,
    /// Raw JSON parameters extracted from the LLM's tool call request.
    parameters: serde_json::Value,
}

/// Response body returned after asking an agent to generate content.
///
/// Wraps both the final text output and optional token-usage accounting.
/// When the agent makes multiple tool calls during a single generation
/// cycle, the `tokens_used` field aggregates usage across all LLM
/// round-trips.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Final message content produced across tool iterations.
    pub content: String,
    /// Optional token usage aggregated across all tool iterations.
    pub tokens_used: Option<TokenUsage>,
}

/// Represents an agent with identity, expertise, optional tool access, and
/// event observability.
///
/// Agents are LLM-powered entities that can:
/// - Generate responses based on system prompts and user messages
/// - Access tools through a [`ToolRegistry`] (single or multi-protocol)
/// - Maintain per-agent conversation memory via [`LLMSession`]
/// - Emit [`AgentEvent`]s for real-time observability of LLM calls and tool usage
/// - Be orchestrated by [`Orchestration`](crate::orchestration::Orchestration) or used independently
pub struct Agent {
    /// Stable identifier referenced inside orchestration coordination.
    pub id: String,
    /// Human-readable display name for logging and UI surfaces.
    pub name: String,
    /// Free-form description of the agent's strengths that will be embedded into prompts.
    pub expertise: Option<String>,
    /// Persona hints that help diversify the tone of generated responses.
    pub personality: Option<String>,
    /// Arbitrary metadata associated with the agent (e.g. agent-card description, skills).
    pub metadata: HashMap<String, String>,

    session: LLMSession,

    /// Shared behind a lock so a team of agents can see one tool set.
    tool_registry: Arc<RwLock<ToolRegistry>>,

    /// Optional event handler for real-time observability. When set, the agent
    /// emits [`AgentEvent`]s during `send()`, `fork()`, `set_system_prompt()`,
    /// and `receive_message()`.
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl Agent {
    /// Create a new agent with the mandatory identity information.
    ///
    /// Internally creates an [`LLMSession`] with the provided client, an empty
    /// system prompt, and a 128k token budget. Tools default to an empty
    /// [`ToolRegistry`].
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        client: Arc<dyn ClientWrapper>,
    ) -> Self {
        let session = LLMSession::new(client, String::new(), 128_000);
        Self {
            id: id.into(),
            name: name.into(),
            expertise: None,
            personality: None,
            metadata: HashMap::new(),
            session,
            tool_registry: Arc::new(RwLock::new(ToolRegistry::empty())),
            event_handler: None,
        }
    }

    /// Attach a brief description of the agent's domain expertise.
    pub fn with_expertise(mut self, expertise: impl Into<String>) -> Self {
        self.expertise = Some(expertise.into());
        self
    }

    /// Attach a personality descriptor used to diversify prompts.
    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = Some(personality.into());
        self
    }

    /// Add arbitrary metadata to the agent definition.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Override the default token budget (builder pattern).
    ///
    /// Recreates the internal [`LLMSession`] with the new budget while keeping
    /// the same client.  History is reset (the session starts empty).
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        let client = self.session.client().clone();
        self.session = LLMSession::new(client, String::new(), max_tokens);
        self
    }

    /// Grant the agent access to a registry of tools.
    ///
    /// Takes ownership of the registry and wraps it in `Arc<RwLock<_>>`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut registry = ToolRegistry::empty();
    /// registry.add_protocol("catalog", Arc::new(catalog_protocol)).await?;
    /// agent.with_tools(registry);
    /// ```
    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.tool_registry = Arc::new(RwLock::new(registry));
        self
    }

    /// Share a mutable tool registry across multiple agents.
    ///
    /// Mutations to the registry are visible to all agents holding it. Use
    /// this when agents in an orchestration need to see the same tool set.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use reviewmind::Agent;
    /// use reviewmind::tool_protocol::ToolRegistry;
    /// use reviewmind::clients::openai::OpenAIClient;
    /// use std::sync::Arc;
    /// use tokio::sync::RwLock;
    ///
    /// let shared = Arc::new(RwLock::new(ToolRegistry::empty()));
    ///
    /// let client = Arc::new(OpenAIClient::new_with_model_string("key", "gpt-4o-mini"));
    /// let collector = Agent::new("collector", "Review Data Collector", client.clone())
    ///     .with_shared_tools(shared.clone());
    /// let analyst = Agent::new("analyst", "Sentiment Analyst", client)
    ///     .with_shared_tools(shared.clone());
    /// ```
    pub fn with_shared_tools(mut self, registry: Arc<RwLock<ToolRegistry>>) -> Self {
        self.tool_registry = registry;
        self
    }

    /// Attach an [`EventHandler`] that will receive lifecycle events (builder pattern).
    ///
    /// The handler receives [`AgentEvent`]s for LLM calls, tool usage, fork
    /// operations, and session changes. When this agent is added to an
    /// [`Orchestration`](crate::orchestration::Orchestration) via `add_agent()`,
    /// the orchestration's handler (if any) will override this one.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set or replace the event handler at runtime.
    ///
    /// Unlike [`with_event_handler`](Agent::with_event_handler) (which consumes `self`
    /// in the builder chain), this takes `&mut self` so the handler can be attached
    /// to a live agent. Used internally by [`Orchestration::add_agent`](crate::orchestration::Orchestration::add_agent)
    /// to propagate the orchestration's handler to each agent.
    pub fn set_event_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.event_handler = Some(handler);
    }

    /// Emit an [`AgentEvent`] to the registered handler (async context).
    ///
    /// If no handler is registered, this is a no-op.
    async fn emit(&self, event: AgentEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_agent_event(&event).await;
        }
    }

    /// Emit an [`AgentEvent`] from a non-async (synchronous) context.
    ///
    /// Spawns a detached tokio task to call the async handler. Used by
    /// synchronous methods like `fork()`, `set_system_prompt()`, and
    /// `receive_message()` that cannot `.await`. The event delivery is
    /// fire-and-forget.
    fn emit_sync(&self, event: AgentEvent) {
        if let Some(handler) = &self.event_handler {
            let handler = Arc::clone(handler);
            tokio::spawn(async move {
                handler.on_agent_event(&event).await;
            });
        }
    }

    /// List all tool names currently available to this agent.
    pub async fn list_tools(&self) -> Vec<String> {
        let registry = self.tool_registry.read().await;
        registry
            .list_tools()
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }

    // ---- fork(): replaces Clone for per-run isolation ----

    /// Create a lightweight copy for an isolated run.
    ///
    /// The fork shares the same tool registry and event handler (via `Arc`)
    /// but has a **fresh, empty** [`LLMSession`] backed by the same client.
    /// Identity fields (`id`, `name`, `expertise`, `personality`, `metadata`)
    /// are cloned.
    ///
    /// The analysis service forks its agent team for every request so no
    /// conversation state leaks between concurrent or successive runs. This
    /// replaces `Clone`; `Agent` is intentionally not `Clone` because cloning
    /// a session would silently carry one run's context into the next.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use reviewmind::Agent;
    /// use reviewmind::clients::openai::OpenAIClient;
    /// use std::sync::Arc;
    ///
    /// let agent = Agent::new(
    ///     "sentiment-analyst", "Sentiment Analyst",
    ///     Arc::new(OpenAIClient::new_with_model_string("key", "gpt-4o-mini")),
    /// ).with_expertise("Customer sentiment analysis");
    ///
    /// // Fork for an isolated run; identity is preserved
    /// let forked = agent.fork();
    /// assert_eq!(forked.id, agent.id);
    /// assert_eq!(forked.expertise, agent.expertise);
    /// ```
    pub fn fork(&self) -> Self {
        let client = self.session.client().clone();
        let max_tokens = self.session.get_max_tokens();
        self.emit_sync(AgentEvent::Forked {
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
        });
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            expertise: self.expertise.clone(),
            personality: self.personality.clone(),
            metadata: self.metadata.clone(),
            session: LLMSession::new(client, String::new(), max_tokens),
            tool_registry: Arc::clone(&self.tool_registry),
            event_handler: self.event_handler.clone(),
        }
    }

    // ---- Session-based methods for hub-routed orchestration ----

    /// Set the agent's LLMSession system prompt, augmented with expertise and personality.
    ///
    /// Called by orchestration modes during setup so each agent has its system
    /// prompt configured once before generation begins.
    pub fn set_system_prompt(&mut self, base_prompt: &str) {
        let augmented = self.augment_system_prompt(base_prompt);
        self.session.set_system_prompt(augmented);
        self.emit_sync(AgentEvent::SystemPromptSet {
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
        });
    }

    /// Inject a message into this agent's session history without sending to the LLM.
    ///
    /// Used by orchestration hub-routing to feed specific messages (e.g., other
    /// agents' responses) into this agent's context before calling [`send`](Agent::send).
    pub fn receive_message(&mut self, role: Role, content: String) {
        self.session.inject_message(role, content);
        self.emit_sync(AgentEvent::MessageReceived {
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
        });
    }

    /// Return the number of messages in this agent's session history.
    ///
    /// Useful for orchestration to check whether the agent has been initialized.
    pub fn session_history_len(&self) -> usize {
        self.session.get_conversation_history().len()
    }

    /// Send a message using the agent's own session history.
    ///
    /// This is the primary method used by orchestration modes. The session
    /// handles system prompt, history, and auto-trimming automatically;
    /// context accumulates via [`receive_message`](Agent::receive_message)
    /// and prior `send` calls.
    ///
    /// # Tool Loop
    ///
    /// After the initial LLM call, the method checks whether the response
    /// contains a tool call (`{"tool_call": {"name": "...", "parameters": {...}}}`).
    /// If so, the tool is executed via the [`ToolRegistry`], the result is
    /// fed back into the session as a follow-up message, and the LLM is
    /// called again. This loop runs for up to 5 iterations.
    ///
    /// # Events Emitted
    ///
    /// The following [`AgentEvent`]s are emitted during `send()` (in order):
    /// 1. [`SendStarted`](AgentEvent::SendStarted) at entry
    /// 2. [`LLMCallStarted`](AgentEvent::LLMCallStarted) before each LLM call
    /// 3. [`LLMCallCompleted`](AgentEvent::LLMCallCompleted) after each LLM call
    /// 4. [`ToolCallDetected`](AgentEvent::ToolCallDetected) when a tool call is parsed
    /// 5. [`ToolExecutionCompleted`](AgentEvent::ToolExecutionCompleted) after tool execution
    /// 6. [`ToolMaxIterationsReached`](AgentEvent::ToolMaxIterationsReached) if the loop cap is hit
    /// 7. [`SendCompleted`](AgentEvent::SendCompleted) at exit
    pub async fn send(
        &mut self,
        user_message: &str,
    ) -> Result<AgentResponse, Box<dyn Error + Send + Sync>> {
        let preview_len = 120.min(user_message.len());
        let preview_end = user_message
            .char_indices()
            .nth(preview_len)
            .map(|(i, _)| i)
            .unwrap_or(user_message.len());
        let message_preview = user_message[..preview_end].to_string();
        self.emit(AgentEvent::SendStarted {
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
            message_preview,
        })
        .await;

        // Build tool description string to append to user message
        let mut message_with_tools = user_message.to_string();
        {
            let registry = self.tool_registry.read().await;
            let tools = registry.list_tools();
            if !tools.is_empty() {
                message_with_tools.push_str("\n\nYou have access to the following tools:\n");
                for tool_metadata in tools {
                    message_with_tools.push_str(&format!(
                        "- {}: {}\n",
                        tool_metadata.name, tool_metadata.description
                    ));
                    if !tool_metadata.parameters.is_empty() {
                        message_with_tools.push_str("  Parameters:\n");
                        for param in &tool_metadata.parameters {
                            message_with_tools.push_str(&format!(
                                "    - {} ({:?}): {}\n",
                                param.name,
                                param.param_type,
                                param.description.as_deref().unwrap_or("No description")
                            ));
                        }
                    }
                }
                message_with_tools.push_str(
                    "\nTo use a tool, respond with a JSON object in the following format:\n\
                     {\"tool_call\": {\"name\": \"tool_name\", \"parameters\": {...}}}\n\
                     After tool execution, I'll provide the result and you can continue.\n",
                );
            }
        }

        // Tool execution loop
        let max_tool_iterations = 5;
        let mut tool_iteration = 0;
        let mut total_input_tokens = 0;
        let mut total_output_tokens = 0;
        let mut total_tokens = 0;

        // First call uses the user message
        self.emit(AgentEvent::LLMCallStarted {
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
            iteration: 1,
        })
        .await;

        let response = self
            .session
            .send_message(Role::User, message_with_tools)
            .await
            .map_err(|e| {
                Box::new(crate::orchestration::OrchestrationError::ExecutionFailed(
                    e.to_string(),
                )) as Box<dyn Error + Send + Sync>
            })?;

        if let Some(usage) = self.session.client().get_last_usage().await {
            total_input_tokens += usage.input_tokens;
            total_output_tokens += usage.output_tokens;
            total_tokens += usage.total_tokens;
        }

        let first_response_length = response.content.len();
        self.emit(AgentEvent::LLMCallCompleted {
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
            iteration: 1,
            tokens_used: if total_tokens > 0 {
                Some(TokenUsage {
                    input_tokens: total_input_tokens,
                    output_tokens: total_output_tokens,
                    total_tokens,
                })
            } else {
                None
            },
            response_length: first_response_length,
        })
        .await;

        let mut current_response = response.content.to_string();

        loop {
            let tool_call = self.parse_tool_call(&current_response);
            if let Some(tool_call) = tool_call {
                if tool_iteration >= max_tool_iterations {
                    self.emit(AgentEvent::ToolMaxIterationsReached {
                        agent_id: self.id.clone(),
                        agent_name: self.name.clone(),
                    })
                    .await;
                    current_response = format!(
                        "{}\n\n[Warning: Maximum tool iterations reached]",
                        current_response
                    );
                    break;
                }
                tool_iteration += 1;

                let tool_params_snapshot = tool_call.parameters.clone();

                self.emit(AgentEvent::ToolCallDetected {
                    agent_id: self.id.clone(),
                    agent_name: self.name.clone(),
                    tool_name: tool_call.name.clone(),
                    parameters: tool_params_snapshot.clone(),
                    iteration: tool_iteration,
                })
                .await;

                // Execute the tool
                let tool_result = {
                    let registry = self.tool_registry.read().await;
                    registry
                        .execute_tool(&tool_call.name, tool_call.parameters)
                        .await
                };

                let (tool_result_message, tool_success, tool_error, tool_output) =
                    match &tool_result {
                        Ok(result) => {
                            if result.success {
                                (
                                    format!(
                                        "Tool '{}' executed successfully. Result: {}",
                                        tool_call.name,
                                        serde_json::to_string_pretty(&result.output)
                                            .unwrap_or_else(|_| format!("{:?}", result.output))
                                    ),
                                    true,
                                    None,
                                    Some(result.output.clone()),
                                )
                            } else {
                                let err = result
                                    .error
                                    .clone()
                                    .unwrap_or_else(|| "Unknown error".to_string());
                                (
                                    format!("Tool '{}' failed. Error: {}", tool_call.name, err),
                                    false,
                                    Some(err),
                                    None,
                                )
                            }
                        }
                        Err(e) => (
                            format!("Tool execution error: {}", e),
                            false,
                            Some(e.to_string()),
                            None,
                        ),
                    };

                self.emit(AgentEvent::ToolExecutionCompleted {
                    agent_id: self.id.clone(),
                    agent_name: self.name.clone(),
                    tool_name: tool_call.name.clone(),
                    parameters: tool_params_snapshot,
                    success: tool_success,
                    error: tool_error,
                    result: tool_output,
                    iteration: tool_iteration,
                })
                .await;

                // Send tool result back through session
                let next_iteration = tool_iteration + 1;
                self.emit(AgentEvent::LLMCallStarted {
                    agent_id: self.id.clone(),
                    agent_name: self.name.clone(),
                    iteration: next_iteration,
                })
                .await;

                let follow_up = self
                    .session
                    .send_message(Role::User, tool_result_message)
                    .await
                    .map_err(|e| {
                        Box::new(crate::orchestration::OrchestrationError::ExecutionFailed(
                            e.to_string(),
                        )) as Box<dyn Error + Send + Sync>
                    })?;

                if let Some(usage) = self.session.client().get_last_usage().await {
                    total_input_tokens += usage.input_tokens;
                    total_output_tokens += usage.output_tokens;
                    total_tokens += usage.total_tokens;
                }

                let follow_up_response_length = follow_up.content.len();
                self.emit(AgentEvent::LLMCallCompleted {
                    agent_id: self.id.clone(),
                    agent_name: self.name.clone(),
                    iteration: next_iteration,
                    tokens_used: if total_tokens > 0 {
                        Some(TokenUsage {
                            input_tokens: total_input_tokens,
                            output_tokens: total_output_tokens,
                            total_tokens,
                        })
                    } else {
                        None
                    },
                    response_length: follow_up_response_length,
                })
                .await;

                current_response = follow_up.content.to_string();
            } else {
                break;
            }
        }

        let tokens_used = if total_tokens > 0 {
            Some(TokenUsage {
                input_tokens: total_input_tokens,
                output_tokens: total_output_tokens,
                total_tokens,
            })
        } else {
            None
        };

        let final_response_length = current_response.len();
        self.emit(AgentEvent::SendCompleted {
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
            tokens_used: tokens_used.clone(),
            tool_calls_made: tool_iteration,
            response_length: final_response_length,
        })
        .await;

        Ok(AgentResponse {
            content: current_response,
            tokens_used,
        })
    }

    /// Borrow the underlying [`ClientWrapper`] from the session.
    ///
    /// Useful for creating new sessions or agents that share the same LLM
    /// provider connection.
    pub fn client(&self) -> &Arc<dyn ClientWrapper> {
        self.session.client()
    }

    /// Generate the system prompt augmented with the agent's expertise and personality.
    fn augment_system_prompt(&self, base_prompt: &str) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!("You are {}.\n", self.name));

        if let Some(expertise) = &self.expertise {
            prompt.push_str(&format!("Your expertise: {}\n", expertise));
        }

        if let Some(personality) = &self.personality {
            prompt.push_str(&format!("Your approach: {}\n", personality));
        }

        prompt.push('\n');
        prompt.push_str(base_prompt);

        prompt
    }

    /// Parse a tool call from an LLM response.
    ///
    /// Scans the response text for a JSON fragment matching the pattern:
    /// ```json
    /// {"tool_call": {"name": "tool_name", "parameters": {...}}}
    /// ```
    ///
    /// The method uses brace-counting to find the matching closing `}` rather
    /// than parsing the entire response as JSON. This handles the common case
    /// where the LLM wraps the tool call in surrounding prose. Byte indices
    /// are used throughout so multibyte prose (translated review text) before
    /// the fragment cannot skew the slice.
    ///
    /// Returns `Some(ToolCall)` if a valid tool call is found, `None` otherwise.
    /// Only the *first* tool call in the response is extracted.
    fn parse_tool_call(&self, response: &str) -> Option<ToolCall> {
        let start_idx = response.find("{\"tool_call\"")?;

        // Use brace-counting to find the matching closing brace
        let mut brace_count = 0;
        let mut end_idx = start_idx;
        for (i, ch) in response.char_indices().skip_while(|(i, _)| *i < start_idx) {
            if ch == '{' {
                brace_count += 1;
            } else if ch == '}' {
                brace_count -= 1;
                if brace_count == 0 {
                    end_idx = i + 1;
                    break;
                }
            }
        }

        if end_idx > start_idx {
            let json_str = &response[start_idx..end_idx];
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(json_str) {
                if let Some(tool_call_obj) = parsed.get("tool_call") {
                    if let (Some(name), Some(parameters)) = (
                        tool_call_obj.get("name").and_then(|v| v.as_str()),
                        tool_call_obj.get("parameters"),
                    ) {
                        return Some(ToolCall {
                            name: name.to_string(),
                            parameters: parameters.clone(),
                        });
                    }
                }
            }
        }

        None
    }
}
