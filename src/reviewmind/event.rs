//! Event system for real-time observability of agents, orchestration runs, and
//! server surfaces.
//!
//! Register an [`EventHandler`] on an [`Agent`](crate::Agent), an
//! [`Orchestration`](crate::orchestration::Orchestration), or a server builder
//! to observe what happens while a review analysis runs: LLM calls, tool
//! executions, speaker selection, phase transitions, termination decisions,
//! and inbound protocol requests.
//!
//! All handler methods have default no-op implementations, so implementors
//! only override the events they care about.

use crate::reviewmind::client_wrapper::TokenUsage;
use async_trait::async_trait;

/// Events emitted by an [`Agent`](crate::Agent) while it works.
///
/// Fine-grained visibility into a single agent's LLM round-trips and tool
/// usage. Orchestration-level progress is reported separately via
/// [`OrchestrationEvent`].
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// `send()` was entered with a new user message.
    SendStarted {
        /// Stable identifier of the agent.
        agent_id: String,
        /// Human-readable display name.
        agent_name: String,
        /// First ~120 characters of the message, for logging.
        message_preview: String,
    },

    /// An LLM call is about to be made.
    ///
    /// `iteration` is 1 for the initial call and increments for each follow-up
    /// triggered by tool results.
    LLMCallStarted {
        agent_id: String,
        agent_name: String,
        iteration: usize,
    },

    /// An LLM call returned successfully.
    LLMCallCompleted {
        agent_id: String,
        agent_name: String,
        iteration: usize,
        /// Cumulative usage across the send() call so far, when the provider
        /// reports usage.
        tokens_used: Option<TokenUsage>,
        /// Character length of the response.
        response_length: usize,
    },

    /// A `{"tool_call": ...}` request was parsed out of the LLM response.
    ToolCallDetected {
        agent_id: String,
        agent_name: String,
        /// Name of the requested tool (e.g. `"get_product_reviews"`).
        tool_name: String,
        /// Raw JSON parameters the model supplied.
        parameters: serde_json::Value,
        iteration: usize,
    },

    /// A tool finished executing (successfully or not).
    ToolExecutionCompleted {
        agent_id: String,
        agent_name: String,
        tool_name: String,
        parameters: serde_json::Value,
        /// Whether the tool reported success.
        success: bool,
        /// Error message when `success` is false.
        error: Option<String>,
        /// Tool output when `success` is true.
        result: Option<serde_json::Value>,
        iteration: usize,
    },

    /// The tool loop hit its iteration cap and was cut off.
    ToolMaxIterationsReached { agent_id: String, agent_name: String },

    /// `send()` is returning its final response.
    SendCompleted {
        agent_id: String,
        agent_name: String,
        tokens_used: Option<TokenUsage>,
        /// Number of tool calls executed during this send().
        tool_calls_made: usize,
        response_length: usize,
    },

    /// The agent's system prompt was (re)configured.
    ///
    /// Emitted during orchestration setup when each team member gets its
    /// role instructions.
    SystemPromptSet { agent_id: String, agent_name: String },

    /// A message was injected into the agent's session history.
    ///
    /// In orchestration, this fires when the hub routes another agent's
    /// response into this agent's context before its turn.
    MessageReceived { agent_id: String, agent_name: String },

    /// The agent was forked via [`Agent::fork`](crate::Agent::fork).
    ///
    /// The forked agent shares tools and event handler via `Arc` but has a
    /// fresh, empty session. The analysis service forks the review team for
    /// every run so no conversation state crosses runs.
    Forked { agent_id: String, agent_name: String },
}

/// Events emitted by an [`Orchestration`](crate::orchestration::Orchestration)
/// during a [`run()`](crate::orchestration::Orchestration::run) call.
///
/// # Event Flow (GroupChat example)
///
/// ```text
/// RunStarted { mode: "GroupChat", agent_count: 4 }
///   └─ TurnStarted { turn: 1 }
///       ├─ AgentSelected { agent: "Review Data Collector", reason: "phase collecting-data" }
///       └─ AgentResponded { agent: "Review Data Collector", response_length: 812 }
///   └─ TurnCompleted { turn: 1 }
///   └─ PhaseAdvanced { from: "collecting-data", to: "translating" }
///   ...
///   └─ TerminationTriggered { reason: "completion phrase detected" }
/// RunCompleted { turns: 5, is_complete: true }
/// ```
#[derive(Debug, Clone)]
pub enum OrchestrationEvent {
    /// The orchestration run has started.
    RunStarted {
        /// Stable identifier of the orchestration run.
        orchestration_id: String,
        /// Human-readable orchestration name.
        orchestration_name: String,
        /// Active topology name (`"Sequential"`, `"HandOff"`, `"GroupChat"`).
        mode: String,
        /// Number of agents on the roster when the run started.
        agent_count: usize,
    },

    /// The orchestration run has completed (successfully or after hitting
    /// limits). Pair with [`RunStarted`](OrchestrationEvent::RunStarted) to
    /// measure wall-clock time.
    RunCompleted {
        orchestration_id: String,
        orchestration_name: String,
        /// Number of agent turns actually executed.
        turns: usize,
        /// Approximate total tokens consumed across all agents and turns.
        total_tokens: usize,
        /// Whether the run reached a terminal state (vs. cap/deadline cutoff).
        is_complete: bool,
    },

    /// A new agent turn is beginning (1-based).
    TurnStarted {
        orchestration_id: String,
        turn: usize,
    },

    /// An agent turn has completed.
    TurnCompleted {
        orchestration_id: String,
        turn: usize,
    },

    /// An agent was selected to speak next, with the reason (current phase,
    /// hand-off target, fixed order position, or the collector fallback).
    AgentSelected {
        orchestration_id: String,
        agent_id: String,
        agent_name: String,
        reason: String,
    },

    /// An agent responded successfully to its turn.
    AgentResponded {
        orchestration_id: String,
        agent_id: String,
        agent_name: String,
        tokens_used: Option<TokenUsage>,
        response_length: usize,
    },

    /// An agent's `send()` call failed. The run ends with the error; a
    /// failed stage leaves nothing for the next stage to work on.
    AgentFailed {
        orchestration_id: String,
        agent_id: String,
        agent_name: String,
        error: String,
    },

    /// The analysis phase machine advanced after a stage-complete marker.
    PhaseAdvanced {
        orchestration_id: String,
        /// Phase name before the transition (e.g. `"collecting-data"`).
        from: String,
        /// Phase name after the transition (e.g. `"translating"`).
        to: String,
    },

    /// An agent requested a hand-off to another agent via a `[HANDOFF:..]`
    /// marker. Only emitted in the hand-off topology.
    HandoffRequested {
        orchestration_id: String,
        from_agent: String,
        to_agent: String,
    },

    /// A termination rule fired and the run is about to stop.
    TerminationTriggered {
        orchestration_id: String,
        /// Human-readable rule description (see `TerminationReason`).
        reason: String,
    },

    /// The manager decided the conversation should pause for user input.
    UserInputRequested {
        orchestration_id: String,
        reason: String,
    },
}

/// Events emitted by the HTTP surfaces (REST analyze endpoint, A2A agents,
/// MCP tool server).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A server finished binding and is accepting requests.
    ServerStarted {
        /// Bound socket address, e.g. `"127.0.0.1:8080"`.
        addr: String,
    },

    /// A request was rejected before reaching a handler (IP filter or auth).
    RequestRejected {
        client_addr: String,
        reason: String,
    },

    /// `POST /tools/list` was received.
    ToolListRequested { client_addr: String },

    /// `POST /tools/list` returned a catalog.
    ToolListReturned {
        client_addr: String,
        tool_count: usize,
    },

    /// `POST /tools/execute` was received.
    ToolCallReceived {
        client_addr: String,
        tool_name: String,
        parameters: serde_json::Value,
    },

    /// A tool execution finished and the response was sent.
    ToolCallCompleted {
        client_addr: String,
        tool_name: String,
        success: bool,
        error: Option<String>,
        duration_ms: u64,
    },

    /// A tool execution errored out before producing a result.
    ToolCallFailed {
        client_addr: String,
        tool_name: String,
        error: String,
        duration_ms: u64,
    },

    /// A JSON-RPC request arrived on an A2A endpoint.
    RpcReceived {
        client_addr: String,
        /// A2A path, e.g. `"/reviews"`.
        endpoint: String,
        method: String,
    },

    /// A JSON-RPC response was sent on an A2A endpoint.
    RpcAnswered {
        client_addr: String,
        endpoint: String,
        duration_ms: u64,
    },

    /// A review analysis was requested over REST.
    AnalysisRequested {
        client_addr: String,
        product_id: u64,
        mode: String,
    },

    /// A review analysis finished (the HTTP response is about to be sent).
    AnalysisCompleted {
        product_id: u64,
        success: bool,
        duration_ms: u64,
    },
}

/// Trait for receiving agent, orchestration, and server events.
///
/// All methods have **default no-op implementations**, so you only need to
/// override the events you care about.
///
/// # Thread Safety
///
/// The `Send + Sync` bound allows the handler to be shared across agents and
/// tokio tasks via `Arc<dyn EventHandler>`. Internal state should use
/// appropriate synchronization (e.g. `AtomicUsize`, `Mutex`).
///
/// # Example: Minimal Logger
///
/// ```rust,no_run
/// use reviewmind::event::{AgentEvent, EventHandler, OrchestrationEvent};
/// use async_trait::async_trait;
///
/// struct Logger;
///
/// #[async_trait]
/// impl EventHandler for Logger {
///     async fn on_orchestration_event(&self, event: &OrchestrationEvent) {
///         println!("{:?}", event);
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called when an agent emits an event. Default is a no-op.
    async fn on_agent_event(&self, _event: &AgentEvent) {}

    /// Called when an orchestration emits an event. Default is a no-op.
    async fn on_orchestration_event(&self, _event: &OrchestrationEvent) {}

    /// Called when a server surface emits an event. Default is a no-op.
    async fn on_server_event(&self, _event: &ServerEvent) {}
}
