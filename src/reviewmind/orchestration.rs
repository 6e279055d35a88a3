//! Multi-Agent Orchestration
//!
//! Drives the review-analysis team through one of three topologies:
//!
//! - **Sequential**: collector → translator → sentiment analyst → synthesizer,
//!   one pass in roster order, hub-routing each response into the next agent's
//!   session.
//! - **HandOff**: starts at the collector; after each turn the response is
//!   scanned for an explicit `[HANDOFF:<agent-id>]` marker. A valid target gets
//!   the next turn; otherwise control follows the phase machine's default.
//! - **GroupChat**: the [`ReviewChatManager`] picks the speaker each turn,
//!   checks the termination ladder, and can pause the run for user input.
//!
//! # Per-Run Context
//!
//! Every run owns a [`RunContext`]: the transcript, turn counter, token tally,
//! hub-routing cursors, and an optional deadline all live there, never on the
//! orchestration instance. Concurrent or successive runs can therefore never
//! interleave state. The deadline is checked at every turn boundary; an
//! expired deadline ends the run with
//! [`TerminationReason::DeadlineExceeded`] and the partial transcript.
//!
//! # Example
//!
//! ```rust,no_run
//! use reviewmind::orchestration::{Orchestration, OrchestrationMode, RunContext};
//! use reviewmind::review_team::ReviewTeam;
//! use reviewmind::clients::openai::OpenAIClient;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async {
//! let client = Arc::new(OpenAIClient::new_with_model_string("key", "gpt-4o-mini"));
//!
//! let mut orch = Orchestration::new("reviews-1001", "Review Analysis")
//!     .with_mode(OrchestrationMode::GroupChat);
//! for agent in ReviewTeam::new(client).into_agents() {
//!     orch.add_agent(agent)?;
//! }
//!
//! let ctx = RunContext::new().with_timeout(Duration::from_secs(60));
//! let response = orch.run_with_context("Analyze the reviews below ...", ctx).await?;
//! println!("complete={} turns={}", response.is_complete, response.turns);
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! # };
//! ```

use crate::reviewmind::agent::Agent;
use crate::reviewmind::chat_manager::{phase_of, ReviewChatManager, MAX_INVOCATIONS};
use crate::reviewmind::client_wrapper::Role;
use crate::reviewmind::event::{EventHandler, OrchestrationEvent};
use crate::reviewmind::review_team::{parse_handoff_target, HANDOFF_MARKER_PREFIX};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Metadata key under which an agent's role instructions are stored.
///
/// [`Orchestration`] setup applies this value as the agent's system prompt
/// (falling back to the shared system context when absent), so instructions
/// survive [`Agent::fork`]: a fork keeps metadata but starts with an empty
/// session.
pub const INSTRUCTIONS_METADATA_KEY: &str = "instructions";

/// The topology used to coordinate the review team.
///
/// # Examples
///
/// ```
/// use reviewmind::orchestration::OrchestrationMode;
///
/// // The HTTP query value "Normal" is the platform's default strategy name
/// // and maps to the hand-off topology.
/// assert_eq!(
///     OrchestrationMode::from_query_value("Normal"),
///     Some(OrchestrationMode::HandOff)
/// );
/// assert_eq!(OrchestrationMode::from_query_value("bogus"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationMode {
    /// One pass through the roster in insertion order.
    Sequential,
    /// Explicit `[HANDOFF:..]` markers steer control, with the phase machine
    /// as fallback.
    HandOff,
    /// The [`ReviewChatManager`] selects speakers and decides termination.
    GroupChat,
}

impl OrchestrationMode {
    /// Parse the HTTP query value (`AgentOrchestrationType=`) into a mode.
    ///
    /// Case-insensitive. `"Normal"` is an alias for [`OrchestrationMode::HandOff`];
    /// `"HandOff"` itself is accepted too. Returns `None` for anything else.
    pub fn from_query_value(value: &str) -> Option<OrchestrationMode> {
        match value.to_ascii_lowercase().as_str() {
            "normal" | "handoff" => Some(OrchestrationMode::HandOff),
            "sequential" => Some(OrchestrationMode::Sequential),
            "groupchat" => Some(OrchestrationMode::GroupChat),
            _ => None,
        }
    }
}

impl fmt::Display for OrchestrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestrationMode::Sequential => "Sequential",
            OrchestrationMode::HandOff => "HandOff",
            OrchestrationMode::GroupChat => "GroupChat",
        };
        write!(f, "{}", name)
    }
}

/// Why a run stopped.
///
/// Produced by the [`ReviewChatManager`]'s termination ladder, the invocation
/// cap in the executors, or an expired [`RunContext`] deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The hard cap on agent invocations was reached.
    InvocationCapReached,
    /// The terminal agent emitted the exact completion phrase.
    CompletionPhrase,
    /// A completion-indicator substring appeared in the last response.
    CompletionIndicator,
    /// Three or more analysis components were covered by the last response.
    ComponentsCovered,
    /// All four core agents contributed and the synthesizer has spoken.
    AllStagesContributed,
    /// The last four messages contained at most two distinct contents.
    RepetitionDetected,
    /// The per-run deadline expired; the transcript is partial.
    DeadlineExceeded,
}

impl TerminationReason {
    /// Whether this reason represents a natural completion of the analysis,
    /// as opposed to a cap, repetition, or deadline cutoff.
    pub fn is_natural(&self) -> bool {
        matches!(
            self,
            TerminationReason::CompletionPhrase
                | TerminationReason::CompletionIndicator
                | TerminationReason::ComponentsCovered
                | TerminationReason::AllStagesContributed
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationReason::InvocationCapReached => "invocation cap reached",
            TerminationReason::CompletionPhrase => "completion phrase detected",
            TerminationReason::CompletionIndicator => "completion indicator detected",
            TerminationReason::ComponentsCovered => "analysis components covered",
            TerminationReason::AllStagesContributed => "all stages contributed",
            TerminationReason::RepetitionDetected => "repetition detected",
            TerminationReason::DeadlineExceeded => "deadline exceeded",
        };
        write!(f, "{}", text)
    }
}

/// Why a run paused to ask the user for direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInputReason {
    /// The last four messages all came from one agent.
    SingleSpeakerStalled,
    /// The last response asked for clarification instead of making progress.
    ClarificationRequested,
    /// The synthesizer is still silent after fifteen messages.
    SynthesizerSilent,
}

impl fmt::Display for UserInputReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UserInputReason::SingleSpeakerStalled => "single speaker stalled",
            UserInputReason::ClarificationRequested => "clarification requested",
            UserInputReason::SynthesizerSilent => "synthesizer silent",
        };
        write!(f, "{}", text)
    }
}

/// A single message in a run's transcript.
///
/// # Examples
///
/// ```
/// use reviewmind::orchestration::OrchestrationMessage;
/// use reviewmind::Role;
///
/// // User prompt: no agent identity
/// let user_msg = OrchestrationMessage::new(Role::User, "Analyze product 1001");
/// assert!(user_msg.agent_id.is_none());
///
/// // Agent message with metadata
/// let agent_msg = OrchestrationMessage::from_agent("reviews-collector", "Review Data Collector", "16 reviews found")
///     .with_metadata("turn", "1");
/// assert_eq!(agent_msg.agent_id.as_deref(), Some("reviews-collector"));
/// assert_eq!(agent_msg.metadata.get("turn").unwrap(), "1");
/// ```
#[derive(Debug, Clone)]
pub struct OrchestrationMessage {
    /// UTC timestamp recorded when the message was created.
    pub timestamp: DateTime<Utc>,

    /// Unique identifier of the agent that produced this message, or `None`
    /// for the user prompt.
    pub agent_id: Option<String>,

    /// Human-readable display name of the contributing agent, or `None` for
    /// non-agent messages.
    pub agent_name: Option<String>,

    /// Conversation role: [`Role::User`] for prompts, [`Role::Assistant`]
    /// for agent responses.
    pub role: Role,

    /// The message body. Stored as `Arc<str>` so cloning messages is cheap.
    pub content: Arc<str>,

    /// Free-form key-value metadata attached to the message.
    ///
    /// The executors populate well-known keys:
    /// - `"turn"`: the 1-based turn number that produced this message
    /// - `"phase"`: the analysis phase at the time (group-chat only)
    pub metadata: HashMap<String, String>,
}

impl OrchestrationMessage {
    /// Create a message with the given role and content but no agent identity.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            agent_id: None,
            agent_name: None,
            role,
            content: Arc::from(content.into().as_str()),
            metadata: HashMap::new(),
        }
    }

    /// Create an assistant-role message attributed to a specific agent.
    pub fn from_agent(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            agent_id: Some(agent_id.into()),
            agent_name: Some(agent_name.into()),
            role: Role::Assistant,
            content: Arc::from(content.into().as_str()),
            metadata: HashMap::new(),
        }
    }

    /// Attach a key-value metadata pair to this message (builder pattern).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Per-call state for one orchestration run.
///
/// Replaces instance-level mutable history: the transcript, turn counter,
/// token tally, and hub-routing cursors belong to exactly one run, so
/// concurrent runs over (forks of) the same team cannot interleave.
///
/// # Examples
///
/// ```
/// use reviewmind::orchestration::RunContext;
/// use std::time::Duration;
///
/// let ctx = RunContext::new();
/// assert!(!ctx.deadline_exceeded());
///
/// let expired = RunContext::new().with_timeout(Duration::from_secs(0));
/// assert!(expired.deadline_exceeded());
/// ```
#[derive(Debug, Default)]
pub struct RunContext {
    deadline: Option<Instant>,
    messages: Vec<OrchestrationMessage>,
    turns: usize,
    total_tokens: usize,
    cursors: HashMap<String, usize>,
}

impl RunContext {
    /// Create a context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an absolute deadline (builder pattern).
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline the given duration from now (builder pattern).
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Whether the deadline, if any, has passed.
    ///
    /// Checked by the executors at every turn boundary.
    pub fn deadline_exceeded(&self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// The transcript accumulated so far.
    pub fn messages(&self) -> &[OrchestrationMessage] {
        &self.messages
    }

    /// The number of agent turns executed so far.
    pub fn turns(&self) -> usize {
        self.turns
    }

    fn into_response(
        self,
        is_complete: bool,
        termination: Option<TerminationReason>,
        needs_user_input: Option<UserInputReason>,
    ) -> OrchestrationResponse {
        OrchestrationResponse {
            messages: self.messages,
            turns: self.turns,
            is_complete,
            termination,
            needs_user_input,
            total_tokens_used: self.total_tokens,
        }
    }
}

/// The result of an [`Orchestration::run`] call.
#[derive(Debug)]
pub struct OrchestrationResponse {
    /// Every [`OrchestrationMessage`] generated during the run, in
    /// chronological order (the user prompt first).
    pub messages: Vec<OrchestrationMessage>,

    /// Number of agent turns actually executed.
    pub turns: usize,

    /// Whether the run reached a natural completion.
    ///
    /// - **Sequential**: `true` after a full pass through the roster.
    /// - **HandOff / GroupChat**: `true` when termination was natural
    ///   (see [`TerminationReason::is_natural`]), `false` for cap,
    ///   repetition, deadline, or user-input pauses.
    pub is_complete: bool,

    /// The termination rule that ended the run, when one fired.
    pub termination: Option<TerminationReason>,

    /// Set when the run paused because the manager decided user direction is
    /// needed (group-chat only).
    pub needs_user_input: Option<UserInputReason>,

    /// Approximate total tokens consumed across all agents and turns.
    ///
    /// Accumulated from the `TokenUsage` reported by each agent's underlying
    /// LLM client. If a client does not report usage the contribution is zero.
    pub total_tokens_used: usize,
}

/// Errors that can occur during orchestration configuration or execution.
///
/// # Examples
///
/// ```
/// use reviewmind::orchestration::OrchestrationError;
///
/// let err = OrchestrationError::AgentNotFound("missing-agent".into());
/// assert_eq!(err.to_string(), "Agent not found: missing-agent");
/// ```
#[derive(Debug)]
pub enum OrchestrationError {
    /// An agent id referenced during execution (hand-off target, phase
    /// default, roster entry) does not match any registered agent.
    AgentNotFound(String),

    /// The mode configuration or query value is invalid.
    InvalidMode(String),

    /// A runtime failure occurred while gathering agent responses (an LLM
    /// call failure or a duplicate agent id on insertion).
    ExecutionFailed(String),

    /// [`Orchestration::run`] was called before any agents were added.
    NoAgents,
}

impl fmt::Display for OrchestrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationError::AgentNotFound(id) => write!(f, "Agent not found: {}", id),
            OrchestrationError::InvalidMode(msg) => write!(f, "Invalid mode: {}", msg),
            OrchestrationError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            OrchestrationError::NoAgents => write!(f, "No agents in orchestration"),
        }
    }
}

impl Error for OrchestrationError {}

/// The engine that coordinates the review team in a chosen
/// [`OrchestrationMode`].
///
/// An `Orchestration` owns a roster of agents and a topology. Call
/// [`run`](Orchestration::run) (or [`run_with_context`](Orchestration::run_with_context)
/// to attach a deadline) to execute an analysis and receive an
/// [`OrchestrationResponse`]. All run state lives in the [`RunContext`].
pub struct Orchestration {
    /// Stable identifier used for logging and events.
    pub id: String,

    /// Human-readable name of this orchestration.
    pub name: String,

    /// Registered agents keyed by their [`Agent::id`].
    agents: HashMap<String, Agent>,

    /// Agent ids in insertion order. Determines the sequential pass and the
    /// initial hand-off speaker.
    agent_order: Vec<String>,

    /// The active topology. Set via [`Orchestration::with_mode`].
    mode: OrchestrationMode,

    /// Fallback system prompt for agents that carry no stored instructions.
    system_context: String,

    /// Hard cap on agent turns per run.
    max_invocations: usize,

    /// Optional event handler. When set, the orchestration emits
    /// [`OrchestrationEvent`]s during `run()` and propagates the handler to
    /// agents added via `add_agent()` so their agent events flow through the
    /// same callback.
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl Orchestration {
    /// Create an orchestration with the provided identifiers.
    ///
    /// Defaults to [`OrchestrationMode::HandOff`] (the platform's `Normal`
    /// strategy) and the [`MAX_INVOCATIONS`] cap. Use the `with_*` builder
    /// methods to customise.
    ///
    /// # Examples
    ///
    /// ```
    /// use reviewmind::orchestration::Orchestration;
    ///
    /// let orch = Orchestration::new("reviews-1001", "Review Analysis");
    /// assert_eq!(orch.id, "reviews-1001");
    /// ```
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            agents: HashMap::new(),
            agent_order: Vec::new(),
            mode: OrchestrationMode::HandOff,
            system_context: String::from(
                "You are part of a team of agents analyzing customer product reviews.",
            ),
            max_invocations: MAX_INVOCATIONS,
            event_handler: None,
        }
    }

    /// Select the topology used during [`Orchestration::run`] (builder pattern).
    pub fn with_mode(mut self, mode: OrchestrationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the fallback system prompt (builder pattern).
    ///
    /// Only applied to agents that carry no stored role instructions in their
    /// metadata (see [`INSTRUCTIONS_METADATA_KEY`]).
    pub fn with_system_context(mut self, context: impl Into<String>) -> Self {
        self.system_context = context.into();
        self
    }

    /// Override the per-run cap on agent turns (builder pattern).
    pub fn with_max_invocations(mut self, max_invocations: usize) -> Self {
        self.max_invocations = max_invocations;
        self
    }

    /// Attach an [`EventHandler`] for run observability (builder pattern).
    ///
    /// The handler is also propagated to every agent added afterwards via
    /// [`add_agent`](Orchestration::add_agent).
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Emit an [`OrchestrationEvent`] to the registered handler.
    ///
    /// If no handler is registered, this is a no-op.
    async fn emit(&self, event: OrchestrationEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_orchestration_event(&event).await;
        }
    }

    /// Register a new agent with the orchestration.
    ///
    /// Returns an error if an agent with the same [`Agent::id`] is already
    /// registered. The insertion order determines the sequential pass and the
    /// initial hand-off speaker, so add the team in pipeline order.
    pub fn add_agent(&mut self, mut agent: Agent) -> Result<(), OrchestrationError> {
        let id = agent.id.clone();
        if self.agents.contains_key(&id) {
            return Err(OrchestrationError::ExecutionFailed(format!(
                "Agent with id '{}' already exists",
                id
            )));
        }

        // Propagate the orchestration's event handler to the agent so that
        // AgentEvents (LLM calls, tool usage, etc.) flow through the same
        // handler as OrchestrationEvents, giving the user a unified stream.
        if let Some(handler) = &self.event_handler {
            agent.set_event_handler(Arc::clone(handler));
        }

        self.agent_order.push(id.clone());
        self.agents.insert(id, agent);
        Ok(())
    }

    /// Remove and return an agent by its identifier.
    ///
    /// Returns `None` if no agent with the given id exists. Removing an agent
    /// also removes it from the roster order.
    pub fn remove_agent(&mut self, id: &str) -> Option<Agent> {
        self.agent_order.retain(|aid| aid != id);
        self.agents.remove(id)
    }

    /// Borrow a registered agent by its identifier.
    pub fn get_agent(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// List agents in their insertion order.
    pub fn list_agents(&self) -> Vec<&Agent> {
        self.agent_order
            .iter()
            .filter_map(|id| self.agents.get(id))
            .collect()
    }

    /// Execute a run with a fresh, deadline-free [`RunContext`].
    ///
    /// See [`run_with_context`](Orchestration::run_with_context).
    pub async fn run(
        &mut self,
        prompt: &str,
    ) -> Result<OrchestrationResponse, Box<dyn Error + Send + Sync>> {
        self.run_with_context(prompt, RunContext::new()).await
    }

    /// Execute a run according to the configured [`OrchestrationMode`].
    ///
    /// The `prompt` is the analysis task; `ctx` carries the per-run state
    /// including an optional deadline checked at every turn boundary.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::NoAgents`] if no agents have been
    /// registered, [`OrchestrationError::AgentNotFound`] if control reaches an
    /// id missing from the roster, and propagates agent LLM failures.
    pub async fn run_with_context(
        &mut self,
        prompt: &str,
        mut ctx: RunContext,
    ) -> Result<OrchestrationResponse, Box<dyn Error + Send + Sync>> {
        if self.agents.is_empty() {
            return Err(Box::new(OrchestrationError::NoAgents));
        }

        self.emit(OrchestrationEvent::RunStarted {
            orchestration_id: self.id.clone(),
            orchestration_name: self.name.clone(),
            mode: self.mode.to_string(),
            agent_count: self.agents.len(),
        })
        .await;
        log::info!(
            "Orchestration '{}' starting in {} mode with {} agents",
            self.id,
            self.mode,
            self.agents.len()
        );

        ctx.messages
            .push(OrchestrationMessage::new(Role::User, prompt));

        let result = match self.mode {
            OrchestrationMode::Sequential => self.execute_sequential(prompt, ctx).await,
            OrchestrationMode::HandOff => self.execute_handoff(prompt, ctx).await,
            OrchestrationMode::GroupChat => self.execute_group_chat(prompt, ctx).await,
        };

        if let Ok(ref response) = result {
            self.emit(OrchestrationEvent::RunCompleted {
                orchestration_id: self.id.clone(),
                orchestration_name: self.name.clone(),
                turns: response.turns,
                total_tokens: response.total_tokens_used,
                is_complete: response.is_complete,
            })
            .await;
            log::info!(
                "Orchestration '{}' finished: {} turns, complete={}",
                self.id,
                response.turns,
                response.is_complete
            );
        }

        result
    }

    /// Initialize every agent's system prompt before a run.
    ///
    /// Agents carrying stored role instructions (under
    /// [`INSTRUCTIONS_METADATA_KEY`]) get those; anyone else gets the shared
    /// system context. Re-applying here is what makes forked teams work: a
    /// fork keeps metadata but loses the live prompt.
    fn setup_agent_prompts(&mut self) {
        let fallback = self.system_context.clone();
        for agent in self.agents.values_mut() {
            match agent.metadata.get(INSTRUCTIONS_METADATA_KEY).cloned() {
                Some(instructions) => agent.set_system_prompt(&instructions),
                None => agent.set_system_prompt(&fallback),
            }
        }
    }

    /// Run one agent turn: hub-route unseen messages, send the prompt, record
    /// the response in the context.
    ///
    /// Returns the agent's response content so the caller can scan it for
    /// markers. An agent failure is emitted as
    /// [`OrchestrationEvent::AgentFailed`] and then propagated; a failed
    /// stage leaves nothing for the next stage to work on.
    async fn take_turn(
        &mut self,
        agent_id: &str,
        turn_prompt: &str,
        selection_reason: &str,
        ctx: &mut RunContext,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut agent = match self.agents.remove(agent_id) {
            Some(agent) => agent,
            None => {
                return Err(Box::new(OrchestrationError::AgentNotFound(
                    agent_id.to_string(),
                )))
            }
        };

        let turn = ctx.turns + 1;
        self.emit(OrchestrationEvent::TurnStarted {
            orchestration_id: self.id.clone(),
            turn,
        })
        .await;
        self.emit(OrchestrationEvent::AgentSelected {
            orchestration_id: self.id.clone(),
            agent_id: agent_id.to_string(),
            agent_name: agent.name.clone(),
            reason: selection_reason.to_string(),
        })
        .await;
        log::debug!(
            "Turn {}: '{}' speaks ({})",
            turn,
            agent.name,
            selection_reason
        );

        // Route only NEW messages this agent hasn't seen yet
        let cursor = ctx.cursors.get(agent_id).copied().unwrap_or(0);
        for msg in &ctx.messages[cursor..] {
            if let Some(name) = &msg.agent_name {
                agent.receive_message(Role::Assistant, format!("[{}]: {}", name, msg.content));
            }
        }
        ctx.cursors.insert(agent_id.to_string(), ctx.messages.len());

        let result = agent.send(turn_prompt).await;

        // Re-insert agent before handling result
        let agent_name = agent.name.clone();
        self.agents.insert(agent_id.to_string(), agent);

        match result {
            Ok(agent_response) => {
                if let Some(usage) = &agent_response.tokens_used {
                    ctx.total_tokens += usage.total_tokens;
                }

                self.emit(OrchestrationEvent::AgentResponded {
                    orchestration_id: self.id.clone(),
                    agent_id: agent_id.to_string(),
                    agent_name: agent_name.clone(),
                    tokens_used: agent_response.tokens_used.clone(),
                    response_length: agent_response.content.len(),
                })
                .await;

                let msg =
                    OrchestrationMessage::from_agent(agent_id, &agent_name, &agent_response.content)
                        .with_metadata("turn", turn.to_string());
                ctx.messages.push(msg);
                ctx.turns = turn;

                self.emit(OrchestrationEvent::TurnCompleted {
                    orchestration_id: self.id.clone(),
                    turn,
                })
                .await;

                Ok(agent_response.content)
            }
            Err(e) => {
                self.emit(OrchestrationEvent::AgentFailed {
                    orchestration_id: self.id.clone(),
                    agent_id: agent_id.to_string(),
                    agent_name,
                    error: e.to_string(),
                })
                .await;
                log::error!("Agent '{}' failed on turn {}: {}", agent_id, turn, e);
                Err(e)
            }
        }
    }

    /// End a run because the deadline expired, emitting the termination event.
    async fn deadline_cutoff(&self, ctx: RunContext) -> OrchestrationResponse {
        self.emit(OrchestrationEvent::TerminationTriggered {
            orchestration_id: self.id.clone(),
            reason: TerminationReason::DeadlineExceeded.to_string(),
        })
        .await;
        log::warn!(
            "Orchestration '{}' hit its deadline after {} turns; returning partial transcript",
            self.id,
            ctx.turns
        );
        ctx.into_response(false, Some(TerminationReason::DeadlineExceeded), None)
    }

    /// Execute the sequential topology: one pass through the roster in
    /// insertion order.
    ///
    /// Each agent's session receives the prior responses via hub-routing, so
    /// the translator sees the collector's dataset, the analyst sees both,
    /// and the synthesizer sees the whole pipeline.
    async fn execute_sequential(
        &mut self,
        prompt: &str,
        mut ctx: RunContext,
    ) -> Result<OrchestrationResponse, Box<dyn Error + Send + Sync>> {
        self.setup_agent_prompts();

        let order = self.agent_order.clone();
        let stages = order.len();
        for (idx, agent_id) in order.iter().enumerate() {
            if ctx.deadline_exceeded() {
                return Ok(self.deadline_cutoff(ctx).await);
            }

            let reason = format!("sequential stage {}/{}", idx + 1, stages);
            self.take_turn(agent_id, prompt, &reason, &mut ctx).await?;
        }

        Ok(ctx.into_response(true, None, None))
    }

    /// Execute the hand-off topology.
    ///
    /// Control starts at the first roster agent (the collector). After each
    /// turn the response is scanned for a `[HANDOFF:<agent-id>]` marker; a
    /// valid target gets the next turn, an unknown target is logged and
    /// ignored, and a missing marker lets the phase machine pick the default
    /// speaker. The [`ReviewChatManager`]'s termination ladder runs after
    /// every turn.
    async fn execute_handoff(
        &mut self,
        prompt: &str,
        mut ctx: RunContext,
    ) -> Result<OrchestrationResponse, Box<dyn Error + Send + Sync>> {
        self.setup_agent_prompts();

        let manager = ReviewChatManager::new().with_max_invocations(self.max_invocations);
        let roster = self.agent_order.join(", ");
        let turn_prompt = format!(
            "{}\n\nWhen your stage is complete, pass control by ending your message \
             with {}<agent-id>]. Agents on this analysis: {}.",
            prompt, HANDOFF_MARKER_PREFIX, roster
        );

        let mut current = match self.agent_order.first() {
            Some(id) => id.clone(),
            None => return Err(Box::new(OrchestrationError::NoAgents)),
        };
        let mut reason = "initial agent".to_string();
        let mut phase = phase_of(ctx.messages());

        loop {
            if ctx.deadline_exceeded() {
                return Ok(self.deadline_cutoff(ctx).await);
            }
            if ctx.turns >= self.max_invocations {
                self.emit(OrchestrationEvent::TerminationTriggered {
                    orchestration_id: self.id.clone(),
                    reason: TerminationReason::InvocationCapReached.to_string(),
                })
                .await;
                return Ok(ctx.into_response(
                    false,
                    Some(TerminationReason::InvocationCapReached),
                    None,
                ));
            }

            let content = self.take_turn(&current, &turn_prompt, &reason, &mut ctx).await?;

            let new_phase = phase_of(ctx.messages());
            if new_phase != phase {
                self.emit(OrchestrationEvent::PhaseAdvanced {
                    orchestration_id: self.id.clone(),
                    from: phase.to_string(),
                    to: new_phase.to_string(),
                })
                .await;
                phase = new_phase;
            }

            if let Some(termination) = manager.should_terminate(ctx.messages()) {
                self.emit(OrchestrationEvent::TerminationTriggered {
                    orchestration_id: self.id.clone(),
                    reason: termination.to_string(),
                })
                .await;
                let is_complete = termination.is_natural();
                return Ok(ctx.into_response(is_complete, Some(termination), None));
            }

            match parse_handoff_target(&content) {
                Some(target) if self.agents.contains_key(&target) => {
                    self.emit(OrchestrationEvent::HandoffRequested {
                        orchestration_id: self.id.clone(),
                        from_agent: current.clone(),
                        to_agent: target.clone(),
                    })
                    .await;
                    reason = format!("hand-off from {}", current);
                    current = target;
                }
                Some(target) => {
                    log::warn!(
                        "Hand-off to unknown agent '{}' ignored; falling back to phase default",
                        target
                    );
                    current = manager.select_next_speaker(ctx.messages()).to_string();
                    reason = format!("phase default ({})", phase);
                }
                None => {
                    current = manager.select_next_speaker(ctx.messages()).to_string();
                    reason = format!("phase default ({})", phase);
                }
            }
        }
    }

    /// Execute the group-chat topology.
    ///
    /// The [`ReviewChatManager`] is consulted before every turn: first the
    /// termination ladder, then the user-input checks, then speaker selection
    /// from the phase machine. The loop is bounded by the termination
    /// ladder's invocation cap.
    async fn execute_group_chat(
        &mut self,
        prompt: &str,
        mut ctx: RunContext,
    ) -> Result<OrchestrationResponse, Box<dyn Error + Send + Sync>> {
        self.setup_agent_prompts();

        let manager = ReviewChatManager::new().with_max_invocations(self.max_invocations);
        let mut phase = phase_of(ctx.messages());

        loop {
            if ctx.deadline_exceeded() {
                return Ok(self.deadline_cutoff(ctx).await);
            }

            if let Some(termination) = manager.should_terminate(ctx.messages()) {
                self.emit(OrchestrationEvent::TerminationTriggered {
                    orchestration_id: self.id.clone(),
                    reason: termination.to_string(),
                })
                .await;
                let is_complete = termination.is_natural();
                return Ok(ctx.into_response(is_complete, Some(termination), None));
            }

            if let Some(pause) = manager.should_request_user_input(ctx.messages()) {
                self.emit(OrchestrationEvent::UserInputRequested {
                    orchestration_id: self.id.clone(),
                    reason: pause.to_string(),
                })
                .await;
                log::info!(
                    "Orchestration '{}' pausing for user input: {}",
                    self.id,
                    pause
                );
                return Ok(ctx.into_response(false, None, Some(pause)));
            }

            let speaker = manager.select_next_speaker(ctx.messages()).to_string();
            let reason = format!("phase {}", phase);
            self.take_turn(&speaker, prompt, &reason, &mut ctx).await?;

            if let Some(last) = ctx.messages.last_mut() {
                last.metadata.insert("phase".to_string(), phase.to_string());
            }

            let new_phase = phase_of(ctx.messages());
            if new_phase != phase {
                self.emit(OrchestrationEvent::PhaseAdvanced {
                    orchestration_id: self.id.clone(),
                    from: phase.to_string(),
                    to: new_phase.to_string(),
                })
                .await;
                phase = new_phase;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reviewmind::clients::openai::OpenAIClient;

    fn test_client() -> Arc<OpenAIClient> {
        Arc::new(OpenAIClient::new_with_model_string("test-key", "gpt-4o-mini"))
    }

    #[test]
    fn mode_parsing_is_case_insensitive() {
        assert_eq!(
            OrchestrationMode::from_query_value("normal"),
            Some(OrchestrationMode::HandOff)
        );
        assert_eq!(
            OrchestrationMode::from_query_value("SEQUENTIAL"),
            Some(OrchestrationMode::Sequential)
        );
        assert_eq!(
            OrchestrationMode::from_query_value("GroupChat"),
            Some(OrchestrationMode::GroupChat)
        );
        assert_eq!(OrchestrationMode::from_query_value("roundrobin"), None);
    }

    #[test]
    fn natural_termination_classification() {
        assert!(TerminationReason::CompletionPhrase.is_natural());
        assert!(TerminationReason::AllStagesContributed.is_natural());
        assert!(!TerminationReason::InvocationCapReached.is_natural());
        assert!(!TerminationReason::DeadlineExceeded.is_natural());
    }

    #[test]
    fn run_context_deadlines() {
        let ctx = RunContext::new();
        assert!(!ctx.deadline_exceeded());

        let expired = RunContext::new().with_timeout(Duration::from_secs(0));
        assert!(expired.deadline_exceeded());

        let generous = RunContext::new().with_timeout(Duration::from_secs(3600));
        assert!(!generous.deadline_exceeded());
    }

    #[test]
    fn duplicate_agent_ids_are_rejected() {
        let mut orch = Orchestration::new("test", "Test");
        orch.add_agent(Agent::new("a", "Agent A", test_client()))
            .unwrap();
        assert!(orch
            .add_agent(Agent::new("a", "Agent A again", test_client()))
            .is_err());
        assert_eq!(orch.list_agents().len(), 1);
    }

    #[tokio::test]
    async fn run_without_agents_errors() {
        let mut orch = Orchestration::new("empty", "Empty");
        let result = orch.run("prompt").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No agents"));
    }
}
