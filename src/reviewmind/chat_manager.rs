//! Review Chat Manager
//!
//! Deterministic group-chat policy for the review-analysis pipeline: decides,
//! after each message, (a) which agent speaks next, (b) whether the
//! conversation should terminate, (c) what the final filtered result is, and
//! (d) whether the run should pause for user input.
//!
//! # Phase Machine
//!
//! Speaker selection is driven by an explicit [`AnalysisPhase`] state
//! (`CollectingData → Translating → AnalyzingSentiment → Synthesizing → Done`)
//! advanced by the `[STAGE_COMPLETE:<stage>]` markers agents embed in their
//! output (see [`review_team`](crate::review_team)). The phase is derived
//! purely from the message history, so every decision method here is a pure
//! function over the per-run transcript: no hidden state, no extra LLM call
//! to pick the next speaker, and fully reproducible runs.
//!
//! # Termination
//!
//! [`should_terminate`](ReviewChatManager::should_terminate) applies an
//! ordered ladder of checks: the hard invocation cap, the terminal agent's
//! exact completion phrase, completion-indicator substrings, analysis-component
//! coverage, full-team contribution, and a repetition detector. The first
//! check that fires names the [`TerminationReason`].

use crate::reviewmind::orchestration::{
    OrchestrationMessage, TerminationReason, UserInputReason,
};
use crate::reviewmind::review_team::{
    parse_stage_markers, COLLECTOR_ID, COMPLETION_PHRASE, SENTIMENT_ID, STAGE_COLLECTION,
    STAGE_SENTIMENT, STAGE_SYNTHESIS, STAGE_TRANSLATION, SYNTHESIZER_ID, TRANSLATOR_ID,
};
use crate::reviewmind::client_wrapper::Role;
use std::collections::HashSet;
use std::fmt;

/// Hard cap on agent invocations per run.
pub const MAX_INVOCATIONS: usize = 20;

/// Number of trailing messages examined by the repetition and staleness checks.
const STALENESS_WINDOW: usize = 4;

/// Message count after which the user-input checks start applying.
const USER_INPUT_THRESHOLD: usize = 10;

/// Message count after which a silent synthesizer triggers a pause.
const SYNTHESIZER_SILENCE_THRESHOLD: usize = 15;

/// Substrings (matched case-insensitively) that indicate a wrapped-up analysis.
const COMPLETION_INDICATORS: [&str; 6] = [
    "analysis completed",
    "analysis complete",
    "final report",
    "final analysis",
    "in conclusion",
    "summary of findings",
];

/// Analysis components counted toward the coverage check. Three or more in a
/// single message mean the report already spans most of the pipeline.
const ANALYSIS_COMPONENTS: [&str; 5] = [
    "data collection",
    "translation",
    "sentiment",
    "key insights",
    "recommendation",
];

/// Keywords (matched case-insensitively) that signal an agent is asking for
/// clarification rather than making progress.
const CLARIFICATION_KEYWORDS: [&str; 6] = [
    "clarification",
    "clarify",
    "unclear",
    "ambiguous",
    "please specify",
    "more information",
];

/// The pipeline stage the conversation is currently in.
///
/// Ordered so that the furthest stage reached in a transcript can be computed
/// with `max`. Advanced by [`AnalysisPhase::after_stage`] when an agent emits
/// a stage-completion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnalysisPhase {
    /// The collector is assembling the raw review dataset.
    CollectingData,
    /// The translator is rendering the dataset into English.
    Translating,
    /// The sentiment analyst is classifying the reviews.
    AnalyzingSentiment,
    /// The synthesizer is writing the final report.
    Synthesizing,
    /// The final report has been delivered.
    Done,
}

impl AnalysisPhase {
    /// The phase that follows the completion of `stage`, or `None` for an
    /// unrecognized stage name.
    pub fn after_stage(stage: &str) -> Option<AnalysisPhase> {
        match stage {
            s if s == STAGE_COLLECTION => Some(AnalysisPhase::Translating),
            s if s == STAGE_TRANSLATION => Some(AnalysisPhase::AnalyzingSentiment),
            s if s == STAGE_SENTIMENT => Some(AnalysisPhase::Synthesizing),
            s if s == STAGE_SYNTHESIS => Some(AnalysisPhase::Done),
            _ => None,
        }
    }

    /// The id of the agent responsible for this phase, or `None` once done.
    pub fn agent_id(&self) -> Option<&'static str> {
        match self {
            AnalysisPhase::CollectingData => Some(COLLECTOR_ID),
            AnalysisPhase::Translating => Some(TRANSLATOR_ID),
            AnalysisPhase::AnalyzingSentiment => Some(SENTIMENT_ID),
            AnalysisPhase::Synthesizing => Some(SYNTHESIZER_ID),
            AnalysisPhase::Done => None,
        }
    }
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisPhase::CollectingData => "collecting-data",
            AnalysisPhase::Translating => "translating",
            AnalysisPhase::AnalyzingSentiment => "analyzing-sentiment",
            AnalysisPhase::Synthesizing => "synthesizing",
            AnalysisPhase::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Compute the furthest [`AnalysisPhase`] reached in a transcript.
///
/// Scans every message for stage-completion markers and takes the maximum of
/// the resulting phases. An empty transcript is in
/// [`AnalysisPhase::CollectingData`]. Out-of-order markers cannot move the
/// phase backwards.
pub fn phase_of(messages: &[OrchestrationMessage]) -> AnalysisPhase {
    let mut phase = AnalysisPhase::CollectingData;
    for msg in messages {
        for stage in parse_stage_markers(&msg.content) {
            if let Some(next) = AnalysisPhase::after_stage(&stage) {
                phase = phase.max(next);
            }
        }
    }
    phase
}

/// The group-chat policy object for review-analysis runs.
///
/// All decision methods are pure functions over the message slice they are
/// given; the manager itself only carries configuration.
///
/// # Example
///
/// ```
/// use reviewmind::chat_manager::ReviewChatManager;
/// use reviewmind::orchestration::OrchestrationMessage;
/// use reviewmind::review_team::COLLECTOR_ID;
///
/// let manager = ReviewChatManager::new();
/// let history: Vec<OrchestrationMessage> = Vec::new();
///
/// // An empty run starts with the collector.
/// assert_eq!(manager.select_next_speaker(&history), COLLECTOR_ID);
/// assert!(manager.should_terminate(&history).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ReviewChatManager {
    max_invocations: usize,
}

impl Default for ReviewChatManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewChatManager {
    /// Create a manager with the default invocation cap ([`MAX_INVOCATIONS`]).
    pub fn new() -> Self {
        Self {
            max_invocations: MAX_INVOCATIONS,
        }
    }

    /// Override the invocation cap (builder pattern).
    pub fn with_max_invocations(mut self, max_invocations: usize) -> Self {
        self.max_invocations = max_invocations;
        self
    }

    /// The configured invocation cap.
    pub fn max_invocations(&self) -> usize {
        self.max_invocations
    }

    /// Pick the agent that should speak next.
    ///
    /// Maps the current [`AnalysisPhase`] to its agent. The indeterminate case
    /// (phase is `Done` yet the run was not terminated) falls back to the
    /// collector.
    pub fn select_next_speaker(&self, messages: &[OrchestrationMessage]) -> &'static str {
        phase_of(messages).agent_id().unwrap_or(COLLECTOR_ID)
    }

    /// Decide whether the conversation should stop, and why.
    ///
    /// Checks run in a fixed order; the first that fires wins:
    ///
    /// 1. the invocation cap: the number of assistant messages has reached
    ///    [`max_invocations`](ReviewChatManager::max_invocations);
    /// 2. the exact phrase `Analysis completed` in the last response;
    /// 3. any completion-indicator substring (case-insensitive) in the last
    ///    response;
    /// 4. three or more analysis components named in the last response;
    /// 5. all four core agents have contributed and the synthesizer has spoken;
    /// 6. repetition: of the last four messages, at most two distinct
    ///    contents.
    ///
    /// Checks 2–4 read agent output only. The task prompt routinely names the
    /// pipeline stages, so scanning it would end runs before they start.
    pub fn should_terminate(
        &self,
        messages: &[OrchestrationMessage],
    ) -> Option<TerminationReason> {
        let invocations = messages
            .iter()
            .filter(|m| matches!(m.role, Role::Assistant))
            .count();
        if invocations >= self.max_invocations {
            return Some(TerminationReason::InvocationCapReached);
        }

        let last = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::Assistant))?;

        if last.content.contains(COMPLETION_PHRASE) {
            return Some(TerminationReason::CompletionPhrase);
        }

        let last_lower = last.content.to_lowercase();
        if COMPLETION_INDICATORS
            .iter()
            .any(|indicator| last_lower.contains(indicator))
        {
            return Some(TerminationReason::CompletionIndicator);
        }

        let components_present = ANALYSIS_COMPONENTS
            .iter()
            .filter(|component| last_lower.contains(*component))
            .count();
        if components_present >= 3 {
            return Some(TerminationReason::ComponentsCovered);
        }

        let contributors: HashSet<&str> = messages
            .iter()
            .filter_map(|m| m.agent_id.as_deref())
            .collect();
        let all_core_contributed = [COLLECTOR_ID, TRANSLATOR_ID, SENTIMENT_ID, SYNTHESIZER_ID]
            .iter()
            .all(|id| contributors.contains(id));
        if all_core_contributed && contributors.contains(SYNTHESIZER_ID) {
            return Some(TerminationReason::AllStagesContributed);
        }

        if messages.len() >= STALENESS_WINDOW {
            let tail = &messages[messages.len() - STALENESS_WINDOW..];
            let unique: HashSet<&str> = tail.iter().map(|m| m.content.as_ref()).collect();
            if unique.len() <= 2 {
                return Some(TerminationReason::RepetitionDetected);
            }
        }

        None
    }

    /// Extract the final result from a finished run.
    ///
    /// Returns the last synthesizer-authored message verbatim. When the
    /// synthesizer never spoke, falls back to concatenating every assistant
    /// message prefixed with its author name, so the result is never empty
    /// while any assistant message exists.
    pub fn filter_result(&self, messages: &[OrchestrationMessage]) -> String {
        if let Some(report) = messages
            .iter()
            .rev()
            .find(|m| m.agent_id.as_deref() == Some(SYNTHESIZER_ID))
        {
            return report.content.to_string();
        }

        messages
            .iter()
            .filter(|m| matches!(m.role, Role::Assistant))
            .map(|m| {
                format!(
                    "{}: {}",
                    m.agent_name.as_deref().unwrap_or("assistant"),
                    m.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Decide whether the run should pause and ask the user for direction.
    ///
    /// Applies only once the conversation has grown past ten messages. Fires
    /// when the last four messages all came from one agent, when the last
    /// message asks for clarification, or when the synthesizer is still silent
    /// after fifteen messages.
    pub fn should_request_user_input(
        &self,
        messages: &[OrchestrationMessage],
    ) -> Option<UserInputReason> {
        if messages.len() <= USER_INPUT_THRESHOLD {
            return None;
        }

        let tail = &messages[messages.len() - STALENESS_WINDOW..];
        let speakers: HashSet<&str> = tail.iter().filter_map(|m| m.agent_id.as_deref()).collect();
        if speakers.len() == 1 && tail.iter().all(|m| m.agent_id.is_some()) {
            return Some(UserInputReason::SingleSpeakerStalled);
        }

        if let Some(last) = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::Assistant))
        {
            let last_lower = last.content.to_lowercase();
            if CLARIFICATION_KEYWORDS
                .iter()
                .any(|keyword| last_lower.contains(keyword))
            {
                return Some(UserInputReason::ClarificationRequested);
            }
        }

        if messages.len() > SYNTHESIZER_SILENCE_THRESHOLD
            && !messages
                .iter()
                .any(|m| m.agent_id.as_deref() == Some(SYNTHESIZER_ID))
        {
            return Some(UserInputReason::SynthesizerSilent);
        }

        None
    }
}
