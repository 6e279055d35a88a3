//! Review Team
//!
//! Defines the specialized agents of the review-analysis pipeline and their
//! stage-signalling contract.
//!
//! # The Team
//!
//! Four core agents form the analysis pipeline, in order:
//!
//! 1. **Review Data Collector** (`reviews-collector`): fetches reviews through
//!    the catalog tools and compiles the raw dataset
//! 2. **Review Translator** (`reviews-translator`): renders non-English review
//!    content into English, preserving ratings and meaning
//! 3. **Sentiment Analyst** (`sentiment-analyst`): per-review polarity,
//!    aggregate distribution, recurring themes
//! 4. **Insights Synthesizer** (`insights-synthesizer`): the terminal agent;
//!    merges the prior stages into the final report and closes it with the
//!    exact phrase `Analysis completed`
//!
//! Two standalone agents back the externally-exposed single-agent endpoints:
//! the **Review Summarizer** (`reviews-summarizer`) and the
//! **Product Recommender** (`product-recommender`, wired to the product-search
//! tools).
//!
//! # Stage Markers
//!
//! Agent coordination is driven by structured markers in agent output rather
//! than free-text keyword detection. Each core agent is instructed to end a
//! finished stage with `[STAGE_COMPLETE:<stage>]` where `<stage>` is one of
//! `collection`, `translation`, `sentiment`, or `synthesis`. In the hand-off
//! topology an agent may pass control explicitly with `[HANDOFF:<agent-id>]`.
//! Markers are parsed with plain string scanning ([`parse_stage_markers`],
//! [`parse_handoff_target`]); no second LLM call is needed to decide who
//! speaks next.
//!
//! # Instructions Survive Forking
//!
//! [`Agent::fork`] gives a fresh, empty session, so a forked agent loses its
//! live system prompt. Each constructor therefore stores the role instructions
//! in agent metadata under [`INSTRUCTIONS_METADATA_KEY`](crate::orchestration::INSTRUCTIONS_METADATA_KEY)
//! as well as applying them to the live session. Orchestration setup and
//! [`apply_instructions`] re-apply them from metadata after a fork.

use crate::reviewmind::agent::Agent;
use crate::reviewmind::client_wrapper::ClientWrapper;
use crate::reviewmind::orchestration::INSTRUCTIONS_METADATA_KEY;
use crate::reviewmind::tool_protocol::ToolRegistry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Agent id of the review data collector.
pub const COLLECTOR_ID: &str = "reviews-collector";
/// Agent id of the review translator.
pub const TRANSLATOR_ID: &str = "reviews-translator";
/// Agent id of the sentiment analyst.
pub const SENTIMENT_ID: &str = "sentiment-analyst";
/// Agent id of the insights synthesizer (the terminal agent).
pub const SYNTHESIZER_ID: &str = "insights-synthesizer";
/// Agent id of the standalone review summarizer.
pub const SUMMARIZER_ID: &str = "reviews-summarizer";
/// Agent id of the standalone product recommender.
pub const RECOMMENDER_ID: &str = "product-recommender";

/// The four pipeline agents in stage order.
pub const CORE_AGENT_IDS: [&str; 4] = [COLLECTOR_ID, TRANSLATOR_ID, SENTIMENT_ID, SYNTHESIZER_ID];

/// Stage name emitted by the collector.
pub const STAGE_COLLECTION: &str = "collection";
/// Stage name emitted by the translator.
pub const STAGE_TRANSLATION: &str = "translation";
/// Stage name emitted by the sentiment analyst.
pub const STAGE_SENTIMENT: &str = "sentiment";
/// Stage name emitted by the synthesizer.
pub const STAGE_SYNTHESIS: &str = "synthesis";

/// Opening delimiter of a stage-completion marker, e.g. `[STAGE_COMPLETE:collection]`.
pub const STAGE_MARKER_PREFIX: &str = "[STAGE_COMPLETE:";
/// Opening delimiter of a hand-off marker, e.g. `[HANDOFF:reviews-translator]`.
pub const HANDOFF_MARKER_PREFIX: &str = "[HANDOFF:";

/// Exact phrase the terminal agent uses to close the final report.
///
/// The chat manager terminates the run immediately when the last message
/// contains this phrase.
pub const COMPLETION_PHRASE: &str = "Analysis completed";

/// Render a stage-completion marker for `stage`.
pub fn stage_marker(stage: &str) -> String {
    format!("{}{}]", STAGE_MARKER_PREFIX, stage)
}

/// Render a hand-off marker targeting `agent_id`.
pub fn handoff_marker(agent_id: &str) -> String {
    format!("{}{}]", HANDOFF_MARKER_PREFIX, agent_id)
}

/// Scan a message for `[STAGE_COMPLETE:xxx]` markers, returning the stage names found.
///
/// Uses simple string scanning (no regex). Multiple markers in the same
/// message are supported; an agent may close more than one stage at once.
///
/// # Examples
///
/// ```
/// use reviewmind::review_team::parse_stage_markers;
///
/// let stages = parse_stage_markers("Dataset ready. [STAGE_COMPLETE:collection]");
/// assert_eq!(stages, vec!["collection".to_string()]);
/// ```
pub fn parse_stage_markers(text: &str) -> Vec<String> {
    let mut results = Vec::new();
    let mut search_from = 0;
    while let Some(start) = text[search_from..].find(STAGE_MARKER_PREFIX) {
        let abs_start = search_from + start + STAGE_MARKER_PREFIX.len();
        if let Some(end) = text[abs_start..].find(']') {
            let stage = text[abs_start..abs_start + end].trim().to_string();
            if !stage.is_empty() {
                results.push(stage);
            }
            search_from = abs_start + end + 1;
        } else {
            break;
        }
    }
    results
}

/// Scan a message for `[HANDOFF:xxx]` markers, returning the last target found.
///
/// The last marker wins: when an agent revises its decision mid-message, the
/// final hand-off is the one that holds. Returns `None` when no well-formed
/// marker is present.
pub fn parse_handoff_target(text: &str) -> Option<String> {
    let mut target = None;
    let mut search_from = 0;
    while let Some(start) = text[search_from..].find(HANDOFF_MARKER_PREFIX) {
        let abs_start = search_from + start + HANDOFF_MARKER_PREFIX.len();
        if let Some(end) = text[abs_start..].find(']') {
            let id = text[abs_start..abs_start + end].trim();
            if !id.is_empty() {
                target = Some(id.to_string());
            }
            search_from = abs_start + end + 1;
        } else {
            break;
        }
    }
    target
}

/// Remove stage and hand-off markers from agent output.
///
/// The markers are internal routing signals between agents and the chat
/// manager. Text that leaves the crate (REST reports, A2A replies) is run
/// through this first so callers never see them. Unclosed markers are left
/// as written.
pub fn strip_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let stage = rest.find(STAGE_MARKER_PREFIX);
        let handoff = rest.find(HANDOFF_MARKER_PREFIX);
        let start = match (stage, handoff) {
            (Some(s), Some(h)) => s.min(h),
            (Some(s), None) => s,
            (None, Some(h)) => h,
            (None, None) => break,
        };
        out.push_str(&rest[..start]);
        match rest[start..].find(']') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    let lines: Vec<&str> = out.lines().map(|line| line.trim_end()).collect();
    lines.join("\n").trim_end().to_string()
}

/// Re-apply an agent's role instructions from metadata to its live session.
///
/// No-op when the agent carries no stored instructions. Call this after
/// [`Agent::fork`] when using a team agent outside an orchestration (the
/// orchestration setup does the equivalent itself).
pub fn apply_instructions(agent: &mut Agent) {
    if let Some(instructions) = agent.metadata.get(INSTRUCTIONS_METADATA_KEY).cloned() {
        agent.set_system_prompt(&instructions);
    }
}

fn collector_instructions() -> String {
    format!(
        "You collect the raw customer review dataset for one product.\n\
         \n\
         Use the get_product_reviews tool to fetch every review and the \
         get_review_stats tool for the aggregate numbers. Compile the complete \
         dataset: review count, rating distribution, languages present, and each \
         review's author, rating, language, and full text.\n\
         \n\
         Report the data faithfully. Do not translate, analyze, or editorialize.\n\
         When the dataset is complete, end your message with {}.",
        stage_marker(STAGE_COLLECTION)
    )
}

fn translator_instructions() -> String {
    format!(
        "You translate customer reviews into English.\n\
         \n\
         Work through the collected dataset: leave English reviews untouched and \
         translate every other review into natural English, preserving the \
         author, the rating, and the meaning. Note each translated review's \
         original language. Do not add commentary or analysis.\n\
         \n\
         When every review is available in English, end your message with {}.",
        stage_marker(STAGE_TRANSLATION)
    )
}

fn sentiment_instructions() -> String {
    format!(
        "You analyze customer sentiment across a set of reviews.\n\
         \n\
         Classify each review as positive, negative, neutral, or mixed, then \
         report the overall distribution and the recurring themes: what \
         customers praise and what they complain about, quoting short passages \
         as evidence. Stay grounded in the review text; do not speculate beyond \
         it.\n\
         \n\
         When the sentiment analysis is complete, end your message with {}.",
        stage_marker(STAGE_SENTIMENT)
    )
}

fn synthesizer_instructions() -> String {
    format!(
        "You write the final review-analysis report for a product.\n\
         \n\
         Merge the collected data, translations, and sentiment analysis from the \
         conversation into one report covering: the overall verdict with rating \
         context, the main strengths, the main complaints, one or two notable \
         customer quotes, and a buying recommendation. Be structured and \
         decisive; do not introduce findings absent from the prior stages.\n\
         \n\
         Close the report with the line \"{}\" followed by {}.",
        COMPLETION_PHRASE,
        stage_marker(STAGE_SYNTHESIS)
    )
}

fn summarizer_instructions() -> String {
    "You summarize customer review text.\n\
     \n\
     Condense the provided reviews into a short summary (three to five \
     sentences) that preserves the balance of opinion, the rating context, and \
     the most-mentioned specifics. Never invent details that are not in the \
     text."
        .to_string()
}

fn recommender_instructions() -> String {
    "You recommend alternative products from the catalog.\n\
     \n\
     Use the hybrid_search_products tool to find candidate products for the \
     customer's need, and the compare_products tool for a side-by-side rating \
     comparison when you have two or more candidates. Recommend one to three \
     products, each with a concrete reason grounded in its ratings or reviews."
        .to_string()
}

/// Build the review data collector agent.
///
/// Grant it the review-catalog tools via [`Agent::with_shared_tools`] (or use
/// [`ReviewTeam::with_catalog_tools`]) so it can actually fetch reviews.
pub fn data_collector(client: Arc<dyn ClientWrapper>) -> Agent {
    let instructions = collector_instructions();
    let mut agent = Agent::new(COLLECTOR_ID, "Review Data Collector", client)
        .with_expertise("Product review retrieval and dataset preparation")
        .with_personality("Methodical and exhaustive")
        .with_metadata(
            "description",
            "Collects and prepares customer review data for analysis",
        )
        .with_metadata(INSTRUCTIONS_METADATA_KEY, instructions.clone());
    agent.set_system_prompt(&instructions);
    agent
}

/// Build the review translator agent.
pub fn translator(client: Arc<dyn ClientWrapper>) -> Agent {
    let instructions = translator_instructions();
    let mut agent = Agent::new(TRANSLATOR_ID, "Review Translator", client)
        .with_expertise("Multilingual translation of customer feedback")
        .with_personality("Precise and faithful to the source")
        .with_metadata("description", "Translates customer reviews into English")
        .with_metadata(INSTRUCTIONS_METADATA_KEY, instructions.clone());
    agent.set_system_prompt(&instructions);
    agent
}

/// Build the sentiment analyst agent.
pub fn sentiment_analyst(client: Arc<dyn ClientWrapper>) -> Agent {
    let instructions = sentiment_instructions();
    let mut agent = Agent::new(SENTIMENT_ID, "Sentiment Analyst", client)
        .with_expertise("Customer sentiment and emotional tone analysis")
        .with_personality("Measured and evidence-driven")
        .with_metadata(
            "description",
            "Analyzes sentiment and themes across customer reviews",
        )
        .with_metadata(INSTRUCTIONS_METADATA_KEY, instructions.clone());
    agent.set_system_prompt(&instructions);
    agent
}

/// Build the insights synthesizer, the terminal agent of every topology.
///
/// Its report closes with the exact phrase [`COMPLETION_PHRASE`], which the
/// chat manager treats as an immediate termination signal.
pub fn insights_synthesizer(client: Arc<dyn ClientWrapper>) -> Agent {
    let instructions = synthesizer_instructions();
    let mut agent = Agent::new(SYNTHESIZER_ID, "Insights Synthesizer", client)
        .with_expertise("Executive reporting and insight synthesis")
        .with_personality("Structured and decisive")
        .with_metadata(
            "description",
            "Synthesizes the analysis stages into a final report",
        )
        .with_metadata(INSTRUCTIONS_METADATA_KEY, instructions.clone());
    agent.set_system_prompt(&instructions);
    agent
}

/// Build the standalone review summarizer agent.
pub fn summarizer(client: Arc<dyn ClientWrapper>) -> Agent {
    let instructions = summarizer_instructions();
    let mut agent = Agent::new(SUMMARIZER_ID, "Review Summarizer", client)
        .with_expertise("Concise summarization of customer feedback")
        .with_personality("Brief and neutral")
        .with_metadata(
            "description",
            "Produces concise summaries of customer review text",
        )
        .with_metadata(INSTRUCTIONS_METADATA_KEY, instructions.clone());
    agent.set_system_prompt(&instructions);
    agent
}

/// Build the standalone product recommender agent.
///
/// Give it the product-search tools (either the local registry or a remote
/// MCP server via `McpClientProtocol`) so `hybrid_search_products` and
/// `compare_products` are callable.
pub fn recommender(client: Arc<dyn ClientWrapper>) -> Agent {
    let instructions = recommender_instructions();
    let mut agent = Agent::new(RECOMMENDER_ID, "Product Recommender", client)
        .with_expertise("Alternative product discovery and comparison")
        .with_personality("Practical and comparative")
        .with_metadata(
            "description",
            "Recommends alternative products using catalog search",
        )
        .with_metadata(INSTRUCTIONS_METADATA_KEY, instructions.clone());
    agent.set_system_prompt(&instructions);
    agent
}

/// The four-agent analysis team, bundled in pipeline order.
///
/// Every orchestration run should work on a fresh [`fork`](ReviewTeam::fork)
/// of the team so no conversation state crosses runs.
pub struct ReviewTeam {
    pub collector: Agent,
    pub translator: Agent,
    pub sentiment: Agent,
    pub synthesizer: Agent,
}

impl ReviewTeam {
    /// Build the team over a shared LLM client.
    pub fn new(client: Arc<dyn ClientWrapper>) -> Self {
        Self {
            collector: data_collector(Arc::clone(&client)),
            translator: translator(Arc::clone(&client)),
            sentiment: sentiment_analyst(Arc::clone(&client)),
            synthesizer: insights_synthesizer(client),
        }
    }

    /// Wire the collector to a shared tool registry carrying the
    /// review-catalog tools.
    pub fn with_catalog_tools(mut self, registry: Arc<RwLock<ToolRegistry>>) -> Self {
        self.collector = self.collector.with_shared_tools(registry);
        self
    }

    /// Fork every agent for an isolated run.
    ///
    /// Forked agents keep their identity, metadata (including stored
    /// instructions), tools, and event handler, but start with empty sessions.
    pub fn fork(&self) -> Self {
        Self {
            collector: self.collector.fork(),
            translator: self.translator.fork(),
            sentiment: self.sentiment.fork(),
            synthesizer: self.synthesizer.fork(),
        }
    }

    /// Consume the team, yielding the agents in pipeline order.
    pub fn into_agents(self) -> Vec<Agent> {
        vec![
            self.collector,
            self.translator,
            self.sentiment,
            self.synthesizer,
        ]
    }
}
