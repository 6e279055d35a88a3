//! Review Analysis Service
//!
//! The façade that turns "analyze product N" into a finished report. It owns
//! the shared review catalog, the template agent team, and the run settings;
//! every call forks fresh agents so concurrent analyses never share session
//! state.
//!
//! # Analysis flow
//!
//! 1. Resolve the product and its reviews from the catalog
//! 2. Build the task prompt (input transform, overridable)
//! 3. Fork the team and run the orchestration under the configured deadline
//! 4. Filter the transcript down to the final report (result transform, overridable)
//! 5. Wrap the text in an [`AnalysisReport`] with a timestamp
//!
//! The service also backs the single-agent A2A endpoints:
//! [`collect`](ReviewAnalysisService::collect),
//! [`summarize`](ReviewAnalysisService::summarize),
//! [`sentiment`](ReviewAnalysisService::sentiment) and
//! [`recommend`](ReviewAnalysisService::recommend) each fork one template
//! agent for a single round-trip.
//!
//! # Example
//!
//! ```rust,no_run
//! use reviewmind::clients::openai::OpenAIClient;
//! use reviewmind::config::ReviewMindConfig;
//! use reviewmind::orchestration::OrchestrationMode;
//! use reviewmind::service::ReviewAnalysisService;
//! use reviewmind::tools::ReviewCatalog;
//! use std::sync::Arc;
//!
//! # async {
//! let client = Arc::new(OpenAIClient::new_with_model_string("key", "gpt-4o-mini"));
//! let catalog = Arc::new(ReviewCatalog::with_demo_data());
//!
//! let service = ReviewAnalysisService::new(client, catalog, ReviewMindConfig::default())
//!     .await
//!     .unwrap();
//!
//! let report = service.analyze(1001, OrchestrationMode::HandOff).await.unwrap();
//! println!("{}", report.analysis);
//! # };
//! ```

use crate::reviewmind::agent::Agent;
use crate::reviewmind::chat_manager::ReviewChatManager;
use crate::reviewmind::client_wrapper::ClientWrapper;
use crate::reviewmind::config::ReviewMindConfig;
use crate::reviewmind::event::EventHandler;
use crate::reviewmind::orchestration::{
    Orchestration, OrchestrationMode, OrchestrationResponse, RunContext, TerminationReason,
};
use crate::reviewmind::review_team::{self, apply_instructions, strip_markers, ReviewTeam};
use crate::reviewmind::tool_protocol::ToolRegistry;
use crate::reviewmind::tool_protocols::{ProductSearchProtocol, ReviewCatalogProtocol};
use crate::reviewmind::tools::{Product, ProductReview, ProductSearch, ReviewCatalog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Builds the task prompt handed to the orchestration for one analysis run.
///
/// Receives the resolved product and its reviews; returns the user-role
/// message that opens the run. The default names the product and the review
/// mix but leaves fetching the full dataset to the collector's tools.
pub type InputTransform = Arc<dyn Fn(&Product, &[ProductReview]) -> String + Send + Sync>;

/// Reduces a finished orchestration run to the analysis text returned to callers.
///
/// The default takes the synthesizer's last message verbatim (falling back to
/// a concatenated transcript) and strips the internal routing markers.
pub type ResultTransform = Arc<dyn Fn(&OrchestrationResponse) -> String + Send + Sync>;

/// Extra wall-clock room the hard timeout gets over the in-run deadline.
///
/// The run-context deadline ends a run at a turn boundary, so a turn already
/// in flight when it expires must be allowed to come back. The outer timeout
/// only fires when a provider call hangs outright.
const DEADLINE_GRACE: Duration = Duration::from_secs(10);

/// Errors surfaced by [`ReviewAnalysisService`] operations.
#[derive(Debug)]
pub enum ServiceError {
    /// No product with the given id exists in the catalog.
    ProductNotFound(u64),
    /// The requested orchestration type matched no known mode.
    UnsupportedMode(String),
    /// The run did not finish within the configured deadline.
    Timeout,
    /// The orchestration engine failed mid-run.
    Orchestration(String),
    /// A standalone agent call failed.
    Agent(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::ProductNotFound(id) => write!(f, "Product not found: {}", id),
            ServiceError::UnsupportedMode(value) => {
                write!(f, "Unsupported orchestration type: {}", value)
            }
            ServiceError::Timeout => write!(f, "Analysis timed out"),
            ServiceError::Orchestration(msg) => write!(f, "Orchestration failed: {}", msg),
            ServiceError::Agent(msg) => write!(f, "Agent failed: {}", msg),
        }
    }
}

impl Error for ServiceError {}

/// The finished product of one analysis run.
///
/// Field names serialize in PascalCase to match the response contract of the
/// storefront clients (`ProductId`, `Analysis`, `GeneratedAt`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(rename = "ProductId")]
    pub product_id: u64,
    #[serde(rename = "Analysis")]
    pub analysis: String,
    #[serde(rename = "GeneratedAt")]
    pub generated_at: DateTime<Utc>,
}

/// Review Analysis Service
///
/// Holds everything one deployment needs to serve analysis requests: the LLM
/// client (inside the template agents), the shared [`ReviewCatalog`], the
/// tool registries the agents draw on, and the [`ReviewMindConfig`] run
/// settings. Construct once, share behind an `Arc`, and call from any number
/// of request handlers.
pub struct ReviewAnalysisService {
    catalog: Arc<ReviewCatalog>,
    team: ReviewTeam,
    summarizer: Agent,
    recommender: Agent,
    config: ReviewMindConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
    input_transform: Option<InputTransform>,
    result_transform: Option<ResultTransform>,
}

impl ReviewAnalysisService {
    /// Build a service over a catalog.
    ///
    /// Wires the collector to the catalog's review tools and the recommender
    /// to a catalog-backed product search. Async because tool discovery runs
    /// against the protocol adapters at registration time.
    pub async fn new(
        client: Arc<dyn ClientWrapper>,
        catalog: Arc<ReviewCatalog>,
        config: ReviewMindConfig,
    ) -> Result<Self, ServiceError> {
        let mut catalog_registry = ToolRegistry::empty();
        catalog_registry
            .add_protocol(
                "review-catalog",
                Arc::new(ReviewCatalogProtocol::new(Arc::clone(&catalog))),
            )
            .await
            .map_err(|e| ServiceError::Agent(format!("catalog tools unavailable: {}", e)))?;
        let catalog_tools = Arc::new(RwLock::new(catalog_registry));

        let mut search_registry = ToolRegistry::empty();
        search_registry
            .add_protocol(
                "product-search",
                Arc::new(ProductSearchProtocol::new(Arc::new(ProductSearch::new(
                    Arc::clone(&catalog),
                )))),
            )
            .await
            .map_err(|e| ServiceError::Agent(format!("search tools unavailable: {}", e)))?;
        let search_tools = Arc::new(RwLock::new(search_registry));

        let team = ReviewTeam::new(Arc::clone(&client)).with_catalog_tools(catalog_tools);
        let summarizer = review_team::summarizer(Arc::clone(&client));
        let recommender = review_team::recommender(client).with_shared_tools(search_tools);

        Ok(Self {
            catalog,
            team,
            summarizer,
            recommender,
            config,
            event_handler: None,
            input_transform: None,
            result_transform: None,
        })
    }

    /// Attach an event handler to every template agent (and, through them,
    /// every fork) plus the orchestrations built per run.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.team.collector.set_event_handler(Arc::clone(&handler));
        self.team.translator.set_event_handler(Arc::clone(&handler));
        self.team.sentiment.set_event_handler(Arc::clone(&handler));
        self.team.synthesizer.set_event_handler(Arc::clone(&handler));
        self.summarizer.set_event_handler(Arc::clone(&handler));
        self.recommender.set_event_handler(Arc::clone(&handler));
        self.event_handler = Some(handler);
        self
    }

    /// Replace the default task-prompt builder.
    pub fn with_input_transform(
        mut self,
        transform: impl Fn(&Product, &[ProductReview]) -> String + Send + Sync + 'static,
    ) -> Self {
        self.input_transform = Some(Arc::new(transform));
        self
    }

    /// Replace the default transcript-to-report reduction.
    ///
    /// Custom transforms receive the raw run, markers included, and their
    /// output is returned to callers as-is.
    pub fn with_result_transform(
        mut self,
        transform: impl Fn(&OrchestrationResponse) -> String + Send + Sync + 'static,
    ) -> Self {
        self.result_transform = Some(Arc::new(transform));
        self
    }

    /// The catalog this service analyzes.
    pub fn catalog(&self) -> &Arc<ReviewCatalog> {
        &self.catalog
    }

    /// The run settings this service was built with.
    pub fn config(&self) -> &ReviewMindConfig {
        &self.config
    }

    /// Run a full multi-agent analysis of one product's reviews.
    ///
    /// Fails with [`ServiceError::ProductNotFound`] before any LLM call when
    /// the product id is unknown. A run that outlives the configured deadline
    /// fails with [`ServiceError::Timeout`], whether the cutoff landed on a
    /// turn boundary or mid-call.
    pub async fn analyze(
        &self,
        product_id: u64,
        mode: OrchestrationMode,
    ) -> Result<AnalysisReport, ServiceError> {
        let product = self
            .catalog
            .product(product_id)
            .ok_or(ServiceError::ProductNotFound(product_id))?;
        let reviews = self.catalog.reviews_for(product_id).unwrap_or_default();
        log::info!(
            "analysis requested: product {} ({}), {} reviews, mode {}",
            product_id,
            product.name,
            reviews.len(),
            mode
        );

        let prompt = match &self.input_transform {
            Some(transform) => transform(&product, &reviews),
            None => default_task_prompt(&product, &reviews),
        };

        let mut orchestration = Orchestration::new(
            format!("review-analysis-{}", product_id),
            format!("Review analysis: {}", product.name),
        )
        .with_mode(mode)
        .with_max_invocations(self.config.max_invocations);
        if let Some(handler) = &self.event_handler {
            orchestration = orchestration.with_event_handler(Arc::clone(handler));
        }
        for agent in self.team.fork().into_agents() {
            orchestration
                .add_agent(agent)
                .map_err(|e| ServiceError::Orchestration(e.to_string()))?;
        }

        let ctx = RunContext::new().with_timeout(self.config.run_timeout);
        let run = tokio::time::timeout(
            self.config.run_timeout + DEADLINE_GRACE,
            orchestration.run_with_context(&prompt, ctx),
        )
        .await
        .map_err(|_| ServiceError::Timeout)?
        .map_err(|e| ServiceError::Orchestration(e.to_string()))?;

        if run.termination == Some(TerminationReason::DeadlineExceeded) {
            return Err(ServiceError::Timeout);
        }
        log::debug!(
            "analysis run finished: product {}, {} turns, {} tokens, complete={}",
            product_id,
            run.turns,
            run.total_tokens_used,
            run.is_complete
        );

        let analysis = match &self.result_transform {
            Some(transform) => transform(&run),
            None => strip_markers(&ReviewChatManager::new().filter_result(&run.messages)),
        };
        if analysis.is_empty() {
            return Err(ServiceError::Orchestration(
                "run produced no analyzable output".into(),
            ));
        }

        Ok(AnalysisReport {
            product_id,
            analysis,
            generated_at: Utc::now(),
        })
    }

    /// Fetch and describe the review dataset matching a free-form request.
    ///
    /// Single round-trip through a forked collector; backs the A2A `/reviews`
    /// endpoint.
    pub async fn collect(&self, query: &str) -> Result<String, ServiceError> {
        let prompt = format!("Fetch the review dataset for this request: {}", query);
        self.run_standalone(&self.team.collector, &prompt).await
    }

    /// Summarize review text into a few sentences.
    pub async fn summarize(&self, text: &str) -> Result<String, ServiceError> {
        let prompt = format!("Customer reviews to summarize:\n\n{}", text);
        self.run_standalone(&self.summarizer, &prompt).await
    }

    /// Classify the sentiment of review text.
    pub async fn sentiment(&self, text: &str) -> Result<String, ServiceError> {
        let prompt = format!("Review text to classify:\n\n{}", text);
        self.run_standalone(&self.team.sentiment, &prompt).await
    }

    /// Recommend products for a customer request, searching the catalog.
    pub async fn recommend(&self, query: &str) -> Result<String, ServiceError> {
        let prompt = format!("Customer request: {}", query);
        self.run_standalone(&self.recommender, &prompt).await
    }

    /// One forked-agent round-trip under the service deadline.
    async fn run_standalone(
        &self,
        template: &Agent,
        prompt: &str,
    ) -> Result<String, ServiceError> {
        let mut agent = template.fork();
        apply_instructions(&mut agent);
        let response = tokio::time::timeout(self.config.run_timeout, agent.send(prompt))
            .await
            .map_err(|_| ServiceError::Timeout)?
            .map_err(|e| ServiceError::Agent(e.to_string()))?;
        Ok(strip_markers(&response.content))
    }
}

/// Default task prompt: name the product and the shape of its review set,
/// leaving the full fetch to the collector's tools.
fn default_task_prompt(product: &Product, reviews: &[ProductReview]) -> String {
    let summary = if reviews.is_empty() {
        "No reviews have been submitted yet.".to_string()
    } else {
        let languages: BTreeSet<&str> = reviews.iter().map(|r| r.language.as_str()).collect();
        format!(
            "{} reviews on file, languages: {}.",
            reviews.len(),
            languages.into_iter().collect::<Vec<_>>().join(", ")
        )
    };
    format!(
        "Analyze the customer reviews for product {}: \"{}\" in category {}. {}\n\n\
         Produce a final report covering overall sentiment, recurring praise and \
         complaints, and a recommendation on whether the product page needs attention.",
        product.id, product.name, product.category, summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reviewmind::client_wrapper::{Message, SendError};
    use async_trait::async_trait;

    struct NoCallClient;

    #[async_trait]
    impl ClientWrapper for NoCallClient {
        fn model_name(&self) -> &str {
            "test-model"
        }

        async fn send_message(&self, _messages: &[Message]) -> Result<Message, SendError> {
            Err("no LLM calls expected in this test".into())
        }
    }

    fn sample_product() -> Product {
        Product {
            id: 1001,
            name: "AeroSound Max Wireless Headphones".to_string(),
            description: "Over-ear wireless headphones".to_string(),
            category: "Audio".to_string(),
            price_cents: 24_999,
        }
    }

    fn sample_review(id: u64, language: &str) -> ProductReview {
        ProductReview {
            id,
            product_id: 1001,
            author: format!("customer-{}", id),
            rating: 4,
            title: "Solid".to_string(),
            body: "Does what it says.".to_string(),
            language: language.to_string(),
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn analyze_rejects_unknown_products() {
        let service = ReviewAnalysisService::new(
            Arc::new(NoCallClient),
            Arc::new(ReviewCatalog::new()),
            ReviewMindConfig::default(),
        )
        .await
        .expect("service construction");

        let err = service
            .analyze(42, OrchestrationMode::Sequential)
            .await
            .expect_err("no products seeded");
        assert!(matches!(err, ServiceError::ProductNotFound(42)));
    }

    #[test]
    fn default_prompt_names_product_and_review_mix() {
        let product = sample_product();
        let reviews = vec![sample_review(1, "en"), sample_review(2, "es")];

        let prompt = default_task_prompt(&product, &reviews);
        assert!(prompt.contains("1001"));
        assert!(prompt.contains("AeroSound Max Wireless Headphones"));
        assert!(prompt.contains("2 reviews on file"));
        assert!(prompt.contains("en, es"));
    }

    #[test]
    fn default_prompt_flags_empty_review_sets() {
        let prompt = default_task_prompt(&sample_product(), &[]);
        assert!(prompt.contains("No reviews have been submitted yet."));
    }

    #[test]
    fn report_serializes_with_pascal_case_keys() {
        let report = AnalysisReport {
            product_id: 7,
            analysis: "All quiet.".to_string(),
            generated_at: Utc::now(),
        };

        let value = serde_json::to_value(&report).expect("serializable");
        assert!(value.get("ProductId").is_some());
        assert!(value.get("Analysis").is_some());
        assert!(value.get("GeneratedAt").is_some());
        assert!(value.get("product_id").is_none());
    }

    #[test]
    fn service_error_display_is_specific() {
        assert_eq!(
            ServiceError::ProductNotFound(9).to_string(),
            "Product not found: 9"
        );
        assert_eq!(
            ServiceError::UnsupportedMode("magic".to_string()).to_string(),
            "Unsupported orchestration type: magic"
        );
        assert_eq!(ServiceError::Timeout.to_string(), "Analysis timed out");
    }
}
