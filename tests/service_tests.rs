use async_trait::async_trait;
use reviewmind::client_wrapper::{ClientWrapper, Message, Role, SendError};
use reviewmind::config::ReviewMindConfig;
use reviewmind::orchestration::OrchestrationMode;
use reviewmind::service::{ReviewAnalysisService, ServiceError};
use reviewmind::tools::ReviewCatalog;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct MockClient {
    response: String,
}

#[async_trait]
impl ClientWrapper for MockClient {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn send_message(&self, _messages: &[Message]) -> Result<Message, SendError> {
        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(self.response.as_str()),
        })
    }
}

/// Replays its scripted responses in call order across all agents that share
/// it, repeating the last entry once the script runs out.
struct ScriptedClient {
    responses: Vec<String>,
    cursor: Mutex<usize>,
}

impl ScriptedClient {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|s| s.to_string()).collect(),
            cursor: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ClientWrapper for ScriptedClient {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn send_message(&self, _messages: &[Message]) -> Result<Message, SendError> {
        let mut cursor = self.cursor.lock().await;
        let idx = (*cursor).min(self.responses.len() - 1);
        *cursor += 1;
        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(self.responses[idx].as_str()),
        })
    }
}

/// Records the prompt of every call it receives, then answers with a fixed
/// response.
struct RecordingClient {
    response: String,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ClientWrapper for RecordingClient {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn send_message(&self, messages: &[Message]) -> Result<Message, SendError> {
        if let Some(last) = messages.last() {
            self.prompts.lock().await.push(last.content.to_string());
        }
        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(self.response.as_str()),
        })
    }
}

struct FailingClient;

#[async_trait]
impl ClientWrapper for FailingClient {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn send_message(&self, _messages: &[Message]) -> Result<Message, SendError> {
        Err("provider unavailable".into())
    }
}

fn pipeline_script() -> Vec<&'static str> {
    vec![
        "Collected 5 reviews from the catalog. [STAGE_COMPLETE:collection]",
        "Spanish, German, and French reviews now in English. [STAGE_COMPLETE:translation]",
        "Four positive, one negative on comfort. [STAGE_COMPLETE:sentiment]",
        "Analysis completed. Customers love the headphones; highlight battery life on the page. [STAGE_COMPLETE:synthesis]",
    ]
}

async fn demo_service(client: Arc<dyn ClientWrapper>) -> ReviewAnalysisService {
    ReviewAnalysisService::new(
        client,
        Arc::new(ReviewCatalog::with_demo_data()),
        ReviewMindConfig::default(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_analyze_hand_off_returns_stripped_report() {
    let client = Arc::new(ScriptedClient::new(&pipeline_script()));
    let service = demo_service(client).await;

    let report = service
        .analyze(1001, OrchestrationMode::HandOff)
        .await
        .unwrap();

    assert_eq!(report.product_id, 1001);
    // The synthesizer's message, with the routing marker stripped off.
    assert_eq!(
        report.analysis,
        "Analysis completed. Customers love the headphones; highlight battery life on the page."
    );
}

#[tokio::test]
async fn test_analyze_group_chat_returns_stripped_report() {
    let client = Arc::new(ScriptedClient::new(&pipeline_script()));
    let service = demo_service(client).await;

    let report = service
        .analyze(1001, OrchestrationMode::GroupChat)
        .await
        .unwrap();

    assert_eq!(report.product_id, 1001);
    assert!(report.analysis.starts_with("Analysis completed."));
    assert!(!report.analysis.contains("[STAGE_COMPLETE:"));
}

#[tokio::test]
async fn test_analyze_sequential_returns_synthesizer_text() {
    let client = Arc::new(MockClient {
        response: "stage noted".to_string(),
    });
    let service = demo_service(client).await;

    let report = service
        .analyze(1002, OrchestrationMode::Sequential)
        .await
        .unwrap();

    // Every agent said the same thing; the synthesizer's copy wins.
    assert_eq!(report.product_id, 1002);
    assert_eq!(report.analysis, "stage noted");
}

#[tokio::test]
async fn test_analyze_rejects_unknown_product_before_any_llm_call() {
    let service = demo_service(Arc::new(FailingClient)).await;

    let err = service
        .analyze(42, OrchestrationMode::HandOff)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ProductNotFound(42)));
}

#[tokio::test]
async fn test_analyze_times_out_on_expired_deadline() {
    let config = ReviewMindConfig {
        run_timeout: Duration::from_secs(0),
        ..ReviewMindConfig::default()
    };
    // A zero deadline must cut the run before the first turn, so a client
    // call would be a bug in itself.
    let service = ReviewAnalysisService::new(
        Arc::new(FailingClient),
        Arc::new(ReviewCatalog::with_demo_data()),
        config,
    )
    .await
    .unwrap();

    let err = service
        .analyze(1001, OrchestrationMode::HandOff)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Timeout));
}

#[tokio::test]
async fn test_input_transform_controls_the_prompt() {
    let client = Arc::new(RecordingClient {
        response: "noted".to_string(),
        prompts: Mutex::new(Vec::new()),
    });
    let service = demo_service(client.clone())
        .await
        .with_input_transform(|product, reviews| {
            format!("CUSTOM TASK {} {}", product.id, reviews.len())
        });

    service
        .analyze(1001, OrchestrationMode::Sequential)
        .await
        .unwrap();

    let prompts = client.prompts.lock().await;
    assert_eq!(prompts.len(), 4); // one turn per team agent
    assert!(prompts.iter().all(|p| p == "CUSTOM TASK 1001 5"));
    assert!(!prompts.iter().any(|p| p.contains("Analyze the customer reviews")));
}

#[tokio::test]
async fn test_result_transform_overrides_reduction() {
    let client = Arc::new(MockClient {
        response: "stage noted".to_string(),
    });
    let service = demo_service(client)
        .await
        .with_result_transform(|run| format!("turns={}", run.turns));

    let report = service
        .analyze(1003, OrchestrationMode::Sequential)
        .await
        .unwrap();
    assert_eq!(report.analysis, "turns=4");
}

#[tokio::test]
async fn test_empty_analysis_is_an_error() {
    let client = Arc::new(MockClient {
        response: "stage noted".to_string(),
    });
    let service = demo_service(client)
        .await
        .with_result_transform(|_| String::new());

    let err = service
        .analyze(1004, OrchestrationMode::Sequential)
        .await
        .unwrap_err();
    match err {
        ServiceError::Orchestration(msg) => assert!(msg.contains("no analyzable output")),
        other => panic!("expected Orchestration error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_standalone_endpoints_strip_markers() {
    let client = Arc::new(MockClient {
        response: "Done. [STAGE_COMPLETE:sentiment] [HANDOFF:insights-synthesizer]".to_string(),
    });
    let service = demo_service(client).await;

    assert_eq!(service.collect("reviews for product 1001").await.unwrap(), "Done.");
    assert_eq!(service.summarize("Great phone. Bad charger.").await.unwrap(), "Done.");
    assert_eq!(service.sentiment("I love it").await.unwrap(), "Done.");
    assert_eq!(service.recommend("quiet headphones").await.unwrap(), "Done.");
}

#[tokio::test]
async fn test_standalone_agent_failure_maps_to_agent_error() {
    let service = demo_service(Arc::new(FailingClient)).await;

    let err = service.summarize("anything").await.unwrap_err();
    match err {
        ServiceError::Agent(msg) => assert!(msg.contains("provider unavailable")),
        other => panic!("expected Agent error, got {:?}", other),
    }
}
