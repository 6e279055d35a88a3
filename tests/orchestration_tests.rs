use async_trait::async_trait;
use reviewmind::client_wrapper::{ClientWrapper, Message, Role, SendError};
use reviewmind::orchestration::{
    Orchestration, OrchestrationMode, OrchestrationResponse, RunContext, TerminationReason,
    UserInputReason,
};
use reviewmind::review_team::{
    ReviewTeam, COLLECTOR_ID, SENTIMENT_ID, SYNTHESIZER_ID, TRANSLATOR_ID,
};
use reviewmind::Agent;
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

fn speaker_ids(response: &OrchestrationResponse) -> Vec<String> {
    response
        .messages
        .iter()
        .filter_map(|m| m.agent_id.clone())
        .collect()
}

fn team_orchestration(
    id: &str,
    mode: OrchestrationMode,
    client: Arc<dyn ClientWrapper>,
) -> Orchestration {
    let mut orch = Orchestration::new(id, "Review Analysis").with_mode(mode);
    for agent in ReviewTeam::new(client).into_agents() {
        orch.add_agent(agent).unwrap();
    }
    orch
}

#[tokio::test]
async fn test_sequential_single_pass() {
    let mut orch =
        Orchestration::new("seq", "Sequential Analysis").with_mode(OrchestrationMode::Sequential);
    orch.add_agent(Agent::new(
        "first",
        "First",
        Arc::new(MockClient {
            response: "first reporting in".to_string(),
        }),
    ))
    .unwrap();
    orch.add_agent(Agent::new(
        "second",
        "Second",
        Arc::new(MockClient {
            response: "second reporting in".to_string(),
        }),
    ))
    .unwrap();

    let response = orch.run("Look at product 1001").await.unwrap();

    assert_eq!(response.messages.len(), 3); // prompt plus one message per agent
    assert_eq!(response.turns, 2);
    assert!(response.is_complete);
    assert_eq!(response.termination, None);
    assert_eq!(response.needs_user_input, None);
    assert_eq!(speaker_ids(&response), vec!["first", "second"]);
    assert_eq!(response.messages[0].role, Role::User);
    assert_eq!(response.messages[1].metadata.get("turn").unwrap(), "1");
    assert_eq!(response.messages[2].metadata.get("turn").unwrap(), "2");
}

#[tokio::test]
async fn test_sequential_team_runs_in_pipeline_order() {
    let client = Arc::new(MockClient {
        response: "stage noted".to_string(),
    });
    let mut orch = team_orchestration("seq-team", OrchestrationMode::Sequential, client);

    let response = orch
        .run("Analyze the reviews for product 1001")
        .await
        .unwrap();

    assert_eq!(response.turns, 4);
    assert!(response.is_complete);
    assert_eq!(
        speaker_ids(&response),
        vec![COLLECTOR_ID, TRANSLATOR_ID, SENTIMENT_ID, SYNTHESIZER_ID]
    );
}

#[tokio::test]
async fn test_handoff_markers_steer_control() {
    let client = Arc::new(ScriptedClient::new(&[
        "Dataset assembled from the catalog. [STAGE_COMPLETE:collection] [HANDOFF:sentiment-analyst]",
        "Skewing positive overall. [STAGE_COMPLETE:sentiment] [HANDOFF:insights-synthesizer]",
        "Analysis completed. Verdict: customers are happy.",
    ]));
    let mut orch = team_orchestration("handoff", OrchestrationMode::HandOff, client);

    let response = orch.run("Analyze product 1001").await.unwrap();

    // The collector handed straight to the analyst, skipping the translator.
    assert_eq!(
        speaker_ids(&response),
        vec![COLLECTOR_ID, SENTIMENT_ID, SYNTHESIZER_ID]
    );
    assert_eq!(response.turns, 3);
    assert_eq!(
        response.termination,
        Some(TerminationReason::CompletionPhrase)
    );
    assert!(response.is_complete);
}

#[tokio::test]
async fn test_handoff_falls_back_to_phase_machine() {
    // No [HANDOFF:..] markers anywhere: control should follow the stage
    // markers through the pipeline instead.
    let client = Arc::new(ScriptedClient::new(&[
        "Collected every review into one dataset. [STAGE_COMPLETE:collection]",
        "Rendered the non-English reviews in English. [STAGE_COMPLETE:translation]",
        "Mood is positive with a few complaints. [STAGE_COMPLETE:sentiment]",
        "Final report: buyers are satisfied; keep the listing as is. [STAGE_COMPLETE:synthesis]",
    ]));
    let mut orch = team_orchestration("fallback", OrchestrationMode::HandOff, client);

    let response = orch.run("Analyze product 1002").await.unwrap();

    assert_eq!(
        speaker_ids(&response),
        vec![COLLECTOR_ID, TRANSLATOR_ID, SENTIMENT_ID, SYNTHESIZER_ID]
    );
    assert_eq!(response.turns, 4);
    assert_eq!(
        response.termination,
        Some(TerminationReason::CompletionIndicator)
    );
    assert!(response.is_complete);
}

#[tokio::test]
async fn test_handoff_stops_at_invocation_cap() {
    let client = Arc::new(ScriptedClient::new(&[
        "Still gathering the review data.",
        "Cross-checking the catalog entries.",
        "Counting ratings one more time.",
    ]));
    let mut orch = Orchestration::new("capped", "Capped Run")
        .with_mode(OrchestrationMode::HandOff)
        .with_max_invocations(3);
    for agent in ReviewTeam::new(client).into_agents() {
        orch.add_agent(agent).unwrap();
    }

    let response = orch.run("Analyze product 1002").await.unwrap();

    // No markers ever appear, so control stays with the collector until the cap.
    assert_eq!(
        speaker_ids(&response),
        vec![COLLECTOR_ID, COLLECTOR_ID, COLLECTOR_ID]
    );
    assert_eq!(response.turns, 3);
    assert_eq!(
        response.termination,
        Some(TerminationReason::InvocationCapReached)
    );
    assert!(!response.is_complete);
}

#[tokio::test]
async fn test_handoff_ignores_unknown_targets() {
    let client = Arc::new(ScriptedClient::new(&[
        "Data in hand. [STAGE_COMPLETE:collection] [HANDOFF:reviews-pricing]",
        "Translated the Spanish reviews. In conclusion, the dataset reads well in English.",
    ]));
    let mut orch = team_orchestration("bogus-target", OrchestrationMode::HandOff, client);

    let response = orch.run("Analyze product 1003").await.unwrap();

    // The bogus target is ignored; the phase machine picked the translator.
    assert_eq!(speaker_ids(&response), vec![COLLECTOR_ID, TRANSLATOR_ID]);
    assert_eq!(
        response.termination,
        Some(TerminationReason::CompletionIndicator)
    );
    assert!(response.is_complete);
}

#[tokio::test]
async fn test_group_chat_walks_the_pipeline() {
    let client = Arc::new(ScriptedClient::new(&[
        "Pulled 4 reviews in three languages. [STAGE_COMPLETE:collection]",
        "All reviews now readable in English. [STAGE_COMPLETE:translation]",
        "Three positive, one negative. [STAGE_COMPLETE:sentiment]",
        "Analysis completed. Overall the product delights buyers. [STAGE_COMPLETE:synthesis]",
    ]));
    let mut orch = team_orchestration("group", OrchestrationMode::GroupChat, client);

    let response = orch.run("Analyze product 1003").await.unwrap();

    assert_eq!(
        speaker_ids(&response),
        vec![COLLECTOR_ID, TRANSLATOR_ID, SENTIMENT_ID, SYNTHESIZER_ID]
    );
    assert_eq!(response.turns, 4);
    assert!(response.is_complete);
    assert_eq!(
        response.termination,
        Some(TerminationReason::CompletionPhrase)
    );

    // Each agent message records the phase that selected its speaker.
    assert_eq!(
        response.messages[1].metadata.get("phase").unwrap(),
        "collecting-data"
    );
    assert_eq!(
        response.messages[2].metadata.get("phase").unwrap(),
        "translating"
    );
    assert_eq!(
        response.messages[3].metadata.get("phase").unwrap(),
        "analyzing-sentiment"
    );
    assert_eq!(
        response.messages[4].metadata.get("phase").unwrap(),
        "synthesizing"
    );
}

#[tokio::test]
async fn test_group_chat_honors_deadline() {
    let client = Arc::new(MockClient {
        response: "should never be sent".to_string(),
    });
    let mut orch = team_orchestration("deadline", OrchestrationMode::GroupChat, client);

    let ctx = RunContext::new().with_timeout(Duration::from_secs(0));
    let response = orch
        .run_with_context("Analyze product 1004", ctx)
        .await
        .unwrap();

    assert_eq!(
        response.termination,
        Some(TerminationReason::DeadlineExceeded)
    );
    assert!(!response.is_complete);
    assert_eq!(response.turns, 0);
    assert_eq!(response.messages.len(), 1); // only the prompt made it in
    assert_eq!(response.needs_user_input, None);
}

#[tokio::test]
async fn test_group_chat_pauses_when_one_agent_stalls() {
    // Ten distinct collector updates, none of which complete a stage. After
    // the tenth the manager should pause the run instead of looping on.
    let updates: Vec<String> = (1..=10)
        .map(|i| format!("Collector status update number {}", i))
        .collect();
    let refs: Vec<&str> = updates.iter().map(String::as_str).collect();
    let client = Arc::new(ScriptedClient::new(&refs));
    let mut orch = team_orchestration("stalled", OrchestrationMode::GroupChat, client);

    let response = orch.run("Analyze product 1001").await.unwrap();

    assert_eq!(response.turns, 10);
    assert_eq!(response.messages.len(), 11);
    assert_eq!(
        response.needs_user_input,
        Some(UserInputReason::SingleSpeakerStalled)
    );
    assert_eq!(response.termination, None);
    assert!(!response.is_complete);
    assert!(speaker_ids(&response)
        .iter()
        .all(|id| id == COLLECTOR_ID));
}

#[tokio::test]
async fn test_agent_failure_propagates() {
    let mut orch =
        Orchestration::new("failing", "Failing Run").with_mode(OrchestrationMode::Sequential);
    orch.add_agent(Agent::new("a", "Agent A", Arc::new(FailingClient)))
        .unwrap();

    let err = orch.run("Analyze product 1001").await.unwrap_err();
    assert!(err.to_string().contains("provider unavailable"));
}
