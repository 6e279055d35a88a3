use reviewmind::chat_manager::ReviewChatManager;
use reviewmind::orchestration::{OrchestrationMessage, TerminationReason, UserInputReason};
use reviewmind::review_team::{
    stage_marker, COLLECTOR_ID, SENTIMENT_ID, STAGE_COLLECTION, STAGE_SENTIMENT,
    STAGE_TRANSLATION, SYNTHESIZER_ID, TRANSLATOR_ID,
};
use reviewmind::Role;

fn user_msg(content: &str) -> OrchestrationMessage {
    OrchestrationMessage::new(Role::User, content)
}

fn agent_msg(id: &str, name: &str, content: &str) -> OrchestrationMessage {
    OrchestrationMessage::from_agent(id, name, content)
}

#[test]
fn test_invocation_cap_outranks_completion_phrase() {
    let manager = ReviewChatManager::new().with_max_invocations(5);
    let mut history = vec![user_msg("Analyze product 1001")];
    for i in 1..=5 {
        history.push(agent_msg(
            COLLECTOR_ID,
            "Review Data Collector",
            &format!("Pass {} finished. Analysis completed", i),
        ));
    }

    // Five assistant messages hit the cap before the phrase is even looked at.
    assert_eq!(
        manager.should_terminate(&history),
        Some(TerminationReason::InvocationCapReached)
    );

    // The stock cap of twenty is nowhere near, so the phrase fires instead.
    assert_eq!(
        ReviewChatManager::new().should_terminate(&history),
        Some(TerminationReason::CompletionPhrase)
    );
}

#[test]
fn test_completion_phrase_terminates() {
    let manager = ReviewChatManager::new();
    let history = vec![
        user_msg("Analyze product 1001"),
        agent_msg(
            SYNTHESIZER_ID,
            "Insights Synthesizer",
            "The verdict is in. Analysis completed",
        ),
    ];

    assert_eq!(
        manager.should_terminate(&history),
        Some(TerminationReason::CompletionPhrase)
    );
}

#[test]
fn test_completion_indicator_is_case_insensitive() {
    let manager = ReviewChatManager::new();
    let history = vec![
        user_msg("Analyze product 1001"),
        agent_msg(
            SYNTHESIZER_ID,
            "Insights Synthesizer",
            "Here is the FINAL REPORT for the headphones.",
        ),
    ];

    assert_eq!(
        manager.should_terminate(&history),
        Some(TerminationReason::CompletionIndicator)
    );
}

#[test]
fn test_component_coverage_terminates() {
    let manager = ReviewChatManager::new();
    let history = vec![
        user_msg("Analyze product 1001"),
        agent_msg(
            SYNTHESIZER_ID,
            "Insights Synthesizer",
            "Covered the data collection, the sentiment distribution, and a \
             recommendation for the listing.",
        ),
    ];

    assert_eq!(
        manager.should_terminate(&history),
        Some(TerminationReason::ComponentsCovered)
    );
}

#[test]
fn test_full_team_contribution_terminates() {
    let manager = ReviewChatManager::new();
    let history = vec![
        user_msg("Analyze product 1001"),
        agent_msg(
            COLLECTOR_ID,
            "Review Data Collector",
            "Dataset ready for the next stage.",
        ),
        agent_msg(
            TRANSLATOR_ID,
            "Review Translator",
            "Everything reads in English now.",
        ),
        agent_msg(
            SENTIMENT_ID,
            "Sentiment Analyst",
            "Mostly four and five stars in tone.",
        ),
        agent_msg(
            SYNTHESIZER_ID,
            "Insights Synthesizer",
            "Drafting the report next.",
        ),
    ];

    assert_eq!(
        manager.should_terminate(&history),
        Some(TerminationReason::AllStagesContributed)
    );
}

#[test]
fn test_repetition_terminates() {
    let manager = ReviewChatManager::new();
    let history = vec![
        user_msg("Analyze product 1001"),
        agent_msg(COLLECTOR_ID, "Review Data Collector", "We are going in circles."),
        agent_msg(TRANSLATOR_ID, "Review Translator", "Indeed we are."),
        agent_msg(COLLECTOR_ID, "Review Data Collector", "We are going in circles."),
        agent_msg(TRANSLATOR_ID, "Review Translator", "Indeed we are."),
    ];

    // Two distinct contents across the last four messages.
    assert_eq!(
        manager.should_terminate(&history),
        Some(TerminationReason::RepetitionDetected)
    );
}

#[test]
fn test_healthy_short_run_keeps_going() {
    let manager = ReviewChatManager::new();

    let prompt_only = vec![user_msg("Analyze product 1001")];
    assert_eq!(manager.should_terminate(&prompt_only), None);

    let underway = vec![
        user_msg("Analyze product 1001"),
        agent_msg(
            COLLECTOR_ID,
            "Review Data Collector",
            "Looking at the dataset now.",
        ),
    ];
    assert_eq!(manager.should_terminate(&underway), None);
    assert_eq!(manager.should_request_user_input(&underway), None);
}

#[test]
fn test_filter_result_prefers_last_synthesizer_message() {
    let manager = ReviewChatManager::new();
    let first_report = format!("Draft report. {}", stage_marker(STAGE_SENTIMENT));
    let final_report = format!("Final verdict: buy it. {}", stage_marker(STAGE_COLLECTION));
    let history = vec![
        user_msg("Analyze product 1001"),
        agent_msg(SYNTHESIZER_ID, "Insights Synthesizer", &first_report),
        agent_msg(SYNTHESIZER_ID, "Insights Synthesizer", &final_report),
        agent_msg(
            COLLECTOR_ID,
            "Review Data Collector",
            "One more review trickled in.",
        ),
    ];

    // Verbatim, markers and all; stripping is the caller's concern.
    assert_eq!(manager.filter_result(&history), final_report);
}

#[test]
fn test_filter_result_falls_back_to_transcript() {
    let manager = ReviewChatManager::new();
    let history = vec![
        user_msg("Analyze product 1001"),
        agent_msg(COLLECTOR_ID, "Review Data Collector", "16 reviews on file."),
        agent_msg(TRANSLATOR_ID, "Review Translator", "All English now."),
    ];

    let result = manager.filter_result(&history);
    assert_eq!(
        result,
        "Review Data Collector: 16 reviews on file.\n\nReview Translator: All English now."
    );
    // The user prompt must not leak into the result.
    assert!(!result.contains("Analyze product 1001"));
}

#[test]
fn test_filter_result_names_anonymous_assistants() {
    let manager = ReviewChatManager::new();
    let history = vec![
        user_msg("Analyze product 1001"),
        OrchestrationMessage::new(Role::Assistant, "raw analysis text"),
    ];

    assert_eq!(manager.filter_result(&history), "assistant: raw analysis text");
}

#[test]
fn test_user_input_checks_wait_for_threshold() {
    let manager = ReviewChatManager::new();
    let mut history = vec![user_msg("Analyze product 1001")];
    for i in 1..=9 {
        history.push(agent_msg(
            COLLECTOR_ID,
            "Review Data Collector",
            &format!("Still collecting, pass {}.", i),
        ));
    }
    // Ten messages total: under the threshold, even with a stalled speaker
    // and a clarification request in the last message.
    history.push(agent_msg(
        COLLECTOR_ID,
        "Review Data Collector",
        "Could you clarify the scope?",
    ));
    assert_eq!(history.len(), 11);
    assert_eq!(manager.should_request_user_input(&history[..10]), None);

    // One more message tips it over; the stalled-speaker check outranks the
    // clarification keyword.
    assert_eq!(
        manager.should_request_user_input(&history),
        Some(UserInputReason::SingleSpeakerStalled)
    );
}

#[test]
fn test_clarification_request_pauses_run() {
    let manager = ReviewChatManager::new();
    let mut history = vec![user_msg("Analyze product 1001")];
    for i in 1..=9 {
        let (id, name) = if i % 2 == 0 {
            (TRANSLATOR_ID, "Review Translator")
        } else {
            (COLLECTOR_ID, "Review Data Collector")
        };
        history.push(agent_msg(id, name, &format!("Working through batch {}.", i)));
    }
    history.push(agent_msg(
        TRANSLATOR_ID,
        "Review Translator",
        "Please specify which language to prioritize.",
    ));
    assert_eq!(history.len(), 11);

    assert_eq!(
        manager.should_request_user_input(&history),
        Some(UserInputReason::ClarificationRequested)
    );
}

#[test]
fn test_silent_synthesizer_pauses_run() {
    let manager = ReviewChatManager::new();
    let cast = [
        (COLLECTOR_ID, "Review Data Collector"),
        (TRANSLATOR_ID, "Review Translator"),
        (SENTIMENT_ID, "Sentiment Analyst"),
    ];
    let mut history = vec![user_msg("Analyze product 1001")];
    for i in 0..15 {
        let (id, name) = cast[i % cast.len()];
        history.push(agent_msg(id, name, &format!("Stage chatter, round {}.", i)));
    }
    assert_eq!(history.len(), 16);

    assert_eq!(
        manager.should_request_user_input(&history),
        Some(UserInputReason::SynthesizerSilent)
    );
}

#[test]
fn test_speaker_selection_tracks_stage_markers() {
    let manager = ReviewChatManager::new();
    let mut history = vec![user_msg("Analyze product 1001")];
    assert_eq!(manager.select_next_speaker(&history), COLLECTOR_ID);

    history.push(agent_msg(
        COLLECTOR_ID,
        "Review Data Collector",
        &format!("Dataset ready. {}", stage_marker(STAGE_COLLECTION)),
    ));
    assert_eq!(manager.select_next_speaker(&history), TRANSLATOR_ID);

    history.push(agent_msg(
        TRANSLATOR_ID,
        "Review Translator",
        &format!("All English now. {}", stage_marker(STAGE_TRANSLATION)),
    ));
    assert_eq!(manager.select_next_speaker(&history), SENTIMENT_ID);

    history.push(agent_msg(
        SENTIMENT_ID,
        "Sentiment Analyst",
        &format!("Positive lean. {}", stage_marker(STAGE_SENTIMENT))
    ));
    assert_eq!(manager.select_next_speaker(&history), SYNTHESIZER_ID);
}
