//! Agent Cards
//!
//! Static discovery metadata for the agents exposed over the A2A surface.
//! Each externally callable agent publishes a card at
//! `{path}/.well-known/agent-card.json` describing its skills, accepted
//! input/output modes, and capabilities, so remote agent frameworks can
//! discover what lives behind the endpoint before sending a message.
//!
//! The JSON shape follows the A2A discovery format (camelCase keys). Cards
//! are plain data with no server dependency, so clients of the crate can use
//! them to describe their own agents too.

use serde::{Deserialize, Serialize};

/// Path the reviews collector agent is served under.
pub const REVIEWS_PATH: &str = "/reviews";
/// Path the review summarizer agent is served under.
pub const SUMMARIZE_PATH: &str = "/summarize";
/// Path the sentiment analyst agent is served under.
pub const SENTIMENT_PATH: &str = "/sentiment";
/// Well-known suffix where each agent's card is discoverable.
pub const AGENT_CARD_WELL_KNOWN: &str = "/.well-known/agent-card.json";

/// One advertised skill on an agent card.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

/// Optional protocol features an agent supports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub push_notifications: bool,
}

/// Discovery card for one externally callable agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    /// Full URL of the agent endpoint the card describes.
    pub url: String,
    pub version: String,
    pub capabilities: AgentCapabilities,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    fn text_agent(base_url: &str, path: &str, name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: AgentCapabilities::default(),
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
            skills: Vec::new(),
        }
    }

    fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }
}

/// Card for the reviews collector served at [`REVIEWS_PATH`].
pub fn reviews_card(base_url: &str) -> AgentCard {
    AgentCard::text_agent(
        base_url,
        REVIEWS_PATH,
        "Review Data Collector",
        "Collects and prepares customer review data for analysis",
    )
    .with_skill(AgentSkill {
        id: "fetch-product-reviews".to_string(),
        name: "Fetch product reviews".to_string(),
        description: "Retrieves the full review dataset for a product, with ratings, \
                      languages, and aggregate statistics"
            .to_string(),
        tags: vec!["reviews".to_string(), "catalog".to_string()],
        examples: vec![
            "Fetch all reviews for product 1001".to_string(),
            "How many reviews does the AeroSound Max have, and in which languages?".to_string(),
        ],
    })
}

/// Card for the review summarizer served at [`SUMMARIZE_PATH`].
pub fn summarize_card(base_url: &str) -> AgentCard {
    AgentCard::text_agent(
        base_url,
        SUMMARIZE_PATH,
        "Review Summarizer",
        "Produces concise summaries of customer review text",
    )
    .with_skill(AgentSkill {
        id: "summarize-reviews".to_string(),
        name: "Summarize reviews".to_string(),
        description: "Condenses a body of customer reviews into a few sentences covering \
                      the dominant opinions"
            .to_string(),
        tags: vec!["reviews".to_string(), "summarization".to_string()],
        examples: vec!["Summarize these twelve reviews of the trail backpack".to_string()],
    })
}

/// Card for the sentiment analyst served at [`SENTIMENT_PATH`].
pub fn sentiment_card(base_url: &str) -> AgentCard {
    AgentCard::text_agent(
        base_url,
        SENTIMENT_PATH,
        "Sentiment Analyst",
        "Analyzes sentiment and themes across customer reviews",
    )
    .with_skill(AgentSkill {
        id: "classify-sentiment".to_string(),
        name: "Classify sentiment".to_string(),
        description: "Labels review text positive, negative, or mixed, with the recurring \
                      themes behind the judgement"
            .to_string(),
        tags: vec!["reviews".to_string(), "sentiment".to_string()],
        examples: vec![
            "What is the overall sentiment of: \"battery died after a week\"?".to_string(),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cards_serialize_camel_case() {
        let card = reviews_card("http://localhost:8080");
        let value = serde_json::to_value(&card).expect("serializable");

        assert!(value.get("defaultInputModes").is_some());
        assert!(value.get("defaultOutputModes").is_some());
        assert!(value["capabilities"].get("pushNotifications").is_some());
        assert!(value.get("default_input_modes").is_none());
    }

    #[test]
    fn card_urls_join_cleanly() {
        let card = summarize_card("http://localhost:8080/");
        assert_eq!(card.url, "http://localhost:8080/summarize");

        let card = sentiment_card("http://localhost:8080");
        assert_eq!(card.url, "http://localhost:8080/sentiment");
    }

    #[test]
    fn each_card_advertises_one_distinct_skill() {
        let base = "http://localhost:8080";
        let ids: Vec<String> = [reviews_card(base), summarize_card(base), sentiment_card(base)]
            .iter()
            .flat_map(|card| card.skills.iter().map(|s| s.id.clone()))
            .collect();

        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"fetch-product-reviews".to_string()));
        assert!(ids.contains(&"summarize-reviews".to_string()));
        assert!(ids.contains(&"classify-sentiment".to_string()));
    }
}
