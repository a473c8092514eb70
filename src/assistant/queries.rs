//! Turns a query and its context into concrete web search queries.

use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        parse, prompts,
        types::{Completion, CompletionRequest, ContextMessage, truncate_chars},
    },
    service::llm::LlmClient,
};

/// Words that mark a message as talking about media worth linking to.
const MEDIA_KEYWORDS: &[&str] = &["movie", "trailer", "video", "link", "watch"];

/// Words too generic to anchor a search on.
const STOPWORDS: &[&str] = &[
    "link", "help", "does", "what", "with", "this", "that", "check", "have", "just", "about", "from", "there", "they", "them", "your", "some", "when", "where", "which", "would",
    "could", "should", "please",
];

/// Search query synthesizer.
#[derive(Clone)]
pub struct QuerySynthesizer {
    llm: LlmClient,
    config: Config,
}

impl QuerySynthesizer {
    pub fn new(llm: LlmClient, config: Config) -> Self {
        Self { llm, config }
    }

    /// Produce at least one search query.
    ///
    /// Falls back to queries derived from media mentions in the context, then to
    /// the original query itself.
    #[instrument(name = "QuerySynthesizer::generate_search_queries", skip_all, fields(context = relevant_context.len()))]
    pub async fn generate_search_queries(&self, query: &str, relevant_context: &[ContextMessage]) -> Vec<String> {
        let request = CompletionRequest::new(&self.config.fast_model, "", build_prompt(query, relevant_context));

        let parsed = match self.llm.complete(&request).await {
            Completion::Text(reply) => {
                let parsed = parse::parse_string_array(&reply);
                if parsed.is_none() {
                    warn!("Could not find a JSON list of queries in: {}", truncate_chars(&reply, 100));
                }
                parsed
            }
            Completion::Failed(failure) => {
                warn!("Query synthesis call failed ({:?})", failure.kind);
                None
            }
        };

        let queries = parsed.or_else(|| fallback_queries(relevant_context)).unwrap_or_else(|| vec![query.to_string()]);

        info!("Using {} search queries: {:?}", queries.len(), queries);

        queries
    }
}

/// Short or fragmentary queries lean on the conversation to mean anything.
pub fn is_minimal_query(query: &str) -> bool {
    query.split_whitespace().count() <= 3 || query.contains('?')
}

/// Build the synthesis prompt.
pub fn build_prompt(query: &str, relevant_context: &[ContextMessage]) -> String {
    let context = if relevant_context.is_empty() {
        "NO CONTEXT AVAILABLE".to_string()
    } else {
        relevant_context
            .iter()
            .enumerate()
            .map(|(i, message)| format!("MESSAGE {}: {}: {}", i + 1, message.author_name, message.content.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let minimal_hint = if is_minimal_query(query) && !relevant_context.is_empty() { prompts::MINIMAL_QUERY_HINT } else { "" };

    prompts::fill(prompts::SEARCH_QUERY_TEMPLATE, &[("context", context.as_str()), ("query", query), ("minimal_hint", minimal_hint)])
}

/// Derive generic media searches from the latest context message that mentions media.
pub fn fallback_queries(relevant_context: &[ContextMessage]) -> Option<Vec<String>> {
    let topic = relevant_context.iter().rev().map(|m| m.content.to_lowercase()).find(|content| MEDIA_KEYWORDS.iter().any(|k| content.contains(k)))?;

    let mut subject: Vec<String> = Vec::new();
    for word in topic.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.chars().count() <= 3 || STOPWORDS.contains(&word) || MEDIA_KEYWORDS.contains(&word) {
            continue;
        }
        if !subject.iter().any(|w| w == word) {
            subject.push(word.to_string());
        }
    }

    if subject.is_empty() {
        return None;
    }

    let subject = subject.join(" ");

    Some(vec![format!("{subject} official trailer"), format!("{subject} movie trailer")])
}

// Tests.
