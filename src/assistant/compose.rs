//! Assembles the final answer request and runs it.

use chrono::{Local, NaiveDate};
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        prompts,
        types::{CompletionRequest, ContextMessage, truncate_chars},
    },
    service::llm::LlmClient,
};

/// System and user instructions for the answering model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Answer composer.
#[derive(Clone)]
pub struct AnswerComposer {
    llm: LlmClient,
    config: Config,
}

impl AnswerComposer {
    pub fn new(llm: LlmClient, config: Config) -> Self {
        Self { llm, config }
    }

    /// Make the single answering call and return its text unmodified.
    ///
    /// `gathered` is `Some` only on the online path.
    #[instrument(name = "AnswerComposer::answer", skip_all, fields(online = gathered.is_some(), context = relevant_context.len()))]
    pub async fn answer(&self, query: &str, relevant_context: &[ContextMessage], gathered: Option<&str>, persona: &str) -> String {
        let prompt = compose(query, relevant_context, gathered, persona, Local::now().date_naive());

        info!("Answering with {} for '{}'", self.config.answer_model, truncate_chars(query, 50));

        let request = CompletionRequest::new(&self.config.answer_model, prompt.system, prompt.user);

        self.llm.complete(&request).await.into_answer()
    }
}

/// Render relevant messages for the answering model, with author ids for mentions.
pub fn render_context(relevant_context: &[ContextMessage]) -> String {
    relevant_context
        .iter()
        .map(|message| format!("Message from {} (ID:{}): {}", message.author_name, message.author_id, message.content))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Build the answering prompt pair.
pub fn compose(query: &str, relevant_context: &[ContextMessage], gathered: Option<&str>, persona: &str, today: NaiveDate) -> PromptPair {
    let system = format!("{}\n\n{}", persona.trim(), prompts::PLATFORM_FORMAT_NOTE);

    let mut user = format!(
        "TODAY'S DATE: {} (only bring it up for time-related matters such as releases or current events).\n\nThe user asked: \"{}\"\n\n",
        today.format("%A, %B %d, %Y"),
        query
    );

    if !relevant_context.is_empty() {
        user.push_str("Relevant earlier conversation:\n--- BEGIN CONVERSATION CONTEXT ---\n");
        user.push_str(&render_context(relevant_context));
        user.push_str("\n--- END CONVERSATION CONTEXT ---\n\n");
    }

    match gathered {
        Some(results) => {
            user.push_str("Targeted web searches were run to answer this. Their aggregated results:\n--- BEGIN GATHERED INFORMATION ---\n");
            user.push_str(results);
            user.push_str("\n--- END GATHERED INFORMATION ---\n\n");
            user.push_str("Answer the user in character, drawing on the gathered information.\n");
            user.push_str(prompts::LENGTH_RULES);
            user.push_str(prompts::ONLINE_LINK_RULES);
        }
        None => {
            if relevant_context.is_empty() {
                user.push_str("Answer the user in character.\n");
            } else {
                user.push_str("Answer the user in character, taking both the query and the earlier conversation into account.\n");
            }
            user.push_str(prompts::LENGTH_RULES);
            user.push_str(prompts::OFFLINE_LINK_RULES);
        }
    }

    PromptPair { system, user }
}

// Tests.
