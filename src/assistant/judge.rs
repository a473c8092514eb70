//! Decides whether a query needs live online data.

use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        prompts,
        types::{Completion, CompletionRequest, ContextMessage, truncate_chars},
    },
    service::llm::LlmClient,
};

/// Judge for the online/offline branch.
#[derive(Clone)]
pub struct OnlineJudge {
    llm: LlmClient,
    config: Config,
}

impl OnlineJudge {
    pub fn new(llm: LlmClient, config: Config) -> Self {
        Self { llm, config }
    }

    /// `true` only when the model's reply starts with `YES`.
    ///
    /// Failed calls and any other reply fall back to the offline path.
    #[instrument(name = "OnlineJudge::needs_online_data", skip_all, fields(context = relevant_context.len()))]
    pub async fn needs_online_data(&self, query: &str, relevant_context: &[ContextMessage]) -> bool {
        let request = CompletionRequest::new(&self.config.fast_model, prompts::ONLINE_JUDGE_DIRECTIVE, build_prompt(query, relevant_context));

        let online = match self.llm.complete(&request).await {
            Completion::Text(reply) => is_affirmative(&reply),
            Completion::Failed(failure) => {
                warn!("Online judge call failed ({:?}); staying offline", failure.kind);
                false
            }
        };

        info!("Judge decided online data needed: {} for '{}'", online, truncate_chars(query, 50));

        online
    }
}

/// The query followed by the chronological conversation history, if any.
pub fn build_prompt(query: &str, relevant_context: &[ContextMessage]) -> String {
    if relevant_context.is_empty() {
        return query.to_string();
    }

    let history = relevant_context
        .iter()
        .enumerate()
        .map(|(i, message)| format!("[Message {}] {}: {}", i + 1, message.author_name, message.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{query}\n\n=== CONVERSATION HISTORY (chronological) ===\n{history}")
}

/// Whether a judge reply is a `YES` verdict.
pub fn is_affirmative(reply: &str) -> bool {
    reply.trim().to_uppercase().starts_with("YES")
}

// Tests.
