//! Context relevance analysis over prior channel messages.
//!
//! The newest slice of the window is checked first; only when it is judged
//! irrelevant do the older messages get a look. A relevant older slice pulls in
//! the whole window so the conversation reads continuously.

use std::ops::Range;

use tracing::{debug, info, instrument, warn};

use crate::{
    base::{
        config::{Config, RelevanceMatch},
        prompts,
        types::{Completion, CompletionRequest, ContextMessage, truncate_chars},
    },
    service::llm::LlmClient,
};

/// Words before `RELEVANT` that are checked for a negating `NOT`.
const NEGATION_REACH: usize = 3;

/// One relevance check over part of the capped window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStage {
    /// Messages shown to the model.
    pub examined: Range<usize>,
    /// Messages returned when the model says they are relevant.
    pub keep: Range<usize>,
}

/// Iterator over the escalating relevance stages for a window of `len` messages.
///
/// Stage one examines (and keeps) the newest `initial` messages. Stage two, which
/// only exists when the window is larger, examines the older remainder and keeps
/// the whole window.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    len: usize,
    initial: usize,
    stage: usize,
}

impl BatchPlan {
    pub fn new(len: usize, initial: usize) -> Self {
        Self { len, initial: initial.max(1), stage: 0 }
    }
}

impl Iterator for BatchPlan {
    type Item = BatchStage;

    fn next(&mut self) -> Option<Self::Item> {
        let split = self.len.saturating_sub(self.initial);

        let stage = match self.stage {
            0 if self.len > 0 => BatchStage {
                examined: split..self.len,
                keep: split..self.len,
            },
            1 if split > 0 => BatchStage {
                examined: 0..split,
                keep: 0..self.len,
            },
            _ => return None,
        };

        self.stage += 1;

        Some(stage)
    }
}

impl RelevanceMatch {
    /// Whether a relevance reply counts as a `RELEVANT` verdict.
    pub fn is_relevant(self, reply: &str) -> bool {
        let upper = reply.to_uppercase();

        match self {
            RelevanceMatch::Substring => upper.contains("RELEVANT"),
            RelevanceMatch::Token => {
                let words: Vec<&str> = upper.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();

                // A `NOT` up to three words back negates the verdict ("not really relevant").
                words
                    .iter()
                    .enumerate()
                    .any(|(i, word)| *word == "RELEVANT" && !words[i.saturating_sub(NEGATION_REACH)..i].contains(&"NOT"))
            }
        }
    }
}

/// Picks which prior messages give context to the current query.
#[derive(Clone)]
pub struct ContextAnalyzer {
    llm: LlmClient,
    config: Config,
}

impl ContextAnalyzer {
    pub fn new(llm: LlmClient, config: Config) -> Self {
        Self { llm, config }
    }

    /// Return the relevant subsequence of `previous_messages` (oldest first), or nothing.
    ///
    /// Only the most recent `context_window` messages are considered. A failed
    /// model call counts as "not relevant" for its stage.
    #[instrument(name = "ContextAnalyzer::find_relevant_context", skip_all, fields(candidates = previous_messages.len()))]
    pub async fn find_relevant_context(&self, current_query: &str, previous_messages: &[ContextMessage]) -> Vec<ContextMessage> {
        if previous_messages.is_empty() {
            return Vec::new();
        }

        let start = previous_messages.len().saturating_sub(self.config.context_window);
        let window = &previous_messages[start..];

        for (index, stage) in BatchPlan::new(window.len(), self.config.context_initial_batch).enumerate() {
            let prompt = self.build_prompt(current_query, window, &stage.examined, index > 0);
            let request = CompletionRequest::new(&self.config.fast_model, prompts::CONTEXT_ANALYZER_DIRECTIVE, prompt);

            match self.llm.complete(&request).await {
                Completion::Text(reply) if self.config.relevance_match.is_relevant(&reply) => {
                    let relevant = window[stage.keep].to_vec();
                    info!("Context analyzer found {} relevant messages for '{}'", relevant.len(), truncate_chars(current_query, 50));
                    return relevant;
                }
                Completion::Text(reply) => debug!("Stage {} judged not relevant: {}", index + 1, truncate_chars(&reply, 50)),
                Completion::Failed(failure) => warn!("Stage {} relevance check failed ({:?}); treating as not relevant", index + 1, failure.kind),
            }
        }

        info!("Context analyzer found no relevant messages for '{}'", truncate_chars(current_query, 50));

        Vec::new()
    }

    /// Build the relevance prompt for one stage.
    fn build_prompt(&self, current_query: &str, window: &[ContextMessage], examined: &Range<usize>, escalated: bool) -> String {
        let listing = window[examined.clone()]
            .iter()
            .enumerate()
            .map(|(offset, message)| {
                format!(
                    "Message {}: {}",
                    examined.start + offset + 1,
                    truncate_chars(&message.content, self.config.context_snippet_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n");

        if escalated {
            format!("Current query: '{current_query}'\n\nMore previous messages:\n{listing}\n\nAre any of these previous messages relevant context for the current query?")
        } else {
            format!("Current query: '{current_query}'\n\nPrevious messages:\n{listing}\n\nAre these previous messages relevant context for the current query?")
        }
    }
}

// Tests.
