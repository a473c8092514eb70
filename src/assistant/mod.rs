//! The answer pipeline.
//!
//! A run walks a fixed sequence of stages:
//! - Find which prior messages are relevant context.
//! - Judge whether the query needs live data.
//! - Online only: synthesize search queries and gather their results.
//! - Compose and run the final answering call.
//!
//! Every stage returns a usable value on failure, so a run always ends with a
//! string for the user.

pub mod compose;
pub mod context;
pub mod gather;
pub mod judge;
pub mod queries;

use std::{sync::Arc, time::Duration};

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        prompts,
        types::{CANCELLED_REPLY, CompletionFailure, ContextMessage, truncate_chars},
    },
    service::llm::LlmClient,
};

use compose::AnswerComposer;
use context::ContextAnalyzer;
use gather::InformationGatherer;
use judge::OnlineJudge;
use queries::QuerySynthesizer;

/// Orchestrator for a single persona.
///
/// This is trivially cloneable and holds no per-run state, so concurrent runs
/// never influence each other.
#[derive(Clone)]
pub struct Assistant {
    config: Config,
    persona: Arc<str>,
    analyzer: ContextAnalyzer,
    judge: OnlineJudge,
    synthesizer: QuerySynthesizer,
    gatherer: InformationGatherer,
    composer: AnswerComposer,
}

impl Assistant {
    /// Create an assistant using the configured persona, or the built-in one.
    pub fn new(config: &Config, llm: LlmClient) -> Self {
        let persona = config.persona.as_deref().unwrap_or(prompts::DEFAULT_PERSONA);

        Self {
            config: config.clone(),
            persona: Arc::from(persona),
            analyzer: ContextAnalyzer::new(llm.clone(), config.clone()),
            judge: OnlineJudge::new(llm.clone(), config.clone()),
            synthesizer: QuerySynthesizer::new(llm.clone(), config.clone()),
            gatherer: InformationGatherer::new(llm.clone(), config.clone()),
            composer: AnswerComposer::new(llm, config.clone()),
        }
    }

    /// Replace the persona spliced into the answering instructions.
    pub fn with_persona(mut self, persona: impl AsRef<str>) -> Self {
        self.persona = Arc::from(persona.as_ref());
        self
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Answer `query`, optionally in light of earlier channel messages (oldest first).
    pub async fn get_ai_response(&self, query: &str, previous_messages: Option<&[ContextMessage]>) -> String {
        self.get_ai_response_cancellable(query, previous_messages, CancellationToken::new()).await
    }

    /// Like [`Assistant::get_ai_response`], but stops early when `cancel` fires.
    ///
    /// Dropping the pipeline future aborts whatever call is in flight. The run
    /// is also bounded by `run_timeout_secs`.
    pub async fn get_ai_response_cancellable(&self, query: &str, previous_messages: Option<&[ContextMessage]>, cancel: CancellationToken) -> String {
        let limit = Duration::from_secs(self.config.run_timeout_secs);

        tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Run cancelled for '{}'", truncate_chars(query, 50));
                CANCELLED_REPLY.to_string()
            }
            result = timeout(limit, self.run(query, previous_messages)) => match result {
                Ok(answer) => answer,
                Err(_) => {
                    warn!("Run exceeded {}s for '{}'", self.config.run_timeout_secs, truncate_chars(query, 50));
                    CompletionFailure::timeout().fallback_text()
                }
            },
        }
    }

    #[instrument(name = "Assistant::run", skip_all)]
    async fn run(&self, query: &str, previous_messages: Option<&[ContextMessage]>) -> String {
        // Analyze context.

        let relevant_context = match previous_messages {
            Some(messages) if !messages.is_empty() => {
                info!("Analyzing {} previous messages for context relevance", messages.len());
                self.analyzer.find_relevant_context(query, messages).await
            }
            _ => Vec::new(),
        };

        // Judge online need.

        let online = self.judge.needs_online_data(query, &relevant_context).await;

        // Gather, when online.

        let gathered = if online {
            let search_queries = self.synthesizer.generate_search_queries(query, &relevant_context).await;
            Some(self.gatherer.gather(&search_queries).await)
        } else {
            None
        };

        // Compose.

        self.composer.answer(query, &relevant_context, gathered.as_deref(), &self.persona).await
    }
}
