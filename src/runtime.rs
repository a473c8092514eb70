//! Runtime services and shared state for the persona-bot.

use tracing::instrument;

use crate::{
    assistant::Assistant,
    base::{config::Config, types::Res},
    service::llm::LlmClient,
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the configuration, the completion client, and the
/// assistant built on top of them. It is designed to be trivially cloneable,
/// allowing it to be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// The assistant pipeline.
    pub assistant: Assistant,
}

impl Runtime {
    /// Create a new runtime instance against the configured completion service.
    #[instrument(skip_all)]
    pub fn new(config: Config) -> Res<Self> {
        // Initialize the LLM client.
        let llm = LlmClient::openrouter(&config)?;

        Ok(Self::with_llm(config, llm))
    }

    /// Create a runtime around an existing LLM client.
    pub fn with_llm(config: Config, llm: LlmClient) -> Self {
        let assistant = Assistant::new(&config, llm.clone());

        Self { config, llm, assistant }
    }
}
