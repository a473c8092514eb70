pub mod openrouter;

use crate::base::types::{Completion, CompletionRequest};
use async_trait::async_trait;
use std::ops::Deref;
use std::sync::Arc;

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// This trait defines the single request/response call the assistant pipeline
/// makes against a text-generation endpoint. Implementing this trait allows
/// different providers (or test stubs) to be used with the persona-bot.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Run one completion.
    ///
    /// Implementations make exactly one attempt and never return an error:
    /// timeouts, transport failures and unparsable bodies are reported as
    /// `Completion::Failed`.
    async fn complete(&self, request: &CompletionRequest) -> Completion;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }
}
