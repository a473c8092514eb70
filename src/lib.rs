//! Library root for `persona-bot`.
//!
//! Persona-bot is a chat assistant that answers in the voice of a configurable
//! persona. Before answering it:
//! - Picks out which earlier channel messages matter for the question
//! - Decides whether the question needs live, online information
//! - Turns the question into web searches and gathers their results
//!
//! Everything runs against an OpenAI-compatible completion service, reached
//! through the [`service::llm::GenericLlmClient`] trait so that other providers
//! (or test stubs) can be swapped in.

pub mod assistant;
pub mod base;
pub mod runtime;
pub mod service;

use base::{
    config::Config,
    types::{ContextMessage, Res},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Public async entry for the binary crate.
///
/// Answers a single query against the configured service. Ctrl-C cancels the
/// run and yields the cancellation reply instead of an error.
pub async fn ask(config: Config, query: &str, history: Vec<ContextMessage>, persona: Option<String>) -> Res<String> {
    info!("Starting persona-bot ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config)?;

    let assistant = match persona {
        Some(persona) => runtime.assistant.with_persona(persona),
        None => runtime.assistant,
    };

    // Cancel on ctrl-c.
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling ...");
            guard.cancel();
        }
    });

    let previous = if history.is_empty() { None } else { Some(history.as_slice()) };
    let answer = assistant.get_ai_response_cancellable(query, previous, cancel).await;

    watcher.abort();

    Ok(answer)
}
