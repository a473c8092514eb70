use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Reply handed back when a run is cancelled by its caller.
pub const CANCELLED_REPLY: &str = "I stopped working on that one before I could finish. Ask me again whenever you like.";

/// One prior chat message that may serve as context for the current query.
///
/// Records are built by the chat platform integration and are read-only for
/// the assistant pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// Display name of the author.
    pub author_name: String,
    /// Stable platform identifier of the author.
    #[serde(default)]
    pub author_id: String,
    /// Text content of the message.
    #[serde(default)]
    pub content: String,
    /// When the message was sent, if the platform reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Identifier of the message this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Identifiers of the users mentioned in the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
}

impl ContextMessage {
    pub fn new(author_name: impl Into<String>, author_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author_name: author_name.into(),
            author_id: author_id.into(),
            content: content.into(),
            timestamp: None,
            reply_to: None,
            mentions: Vec::new(),
        }
    }

    /// Drop records without any text, keeping the chronological order intact.
    pub fn prepare_history(messages: impl IntoIterator<Item = ContextMessage>) -> Vec<ContextMessage> {
        messages.into_iter().filter(|m| !m.content.trim().is_empty()).collect()
    }
}

/// A single request to the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_instruction: String,
    pub user_instruction: String,
    /// Ask the provider to run its own web retrieval using `user_instruction` as the query.
    pub enable_live_search: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, system_instruction: impl Into<String>, user_instruction: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_instruction: system_instruction.into(),
            user_instruction: user_instruction.into(),
            enable_live_search: false,
        }
    }

    pub fn with_live_search(mut self) -> Self {
        self.enable_live_search = true;
        self
    }
}

/// Why a completion call did not produce text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The call exceeded its time budget.
    Timeout,
    /// Connection or HTTP status failure.
    Transport,
    /// The response body was missing the fields we need.
    Parse,
}

/// A failed completion call, carrying enough detail for logs and the user-facing apology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl CompletionFailure {
    pub fn timeout() -> Self {
        Self {
            kind: FailureKind::Timeout,
            detail: "request timed out".to_string(),
        }
    }

    pub fn transport(detail: impl std::fmt::Display) -> Self {
        Self {
            kind: FailureKind::Transport,
            detail: detail.to_string(),
        }
    }

    pub fn parse(detail: impl std::fmt::Display) -> Self {
        Self {
            kind: FailureKind::Parse,
            detail: detail.to_string(),
        }
    }

    /// The apology shown to the user in place of an answer.
    pub fn fallback_text(&self) -> String {
        match self.kind {
            FailureKind::Timeout => "I tried to process your request, but it took too long. Please try again, perhaps with a simpler question.".to_string(),
            FailureKind::Transport => format!(
                "I ran into a network error while thinking about that. Please try again. Details: {}",
                truncate_chars(&self.detail, 100)
            ),
            FailureKind::Parse => "I had a little trouble understanding the response from my AI services. Could you ask again?".to_string(),
        }
    }
}

/// Outcome of a completion call.
///
/// `Text` is never empty: an empty body is reported as a parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    Failed(CompletionFailure),
}

impl Completion {
    pub fn text(&self) -> Option<&str> {
        match self {
            Completion::Text(text) => Some(text),
            Completion::Failed(_) => None,
        }
    }

    /// The model text, or the user-facing apology for a failure.
    pub fn into_answer(self) -> String {
        match self {
            Completion::Text(text) => text,
            Completion::Failed(failure) => failure.fallback_text(),
        }
    }
}

/// Text retrieved for one synthesized search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatheredResult {
    pub query: String,
    pub text: String,
}

/// Cut `text` to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

// Tests.
