//! Integration with an OpenRouter-compatible chat completion endpoint.
//!
//! Requests are built with the `async-openai` chat types and sent with `reqwest`,
//! which lets us attach the provider-specific live-search `options` block that
//! the typed OpenAI request does not model.
//!
//! Every failure is folded into `Completion::Failed` here; nothing above this
//! layer sees a transport or decoding error.

use std::sync::Arc;
use std::time::Duration;

use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::base::{
    config::Config,
    types::{Completion, CompletionFailure, CompletionRequest, Res, truncate_chars},
};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openrouter implementation.

impl LlmClient {
    pub fn openrouter(config: &Config) -> Res<Self> {
        let client = OpenRouterLlmClient::new(config)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Wire types.

/// Chat completion body with the optional live-search directive.
#[derive(Debug, Serialize)]
struct ChatRequest {
    #[serde(flatten)]
    inner: CreateChatCompletionRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<SearchOptions>,
}

#[derive(Debug, Serialize)]
struct SearchOptions {
    search: bool,
    search_contexts: Vec<SearchContext>,
}

#[derive(Debug, Serialize)]
struct SearchContext {
    search_query: String,
    max_snippets: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Specific implementations.

/// OpenRouter LLM client implementation.
#[derive(Clone)]
pub struct OpenRouterLlmClient {
    http: reqwest::Client,
    config: Config,
}

impl OpenRouterLlmClient {
    /// Create a new OpenRouter LLM client.
    #[instrument(name = "OpenRouterLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let http = reqwest::Client::builder().build()?;

        Ok(Self::with_http_client(config, http))
    }

    /// Create a client around an existing `reqwest` client.
    pub fn with_http_client(config: &Config, http: reqwest::Client) -> Self {
        Self { http, config: config.clone() }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.openrouter_api_base.trim_end_matches('/'))
    }

    /// Whether the model belongs to a family that accepts the live-search directive.
    fn supports_live_search(&self, model: &str) -> bool {
        let model = model.to_lowercase();

        self.config.search_capable_models.iter().any(|fragment| model.contains(&fragment.to_lowercase()))
    }

    /// Build the request body.
    fn build_request_body(&self, request: &CompletionRequest) -> Res<ChatRequest> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default().content(request.system_instruction.clone()).build()?.into(),
            ChatCompletionRequestUserMessageArgs::default().content(request.user_instruction.clone()).build()?.into(),
        ];

        let inner = CreateChatCompletionRequestArgs::default().model(&request.model).messages(messages).build()?;

        // The provider searches with the user instruction verbatim.
        let options = (request.enable_live_search && self.supports_live_search(&request.model)).then(|| SearchOptions {
            search: true,
            search_contexts: vec![SearchContext {
                search_query: request.user_instruction.clone(),
                max_snippets: self.config.search_max_snippets,
            }],
        });

        Ok(ChatRequest { inner, options })
    }

    /// Send one request, bounded by the per-call timeout. No retries.
    async fn send(&self, body: &ChatRequest) -> Result<String, CompletionFailure> {
        let exchange = async {
            let response = self
                .http
                .post(self.endpoint())
                .bearer_auth(&self.config.openrouter_api_key)
                .header("HTTP-Referer", &self.config.app_url)
                .header("X-Title", &self.config.app_name)
                .json(body)
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            let status = response.status();
            if !status.is_success() {
                let error = response.text().await.unwrap_or_default();
                return Err(CompletionFailure::transport(format!("HTTP {status}: {error}")));
            }

            let bytes = response.bytes().await.map_err(classify_reqwest_error)?;

            parse_completion_body(&bytes)
        };

        match timeout(Duration::from_secs(self.config.request_timeout_secs), exchange).await {
            Ok(result) => result,
            Err(_) => Err(CompletionFailure::timeout()),
        }
    }
}

#[async_trait]
impl GenericLlmClient for OpenRouterLlmClient {
    #[instrument(name = "OpenRouterLlmClient::complete", skip_all, fields(model = %request.model, live_search = request.enable_live_search))]
    async fn complete(&self, request: &CompletionRequest) -> Completion {
        let body = match self.build_request_body(request) {
            Ok(body) => body,
            Err(err) => {
                warn!("Could not build completion request: {err}");
                return Completion::Failed(CompletionFailure::transport(err));
            }
        };

        if let Some(options) = &body.options {
            info!("Enabling live search for {} with {} snippets", request.model, options.search_contexts[0].max_snippets);
        }

        match self.send(&body).await {
            Ok(text) => {
                debug!("Completion returned {} chars", text.len());
                Completion::Text(text)
            }
            Err(failure) => {
                warn!(
                    "Completion via {} failed ({:?}) for '{}': {}",
                    request.model,
                    failure.kind,
                    truncate_chars(&request.user_instruction, 50),
                    failure.detail
                );
                Completion::Failed(failure)
            }
        }
    }
}

/// Map a `reqwest` error onto the completion failure taxonomy.
fn classify_reqwest_error(err: reqwest::Error) -> CompletionFailure {
    if err.is_timeout() {
        CompletionFailure::timeout()
    } else if err.is_decode() {
        CompletionFailure::parse(err)
    } else {
        CompletionFailure::transport(err)
    }
}

/// Pull the first choice's text out of a response body.
fn parse_completion_body(bytes: &[u8]) -> Result<String, CompletionFailure> {
    let response: ChatResponse = serde_json::from_slice(bytes).map_err(CompletionFailure::parse)?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| CompletionFailure::parse("response has no message content"))?;

    if content.trim().is_empty() {
        return Err(CompletionFailure::parse("response content is empty"));
    }

    Ok(content)
}

// Tests.
