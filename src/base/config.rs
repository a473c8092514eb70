//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use super::types::{Res, Void};

/// Default OpenRouter-compatible API base.
fn default_openrouter_api_base() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

/// Default referer sent for request attribution.
fn default_app_url() -> String {
    "https://persona-bot.app".to_string()
}

/// Default title sent for request attribution.
fn default_app_name() -> String {
    "Persona Bot".to_string()
}

/// Default model for the quick analysis calls (relevance, online judge, query synthesis).
fn default_fast_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

/// Default web-search-capable model for information gathering.
fn default_search_model() -> String {
    "perplexity/sonar".to_string()
}

/// Default model for the final answer.
fn default_answer_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

/// Model name fragments that accept the live-search directive.
fn default_search_capable_models() -> Vec<String> {
    vec!["perplexity".to_string()]
}

fn default_search_max_snippets() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_run_timeout_secs() -> u64 {
    600
}

fn default_context_window() -> usize {
    100
}

fn default_context_initial_batch() -> usize {
    20
}

fn default_context_snippet_chars() -> usize {
    100
}

fn default_search_concurrency() -> usize {
    3
}

/// How a relevance reply is matched against the `RELEVANT` verdict.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceMatch {
    /// A standalone `RELEVANT` word with no `NOT` among the three words before it.
    #[default]
    Token,
    /// Any occurrence of `RELEVANT`, which also matches `NOT RELEVANT`.
    Substring,
}

/// Configuration for the persona-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// OpenRouter API key (`PERSONA_BOT_OPENROUTER_API_KEY`).
    pub openrouter_api_key: String,
    /// Base URL of the OpenAI-compatible completion API (`PERSONA_BOT_OPENROUTER_API_BASE`).
    #[serde(default = "default_openrouter_api_base")]
    pub openrouter_api_base: String,
    /// Referer header sent with every request (`PERSONA_BOT_APP_URL`).
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Title header sent with every request (`PERSONA_BOT_APP_NAME`).
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Fast analysis tier (`PERSONA_BOT_FAST_MODEL`).
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    /// Web-search-capable tier (`PERSONA_BOT_SEARCH_MODEL`).
    #[serde(default = "default_search_model")]
    pub search_model: String,
    /// Answering tier (`PERSONA_BOT_ANSWER_MODEL`).
    #[serde(default = "default_answer_model")]
    pub answer_model: String,
    /// Model name fragments that get the live-search directive (`PERSONA_BOT_SEARCH_CAPABLE_MODELS`, comma separated).
    #[serde(default = "default_search_capable_models")]
    pub search_capable_models: Vec<String>,
    /// Snippets requested per live search (`PERSONA_BOT_SEARCH_MAX_SNIPPETS`).
    #[serde(default = "default_search_max_snippets")]
    pub search_max_snippets: u32,
    /// Ceiling for a single completion call, in seconds (`PERSONA_BOT_REQUEST_TIMEOUT_SECS`).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Ceiling for a whole orchestration run, in seconds (`PERSONA_BOT_RUN_TIMEOUT_SECS`).
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    /// Most recent messages considered for relevance (`PERSONA_BOT_CONTEXT_WINDOW`).
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    /// Newest messages checked in the first relevance stage (`PERSONA_BOT_CONTEXT_INITIAL_BATCH`).
    #[serde(default = "default_context_initial_batch")]
    pub context_initial_batch: usize,
    /// Characters of each message shown to the relevance check (`PERSONA_BOT_CONTEXT_SNIPPET_CHARS`).
    #[serde(default = "default_context_snippet_chars")]
    pub context_snippet_chars: usize,
    /// Relevance verdict matching (`PERSONA_BOT_RELEVANCE_MATCH`: `token` or `substring`).
    #[serde(default)]
    pub relevance_match: RelevanceMatch,
    /// Search queries gathered at once (`PERSONA_BOT_SEARCH_CONCURRENCY`).
    #[serde(default = "default_search_concurrency")]
    pub search_concurrency: usize,
    /// Optional persona override for the answering model (`PERSONA_BOT_PERSONA`).
    #[serde(default)]
    pub persona: Option<String>,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            openrouter_api_key: String::new(),
            openrouter_api_base: default_openrouter_api_base(),
            app_url: default_app_url(),
            app_name: default_app_name(),
            fast_model: default_fast_model(),
            search_model: default_search_model(),
            answer_model: default_answer_model(),
            search_capable_models: default_search_capable_models(),
            search_max_snippets: default_search_max_snippets(),
            request_timeout_secs: default_request_timeout_secs(),
            run_timeout_secs: default_run_timeout_secs(),
            context_window: default_context_window(),
            context_initial_batch: default_context_initial_batch(),
            context_snippet_chars: default_context_snippet_chars(),
            relevance_match: RelevanceMatch::default(),
            search_concurrency: default_search_concurrency(),
            persona: None,
        }
    }
}

impl ConfigInner {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Void {
        if self.openrouter_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("OpenRouter API key must be set."));
        }

        for (name, model) in [("fast", &self.fast_model), ("search", &self.search_model), ("answer", &self.answer_model)] {
            if model.trim().is_empty() {
                return Err(anyhow::anyhow!("The {name} model identifier must not be empty."));
            }
        }

        if self.context_initial_batch < 1 {
            return Err(anyhow::anyhow!("Context initial batch must be at least 1."));
        }

        if self.context_window < self.context_initial_batch {
            return Err(anyhow::anyhow!("Context window must be at least as large as the initial batch."));
        }

        if self.search_concurrency < 1 {
            return Err(anyhow::anyhow!("Search concurrency must be at least 1."));
        }

        if self.request_timeout_secs < 1 || self.run_timeout_secs < 1 {
            return Err(anyhow::anyhow!("Timeouts must be at least one second."));
        }

        Ok(())
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(
            config::Environment::default()
                .prefix("PERSONA_BOT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("search_capable_models"),
        );

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }
}

// Tests.
