//! Runs synthesized search queries against the web-search-capable model.

use std::sync::OnceLock;

use futures::{StreamExt, stream};
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        prompts,
        types::{Completion, CompletionRequest, GatheredResult, truncate_chars},
    },
    service::llm::LlmClient,
};

/// Separator between per-query results.
pub const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// Header of the verbatim video link listing.
pub const EXTRACTED_LINKS_HEADER: &str = "=== EXTRACTED VIDEO LINKS - USE THESE EXACT LINKS ===";

/// Stand-in text for a search that produced nothing.
pub const NO_RESULTS_TEXT: &str = "No information could be retrieved for this search.";

static VIDEO_LINK: OnceLock<Regex> = OnceLock::new();

fn video_link_regex() -> &'static Regex {
    VIDEO_LINK.get_or_init(|| Regex::new(r"https?://(?:(?:www\.|m\.)?youtube\.com/watch\?v=|youtu\.be/)[\w-]+").expect("video link pattern is valid"))
}

/// Information gatherer.
#[derive(Clone)]
pub struct InformationGatherer {
    llm: LlmClient,
    config: Config,
}

impl InformationGatherer {
    pub fn new(llm: LlmClient, config: Config) -> Self {
        Self { llm, config }
    }

    /// Search every query and return the labelled, concatenated results.
    ///
    /// Up to `search_concurrency` searches run at once; output order always
    /// follows `search_queries`.
    #[instrument(name = "InformationGatherer::gather", skip_all, fields(queries = search_queries.len()))]
    pub async fn gather(&self, search_queries: &[String]) -> String {
        let total = search_queries.len();

        let results: Vec<GatheredResult> = stream::iter(search_queries.iter().enumerate())
            .map(|(index, query)| self.search(index, total, query))
            .buffered(self.config.search_concurrency.max(1))
            .collect()
            .await;

        let aggregated = render_results(&results);

        info!("Aggregated {} chars of search results", aggregated.len());

        aggregated
    }

    /// Run one live search.
    async fn search(&self, index: usize, total: usize, query: &str) -> GatheredResult {
        info!("Processing search query {}/{}: '{}'", index + 1, total, truncate_chars(query, 70));

        let directive = prompts::fill(prompts::GATHER_DIRECTIVE_TEMPLATE, &[("search_query", query)]);
        let request = CompletionRequest::new(&self.config.search_model, directive, query).with_live_search();

        let text = match self.llm.complete(&request).await {
            Completion::Text(text) => text,
            Completion::Failed(failure) => {
                warn!("Search for '{}' failed ({:?})", truncate_chars(query, 50), failure.kind);
                NO_RESULTS_TEXT.to_string()
            }
        };

        GatheredResult { query: query.to_string(), text }
    }
}

/// Concatenate labelled results and append any video links found in them.
pub fn render_results(results: &[GatheredResult]) -> String {
    let mut aggregated = results
        .iter()
        .map(|result| format!("Results for search query \"{}\":\n{}", result.query, result.text))
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR);

    let links = extract_video_links(&aggregated);
    if !links.is_empty() {
        aggregated.push_str("\n\n");
        aggregated.push_str(EXTRACTED_LINKS_HEADER);
        aggregated.push('\n');
        aggregated.push_str(&links.join("\n"));
    }

    aggregated
}

/// Video watch links in order of first appearance, without duplicates.
pub fn extract_video_links(text: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();

    for found in video_link_regex().find_iter(text) {
        if !links.iter().any(|l| l == found.as_str()) {
            links.push(found.as_str().to_string());
        }
    }

    links
}

// Tests.
