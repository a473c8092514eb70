#![cfg(test)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use mockall::mock;
use persona_bot::{
    assistant::{
        Assistant,
        context::ContextAnalyzer,
        gather::{EXTRACTED_LINKS_HEADER, InformationGatherer, NO_RESULTS_TEXT},
        judge::OnlineJudge,
        queries::QuerySynthesizer,
    },
    base::{
        config::{Config, ConfigInner},
        prompts,
        types::{CANCELLED_REPLY, Completion, CompletionFailure, CompletionRequest, ContextMessage},
    },
    runtime::Runtime,
    service::llm::{GenericLlmClient, LlmClient},
};
use tokio_util::sync::CancellationToken;

// Mocks.

// Mock LLM client for testing.

mock! {
    pub Llm {}

    #[async_trait]
    impl GenericLlmClient for Llm {
        async fn complete(&self, request: &CompletionRequest) -> Completion;
    }
}

/// Stub that answers after a delay chosen by the request.
struct DelayedLlm;

#[async_trait]
impl GenericLlmClient for DelayedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Completion {
        let delay = match request.user_instruction.as_str() {
            "slow" => 300,
            "sleepy" => 10_000,
            _ => 10,
        };

        tokio::time::sleep(Duration::from_millis(delay)).await;

        Completion::Text(format!("answer for {}", request.user_instruction))
    }
}

// Helpers.

type Calls = Arc<Mutex<Vec<CompletionRequest>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Analyze,
    Judge,
    Synthesize,
    Search,
    Answer,
}

fn stage_of(request: &CompletionRequest) -> Stage {
    if request.system_instruction == prompts::CONTEXT_ANALYZER_DIRECTIVE {
        Stage::Analyze
    } else if request.system_instruction == prompts::ONLINE_JUDGE_DIRECTIVE {
        Stage::Judge
    } else if request.enable_live_search {
        Stage::Search
    } else if request.model == "answer" {
        Stage::Answer
    } else {
        Stage::Synthesize
    }
}

fn test_config() -> Config {
    Config::from(ConfigInner {
        openrouter_api_key: "sk-test".to_string(),
        fast_model: "fast".to_string(),
        search_model: "perplexity/sonar".to_string(),
        answer_model: "answer".to_string(),
        ..Default::default()
    })
}

fn text(reply: &str) -> Completion {
    Completion::Text(reply.to_string())
}

/// A mock that records every request and answers through `reply`.
fn scripted<F>(reply: F) -> (LlmClient, Calls)
where
    F: Fn(Stage, &CompletionRequest) -> Completion + Send + 'static,
{
    let calls: Calls = Arc::default();
    let log = calls.clone();

    let mut mock = MockLlm::new();
    mock.expect_complete().returning(move |request| {
        log.lock().unwrap().push(request.clone());
        reply(stage_of(request), request)
    });

    (LlmClient::new(Arc::new(mock)), calls)
}

fn stages(calls: &Calls) -> Vec<Stage> {
    calls.lock().unwrap().iter().map(stage_of).collect()
}

fn request_for(calls: &Calls, stage: Stage) -> CompletionRequest {
    calls.lock().unwrap().iter().find(|r| stage_of(r) == stage).cloned().expect("stage was called")
}

fn numbered_messages(count: usize) -> Vec<ContextMessage> {
    (0..count).map(|i| ContextMessage::new(format!("user{i}"), i.to_string(), format!("message {i}"))).collect()
}

fn trailer_chat() -> Vec<ContextMessage> {
    vec![ContextMessage::new("ann", "1", "morning all"), ContextMessage::new("bob", "2", "check out this minecraft trailer")]
}

const TRAILER_URL: &str = "https://www.youtube.com/watch?v=PE2YZhcC4NY";

fn trailer_reply(stage: Stage, request: &CompletionRequest) -> Completion {
    match stage {
        Stage::Analyze => text("RELEVANT"),
        Stage::Judge => text("YES"),
        Stage::Synthesize => text("```json\n[\"minecraft trailer\", \"minecraft trailer youtube\"]\n```"),
        Stage::Search => Completion::Text(format!("The official trailer for {} is at {}", request.user_instruction, TRAILER_URL)),
        Stage::Answer => text("Here it is!"),
    }
}

// Orchestrator.

#[tokio::test]
async fn online_run_passes_video_links_to_the_answer() {
    let (llm, calls) = scripted(trailer_reply);
    let assistant = Assistant::new(&test_config(), llm);

    let answer = assistant.get_ai_response("link?", Some(&trailer_chat())).await;

    assert_eq!(answer, "Here it is!");
    assert_eq!(stages(&calls), vec![Stage::Analyze, Stage::Judge, Stage::Synthesize, Stage::Search, Stage::Search, Stage::Answer]);

    let judge = request_for(&calls, Stage::Judge);
    assert!(judge.user_instruction.contains("[Message 2] bob: check out this minecraft trailer"));

    let searches: Vec<CompletionRequest> = calls.lock().unwrap().iter().filter(|r| stage_of(r) == Stage::Search).cloned().collect();
    assert_eq!(searches[0].user_instruction, "minecraft trailer");
    assert_eq!(searches[1].user_instruction, "minecraft trailer youtube");
    assert!(searches.iter().all(|r| r.model == "perplexity/sonar"));

    let composed = request_for(&calls, Stage::Answer);
    assert!(composed.user_instruction.contains(TRAILER_URL));
    assert!(composed.user_instruction.contains(EXTRACTED_LINKS_HEADER));
    assert!(composed.user_instruction.contains("Message from bob (ID:2): check out this minecraft trailer"));
    assert!(!composed.enable_live_search);
}

#[tokio::test]
async fn offline_run_without_history_skips_context_and_search() {
    let (llm, calls) = scripted(|stage, _| match stage {
        Stage::Judge => text("NO"),
        Stage::Answer => text("4"),
        other => panic!("unexpected {other:?} call"),
    });
    let assistant = Assistant::new(&test_config(), llm);

    let answer = assistant.get_ai_response("what's 2+2", None).await;

    assert_eq!(answer, "4");
    assert_eq!(stages(&calls), vec![Stage::Judge, Stage::Answer]);
    assert_eq!(request_for(&calls, Stage::Judge).user_instruction, "what's 2+2");

    let composed = request_for(&calls, Stage::Answer);
    assert!(composed.user_instruction.contains("The user asked: \"what's 2+2\""));
    assert!(!composed.user_instruction.contains("BEGIN GATHERED INFORMATION"));
    assert!(!composed.user_instruction.contains("BEGIN CONVERSATION CONTEXT"));
}

#[tokio::test]
async fn empty_history_is_treated_as_no_history() {
    let (llm, calls) = scripted(|stage, _| match stage {
        Stage::Judge => text("NO"),
        _ => text("fine"),
    });
    let assistant = Assistant::new(&test_config(), llm);

    assistant.get_ai_response("hello there", Some(&[])).await;

    assert!(!stages(&calls).contains(&Stage::Analyze));
}

#[tokio::test]
async fn failed_judge_falls_back_to_offline() {
    let (llm, calls) = scripted(|stage, _| match stage {
        Stage::Judge => Completion::Failed(CompletionFailure::timeout()),
        Stage::Answer => text("Offline answer."),
        other => panic!("unexpected {other:?} call"),
    });
    let assistant = Assistant::new(&test_config(), llm);

    let answer = assistant.get_ai_response("latest rust release?", None).await;

    assert_eq!(answer, "Offline answer.");
    assert_eq!(stages(&calls), vec![Stage::Judge, Stage::Answer]);
}

#[tokio::test]
async fn failed_answer_call_returns_its_fallback_text() {
    let (llm, _) = scripted(|stage, _| match stage {
        Stage::Judge => text("NO"),
        _ => Completion::Failed(CompletionFailure::transport("connection reset by peer")),
    });
    let assistant = Assistant::new(&test_config(), llm);

    let answer = assistant.get_ai_response("hi", None).await;

    assert_eq!(answer, CompletionFailure::transport("connection reset by peer").fallback_text());
}

#[tokio::test]
async fn persona_override_reaches_the_answer_call() {
    let (llm, calls) = scripted(|stage, _| match stage {
        Stage::Judge => text("NO"),
        _ => text("Woof."),
    });
    let assistant = Assistant::new(&test_config(), llm).with_persona("You are Rex, a friendly dog.");

    assistant.get_ai_response("who are you", None).await;

    let composed = request_for(&calls, Stage::Answer);
    assert!(composed.system_instruction.starts_with("You are Rex, a friendly dog."));
    assert!(composed.system_instruction.contains(prompts::PLATFORM_FORMAT_NOTE));
}

#[tokio::test]
async fn repeated_runs_give_the_same_answer() {
    let (llm, calls) = scripted(trailer_reply);
    let assistant = Assistant::new(&test_config(), llm);
    let chat = trailer_chat();

    let first = assistant.get_ai_response("link?", Some(&chat)).await;
    let second = assistant.get_ai_response("link?", Some(&chat)).await;

    assert_eq!(first, second);

    let answers: Vec<String> = calls.lock().unwrap().iter().filter(|r| stage_of(r) == Stage::Answer).map(|r| r.user_instruction.clone()).collect();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0], answers[1]);
}

#[tokio::test]
async fn concurrent_runs_do_not_share_state() {
    let (llm, _) = scripted(|stage, request| match stage {
        Stage::Judge => text("NO"),
        _ if request.user_instruction.contains("\"alpha\"") => text("A"),
        _ => text("B"),
    });
    let assistant = Assistant::new(&test_config(), llm);

    let (a, b) = tokio::join!(assistant.get_ai_response("alpha", None), assistant.get_ai_response("beta", None));

    assert_eq!(a, "A");
    assert_eq!(b, "B");
}

#[tokio::test]
async fn cancelled_run_returns_the_cancellation_reply() {
    let assistant = Assistant::new(&test_config(), LlmClient::new(Arc::new(DelayedLlm)));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let answer = assistant.get_ai_response_cancellable("sleepy", None, cancel).await;

    assert_eq!(answer, CANCELLED_REPLY);
}

#[tokio::test]
async fn slow_run_hits_the_run_timeout() {
    let config = Config::from(ConfigInner {
        openrouter_api_key: "sk-test".to_string(),
        run_timeout_secs: 1,
        ..Default::default()
    });
    let assistant = Assistant::new(&config, LlmClient::new(Arc::new(DelayedLlm)));

    let answer = assistant.get_ai_response("sleepy", None).await;

    assert_eq!(answer, CompletionFailure::timeout().fallback_text());
}

#[tokio::test]
async fn runtime_wires_the_assistant_to_its_client() {
    let (llm, calls) = scripted(|stage, _| match stage {
        Stage::Judge => text("NO"),
        _ => text("Hello!"),
    });
    let runtime = Runtime::with_llm(test_config(), llm);

    let answer = runtime.assistant.get_ai_response("hi", None).await;

    assert_eq!(answer, "Hello!");
    assert_eq!(calls.lock().unwrap().len(), 2);
    assert_eq!(runtime.assistant.persona(), prompts::DEFAULT_PERSONA);
}

// Context relevance.

#[tokio::test]
async fn relevant_first_batch_needs_one_call() {
    let mut mock = MockLlm::new();
    mock.expect_complete()
        .withf(|r| r.system_instruction == prompts::CONTEXT_ANALYZER_DIRECTIVE && r.model == "fast")
        .times(1)
        .returning(|_| text("RELEVANT"));
    let analyzer = ContextAnalyzer::new(LlmClient::new(Arc::new(mock)), test_config());
    let messages = numbered_messages(100);

    let relevant = analyzer.find_relevant_context("what about that?", &messages).await;

    assert_eq!(relevant, messages[80..].to_vec());
}

#[tokio::test]
async fn relevant_older_batch_returns_the_whole_window() {
    let (llm, calls) = scripted(|_, request| {
        if request.user_instruction.contains("More previous messages") { text("RELEVANT") } else { text("NOT RELEVANT") }
    });
    let analyzer = ContextAnalyzer::new(llm, test_config());
    let messages = numbered_messages(100);

    let relevant = analyzer.find_relevant_context("what about that?", &messages).await;

    assert_eq!(relevant, messages);
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn window_is_capped_to_the_newest_hundred() {
    let (llm, calls) = scripted(|_, request| {
        if request.user_instruction.contains("More previous messages") { text("RELEVANT") } else { text("NOT RELEVANT") }
    });
    let analyzer = ContextAnalyzer::new(llm, test_config());
    let messages = numbered_messages(101);

    let relevant = analyzer.find_relevant_context("what about that?", &messages).await;

    assert_eq!(relevant.len(), 100);
    assert_eq!(relevant[0].content, "message 1");
    assert_eq!(relevant, messages[1..].to_vec());

    let first = calls.lock().unwrap()[0].user_instruction.clone();
    assert!(first.contains("message 100"));
    assert!(!first.contains("message 80\n"));
}

#[tokio::test]
async fn irrelevant_history_yields_nothing() {
    let (llm, calls) = scripted(|_, _| text("NOT RELEVANT"));
    let analyzer = ContextAnalyzer::new(llm, test_config());

    let relevant = analyzer.find_relevant_context("new topic", &numbered_messages(50)).await;

    assert!(relevant.is_empty());
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_relevance_checks_yield_nothing() {
    let (llm, calls) = scripted(|_, _| Completion::Failed(CompletionFailure::parse("empty body")));
    let analyzer = ContextAnalyzer::new(llm, test_config());

    let relevant = analyzer.find_relevant_context("new topic", &numbered_messages(30)).await;

    assert!(relevant.is_empty());
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn no_messages_means_no_relevance_call() {
    let mut mock = MockLlm::new();
    mock.expect_complete().never();
    let analyzer = ContextAnalyzer::new(LlmClient::new(Arc::new(mock)), test_config());

    assert!(analyzer.find_relevant_context("anything", &[]).await.is_empty());
}

#[tokio::test]
async fn snippets_are_truncated_for_the_relevance_check() {
    let (llm, calls) = scripted(|_, _| text("RELEVANT"));
    let analyzer = ContextAnalyzer::new(llm, test_config());
    let long = ContextMessage::new("ann", "1", "x".repeat(500));

    let relevant = analyzer.find_relevant_context("and?", std::slice::from_ref(&long)).await;

    assert_eq!(relevant, vec![long]);
    let prompt = calls.lock().unwrap()[0].user_instruction.clone();
    assert!(prompt.contains(&"x".repeat(100)));
    assert!(!prompt.contains(&"x".repeat(101)));
}

// Online judge.

#[tokio::test]
async fn judge_accepts_yes_prefixed_replies_only() {
    for (reply, expected) in [("YES", true), ("yes please", true), ("NO", false), ("maybe", false), ("", false)] {
        let (llm, _) = scripted(move |_, _| text(reply));
        let judge = OnlineJudge::new(llm, test_config());

        assert_eq!(judge.needs_online_data("latest news?", &[]).await, expected, "reply {reply:?}");
    }
}

// Query synthesis.

#[tokio::test]
async fn synthesizer_returns_fenced_json_unchanged() {
    let (llm, calls) = scripted(|_, _| text("```json\n[\"minecraft trailer\", \"minecraft trailer youtube\"]\n```"));
    let synthesizer = QuerySynthesizer::new(llm, test_config());

    let queries = synthesizer.generate_search_queries("link?", &trailer_chat()).await;

    assert_eq!(queries, vec!["minecraft trailer".to_string(), "minecraft trailer youtube".to_string()]);

    let request = calls.lock().unwrap()[0].clone();
    assert_eq!(request.model, "fast");
    assert!(request.system_instruction.is_empty());
    assert!(request.user_instruction.contains("MESSAGE 2: bob: check out this minecraft trailer"));
}

#[tokio::test]
async fn synthesizer_falls_back_to_media_context() {
    let (llm, _) = scripted(|_, _| text("sure! here are some ideas: minecraft stuff"));
    let synthesizer = QuerySynthesizer::new(llm, test_config());

    let queries = synthesizer.generate_search_queries("link?", &trailer_chat()).await;

    assert!(!queries.is_empty());
    assert!(queries.iter().all(|q| q.contains("minecraft")));
    assert!(queries.iter().any(|q| q.contains("trailer")));
}

#[tokio::test]
async fn synthesizer_falls_back_to_the_query_itself() {
    let (llm, _) = scripted(|_, _| text("no json here"));
    let synthesizer = QuerySynthesizer::new(llm, test_config());

    let queries = synthesizer.generate_search_queries("rust 1.80 release date", &[]).await;

    assert_eq!(queries, vec!["rust 1.80 release date".to_string()]);
}

#[tokio::test]
async fn synthesizer_survives_failed_calls() {
    let (llm, _) = scripted(|_, _| Completion::Failed(CompletionFailure::timeout()));
    let synthesizer = QuerySynthesizer::new(llm, test_config());

    let queries = synthesizer.generate_search_queries("link?", &trailer_chat()).await;

    assert_eq!(queries, vec!["minecraft official trailer".to_string(), "minecraft movie trailer".to_string()]);
}

// Information gathering.

#[tokio::test]
async fn gathered_results_follow_query_order() {
    let gatherer = InformationGatherer::new(LlmClient::new(Arc::new(DelayedLlm)), test_config());

    let gathered = gatherer.gather(&["slow".to_string(), "quick".to_string()]).await;

    let slow = gathered.find("Results for search query \"slow\":\nanswer for slow").unwrap();
    let quick = gathered.find("Results for search query \"quick\":\nanswer for quick").unwrap();
    assert!(slow < quick);
}

#[tokio::test]
async fn failed_search_does_not_sink_the_others() {
    let (llm, calls) = scripted(|_, request| {
        if request.user_instruction == "broken" {
            Completion::Failed(CompletionFailure::transport("HTTP 502"))
        } else {
            Completion::Text(format!("found {}", request.user_instruction))
        }
    });
    let gatherer = InformationGatherer::new(llm, test_config());

    let gathered = gatherer.gather(&["broken".to_string(), "working".to_string()]).await;

    assert!(gathered.contains(&format!("Results for search query \"broken\":\n{NO_RESULTS_TEXT}")));
    assert!(gathered.contains("Results for search query \"working\":\nfound working"));

    let requests = calls.lock().unwrap();
    assert!(requests.iter().all(|r| r.enable_live_search));
    assert!(requests.iter().all(|r| r.system_instruction.contains(&r.user_instruction)));
}
