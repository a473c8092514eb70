//! Binary entry point for `persona-bot`.
//!
//! This module provides the command-line interface for persona-bot with options
//! for configuration file paths and logging verbosity. It answers one query per
//! invocation, or validates the configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use persona_bot::base::{
    config::Config,
    types::{ContextMessage, Res, Void},
};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Persona-bot – a chat assistant that searches the web when it has to.
///
/// Configuration can come from `config.toml` or `PERSONA_BOT_*` environment
/// variables. Logs go to stderr; the answer is printed to stdout.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, the bot will look for a config file at `.hidden/config.toml`
    /// in the current directory.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Export spans over OTLP/HTTP (uses the standard `OTEL_EXPORTER_OTLP_*` variables).
    #[arg(long)]
    otlp: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single query.
    Ask {
        /// The query to answer.
        query: String,
        /// JSON file holding earlier channel messages, oldest first.
        #[arg(long)]
        history: Option<PathBuf>,
        /// Persona text that replaces the configured one.
        #[arg(long)]
        persona: Option<String>,
    },
    /// Load and validate the configuration, then print a summary.
    CheckConfig,
}

/// Main entry point for the persona-bot binary.
///
/// Sets up logging based on verbosity, loads configuration, and runs the command.
#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer.

    let otel = if args.otlp {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("persona-bot");
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(level_filter).with(stderr).init();

    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Ask { query, history, persona } => {
            let history = match history {
                Some(path) => read_history(&path)?,
                None => Vec::new(),
            };

            let answer = persona_bot::ask(config, &query, history, persona).await?;

            println!("{answer}");
        }
        Command::CheckConfig => {
            println!("api base:        {}", config.openrouter_api_base);
            println!("fast model:      {}", config.fast_model);
            println!("search model:    {}", config.search_model);
            println!("answer model:    {}", config.answer_model);
            println!("context window:  {} (first batch {})", config.context_window, config.context_initial_batch);
            println!("relevance match: {:?}", config.relevance_match);
            println!("timeouts:        {}s per call, {}s per run", config.request_timeout_secs, config.run_timeout_secs);
        }
    }

    Ok(())
}

/// Read a JSON array of messages, dropping the ones without text.
fn read_history(path: &Path) -> Res<Vec<ContextMessage>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read history file `{}`", path.display()))?;
    let messages: Vec<ContextMessage> = serde_json::from_str(&raw).with_context(|| format!("Failed to parse history file `{}`", path.display()))?;

    Ok(ContextMessage::prepare_history(messages))
}
