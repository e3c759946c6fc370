//! Quill - CLI Coding Assistant
//!
//! Command-line front end for the quill routing core. Loads configuration,
//! builds the provider router, and exposes three subcommands:
//!
//! ```bash
//! # Ask a question (auto mode)
//! quill ask "How do I reverse a Vec in Rust?"
//!
//! # Force a mode and attach project files as context
//! quill ask --mode thorough --file src/main.rs --file src/lib.rs "Refactor this"
//!
//! # Probe configured providers
//! quill health
//!
//! # Show routing statistics
//! quill metrics
//!
//! # Verbose logging
//! RUST_LOG=debug quill ask "..."
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use quill_core::config::{load_config, load_config_from_path, QuillConfig};
use quill_core::routing::RouterEvent;
use quill_core::{ExecutionMode, GenerationRequest, ProjectContext, ProviderRouter};

/// Quill - route coding questions across local and hosted LLM backends
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "QUILL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "QUILL_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a prompt through the router and print the response
    Ask {
        /// Prompt text; reads stdin when omitted
        prompt: Option<String>,

        /// Execution mode: fast, balanced, thorough, or auto
        #[arg(short, long, default_value = "auto")]
        mode: String,

        /// Project files to attach as context (repeatable)
        #[arg(short = 'f', long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Bypass admission control instead of queueing
        #[arg(long)]
        no_queue: bool,
    },

    /// Probe every configured provider and report reachability
    Health,

    /// Print the router's statistics snapshot
    Metrics,
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("quill={log_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(path: Option<&PathBuf>) -> Result<QuillConfig> {
    match path {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => load_config().context("loading config"),
    }
}

/// Build a project context from the given file paths: the file list plus
/// their combined size. Unreadable files still count as context entries.
fn gather_context(files: &[PathBuf]) -> Option<ProjectContext> {
    if files.is_empty() {
        return None;
    }
    let total_bytes = files
        .iter()
        .filter_map(|f| std::fs::metadata(f).ok())
        .map(|m| m.len())
        .sum();
    let files = files
        .iter()
        .map(|f| f.display().to_string())
        .collect::<Vec<_>>();
    Some(ProjectContext::new(files, total_bytes))
}

fn read_prompt(prompt: Option<String>) -> Result<String> {
    match prompt {
        Some(prompt) => Ok(prompt),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading prompt from stdin")?;
            Ok(buffer)
        }
    }
}

async fn run_ask(
    router: &ProviderRouter,
    prompt: Option<String>,
    mode: &str,
    files: &[PathBuf],
    no_queue: bool,
) -> Result<()> {
    let mode: ExecutionMode = mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("parsing --mode")?;
    let prompt = read_prompt(prompt)?;
    let request = GenerationRequest::new(prompt).with_mode(mode);
    let context = gather_context(files);

    // Surface per-attempt progress through the log stream
    let mut events = router.subscribe();
    let progress = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RouterEvent::RequestStart { provider, .. } => {
                    info!(%provider, "attempting");
                }
                RouterEvent::RequestComplete {
                    provider,
                    success,
                    error,
                    ..
                } => {
                    if success {
                        info!(%provider, "completed");
                    } else {
                        info!(%provider, error = error.as_deref().unwrap_or(""), "attempt failed");
                    }
                }
            }
        }
    });

    let result = if no_queue {
        router.process_request(request, context).await
    } else {
        router.queue_request(request, context).await
    };
    progress.abort();

    let response = result.context("request failed")?;
    println!("{}", response.content);
    if let Some(usage) = response.usage {
        info!(model = %response.model, tokens = usage.total_tokens, "usage");
    }
    Ok(())
}

async fn run_health(router: &ProviderRouter) -> Result<()> {
    let health = router.health_check().await;
    let mut any_healthy = false;
    let mut kinds: Vec<_> = health.iter().collect();
    kinds.sort_by_key(|(kind, _)| kind.to_string());

    for (kind, healthy) in kinds {
        println!("{kind:12} {}", if *healthy { "ok" } else { "unreachable" });
        any_healthy |= *healthy;
    }
    if !any_healthy {
        bail!("no provider is reachable");
    }
    Ok(())
}

fn run_metrics(router: &ProviderRouter) {
    let summary = router.metrics();
    println!(
        "active requests: {}  queued: {}",
        summary.active_requests, summary.queue_depth
    );
    let mut providers: Vec<_> = summary.providers.iter().collect();
    providers.sort_by_key(|(kind, _)| kind.to_string());
    for (kind, stats) in providers {
        println!(
            "{kind:12} samples={:<6} success={:.1}%  avg latency={:.0}ms",
            stats.samples,
            stats.success_rate * 100.0,
            stats.average_latency_ms
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = resolve_config(args.config.as_ref())?;
    let router = ProviderRouter::initialize_with_security(config.router, config.security)
        .context("initializing router")?;

    let result = match &args.command {
        Command::Ask {
            prompt,
            mode,
            files,
            no_queue,
        } => run_ask(&router, prompt.clone(), mode, files, *no_queue).await,
        Command::Health => run_health(&router).await,
        Command::Metrics => {
            run_metrics(&router);
            Ok(())
        }
    };

    router.shutdown().await;
    result
}
