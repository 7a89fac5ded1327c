//! Delve CLI: run one deep-research query from the terminal.
//!
//! Plans sub-queries, searches arXiv, the web and Kaggle, checks coverage,
//! follows related papers, then writes a Markdown report.

mod output;
mod progress;

use clap::{CommandFactory, Parser};
use delve_core::error::{DelveError, WorkflowError};
use delve_core::research::WorkflowEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Delve: iterative deep research with cited reports
#[derive(Parser, Debug)]
#[command(name = "delve", version, about, long_about = None)]
struct Cli {
    /// Research question (all words are joined with spaces)
    query: Vec<String>,

    /// Model identifier for the oracle
    #[arg(short, long)]
    model: Option<String>,

    /// Cloud region for the Bedrock backend
    #[arg(long)]
    region: Option<String>,

    /// Oracle backend: bedrock or anthropic
    #[arg(long)]
    provider: Option<String>,

    /// Output language for the outline and article
    #[arg(long)]
    language: Option<String>,

    /// Workspace directory (for .delve/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory reports are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let query = cli.query.join(" ").trim().to_string();
    if query.is_empty() {
        eprintln!("{}", Cli::command().render_usage());
        std::process::exit(1);
    }

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));

    let log_dir = directories::ProjectDirs::from("dev", "delve", "delve")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "delve.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    // Load configuration
    let mut config =
        delve_core::config::load_config(Some(&workspace), cli.config.as_deref(), None)
            .map_err(DelveError::from)?;

    // Apply CLI overrides
    if let Some(model) = &cli.model {
        config.oracle.model = model.clone();
    }
    if let Some(region) = &cli.region {
        config.oracle.region = region.clone();
    }
    if let Some(provider) = &cli.provider {
        config.oracle.provider = provider.clone();
    }
    if let Some(language) = &cli.language {
        config.research.language = language.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.report.output_dir = dir.clone();
    }
    for warning in config.oracle.validate() {
        tracing::warn!("{}", warning);
    }

    let oracle = delve_core::create_oracle(&config.oracle)?;
    let providers = delve_tools::default_providers(&config.search)?;
    let engine = WorkflowEngine::new(oracle, providers, config.research.clone())
        .with_callback(Arc::new(progress::ConsoleProgress::new(cli.quiet)));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted; stopping the run...");
            on_interrupt.cancel();
        }
    });

    println!("Query: {}", query);
    println!("Model: {} ({})", config.oracle.model, config.oracle.provider);
    println!(
        "Started: {}",
        chrono::Local::now().format(output::TIMESTAMP_FORMAT)
    );

    let state = match engine.run(&query, &cancel).await {
        Ok(state) => state,
        Err(DelveError::Workflow(WorkflowError::Cancelled { stage })) => {
            eprintln!("Research cancelled while {}; no report was written.", stage);
            std::process::exit(130);
        }
        Err(e) => return Err(e.into()),
    };

    println!("\n{}", output::summary(&state));

    let finished = chrono::Local::now();
    let path = output::save_report(&config.report.output_dir, &state, &finished)?;
    println!("\nReport saved to: {}", path.display());
    println!("Finished: {}", finished.format(output::TIMESTAMP_FORMAT));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_words_are_joined() {
        let cli = Cli::parse_from(["delve", "transformer", "model", "quantization"]);
        assert_eq!(cli.query.join(" "), "transformer model quantization");
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "delve",
            "--model",
            "claude-test",
            "--provider",
            "anthropic",
            "-o",
            "out",
            "-vv",
            "what is GPTQ",
        ]);
        assert_eq!(cli.model.as_deref(), Some("claude-test"));
        assert_eq!(cli.provider.as_deref(), Some("anthropic"));
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.query, vec!["what is GPTQ"]);
    }

    #[test]
    fn test_missing_query_parses_empty() {
        let cli = Cli::parse_from(["delve"]);
        assert!(cli.query.is_empty());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
