use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use sage_core::orchestrator::{FileOutcome, IngestReport, QueryResult};
use sage_core::{Config, Orchestrator, TaskQueue};
use sage_index::IndexStats;
use sage_llm::CompatibleProvider;

/// Ask questions about your local documents.
#[derive(Parser, Debug)]
#[command(name = "sage", version, about)]
struct Cli {
    /// Configuration file; falls back to `SAGE_CONFIG`, then `config/default.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, chunk and index documents
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Answer a question from the indexed documents
    Ask {
        /// Add facts about this host to the context
        #[arg(long)]
        system_info: bool,
        question: String,
    },
    /// Show index statistics
    Stats,
    /// Remove every document and delete the persisted index
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.clone());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let api_key = config
        .secrets
        .api_key
        .as_ref()
        .map(|k| k.expose().to_owned())
        .unwrap_or_default();
    let provider = CompatibleProvider::new(
        config.llm.provider_name.clone(),
        api_key,
        config.llm.endpoint.clone(),
        config.llm.retry_policy(),
    )?;
    let orchestrator = Arc::new(Orchestrator::from_config(&config, provider));
    let queue = TaskQueue::spawn(Arc::clone(&orchestrator), config.queue.capacity);

    let outcome = run(&cli, &queue, orchestrator.index().stats()).await;
    queue.shutdown().await;
    outcome
}

async fn run(cli: &Cli, queue: &TaskQueue, stats: IndexStats) -> anyhow::Result<()> {
    match &cli.command {
        Command::Ingest { files } => {
            let report = queue.submit_ingest(files.clone())?.await?;
            print_ingest(&report, cli.json)?;
            if let Some(error) = &report.index_error {
                bail!("index update failed: {error}");
            }
        }
        Command::Ask {
            system_info,
            question,
        } => {
            let pending = queue.submit_query(question.clone(), *system_info)?;
            let cancel = pending.cancel_token();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, cancelling query");
                    cancel.cancel();
                }
            });
            let result = pending.wait().await;
            interrupt.abort();
            print_query(&result?, cli.json)?;
        }
        Command::Stats => print_stats(&stats, cli.json)?,
        Command::Clear => {
            queue.submit_clear()?.await??;
            println!("index cleared");
        }
    }
    Ok(())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("SAGE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn print_ingest(report: &IngestReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for file in &report.files {
        match &file.outcome {
            FileOutcome::Chunked { chunks } => {
                println!("ok      {} ({chunks} chunks)", file.path.display());
            }
            FileOutcome::Empty => println!("empty   {}", file.path.display()),
            FileOutcome::Failed { error } => {
                println!("failed  {}: {error}", file.path.display());
            }
        }
    }
    println!(
        "{} chunks added, {} of {} files failed",
        report.chunks_added,
        report.failed_files(),
        report.files.len()
    );
    Ok(())
}

fn print_query(result: &QueryResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    println!("{}", result.answer);
    if !result.relevant_docs.is_empty() {
        println!();
        println!("Sources:");
        for (rank, doc) in result.relevant_docs.iter().enumerate() {
            println!(
                "  {}. {} [chunk {}] similarity={:.3}",
                rank + 1,
                doc.chunk.source,
                doc.chunk.chunk_index,
                doc.similarity
            );
        }
    }
    Ok(())
}

fn print_stats(stats: &IndexStats, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }
    println!("documents: {}", stats.document_count);
    println!("fitted:    {}", stats.is_fitted);
    match stats.vector_shape {
        Some((rows, cols)) => println!("matrix:    {rows} x {cols}"),
        None => println!("matrix:    none"),
    }
    match &stats.path {
        Some(path) => println!("path:      {}", path.display()),
        None => println!("path:      (in memory)"),
    }
    Ok(())
}
