//! parget - multi-connection file downloader
//!
//! Thin driver around parget-core: parses arguments, probes each URL,
//! opens the output file, and reports progress and throughput.

mod progress;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use indicatif::{HumanBytes, HumanDuration};
use parget_core::{CancellationToken, DownloadConfig, Downloader};
use url::Url;

/// Multi-connection file downloader
#[derive(Parser)]
#[command(name = "parget", version, about)]
struct Cli {
    /// URLs to download
    urls: Vec<String>,

    /// Path or name of the save file (defaults to a server-derived name)
    #[arg(short, long)]
    name: Option<String>,

    /// Number of download parts
    #[arg(short, long, default_value_t = 32)]
    parts: u32,

    /// Retry budget per part
    #[arg(short, long, default_value_t = 10)]
    retries: u32,

    /// Show download progress
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut urls = cli.urls.clone();
    if urls.is_empty() {
        let input: String = dialoguer::Input::new()
            .with_prompt("URL")
            .allow_empty(true)
            .interact_text()?;
        if input.trim().is_empty() {
            bail!("no URL provided");
        }
        urls.push(input.trim().to_string());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupt detected, shutting down.");
                cancel.cancel();
            }
        });
    }

    let downloader = Downloader::new()?;
    let mut failed = false;

    for raw in &urls {
        if cancel.is_cancelled() {
            break;
        }
        if let Err(e) = fetch_one(&downloader, raw, &cli, cancel.clone()).await {
            eprintln!("{} {raw}: {e:#}", style("✗").red().bold());
            failed = true;
        }
    }

    if failed || cancel.is_cancelled() {
        std::process::exit(1);
    }
    Ok(())
}

async fn fetch_one(
    downloader: &Downloader,
    raw: &str,
    cli: &Cli,
    cancel: CancellationToken,
) -> Result<()> {
    let url = Url::parse(raw).context("invalid URL")?;

    let metadata = downloader.probe(&url).await?;
    let total = metadata.size;
    let file_name = cli
        .name
        .clone()
        .unwrap_or_else(|| metadata.file_name.clone());

    println!(
        "Downloading {} to {} with {} connection(s)",
        style(url.as_str()).cyan(),
        style(&file_name).green(),
        cli.parts
    );

    let output = std::fs::File::create(&file_name)
        .with_context(|| format!("cannot create {file_name}"))?;

    let bar = cli
        .verbose
        .then(|| progress::spawn_bar(downloader.subscribe(), total));

    let result = downloader
        .download(DownloadConfig {
            metadata,
            parts: cli.parts,
            retry_limit: cli.retries,
            verbose: cli.verbose,
            output,
            cancel,
        })
        .await;

    if let Some((bar, handle)) = bar {
        handle.abort();
        bar.finish_and_clear();
    }

    let outcome = result?;
    let secs = outcome.elapsed.as_secs_f64().max(f64::EPSILON);
    let speed = (outcome.total_bytes as f64 / secs) as u64;
    println!(
        "{} {} in {} ({}/s)",
        style("✓").green().bold(),
        HumanBytes(outcome.total_bytes),
        HumanDuration(outcome.elapsed),
        HumanBytes(speed),
    );
    Ok(())
}
