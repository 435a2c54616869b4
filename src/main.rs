//! Spinneret command-line entry point
//!
//! The binary is the glue around the crawling core: flags and environment
//! settings, logging, signal wiring, and a stdout consumer draining the
//! message bus.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use spinneret::config::Settings;
use spinneret::crawler::Crawler;
use spinneret::messaging::ChannelQueue;

/// A polite, concurrent web crawler.
///
/// Crawls every target within its own host, honoring robots.txt and pacing
/// requests per domain, and prints one JSON crawl record per fetched page.
#[derive(Parser, Debug)]
#[command(name = "spinneret")]
#[command(about = "A polite, concurrent web crawler", long_about = None)]
struct Cli {
    /// Seed URL(s) to crawl; repeat the flag or separate with commas
    #[arg(short, long, value_delimiter = ',', required = true)]
    target: Vec<String>,

    /// Concurrent fetches per domain (overrides CONCURRENCY)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// URL budget per domain, 0 for unlimited (overrides MAX_DEPTH)
    #[arg(short, long)]
    depth: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let mut settings = Settings::from_env();
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(depth) = cli.depth {
        settings.max_depth = depth;
    }
    let settings = settings.normalized();

    // The bus and its consumer: crawl records are printed as JSON lines
    let (queue, mut results) = ChannelQueue::new();
    let printer = tokio::spawn(async move {
        while let Some(payload) = results.recv().await {
            println!("{}", String::from_utf8_lossy(&payload));
        }
    });

    // One token cancels every engine
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            signal_cancel.cancel();
        }
    });

    let crawler = Crawler::new(settings, Arc::new(queue));
    crawler.crawl(&cli.target, cancel.clone()).await;

    // Dropping the crawler drops the last producer handle so the printer
    // can drain and finish
    drop(crawler);
    let _ = printer.await;

    if cancel.is_cancelled() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("spinneret=info,warn"),
            1 => EnvFilter::new("spinneret=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
