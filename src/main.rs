//! # Newsflash Scraper
//!
//! A news aggregation pipeline that collects items from six kinds of
//! sources (configurable web pages, Twitter, Facebook, Telegram, Reddit,
//! and WhatsApp), normalizes them into a single article shape, validates
//! them, and writes timestamped JSON batch files.
//!
//! ## Features
//!
//! - One collector per source kind behind a shared fetch/normalize/validate
//!   contract
//! - Collectors run concurrently on their own tasks; one failing collector
//!   never disturbs the others
//! - Per-collector and combined JSON result files per run
//! - Built-in scheduler: run immediately, then every six hours
//!
//! ## Usage
//!
//! ```sh
//! newsflash_scraper --sources ./sources.json
//! ```
//!
//! Collectors whose credentials are absent from the environment are
//! skipped at startup with a warning rather than failing the process.

use chrono::Duration as Interval;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod error;
mod models;
mod outputs;
mod pipeline;
mod scheduler;
mod scrapers;
mod utils;

use cli::Cli;
use models::Source;
use outputs::ResultSink;
use pipeline::ScrapingPipeline;
use scheduler::Scheduler;
use scrapers::{
    RunCollector, facebook::FacebookScraper, reddit::RedditScraper, telegram::TelegramScraper,
    twitter::TwitterScraper, web::WebPageScraper, whatsapp::WhatsAppScraper,
};
use utils::ensure_writable_dir;

/// Load configurable web sources from a JSON file.
async fn load_web_sources(path: &str) -> anyhow::Result<Vec<Source>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let sources: Vec<Source> = serde_json::from_str(&raw)?;
    Ok(sources)
}

/// Build every collector whose configuration is available. Missing
/// credentials demote a collector to a startup warning, not an error.
async fn build_collectors(args: &Cli) -> anyhow::Result<Vec<Arc<dyn RunCollector>>> {
    let mut collectors: Vec<Arc<dyn RunCollector>> = Vec::new();

    if let Some(ref path) = args.sources {
        let sources = load_web_sources(path).await?;
        info!(count = sources.len(), path = %path, "Loaded web sources");
        for source in sources {
            let name = source.name.clone();
            match WebPageScraper::new(source) {
                Ok(scraper) => collectors.push(Arc::new(scraper)),
                Err(e) => warn!(source = %name, error = %e, "Skipping web source"),
            }
        }
    }

    match TwitterScraper::from_env() {
        Ok(scraper) => collectors.push(Arc::new(scraper)),
        Err(e) => warn!(error = %e, "Twitter collector disabled"),
    }
    match FacebookScraper::from_env() {
        Ok(scraper) => collectors.push(Arc::new(scraper)),
        Err(e) => warn!(error = %e, "Facebook collector disabled"),
    }
    match TelegramScraper::from_env() {
        Ok(scraper) => collectors.push(Arc::new(scraper)),
        Err(e) => warn!(error = %e, "Telegram collector disabled"),
    }
    match RedditScraper::from_env() {
        Ok(scraper) => collectors.push(Arc::new(scraper)),
        Err(e) => warn!(error = %e, "Reddit collector disabled"),
    }
    match WhatsAppScraper::from_env() {
        Ok(scraper) => collectors.push(Arc::new(scraper)),
        Err(e) => warn!(error = %e, "WhatsApp collector disabled"),
    }

    Ok(collectors)
}

#[tokio::main]
#[instrument]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("newsflash_scraper starting up");

    let args = Cli::parse();

    // Early check: ensure the results dir is writable
    if let Err(e) = ensure_writable_dir(&args.results_dir).await {
        error!(
            path = %args.results_dir,
            error = %e,
            "Results directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let collectors = build_collectors(&args).await?;
    if collectors.is_empty() {
        warn!("No collectors are configured; runs will produce no output");
    } else {
        info!(count = collectors.len(), "Collectors registered");
    }

    let sink = ResultSink::new(&args.results_dir);
    let pipeline = Arc::new(ScrapingPipeline::new(collectors, sink));

    if args.once {
        let report = pipeline.run().await?;
        info!(
            total_items = report.total_items,
            elapsed_secs = report.elapsed.as_secs(),
            "Single run complete"
        );
        return Ok(());
    }

    let scheduler = Scheduler::new(
        pipeline,
        Interval::hours(i64::from(args.interval_hours)),
        Duration::from_secs(args.poll_secs),
    );
    scheduler.run_forever().await;
    Ok(())
}
