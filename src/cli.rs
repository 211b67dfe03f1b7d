//! Command-line interface definitions for Newsflash Scraper.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most arguments can be provided via command-line flags or environment
//! variables; collector credentials are read from the environment only.

use clap::Parser;

/// Command-line arguments for the Newsflash Scraper application.
///
/// # Examples
///
/// ```sh
/// # Run the full pipeline once and exit
/// newsflash_scraper --once
///
/// # Run on the default six hour schedule with a custom results directory
/// newsflash_scraper -r ./scraping_results
///
/// # Add configurable web sources from a JSON file
/// newsflash_scraper --sources ./sources.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for result batch files
    #[arg(short, long, env = "RESULTS_DIR", default_value = "scraping_results")]
    pub results_dir: String,

    /// Optional path to a JSON file of configurable web sources
    #[arg(short, long, env = "SOURCES_FILE")]
    pub sources: Option<String>,

    /// Run the pipeline once and exit instead of scheduling
    #[arg(long)]
    pub once: bool,

    /// Hours between scheduled pipeline runs
    #[arg(long, env = "SCRAPE_INTERVAL_HOURS", default_value_t = 6)]
    pub interval_hours: u32,

    /// Seconds between scheduler clock checks
    #[arg(long, env = "SCHEDULER_POLL_SECS", default_value_t = 60)]
    pub poll_secs: u64,
}
