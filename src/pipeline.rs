//! Pipeline orchestrator: fan out to every registered collector, isolate
//! their failures, persist what survived.
//!
//! One run spawns one task per collector and joins them all; there is no
//! racing and no early return. A collector that errors (or panics) is
//! logged and reported as a zero-item failed outcome without disturbing
//! its siblings. Only sink I/O may fail the run as a whole.

use crate::outputs::ResultSink;
use crate::scrapers::RunCollector;
use anyhow::Context;
use chrono::Local;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

/// Batch name for the concatenation of all collectors' results.
const COMBINED_NAME: &str = "combined";

pub struct ScrapingPipeline {
    collectors: Vec<Arc<dyn RunCollector>>,
    sink: ResultSink,
}

/// What one collector contributed to a run.
#[derive(Debug)]
pub struct CollectorOutcome {
    pub name: String,
    /// Valid articles persisted for this collector.
    pub items: usize,
    /// Items fetched but dropped by validation.
    pub dropped: usize,
    /// True when the collector errored or panicked. Zero items with
    /// `failed == false` just means nothing was found, which is not an
    /// error.
    pub failed: bool,
}

/// Aggregate statistics for one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    /// Second-granularity identity shared by every batch file of the run.
    pub run_timestamp: String,
    /// Per-collector outcomes in registration order.
    pub outcomes: Vec<CollectorOutcome>,
    pub total_items: usize,
    pub elapsed: Duration,
}

impl ScrapingPipeline {
    pub fn new(collectors: Vec<Arc<dyn RunCollector>>, sink: ResultSink) -> Self {
        Self { collectors, sink }
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    /// Run every registered collector concurrently and persist the
    /// results: one batch per non-empty collector, then one combined
    /// batch in registration order.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> anyhow::Result<RunReport> {
        let started = Instant::now();
        let run_timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        info!(
            collectors = self.collectors.len(),
            run_timestamp = %run_timestamp,
            "Starting scraping pipeline run"
        );

        let handles: Vec<_> = self
            .collectors
            .iter()
            .map(|collector| {
                let collector = Arc::clone(collector);
                tokio::spawn(async move {
                    info!(collector = collector.name(), "Collector starting");
                    collector.run().await
                })
            })
            .collect();
        let joined = join_all(handles).await;

        let mut outcomes = Vec::with_capacity(self.collectors.len());
        let mut combined = Vec::new();

        for (collector, result) in self.collectors.iter().zip(joined) {
            let name = collector.name().to_string();
            let harvest = match result {
                Ok(Ok(harvest)) => harvest,
                Ok(Err(e)) => {
                    error!(collector = %name, error = %e, "Collector failed");
                    outcomes.push(CollectorOutcome {
                        name,
                        items: 0,
                        dropped: 0,
                        failed: true,
                    });
                    continue;
                }
                Err(e) => {
                    error!(collector = %name, error = %e, "Collector task panicked");
                    outcomes.push(CollectorOutcome {
                        name,
                        items: 0,
                        dropped: 0,
                        failed: true,
                    });
                    continue;
                }
            };

            if harvest.articles.is_empty() {
                info!(collector = %name, dropped = harvest.dropped, "No items found");
            } else {
                self.sink
                    .write_batch(&name, &run_timestamp, &harvest.articles)
                    .await
                    .with_context(|| format!("persisting {name} batch"))?;
            }

            outcomes.push(CollectorOutcome {
                items: harvest.articles.len(),
                dropped: harvest.dropped,
                failed: false,
                name,
            });
            combined.extend(harvest.articles);
        }

        if !combined.is_empty() {
            self.sink
                .write_batch(COMBINED_NAME, &run_timestamp, &combined)
                .await
                .context("persisting combined batch")?;
        }

        let elapsed = started.elapsed();
        for outcome in &outcomes {
            info!(
                collector = %outcome.name,
                items = outcome.items,
                dropped = outcome.dropped,
                failed = outcome.failed,
                "Collector outcome"
            );
        }
        info!(
            total_items = combined.len(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Pipeline run completed"
        );

        Ok(RunReport {
            run_timestamp,
            outcomes,
            total_items: combined.len(),
            elapsed,
        })
    }
}
