//! Append-only JSON batch storage.
//!
//! One file per collector per run plus one combined file, named
//! `{results_dir}/{name}_results_{YYYYMMDD_HHMMSS}.json`. Content is a
//! pretty-printed JSON array of normalized articles that parses back to
//! the same fields, which makes the files the durable contract between
//! the pipeline and any downstream ingester. Batches are always written
//! whole, never appended to partially, so no intra-file locking exists.

use crate::models::NormalizedArticle;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub struct ResultSink {
    results_dir: PathBuf,
}

impl ResultSink {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Write one batch. `run_timestamp` is shared by every batch of a run
    /// so the per-collector files and the combined file sort together.
    ///
    /// Errors here are the one failure class allowed to fail a whole run.
    pub async fn write_batch(
        &self,
        name: &str,
        run_timestamp: &str,
        articles: &[NormalizedArticle],
    ) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.results_dir)
            .await
            .with_context(|| format!("failed to create {}", self.results_dir.display()))?;

        let path = self
            .results_dir
            .join(format!("{name}_results_{run_timestamp}.json"));
        let json = serde_json::to_string_pretty(articles)
            .with_context(|| format!("failed to serialize {name} batch"))?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        info!(path = %path.display(), count = articles.len(), "Wrote result batch");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn article(content: &str) -> NormalizedArticle {
        NormalizedArticle {
            title: content.to_string(),
            content: content.to_string(),
            author: "tester".to_string(),
            published_date: Some(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap()),
            source_url: "https://example.com/a".to_string(),
            source_type: SourceType::Web,
            engagement_metrics: BTreeMap::new(),
            group_name: None,
            media_url: None,
        }
    }

    #[tokio::test]
    async fn test_write_batch_uses_naming_contract() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(tmp.path());
        let path = sink
            .write_batch("twitter", "20230101_120000", &[article("a")])
            .await
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "twitter_results_20230101_120000.json"
        );
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_batch_file_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(tmp.path());
        let batch = vec![article("first"), article("second")];
        let path = sink
            .write_batch("combined", "20230101_120000", &batch)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<NormalizedArticle> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, batch);
    }

    #[tokio::test]
    async fn test_write_batch_creates_results_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("not/yet/here");
        let sink = ResultSink::new(&nested);
        sink.write_batch("reddit", "20230101_120000", &[])
            .await
            .unwrap();
        assert!(nested.is_dir());
    }
}
