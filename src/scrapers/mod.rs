//! Source collectors and the contract they all share.
//!
//! Every collector implements the same three primitives over its own raw
//! payload type:
//!
//! 1. **fetch**: network I/O against one source, with source-specific
//!    backoff/isolation policy
//! 2. **normalize**: pure mapping of a raw item into
//!    [`NormalizedArticle`], substituting documented defaults for missing
//!    optional fields
//! 3. **validate**: pure predicate over the normalized article
//!
//! The derived [`process`] step is provided once, generically, atop those
//! primitives: fetch, normalize each item, keep only what validates,
//! preserving fetch order. Invalid items are counted, not raised.
//!
//! | Source | Module | Transport | Quirks |
//! |--------|--------|-----------|--------|
//! | Web page | [`web`] | HTML + configured selectors | per-article skip, `last_scraped` write-back |
//! | Twitter | [`twitter`] | v2 recent search | page cap, 15-minute rate-limit cooldown |
//! | Facebook | [`facebook`] | Graph API page posts | per-page isolation |
//! | Telegram | [`telegram`] | t.me channel previews | session connect/disconnect, per-channel isolation |
//! | Reddit | [`reddit`] | OAuth search | per-subreddit isolation |
//! | WhatsApp | [`whatsapp`] | provider message feed | never errors, empty on failure |

use crate::error::ScrapeError;
use crate::models::{NormalizedArticle, SourceType};
use async_trait::async_trait;
use tracing::debug;

pub mod facebook;
pub mod reddit;
pub mod telegram;
pub mod twitter;
pub mod web;
pub mod whatsapp;

/// The capability contract every source collector implements.
///
/// `fetch` is the only operation allowed to touch the network or fail;
/// `normalize` and `validate` are pure. The default `validate` covers the
/// minimum every source requires; collectors with extra required fields
/// (reddit needs a title) override it.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Source-native payload. Never crosses the collector boundary.
    type Raw: Send + Sync;

    fn name(&self) -> &str;

    fn source_type(&self) -> SourceType;

    /// Fetch raw items from the source, in source order.
    async fn fetch(&self) -> Result<Vec<Self::Raw>, ScrapeError>;

    /// Map a raw item into the canonical schema. Must not fail: missing
    /// optional fields get documented defaults instead.
    fn normalize(&self, raw: &Self::Raw) -> NormalizedArticle;

    /// Whether a normalized article is complete enough to persist.
    fn validate(&self, article: &NormalizedArticle) -> bool {
        !article.content.is_empty()
            && !article.author.is_empty()
            && article.published_date.is_some()
    }
}

/// One collector's output for one run.
#[derive(Debug, Default)]
pub struct Harvest {
    /// Valid normalized articles, in fetch order.
    pub articles: Vec<NormalizedArticle>,
    /// Items fetched but dropped by validation.
    pub dropped: usize,
}

/// Run the full fetch → normalize → validate pipeline for one collector.
///
/// Provided once for all collectors; fetch order is preserved and only
/// valid articles survive.
pub async fn process<C: Collector>(collector: &C) -> Result<Harvest, ScrapeError> {
    let raw_items = collector.fetch().await?;
    let mut articles = Vec::with_capacity(raw_items.len());
    let mut dropped = 0usize;

    for raw in &raw_items {
        let article = collector.normalize(raw);
        if collector.validate(&article) {
            articles.push(article);
        } else {
            dropped += 1;
            debug!(
                collector = collector.name(),
                "Dropped item failing validation"
            );
        }
    }

    Ok(Harvest { articles, dropped })
}

/// Object-safe surface the pipeline fans out over.
///
/// Blanket-implemented for every [`Collector`], so registering a new source
/// means implementing the three primitives and nothing else.
#[async_trait]
pub trait RunCollector: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> Result<Harvest, ScrapeError>;
}

#[async_trait]
impl<C: Collector> RunCollector for C {
    fn name(&self) -> &str {
        Collector::name(self)
    }

    async fn run(&self) -> Result<Harvest, ScrapeError> {
        process(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    /// Minimal collector over pre-baked raw strings: empty strings
    /// normalize into articles with empty content and fail validation.
    struct StubCollector {
        raws: Vec<String>,
    }

    #[async_trait]
    impl Collector for StubCollector {
        type Raw = String;

        fn name(&self) -> &str {
            "stub"
        }

        fn source_type(&self) -> SourceType {
            SourceType::Web
        }

        async fn fetch(&self) -> Result<Vec<String>, ScrapeError> {
            Ok(self.raws.clone())
        }

        fn normalize(&self, raw: &String) -> NormalizedArticle {
            NormalizedArticle {
                title: raw.clone(),
                content: raw.clone(),
                author: "tester".to_string(),
                published_date: Some(Utc::now()),
                source_url: String::new(),
                source_type: SourceType::Web,
                engagement_metrics: BTreeMap::new(),
                group_name: None,
                media_url: None,
            }
        }
    }

    #[tokio::test]
    async fn test_process_preserves_fetch_order() {
        let collector = StubCollector {
            raws: vec!["first".into(), "second".into(), "third".into()],
        };
        let harvest = process(&collector).await.unwrap();
        let titles: Vec<&str> = harvest.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
        assert_eq!(harvest.dropped, 0);
    }

    #[tokio::test]
    async fn test_process_drops_invalid_items_and_counts_them() {
        let collector = StubCollector {
            raws: vec!["keep".into(), "".into(), "also keep".into(), "".into()],
        };
        let harvest = process(&collector).await.unwrap();
        assert_eq!(harvest.articles.len(), 2);
        assert_eq!(harvest.dropped, 2);
        assert_eq!(harvest.articles[0].title, "keep");
        assert_eq!(harvest.articles[1].title, "also keep");
    }

    #[tokio::test]
    async fn test_normalize_is_idempotent() {
        let collector = StubCollector { raws: vec![] };
        let raw = "same input".to_string();
        let first = collector.normalize(&raw);
        let second = collector.normalize(&raw);
        // published_date uses the stub's clock, so compare the mapped fields
        assert_eq!(first.title, second.title);
        assert_eq!(first.content, second.content);
        assert_eq!(first.author, second.author);
        assert_eq!(first.source_url, second.source_url);
    }

    #[test]
    fn test_default_validate_requires_core_fields() {
        let collector = StubCollector { raws: vec![] };
        let mut article = collector.normalize(&"ok".to_string());
        assert!(collector.validate(&article));

        article.author.clear();
        assert!(!collector.validate(&article));

        article.author = "tester".to_string();
        article.published_date = None;
        assert!(!collector.validate(&article));
    }
}
