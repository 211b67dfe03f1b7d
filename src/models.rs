//! Data models shared across the scraping pipeline.
//!
//! This module defines the canonical article schema every collector
//! normalizes into, plus the configuration record consumed by the
//! web-page collector:
//! - [`NormalizedArticle`]: the persisted record shape, uniform across
//!   sources except for `engagement_metrics` and the WhatsApp-only fields
//! - [`SourceType`]: which collector produced an article
//! - [`Source`] / [`ScrapingConfig`]: a configured web page and its
//!   CSS selectors
//!
//! Raw source payloads never appear here; each collector keeps its own
//! deserialization structs private to its module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum number of code points in a title derived from article content.
pub const TITLE_MAX_CHARS: usize = 100;

/// The source a normalized article was collected from.
///
/// Serialized lowercase so persisted batches read `"source_type": "twitter"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Web,
    Twitter,
    Facebook,
    Telegram,
    Reddit,
    Whatsapp,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceType::Web => "web",
            SourceType::Twitter => "twitter",
            SourceType::Facebook => "facebook",
            SourceType::Telegram => "telegram",
            SourceType::Reddit => "reddit",
            SourceType::Whatsapp => "whatsapp",
        };
        f.write_str(s)
    }
}

/// A news item normalized into the canonical schema.
///
/// This is the only shape that crosses a collector's boundary and the only
/// shape the result sink persists. Every persisted article has passed its
/// collector's `validate` predicate first.
///
/// # Engagement metrics
///
/// Keys vary by source and are deliberately not unified: twitter reports
/// `likes`/`retweets`, facebook `likes`/`shares`, telegram
/// `views`/`forwards`, reddit `upvotes`/`comments`/`upvote_ratio`.
/// Consumers must branch on `source_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedArticle {
    /// Display title; derived by truncating `content` to
    /// [`TITLE_MAX_CHARS`] code points when the source has no native title.
    pub title: String,
    /// Full item text. Must be non-empty for the article to be valid.
    pub content: String,
    /// Source-dependent identifier: numeric ID, username, or display name.
    pub author: String,
    /// Publication timestamp; `None` only for items that will fail
    /// validation and be dropped.
    pub published_date: Option<DateTime<Utc>>,
    /// Canonical permalink. Empty for WhatsApp, which has none.
    #[serde(default)]
    pub source_url: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub engagement_metrics: BTreeMap<String, f64>,
    /// WhatsApp only: the group a message was posted in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    /// WhatsApp only: attached media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

/// A configured web page source, owned by the consuming application's
/// storage layer and handed to the pipeline as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub scraping_config: ScrapingConfig,
    /// When this source was last fetched successfully. Written back by the
    /// web-page collector through [`Source::mark_scraped`] only.
    #[serde(default)]
    pub last_scraped: Option<DateTime<Utc>>,
}

impl Source {
    /// The one write the pipeline performs on a source record.
    pub fn mark_scraped(&mut self, at: DateTime<Utc>) {
        self.last_scraped = Some(at);
    }
}

/// CSS selectors for pulling articles out of a web page.
///
/// Every field is optional; absent selectors fall back to the documented
/// defaults via the accessor methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapingConfig {
    #[serde(default)]
    pub article_selector: Option<String>,
    #[serde(default)]
    pub title_selector: Option<String>,
    #[serde(default)]
    pub content_selector: Option<String>,
    #[serde(default)]
    pub author_selector: Option<String>,
    #[serde(default)]
    pub date_selector: Option<String>,
}

impl ScrapingConfig {
    pub fn article_selector(&self) -> &str {
        self.article_selector.as_deref().unwrap_or("article")
    }

    pub fn title_selector(&self) -> &str {
        self.title_selector.as_deref().unwrap_or("h1")
    }

    pub fn content_selector(&self) -> &str {
        self.content_selector.as_deref().unwrap_or(".content")
    }

    pub fn author_selector(&self) -> &str {
        self.author_selector.as_deref().unwrap_or(".author")
    }

    pub fn date_selector(&self) -> &str {
        self.date_selector.as_deref().unwrap_or("time")
    }
}
