//! Facebook Graph API collector.
//!
//! Iterates a fixed list of target pages and pulls their recent posts.
//! A failure on one page is logged and the loop moves on; this collector
//! never aborts entirely because one target is unreachable.

use crate::error::ScrapeError;
use crate::models::{NormalizedArticle, SourceType, TITLE_MAX_CHARS};
use crate::scrapers::Collector;
use crate::utils::{parse_datetime_flexible, truncate_chars, truncate_for_log};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const GRAPH_URL: &str = "https://graph.facebook.com/v19.0";
const POST_FIELDS: &str = "id,message,created_time,from,reactions.summary(true),shares";
const POSTS_PER_PAGE: &str = "10";
const TARGET_DELAY: Duration = Duration::from_secs(2);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Pages polled when `FACEBOOK_PAGES` is not set.
const DEFAULT_PAGES: &[&str] = &["dailynation", "StandardKenya", "citizentvkenya"];

pub struct FacebookScraper {
    client: reqwest::Client,
    access_token: String,
    pages: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFacebookPost {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub from: Option<PostAuthor>,
    #[serde(default)]
    pub reactions: Option<ReactionField>,
    #[serde(default)]
    pub shares: Option<ShareCount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostAuthor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionField {
    #[serde(default)]
    pub summary: Option<ReactionSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionSummary {
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareCount {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    data: Vec<RawFacebookPost>,
}

impl FacebookScraper {
    /// Build from `FACEBOOK_ACCESS_TOKEN`, with the target page list
    /// overridable through `FACEBOOK_PAGES` (comma-separated).
    pub fn from_env() -> Result<Self, ScrapeError> {
        let access_token = std::env::var("FACEBOOK_ACCESS_TOKEN")
            .map_err(|_| ScrapeError::MissingCredential("FACEBOOK_ACCESS_TOKEN"))?;
        let pages = match std::env::var("FACEBOOK_PAGES") {
            Ok(raw) => raw
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            Err(_) => DEFAULT_PAGES.iter().map(|p| p.to_string()).collect(),
        };
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            access_token,
            pages,
        })
    }

    async fn fetch_page(&self, page: &str) -> Result<Vec<RawFacebookPost>, ScrapeError> {
        let url = format!("{GRAPH_URL}/{page}/posts");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", POST_FIELDS),
                ("limit", POSTS_PER_PAGE),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScrapeError::RateLimited {
                source_type: SourceType::Facebook,
            });
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Api {
                source_type: SourceType::Facebook,
                detail: format!("status {status}: {}", truncate_for_log(&body, 200)),
            });
        }

        let parsed: PostsResponse = response.json().await?;
        Ok(parsed.data)
    }
}

#[async_trait]
impl Collector for FacebookScraper {
    type Raw = RawFacebookPost;

    fn name(&self) -> &str {
        "facebook"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Facebook
    }

    async fn fetch(&self) -> Result<Vec<RawFacebookPost>, ScrapeError> {
        let mut posts = Vec::new();
        for (i, page) in self.pages.iter().enumerate() {
            if i > 0 {
                sleep(TARGET_DELAY).await;
            }
            match self.fetch_page(page).await {
                Ok(batch) => {
                    debug!(page = %page, count = batch.len(), "Fetched Facebook page posts");
                    posts.extend(batch);
                }
                Err(e) => {
                    warn!(page = %page, error = %e, "Skipping Facebook page");
                }
            }
        }
        info!(count = posts.len(), "Fetched Facebook posts");
        Ok(posts)
    }

    fn normalize(&self, raw: &RawFacebookPost) -> NormalizedArticle {
        let content = raw.message.clone().unwrap_or_default();
        let likes = raw
            .reactions
            .as_ref()
            .and_then(|r| r.summary.as_ref())
            .map(|s| s.total_count)
            .unwrap_or(0);
        let shares = raw.shares.as_ref().map(|s| s.count).unwrap_or(0);
        let engagement_metrics = BTreeMap::from([
            ("likes".to_string(), likes as f64),
            ("shares".to_string(), shares as f64),
        ]);
        NormalizedArticle {
            title: truncate_chars(&content, TITLE_MAX_CHARS),
            content,
            author: raw
                .from
                .as_ref()
                .and_then(|f| f.id.clone().or_else(|| f.name.clone()))
                .unwrap_or_default(),
            published_date: raw
                .created_time
                .as_deref()
                .and_then(parse_datetime_flexible),
            source_url: format!("https://facebook.com/{}", raw.id),
            source_type: SourceType::Facebook,
            engagement_metrics,
            group_name: None,
            media_url: None,
        }
    }
}
