//! Twitter/X recent-search collector.
//!
//! Pages through the v2 recent-search endpoint with a hard cap on pages
//! per run to bound API cost. A 429 triggers the documented 15-minute
//! cooldown and then aborts the remainder of the run, keeping whatever was
//! already fetched; any other API error propagates as this collector's
//! failure and is isolated at the pipeline boundary.

use crate::error::ScrapeError;
use crate::models::{NormalizedArticle, SourceType, TITLE_MAX_CHARS};
use crate::scrapers::Collector;
use crate::utils::{truncate_chars, truncate_for_log};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";
const SEARCH_QUERY: &str = "news kenya lang:en -is:retweet";
const TWEET_FIELDS: &str = "created_at,public_metrics,author_id";
const PAGE_SIZE: &str = "10";
/// Hard cap on search pages per run, bounding API cost.
const MAX_PAGES: u32 = 2;
const PAGE_DELAY: Duration = Duration::from_secs(2);
/// How long to wait out a rate-limit window before giving up on the run.
const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(15 * 60);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TwitterScraper {
    client: reqwest::Client,
    bearer_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTweet {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub public_metrics: TweetMetrics,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RawTweet>,
    #[serde(default)]
    meta: SearchMeta,
}

#[derive(Debug, Default, Deserialize)]
struct SearchMeta {
    next_token: Option<String>,
}

impl TwitterScraper {
    /// Build from `TWITTER_BEARER_TOKEN`. Fails cleanly when the
    /// credential is absent so the rest of the pipeline still runs.
    pub fn from_env() -> Result<Self, ScrapeError> {
        let bearer_token = std::env::var("TWITTER_BEARER_TOKEN")
            .map_err(|_| ScrapeError::MissingCredential("TWITTER_BEARER_TOKEN"))?;
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            bearer_token,
        })
    }
}

#[async_trait]
impl Collector for TwitterScraper {
    type Raw = RawTweet;

    fn name(&self) -> &str {
        "twitter"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Twitter
    }

    async fn fetch(&self) -> Result<Vec<RawTweet>, ScrapeError> {
        let mut tweets = Vec::new();
        let mut next_token: Option<String> = None;

        for page in 0..MAX_PAGES {
            if page > 0 {
                sleep(PAGE_DELAY).await;
            }

            let mut request = self
                .client
                .get(SEARCH_URL)
                .bearer_auth(&self.bearer_token)
                .query(&[
                    ("query", SEARCH_QUERY),
                    ("max_results", PAGE_SIZE),
                    ("tweet.fields", TWEET_FIELDS),
                ]);
            if let Some(token) = &next_token {
                request = request.query(&[("next_token", token.as_str())]);
            }

            let response = request.send().await?;
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                warn!(
                    page,
                    cooldown_secs = RATE_LIMIT_COOLDOWN.as_secs(),
                    "Twitter rate limit reached; cooling down, then aborting this run"
                );
                sleep(RATE_LIMIT_COOLDOWN).await;
                break;
            }
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ScrapeError::Api {
                    source_type: SourceType::Twitter,
                    detail: format!("status {status}: {}", truncate_for_log(&body, 200)),
                });
            }

            let page_data: SearchResponse = response.json().await?;
            debug!(page, count = page_data.data.len(), "Fetched tweet page");
            tweets.extend(page_data.data);

            next_token = page_data.meta.next_token;
            if next_token.is_none() {
                break;
            }
        }

        info!(count = tweets.len(), "Fetched tweets");
        Ok(tweets)
    }

    fn normalize(&self, raw: &RawTweet) -> NormalizedArticle {
        let engagement_metrics = BTreeMap::from([
            ("likes".to_string(), raw.public_metrics.like_count as f64),
            (
                "retweets".to_string(),
                raw.public_metrics.retweet_count as f64,
            ),
        ]);
        NormalizedArticle {
            title: truncate_chars(&raw.text, TITLE_MAX_CHARS),
            content: raw.text.clone(),
            author: raw.author_id.clone().unwrap_or_default(),
            published_date: raw.created_at,
            source_url: format!("https://twitter.com/user/status/{}", raw.id),
            source_type: SourceType::Twitter,
            engagement_metrics,
            group_name: None,
            media_url: None,
        }
    }
}
