//! Reddit search collector.
//!
//! Authenticates once per fetch with the app-only OAuth flow, then
//! searches a fixed list of subreddits. One unreachable subreddit is
//! logged and skipped; an authentication failure is fatal for this
//! collector (and only this collector).

use crate::error::ScrapeError;
use crate::models::{NormalizedArticle, SourceType};
use crate::scrapers::Collector;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const SEARCH_BASE: &str = "https://oauth.reddit.com/r";
const SEARCH_QUERY: &str = "kenya news";
const POSTS_PER_SUBREDDIT: &str = "10";
const TARGET_DELAY: Duration = Duration::from_secs(2);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Subreddits searched when `REDDIT_SUBREDDITS` is not set.
const DEFAULT_SUBREDDITS: &[&str] = &["Kenya", "KenyaPolitics", "AfricanNews"];

pub struct RedditScraper {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    user_agent: String,
    subreddits: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRedditPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub upvote_ratio: f64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: RawRedditPost,
}

impl RedditScraper {
    /// Build from `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`, and
    /// `REDDIT_USER_AGENT`; the subreddit list is overridable through
    /// `REDDIT_SUBREDDITS` (comma-separated).
    pub fn from_env() -> Result<Self, ScrapeError> {
        let client_id = std::env::var("REDDIT_CLIENT_ID")
            .map_err(|_| ScrapeError::MissingCredential("REDDIT_CLIENT_ID"))?;
        let client_secret = std::env::var("REDDIT_CLIENT_SECRET")
            .map_err(|_| ScrapeError::MissingCredential("REDDIT_CLIENT_SECRET"))?;
        let user_agent = std::env::var("REDDIT_USER_AGENT")
            .map_err(|_| ScrapeError::MissingCredential("REDDIT_USER_AGENT"))?;
        let subreddits = match std::env::var("REDDIT_SUBREDDITS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
        };
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            user_agent,
            subreddits,
        })
    }

    /// App-only OAuth (client credentials grant).
    async fn authenticate(&self) -> Result<String, ScrapeError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScrapeError::RateLimited {
                source_type: SourceType::Reddit,
            });
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Api {
                source_type: SourceType::Reddit,
                detail: format!("token request status {status}: {}", truncate_for_log(&body, 200)),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn fetch_subreddit(
        &self,
        token: &str,
        subreddit: &str,
    ) -> Result<Vec<RawRedditPost>, ScrapeError> {
        let url = format!("{SEARCH_BASE}/{subreddit}/search");
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[
                ("q", SEARCH_QUERY),
                ("restrict_sr", "1"),
                ("limit", POSTS_PER_SUBREDDIT),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScrapeError::Api {
                source_type: SourceType::Reddit,
                detail: format!("r/{subreddit} returned status {}", response.status()),
            });
        }

        let listing: Listing = response.json().await?;
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }
}

#[async_trait]
impl Collector for RedditScraper {
    type Raw = RawRedditPost;

    fn name(&self) -> &str {
        "reddit"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Reddit
    }

    async fn fetch(&self) -> Result<Vec<RawRedditPost>, ScrapeError> {
        let token = self.authenticate().await?;

        let mut posts = Vec::new();
        for (i, subreddit) in self.subreddits.iter().enumerate() {
            if i > 0 {
                sleep(TARGET_DELAY).await;
            }
            match self.fetch_subreddit(&token, subreddit).await {
                Ok(batch) => {
                    debug!(subreddit = %subreddit, count = batch.len(), "Fetched subreddit posts");
                    posts.extend(batch);
                }
                Err(e) => {
                    warn!(subreddit = %subreddit, error = %e, "Skipping subreddit");
                }
            }
        }

        info!(count = posts.len(), "Fetched Reddit posts");
        Ok(posts)
    }

    fn normalize(&self, raw: &RawRedditPost) -> NormalizedArticle {
        // Link posts have no selftext; the title stands in as content.
        let content = if raw.selftext.trim().is_empty() {
            raw.title.clone()
        } else {
            raw.selftext.clone()
        };
        let engagement_metrics = BTreeMap::from([
            ("upvotes".to_string(), raw.score as f64),
            ("comments".to_string(), raw.num_comments as f64),
            ("upvote_ratio".to_string(), raw.upvote_ratio),
        ]);
        NormalizedArticle {
            title: raw.title.clone(),
            content,
            author: raw.author.clone().unwrap_or_default(),
            published_date: raw
                .created_utc
                .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
            source_url: format!("https://reddit.com{}", raw.permalink),
            source_type: SourceType::Reddit,
            engagement_metrics,
            group_name: None,
            media_url: None,
        }
    }

    /// Reddit items must also carry their native title.
    fn validate(&self, article: &NormalizedArticle) -> bool {
        !article.content.is_empty()
            && !article.author.is_empty()
            && article.published_date.is_some()
            && !article.title.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn scraper() -> RedditScraper {
        RedditScraper {
            client: reqwest::Client::new(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            user_agent: "newsflash-test/0.1".to_string(),
            subreddits: vec!["Kenya".to_string()],
        }
    }

    fn raw_post() -> RawRedditPost {
        RawRedditPost {
            title: "Election results announced".to_string(),
            selftext: "Full details inside.".to_string(),
            author: Some("u_reporter".to_string()),
            created_utc: Some(1672574400.0), // 2023-01-01T12:00:00Z
            permalink: "/r/Kenya/comments/abc/election_results/".to_string(),
            score: 120,
            num_comments: 34,
            upvote_ratio: 0.97,
        }
    }

    #[test]
    fn test_normalize_maps_post_fields() {
        let scraper = scraper();
        let article = scraper.normalize(&raw_post());
        assert_eq!(article.title, "Election results announced");
        assert_eq!(article.content, "Full details inside.");
        assert_eq!(article.author, "u_reporter");
        assert_eq!(
            article.published_date,
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            article.source_url,
            "https://reddit.com/r/Kenya/comments/abc/election_results/"
        );
        assert_eq!(article.engagement_metrics["upvotes"], 120.0);
        assert_eq!(article.engagement_metrics["comments"], 34.0);
        assert_eq!(article.engagement_metrics["upvote_ratio"], 0.97);
    }

    #[test]
    fn test_normalize_link_post_uses_title_as_content() {
        let scraper = scraper();
        let mut raw = raw_post();
        raw.selftext = String::new();
        let article = scraper.normalize(&raw);
        assert_eq!(article.content, "Election results announced");
    }

    #[test]
    fn test_validate_requires_title() {
        let scraper = scraper();
        let mut article = scraper.normalize(&raw_post());
        assert!(scraper.validate(&article));
        article.title.clear();
        assert!(!scraper.validate(&article));
    }

    #[test]
    fn test_listing_deserializes_api_shape() {
        let json = r#"{
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {
                        "title": "hello",
                        "selftext": "",
                        "author": "someone",
                        "created_utc": 1672574400.0,
                        "permalink": "/r/Kenya/comments/x/hello/",
                        "score": 5,
                        "num_comments": 1,
                        "upvote_ratio": 0.8
                    }}
                ]
            }
        }"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.data.children.len(), 1);
        assert_eq!(listing.data.children[0].data.title, "hello");
    }
}
