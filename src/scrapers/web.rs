//! Configurable web-page collector.
//!
//! One GET per run against a [`Source`]'s URL, then extraction with the
//! source's configured CSS selectors. Articles that fail selector
//! extraction are logged and skipped, never fatal; a non-200 response
//! yields an empty batch. After a successful fetch the collector writes
//! `last_scraped` back onto the shared source record, the one mutation
//! the pipeline performs for the owning application.

use crate::error::ScrapeError;
use crate::models::{NormalizedArticle, ScrapingConfig, Source, SourceType};
use crate::scrapers::Collector;
use crate::utils::parse_datetime_flexible;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static LINK_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

pub struct WebPageScraper {
    source: Arc<Mutex<Source>>,
    client: reqwest::Client,
    name: String,
    url: String,
    config: ScrapingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawWebArticle {
    pub title: String,
    pub content: String,
    pub author: String,
    pub date: Option<String>,
    pub url: String,
}

impl WebPageScraper {
    pub fn new(source: Source) -> Result<Self, ScrapeError> {
        let name = source.name.clone();
        let url = source.url.clone();
        let config = source.scraping_config.clone();
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            source: Arc::new(Mutex::new(source)),
            client,
            name,
            url,
            config,
        })
    }

    /// Handle for collaborators that need to observe `last_scraped`.
    pub fn source(&self) -> Arc<Mutex<Source>> {
        Arc::clone(&self.source)
    }

    /// Record a successful fetch on the shared source record. A poisoned
    /// lock still yields the data, so the write-back always lands.
    fn record_scrape(&self, at: DateTime<Utc>) {
        let mut source = self.source.lock().unwrap_or_else(|e| e.into_inner());
        source.mark_scraped(at);
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        selector: selector.to_string(),
        detail: e.to_string(),
    })
}

fn selected_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let node = element.select(selector).next()?;
    let text = node.text().collect::<Vec<_>>().join(" ").trim().to_string();
    Some(text)
}

/// Extract articles from a fetched page. Pure parse so it is testable
/// against fixtures and the non-`Send` DOM never crosses an await point.
fn extract_articles(
    html: &str,
    base_url: &str,
    config: &ScrapingConfig,
) -> Result<Vec<RawWebArticle>, ScrapeError> {
    let article_sel = parse_selector(config.article_selector())?;
    let title_sel = parse_selector(config.title_selector())?;
    let content_sel = parse_selector(config.content_selector())?;
    let author_sel = parse_selector(config.author_selector())?;
    let date_sel = parse_selector(config.date_selector())?;

    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let mut articles = Vec::new();

    for element in document.select(&article_sel) {
        let extracted = (|| {
            let title = selected_text(&element, &title_sel)?;
            let content = selected_text(&element, &content_sel)?;
            let author = selected_text(&element, &author_sel)?;
            // the date element is required, its datetime attribute is not
            let date = element
                .select(&date_sel)
                .next()?
                .value()
                .attr("datetime")
                .map(str::to_string);
            let href = element.select(&LINK_SEL).next()?.value().attr("href")?;
            let url = match (&base, Url::parse(href)) {
                (_, Ok(absolute)) => absolute.to_string(),
                (Some(base), Err(_)) => base.join(href).ok()?.to_string(),
                (None, Err(_)) => return None,
            };
            Some(RawWebArticle {
                title,
                content,
                author,
                date,
                url,
            })
        })();

        match extracted {
            Some(article) => articles.push(article),
            None => warn!("Skipping article missing a configured selector match"),
        }
    }

    Ok(articles)
}

#[async_trait]
impl Collector for WebPageScraper {
    type Raw = RawWebArticle;

    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::Web
    }

    async fn fetch(&self) -> Result<Vec<RawWebArticle>, ScrapeError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            info!(
                source = %self.name,
                url = %self.url,
                status = %response.status(),
                "Page fetch returned non-success status; skipping this run"
            );
            return Ok(Vec::new());
        }

        let html = response.text().await?;
        let articles = extract_articles(&html, &self.url, &self.config)?;

        self.record_scrape(Utc::now());

        info!(source = %self.name, count = articles.len(), "Extracted articles");
        Ok(articles)
    }

    fn normalize(&self, raw: &RawWebArticle) -> NormalizedArticle {
        NormalizedArticle {
            title: raw.title.clone(),
            content: raw.content.clone(),
            author: raw.author.clone(),
            published_date: raw.date.as_deref().and_then(parse_datetime_flexible),
            source_url: raw.url.clone(),
            source_type: SourceType::Web,
            engagement_metrics: BTreeMap::new(),
            group_name: None,
            media_url: None,
        }
    }
}
