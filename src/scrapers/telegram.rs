//! Telegram channel collector.
//!
//! Reads a fixed list of public channels through their `t.me/s/{channel}`
//! preview pages and extracts messages with the same selector machinery
//! the web-page collector uses. The whole fetch runs inside a scoped
//! session that disconnects when dropped, so early returns and panics
//! cannot leave it open.

use crate::error::ScrapeError;
use crate::models::{NormalizedArticle, SourceType, TITLE_MAX_CHARS};
use crate::scrapers::Collector;
use crate::utils::truncate_chars;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const PREVIEW_BASE: &str = "https://t.me/s";
const PROBE_URL: &str = "https://t.me";
const MESSAGES_PER_CHANNEL: usize = 10;
const CHANNEL_DELAY: Duration = Duration::from_secs(2);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Channels polled when `TELEGRAM_CHANNELS` is not set.
const DEFAULT_CHANNELS: &[&str] = &["KenyaNewsChannel", "KenyaUpdates"];

static MESSAGE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tgme_widget_message").unwrap());
static TEXT_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tgme_widget_message_text").unwrap());
static DATE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tgme_widget_message_date time").unwrap());
static VIEWS_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tgme_widget_message_views").unwrap());

pub struct TelegramScraper {
    client: reqwest::Client,
    channels: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RawTelegramMessage {
    pub channel: String,
    pub message_id: String,
    pub text: String,
    pub date: Option<DateTime<Utc>>,
    pub views: f64,
    /// The preview pages do not expose forward counts; kept at zero the
    /// way the original fell back when the field was absent.
    pub forwards: f64,
}

/// Scoped connection around one fetch. `connect` probes the endpoint;
/// disconnect happens on drop, so no exit path from the fetch can leave
/// the session open.
struct ChannelSession;

impl ChannelSession {
    async fn connect(client: &reqwest::Client) -> Result<Self, ScrapeError> {
        let response = client.get(PROBE_URL).send().await?;
        if !response.status().is_success() {
            return Err(ScrapeError::Api {
                source_type: SourceType::Telegram,
                detail: format!("connect probe returned status {}", response.status()),
            });
        }
        debug!("Telegram session connected");
        Ok(Self)
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        debug!("Telegram session disconnected");
    }
}

impl TelegramScraper {
    /// Channel list comes from `TELEGRAM_CHANNELS` (comma-separated) or
    /// the built-in defaults; the public preview pages need no credential.
    pub fn from_env() -> Result<Self, ScrapeError> {
        let channels = match std::env::var("TELEGRAM_CHANNELS") {
            Ok(raw) => raw
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            Err(_) => DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
        };
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client, channels })
    }

    async fn fetch_channel(&self, channel: &str) -> Result<Vec<RawTelegramMessage>, ScrapeError> {
        let url = format!("{PREVIEW_BASE}/{channel}");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ScrapeError::Api {
                source_type: SourceType::Telegram,
                detail: format!("channel {channel} returned status {}", response.status()),
            });
        }
        let html = response.text().await?;
        let mut messages = parse_channel_page(channel, &html);
        messages.truncate(MESSAGES_PER_CHANNEL);
        Ok(messages)
    }
}

/// Extract messages from one channel preview page. Pure parse so it is
/// testable against an HTML fixture, and so the non-`Send` DOM never
/// crosses an await point.
fn parse_channel_page(channel: &str, html: &str) -> Vec<RawTelegramMessage> {
    let document = Html::parse_document(html);
    let mut messages = Vec::new();

    for element in document.select(&MESSAGE_SEL) {
        let text = element
            .select(&TEXT_SEL)
            .next()
            .map(|t| t.text().collect::<Vec<_>>().join(" ").trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            continue;
        }

        // data-post is "channel/1234"
        let message_id = element
            .value()
            .attr("data-post")
            .and_then(|p| p.rsplit('/').next())
            .unwrap_or_default()
            .to_string();
        let date = element
            .select(&DATE_SEL)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc));
        let views = element
            .select(&VIEWS_SEL)
            .next()
            .map(|v| parse_count(&v.text().collect::<String>()))
            .unwrap_or(0.0);

        messages.push(RawTelegramMessage {
            channel: channel.to_string(),
            message_id,
            text,
            date,
            views,
            forwards: 0.0,
        });
    }

    messages
}

/// Parse Telegram's abbreviated counters: `"1.2K"` → 1200, `"3M"` →
/// 3 000 000, plain numbers pass through. Unparseable input counts as 0.
pub(crate) fn parse_count(s: &str) -> f64 {
    let s = s.trim();
    let (digits, multiplier) = match s.strip_suffix(['K', 'k']) {
        Some(rest) => (rest, 1_000.0),
        None => match s.strip_suffix(['M', 'm']) {
            Some(rest) => (rest, 1_000_000.0),
            None => (s, 1.0),
        },
    };
    digits
        .trim()
        .parse::<f64>()
        .map(|n| n * multiplier)
        .unwrap_or(0.0)
}

#[async_trait]
impl Collector for TelegramScraper {
    type Raw = RawTelegramMessage;

    fn name(&self) -> &str {
        "telegram"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Telegram
    }

    async fn fetch(&self) -> Result<Vec<RawTelegramMessage>, ScrapeError> {
        let session = ChannelSession::connect(&self.client).await?;

        let mut messages = Vec::new();
        for (i, channel) in self.channels.iter().enumerate() {
            if i > 0 {
                sleep(CHANNEL_DELAY).await;
            }
            match self.fetch_channel(channel).await {
                Ok(batch) => {
                    debug!(channel = %channel, count = batch.len(), "Fetched channel messages");
                    messages.extend(batch);
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Skipping Telegram channel");
                }
            }
        }

        drop(session);
        info!(count = messages.len(), "Fetched Telegram messages");
        Ok(messages)
    }

    fn normalize(&self, raw: &RawTelegramMessage) -> NormalizedArticle {
        let engagement_metrics = BTreeMap::from([
            ("views".to_string(), raw.views),
            ("forwards".to_string(), raw.forwards),
        ]);
        NormalizedArticle {
            title: truncate_chars(&raw.text, TITLE_MAX_CHARS),
            content: raw.text.clone(),
            author: raw.channel.clone(),
            published_date: raw.date,
            source_url: format!("https://t.me/{}/{}", raw.channel, raw.message_id),
            source_type: SourceType::Telegram,
            engagement_metrics,
            group_name: None,
            media_url: None,
        }
    }
}
