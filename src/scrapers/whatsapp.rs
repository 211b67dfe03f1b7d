//! WhatsApp message collector.
//!
//! Pulls recent incoming messages from the provider's HTTP gateway
//! (instance ID + API token, Green API shaped). Unlike the other social
//! collectors, an unrecoverable fetch failure here is reported and mapped
//! to an empty batch rather than an error, matching the reference
//! behavior.

use crate::error::ScrapeError;
use crate::models::{NormalizedArticle, SourceType, TITLE_MAX_CHARS};
use crate::scrapers::Collector;
use crate::utils::{parse_datetime_flexible, truncate_chars};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info};

const API_BASE: &str = "https://api.green-api.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default author when a message carries no sender name.
pub const DEFAULT_AUTHOR: &str = "WhatsApp User";

pub struct WhatsAppScraper {
    client: reqwest::Client,
    instance_id: String,
    api_token: String,
}

/// A WhatsApp message reduced to the fields normalization cares about.
/// Built from the provider payload in `fetch`; every field is optional
/// and `normalize` substitutes the documented defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWhatsAppMessage {
    pub text: Option<String>,
    pub author: Option<String>,
    pub timestamp: Option<String>,
    pub group_name: Option<String>,
    pub media_url: Option<String>,
}

impl WhatsAppScraper {
    /// Build from `WHATSAPP_INSTANCE_ID` and `WHATSAPP_API_TOKEN`.
    pub fn from_env() -> Result<Self, ScrapeError> {
        let instance_id = std::env::var("WHATSAPP_INSTANCE_ID")
            .map_err(|_| ScrapeError::MissingCredential("WHATSAPP_INSTANCE_ID"))?;
        let api_token = std::env::var("WHATSAPP_API_TOKEN")
            .map_err(|_| ScrapeError::MissingCredential("WHATSAPP_API_TOKEN"))?;
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            instance_id,
            api_token,
        })
    }

    async fn fetch_messages(&self) -> Result<Vec<RawWhatsAppMessage>, ScrapeError> {
        let url = format!(
            "{API_BASE}/waInstance{}/lastIncomingMessages/{}",
            self.instance_id, self.api_token
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ScrapeError::Api {
                source_type: SourceType::Whatsapp,
                detail: format!("message feed returned status {}", response.status()),
            });
        }
        let payload: Vec<Value> = response.json().await?;
        Ok(payload.iter().map(raw_from_provider).collect())
    }
}

/// Reduce one provider message object to [`RawWhatsAppMessage`]. The
/// gateway reports timestamps as unix seconds; they are carried forward
/// as ISO strings so normalization has a single parse path.
fn raw_from_provider(value: &Value) -> RawWhatsAppMessage {
    let timestamp = value.get("timestamp").and_then(|t| {
        if let Some(secs) = t.as_i64() {
            chrono::DateTime::from_timestamp(secs, 0)
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        } else {
            t.as_str().map(str::to_string)
        }
    });
    let text_of = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
    RawWhatsAppMessage {
        text: text_of("textMessage").or_else(|| text_of("caption")),
        author: text_of("senderName"),
        timestamp,
        group_name: text_of("chatName"),
        media_url: text_of("downloadUrl"),
    }
}

#[async_trait]
impl Collector for WhatsAppScraper {
    type Raw = RawWhatsAppMessage;

    fn name(&self) -> &str {
        "whatsapp"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Whatsapp
    }

    async fn fetch(&self) -> Result<Vec<RawWhatsAppMessage>, ScrapeError> {
        match self.fetch_messages().await {
            Ok(messages) => {
                info!(count = messages.len(), "Fetched WhatsApp messages");
                Ok(messages)
            }
            Err(e) => {
                error!(error = %e, "WhatsApp fetch failed; returning empty batch");
                Ok(Vec::new())
            }
        }
    }

    fn normalize(&self, raw: &RawWhatsAppMessage) -> NormalizedArticle {
        let text = raw.text.clone().unwrap_or_default();
        NormalizedArticle {
            title: truncate_chars(&text, TITLE_MAX_CHARS),
            content: text,
            author: raw
                .author
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            published_date: raw
                .timestamp
                .as_deref()
                .and_then(parse_datetime_flexible),
            source_url: String::new(),
            source_type: SourceType::Whatsapp,
            engagement_metrics: BTreeMap::new(),
            group_name: raw.group_name.clone(),
            media_url: raw.media_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn scraper() -> WhatsAppScraper {
        WhatsAppScraper {
            client: reqwest::Client::new(),
            instance_id: "1101".to_string(),
            api_token: "dummy_token".to_string(),
        }
    }

    #[test]
    fn test_normalize_complete_message() {
        let raw = RawWhatsAppMessage {
            text: Some("Test message".to_string()),
            author: Some("John Doe".to_string()),
            timestamp: Some("2023-01-01T12:00:00".to_string()),
            group_name: Some("Test Group".to_string()),
            media_url: Some("http://x/img.jpg".to_string()),
        };

        let article = scraper().normalize(&raw);

        assert_eq!(article.title, "Test message");
        assert_eq!(article.content, "Test message");
        assert_eq!(article.author, "John Doe");
        assert_eq!(
            article.published_date,
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(article.source_type, SourceType::Whatsapp);
        assert_eq!(article.group_name.as_deref(), Some("Test Group"));
        assert_eq!(article.media_url.as_deref(), Some("http://x/img.jpg"));
    }

    #[test]
    fn test_normalize_missing_fields_get_defaults() {
        let raw = RawWhatsAppMessage {
            text: Some("Test message".to_string()),
            timestamp: Some("2023-01-01T12:00:00".to_string()),
            ..Default::default()
        };

        let article = scraper().normalize(&raw);

        assert_eq!(article.author, "WhatsApp User");
        assert!(article.group_name.is_none());
        assert!(article.media_url.is_none());
    }

    #[test]
    fn test_normalize_long_text_truncates_title_only() {
        let raw = RawWhatsAppMessage {
            text: Some("x".repeat(150)),
            timestamp: Some("2023-01-01T12:00:00".to_string()),
            ..Default::default()
        };

        let article = scraper().normalize(&raw);

        assert_eq!(article.title.chars().count(), 100);
        assert_eq!(article.content.chars().count(), 150);
        assert_eq!(article.author, "WhatsApp User");
    }

    #[test]
    fn test_normalize_empty_message_fails_validation() {
        let scraper = scraper();
        let article = scraper.normalize(&RawWhatsAppMessage::default());

        assert_eq!(article.title, "");
        assert_eq!(article.content, "");
        assert_eq!(article.author, "WhatsApp User");
        assert!(!scraper.validate(&article));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let scraper = scraper();
        let raw = RawWhatsAppMessage {
            text: Some("same message".to_string()),
            author: Some("Jane".to_string()),
            timestamp: Some("2023-01-01T12:00:00".to_string()),
            ..Default::default()
        };
        assert_eq!(scraper.normalize(&raw), scraper.normalize(&raw));
    }

    #[test]
    fn test_raw_from_provider_maps_gateway_fields() {
        let value = json!({
            "textMessage": "hello from the gateway",
            "senderName": "Asha",
            "timestamp": 1672574400,
            "chatName": "Nairobi News",
            "downloadUrl": "https://cdn.example/img.jpg"
        });
        let raw = raw_from_provider(&value);
        assert_eq!(raw.text.as_deref(), Some("hello from the gateway"));
        assert_eq!(raw.author.as_deref(), Some("Asha"));
        assert_eq!(raw.timestamp.as_deref(), Some("2023-01-01T12:00:00"));
        assert_eq!(raw.group_name.as_deref(), Some("Nairobi News"));
        assert_eq!(raw.media_url.as_deref(), Some("https://cdn.example/img.jpg"));
    }

    #[test]
    fn test_raw_from_provider_empty_object() {
        let raw = raw_from_provider(&json!({}));
        assert_eq!(raw, RawWhatsAppMessage::default());
    }
}
