//! Utility functions for string truncation, timestamp parsing, and file
//! system checks.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string to at most `max` code points.
///
/// Operates on `char` boundaries, never bytes, so multibyte text cannot be
/// split mid-character. Strings at or under the limit come back unchanged.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes with an ellipsis and
/// byte count indicator appended. The cut steps back to the nearest char
/// boundary, so multibyte upstream bodies cannot panic the caller.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Parse a timestamp in any of the formats the sources emit.
///
/// Tried in order: RFC 3339, offset-suffixed (`2023-01-01T12:00:00+0000`,
/// the Graph API shape), bare naive datetime (assumed UTC), bare date
/// (midnight UTC). Returns `None` when nothing matches; callers treat that
/// as a missing `published_date` and let validation drop the item.
pub fn parse_datetime_flexible(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then probes it with a throwaway file.
/// Called once at startup so a bad results path fails the process before
/// any scraping happens instead of after.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> anyhow::Result<()> {
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to create directory {path}"))?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)
        .with_context(|| format!("directory {path} is not writable"))?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Results directory is writable");
    Ok(())
}
