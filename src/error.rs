//! Collector error taxonomy.
//!
//! Errors stay inside the collector that produced them: per-item and
//! per-target failures are logged and skipped in the fetch loops, and
//! anything that escapes a collector's `fetch` is caught at the pipeline
//! boundary and turned into a zero-item failed outcome. Only sink and
//! scheduler errors may fail a whole run.

use crate::models::SourceType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A required environment variable was absent at construction.
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    /// The upstream signalled a rate limit (HTTP 429).
    #[error("{source_type} rate limited the request")]
    RateLimited { source_type: SourceType },

    /// Transport-level failure from the HTTP client.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered, but not with what we expected.
    #[error("unexpected {source_type} response: {detail}")]
    Api {
        source_type: SourceType,
        detail: String,
    },

    /// A configured CSS selector failed to parse.
    #[error("invalid selector `{selector}`: {detail}")]
    Selector { selector: String, detail: String },
}
