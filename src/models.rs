//! Data models for the search/extraction pipeline.
//!
//! Three records move through the pipeline:
//! - [`ArticleCandidate`]: what a search provider returns for one hit
//! - [`ArticleContent`]: what the article fetcher extracts from one page
//! - [`EnrichedArticle`]: the union exposed to callers, with a normalized
//!   publication timestamp
//!
//! Providers report dates in whatever shape their backend uses, so the raw
//! string is kept alongside the parsed [`DateTime`]; parsing failures are a
//! `None`, never an error.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// A single search hit as reported by a provider adapter.
///
/// Adapters discard hits without a resolvable URL, so `url` is always
/// non-empty here. The normalized URL is the record's identity for dedup.
#[derive(Debug, Clone)]
pub struct ArticleCandidate {
    pub title: String,
    /// Absolute URL of the article (possibly aggregator-wrapped).
    pub url: String,
    /// Provider-native date string; format varies per backend.
    pub published_raw: Option<String>,
    pub source_name: String,
    /// Provider-supplied summary, possibly HTML-contaminated.
    pub snippet: String,
    pub preview_image: Option<String>,
}

/// Extraction result for one article page.
///
/// `full_text` is never an error value in the Result sense: failed fetches
/// carry a human-readable sentinel instead, and [`ArticleContent::is_error`]
/// tells the two apart so the presentation layer can render a degraded state.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleContent {
    pub full_text: String,
    pub image: Option<String>,
}

impl ArticleContent {
    /// True when `full_text` holds a failure sentinel rather than article
    /// text. Sentinel strings are defined in the fetcher module.
    pub fn is_error(&self) -> bool {
        crate::fetcher::is_sentinel(&self.full_text)
    }
}

/// The record handed to callers: candidate metadata plus fetched content.
///
/// In fast-search mode `full_text` stays empty; a caller may fetch content
/// later and attach it with [`EnrichedArticle::attach_content`]. An empty
/// `full_text` therefore means "not yet fetched", distinct from a fetched
/// sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedArticle {
    pub title: String,
    pub url: String,
    pub source_name: String,
    pub snippet: String,
    pub published_raw: Option<String>,
    /// Normalized publication time computed from `published_raw`.
    pub published: Option<DateTime<Utc>>,
    pub full_text: String,
    pub image: Option<String>,
}

impl EnrichedArticle {
    pub fn from_candidate(candidate: &ArticleCandidate) -> Self {
        let published = candidate
            .published_raw
            .as_deref()
            .and_then(parse_published);
        Self {
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            source_name: candidate.source_name.clone(),
            snippet: candidate.snippet.clone(),
            published_raw: candidate.published_raw.clone(),
            published,
            full_text: String::new(),
            image: candidate.preview_image.clone(),
        }
    }

    /// Second phase of the two-phase fill: attach fetched content. The
    /// provider-supplied image keeps precedence over the scraped one.
    pub fn attach_content(&mut self, content: ArticleContent) {
        self.full_text = content.full_text;
        if self.image.is_none() {
            self.image = content.image;
        }
    }
}

/// Parse a provider-native date string into UTC.
///
/// Accepts ISO-8601 variants (with or without an explicit offset, with or
/// without a trailing `Z`) and RFC-2822 mail dates, which is what the RSS
/// backends emit. Anything else is `None`.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // ISO-8601 without an offset: assume UTC, as the backends do.
    let naked = s.strip_suffix('Z').unwrap_or(s);
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naked, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}
