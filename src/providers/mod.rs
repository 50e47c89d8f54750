//! Search provider adapters.
//!
//! Every backend (RSS feeds, HTML-scraping search engines) is an
//! implementation of one [`SearchProvider`] trait producing the uniform
//! [`ArticleCandidate`] shape; the aggregator composes them by explicit
//! configuration instead of duplicating the pipeline per backend.
//!
//! | Backend | Module | Method |
//! |---------|--------|--------|
//! | Google News | [`rss`] | search feed, quick-xml |
//! | Bing News | [`scrape`] | result-page scraping, css selectors |
//!
//! Adapters enforce one invariant at their boundary: no candidate leaves an
//! adapter without a non-empty URL.

use crate::models::ArticleCandidate;
use crate::util::BoxError;
use async_trait::async_trait;

pub mod rss;
pub mod scrape;

pub use rss::GoogleNewsProvider;
pub use scrape::BingNewsProvider;

/// A search backend returning normalized article candidates for a query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Query the backend for up to `max_results` candidates.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ArticleCandidate>, BoxError>;
}

/// How the aggregator combines multiple providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    /// Query providers in priority order, stopping at the first non-empty
    /// result set.
    Failover,
    /// Query every provider and merge, priority order first.
    Merge,
}
