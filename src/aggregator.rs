//! Search aggregation: the pipeline's front door.
//!
//! One call does the whole dance: normalize the query, over-fetch
//! candidates from the configured providers, dedupe by normalized URL,
//! apply the expanding recency filter, and (optionally) fan the survivors
//! out to the article fetcher on a bounded worker pool.
//!
//! Ordering guarantees: within one batch the output order matches the
//! candidate order (the fan-out buffer is the ordered variant and results
//! are joined after all workers finish); across calls there are none, every
//! call re-queries live sources. Per-item fetch failures never abort a
//! batch: a failed entry carries a sentinel, a crashed worker an empty
//! string, siblings are unaffected.

use crate::config::PipelineConfig;
use crate::fetcher::ArticleFetcher;
use crate::models::{ArticleCandidate, ArticleContent, EnrichedArticle, parse_published};
use crate::providers::{ProviderMode, SearchProvider};
use crate::util::normalize_url;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct NewsAggregator {
    providers: Vec<Arc<dyn SearchProvider>>,
    fetcher: Arc<ArticleFetcher>,
    config: Arc<PipelineConfig>,
    mode: ProviderMode,
}

impl NewsAggregator {
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        fetcher: Arc<ArticleFetcher>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            providers,
            fetcher,
            config,
            mode: ProviderMode::Failover,
        }
    }

    pub fn with_mode(mut self, mode: ProviderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run a search and return up to `max_results` enriched articles.
    ///
    /// With `fetch_content` false this is the fast mode: `full_text` stays
    /// empty and callers fetch on demand. Total: provider failures degrade
    /// to fewer (possibly zero) results, never an error.
    #[instrument(level = "info", skip(self))]
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        fetch_content: bool,
    ) -> Vec<EnrichedArticle> {
        if query.trim().is_empty() || max_results == 0 {
            return Vec::new();
        }
        let normalized = normalize_query(query);
        let over_fetch = (max_results * self.config.over_fetch_factor)
            .max(self.config.over_fetch_floor);

        let mut raw: Vec<ArticleCandidate> = Vec::new();
        for provider in &self.providers {
            match provider.search(&normalized, over_fetch).await {
                Ok(batch) => {
                    info!(
                        provider = provider.name(),
                        count = batch.len(),
                        "Provider returned candidates"
                    );
                    raw.extend(batch);
                    if self.mode == ProviderMode::Failover && !raw.is_empty() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Provider query failed; continuing");
                }
            }
        }

        let deduped = dedupe_candidates(raw);
        let selected: Vec<ArticleCandidate> =
            filter_recent(&deduped, Utc::now(), max_results, &self.config)
                .into_iter()
                .take(max_results)
                .collect();
        info!(
            candidates = deduped.len(),
            selected = selected.len(),
            "Candidate selection complete"
        );

        let mut articles: Vec<EnrichedArticle> =
            selected.iter().map(EnrichedArticle::from_candidate).collect();

        if fetch_content && !articles.is_empty() {
            let contents = self.fetch_batch(&selected).await;
            for (article, content) in articles.iter_mut().zip(contents) {
                article.attach_content(content);
            }
        }
        articles
    }

    /// Fan out one fetch per candidate on a bounded, order-preserving
    /// worker pool and join the whole batch. A worker that dies (panics)
    /// yields an empty-text record for its own candidate only.
    async fn fetch_batch(&self, candidates: &[ArticleCandidate]) -> Vec<ArticleContent> {
        info!(
            count = candidates.len(),
            workers = self.config.fetch_workers,
            "Fetching article contents"
        );
        stream::iter(candidates.iter().cloned().map(|candidate| {
            let fetcher = Arc::clone(&self.fetcher);
            async move {
                let handle = tokio::spawn(async move {
                    fetcher
                        .fetch(
                            &candidate.url,
                            candidate.preview_image.as_deref(),
                            Some(&candidate.title),
                        )
                        .await
                });
                match handle.await {
                    Ok(content) => content,
                    Err(e) => {
                        error!(error = %e, "Fetch worker died; yielding empty record");
                        ArticleContent {
                            full_text: String::new(),
                            image: None,
                        }
                    }
                }
            }
        }))
        .buffered(self.config.fetch_workers.max(1))
        .collect()
        .await
    }
}

/// Bias short queries toward news results: fewer than three words and no
/// news keyword gets a localized qualifier appended.
pub(crate) fn normalize_query(query: &str) -> String {
    let trimmed = query.trim();
    let lower = trimmed.to_lowercase();
    if trimmed.split_whitespace().count() < 3
        && !lower.contains("новости")
        && !lower.contains("news")
    {
        format!("{trimmed} новости")
    } else {
        trimmed.to_string()
    }
}

/// Dedupe by normalized URL, first-seen order preserved across providers.
pub(crate) fn dedupe_candidates(candidates: Vec<ArticleCandidate>) -> Vec<ArticleCandidate> {
    candidates
        .into_iter()
        .filter(|c| !c.url.trim().is_empty())
        .unique_by(|c| normalize_url(&c.url))
        .collect()
}

/// Expanding-window recency filter.
///
/// Windows are tried in configured order; the first one that reaches
/// `min(max_results, min_desired_results)` parsed matches wins. If even the
/// widest window falls short, its matches are backfilled with candidates
/// whose dates could not be parsed at all, in original order. Candidates
/// with parsed dates older than the widest window are out entirely.
pub(crate) fn filter_recent(
    candidates: &[ArticleCandidate],
    now: DateTime<Utc>,
    max_results: usize,
    config: &PipelineConfig,
) -> Vec<ArticleCandidate> {
    let parsed: Vec<(&ArticleCandidate, Option<DateTime<Utc>>)> = candidates
        .iter()
        .map(|c| (c, c.published_raw.as_deref().and_then(parse_published)))
        .collect();
    let min_desired = max_results.min(config.min_desired_results);

    let mut widest: Vec<&ArticleCandidate> = Vec::new();
    for days in &config.recency_windows_days {
        let cutoff = now - Duration::days(*days);
        widest = parsed
            .iter()
            .filter(|(_, date)| date.is_some_and(|d| d >= cutoff))
            .map(|(c, _)| *c)
            .collect();
        debug!(window_days = days, matches = widest.len(), "Recency window");
        if widest.len() >= min_desired {
            return widest.into_iter().cloned().collect();
        }
    }

    // Not enough dated matches anywhere: keep the widest window and pad
    // with undated candidates in their original order.
    let mut selected: Vec<&ArticleCandidate> = widest;
    for (candidate, date) in &parsed {
        if selected.len() >= min_desired {
            break;
        }
        if date.is_none() {
            selected.push(candidate);
        }
    }
    selected.into_iter().cloned().collect()
}
