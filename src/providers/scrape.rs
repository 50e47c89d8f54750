//! Bing News result-page adapter.
//!
//! No feed here: the backend returns a search result page and we scrape the
//! news cards out of it. Bing renders publication times as relative labels
//! ("2 ч. назад"), so candidates usually carry no parseable date and rely
//! on the aggregator's unparsable-date backfill. Serves double duty as the
//! fetcher's consent-fallback search surface.

use crate::config::PipelineConfig;
use crate::http::HttpClient;
use crate::models::ArticleCandidate;
use crate::providers::SearchProvider;
use crate::util::BoxError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument};
use url::Url;

const SEARCH_BASE: &str = "https://www.bing.com/news/search";

static NEWS_CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.news-card").expect("selector"));
static CARD_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("a.title").expect("selector"));
static CARD_SNIPPET: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.snippet").expect("selector"));
static CARD_SOURCE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.source a, div.source span").expect("selector"));
static CARD_IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("selector"));

pub struct BingNewsProvider {
    http: HttpClient,
    base_url: String,
    market: String,
}

impl BingNewsProvider {
    pub fn new(http: HttpClient, config: &PipelineConfig) -> Self {
        Self {
            http,
            base_url: SEARCH_BASE.to_string(),
            market: format!("{}-{}", config.search_lang, config.search_country),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}?q={}&setmkt={}&qft=sortbydate%3d%221%22",
            self.base_url,
            urlencoding::encode(query),
            self.market
        )
    }
}

#[async_trait]
impl SearchProvider for BingNewsProvider {
    fn name(&self) -> &'static str {
        "bing-news"
    }

    #[instrument(level = "info", skip(self))]
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ArticleCandidate>, BoxError> {
        let url = self.search_url(query);
        let page = self.http.get_page(&url).await?;
        if !page.status.is_success() {
            return Err(format!("result page returned status {}", page.status).into());
        }
        let candidates = parse_result_page(&page.body, &page.final_url, max_results);
        info!(count = candidates.len(), "Scraped result page");
        Ok(candidates)
    }
}

/// Scrape news cards out of a result page. Cards without a resolvable
/// article URL are discarded.
pub(crate) fn parse_result_page(
    html: &str,
    page_url: &str,
    max_results: usize,
) -> Vec<ArticleCandidate> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    document
        .select(&NEWS_CARD)
        .filter_map(|card| card_to_candidate(card, base.as_ref()))
        .take(max_results)
        .collect()
}

fn card_to_candidate(card: ElementRef<'_>, base: Option<&Url>) -> Option<ArticleCandidate> {
    // The card carries the article URL as an attribute; older layouts put
    // it on the title anchor instead.
    let href = card
        .value()
        .attr("url")
        .map(str::to_string)
        .or_else(|| {
            card.select(&CARD_TITLE)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string)
        })?;
    let url = absolutize(&href, base)?;

    let title = card
        .select(&CARD_TITLE)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())?;
    let snippet = card
        .select(&CARD_SNIPPET)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let source_name = card
        .value()
        .attr("data-author")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            card.select(&CARD_SOURCE)
                .next()
                .map(element_text)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default();
    let preview_image = card
        .select(&CARD_IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| absolutize(src, base));

    Some(ArticleCandidate {
        title,
        url,
        published_raw: None,
        source_name,
        snippet,
        preview_image,
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn absolutize(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None if href.starts_with("http://") || href.starts_with("https://") => {
            Some(href.to_string())
        }
        None => None,
    }
}
