//! Article fetching and content extraction.
//!
//! One fetch walks a small state machine:
//!
//! ```text
//! Start -> Resolved -> Fetched -> { ConsentBlocked, ShortContent, Done }
//! ```
//!
//! with a single permitted retry hop back to `Start` from either
//! `ConsentBlocked` (via fallback discovery on a secondary search surface)
//! or `ShortContent` (via a canonical/source link), bounded by an explicit
//! depth counter.
//!
//! The public contract is total: `fetch` always returns an
//! [`ArticleContent`]. Network errors, bad statuses, consent walls and
//! extraction failures all degrade to short, actionable sentinel strings
//! inside `full_text`; the pipeline runs against adversarial third-party
//! HTML and must not crash on the first bad page.

use crate::config::PipelineConfig;
use crate::consent;
use crate::extract;
use crate::http::HttpClient;
use crate::models::ArticleContent;
use crate::providers::SearchProvider;
use crate::resolver;
use crate::util::normalize_url;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Prefix of load-failure sentinels; the status or error detail follows.
pub const LOAD_ERROR_PREFIX: &str = "Ошибка загрузки:";
/// Page fetched fine but no text could be extracted.
pub const EXTRACT_FAILED: &str =
    "Не удалось извлечь текст. Возможно, сайт защищён от ботов. Попробуйте другую статью.";
/// Consent wall could not be bypassed.
pub const CONSENT_BLOCKED: &str =
    "Статья недоступна: сайт требует согласия на использование cookie. Попробуйте другую статью.";

/// True when `full_text` carries one of the fetcher's failure sentinels.
/// The presentation layer uses this to render a degraded state instead of
/// showing the sentinel as article text.
pub fn is_sentinel(text: &str) -> bool {
    text.starts_with(LOAD_ERROR_PREFIX) || text == EXTRACT_FAILED || text == CONSENT_BLOCKED
}

static CANONICAL_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel="canonical"]"#).expect("selector"));
static OG_URL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:url"]"#).expect("selector"));
static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("selector"));

/// Visible labels of "go to the original" anchors, localized variants
/// included.
const SOURCE_LABELS: [&str; 5] = ["источник", "оригинал", "первоисточник", "source", "original"];

/// Title words used for consent-fallback discovery.
const FALLBACK_PHRASE_WORDS: usize = 10;

pub struct ArticleFetcher {
    http: HttpClient,
    config: Arc<PipelineConfig>,
    /// Secondary search surface for consent-fallback discovery.
    fallback_search: Option<Arc<dyn SearchProvider>>,
}

impl ArticleFetcher {
    pub fn new(http: HttpClient, config: Arc<PipelineConfig>) -> Self {
        Self {
            http,
            config,
            fallback_search: None,
        }
    }

    pub fn with_fallback_search(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.fallback_search = Some(provider);
        self
    }

    /// Fetch one article and extract its text and image.
    ///
    /// `known_image` is the provider-supplied preview (trusted over
    /// scraping); `title` enables consent-fallback discovery.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn fetch(
        &self,
        url: &str,
        known_image: Option<&str>,
        title: Option<&str>,
    ) -> ArticleContent {
        self.fetch_at_depth(
            url.to_string(),
            known_image.map(str::to_string),
            title.map(str::to_string),
            0,
        )
        .await
    }

    /// The state machine proper. Boxed because the consent/short-content
    /// hops recurse; `depth` keeps the recursion bounded at one hop.
    fn fetch_at_depth<'a>(
        &'a self,
        url: String,
        known_image: Option<String>,
        title: Option<String>,
        depth: u8,
    ) -> Pin<Box<dyn Future<Output = ArticleContent> + Send + 'a>> {
        Box::pin(async move {
            // Start -> Resolved
            let resolved = resolver::resolve(&url);

            // Resolved -> Fetched
            let page = match self.http.get_page(&resolved).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "Fetch failed");
                    return ArticleContent {
                        full_text: format!("{LOAD_ERROR_PREFIX} {e}"),
                        image: known_image,
                    };
                }
            };
            if !page.status.is_success() {
                return ArticleContent {
                    full_text: format!("{LOAD_ERROR_PREFIX} {}", page.status.as_u16()),
                    image: known_image,
                };
            }

            // Fetched -> ConsentBlocked
            if consent::is_consent_page(
                &page.final_url,
                &page.body,
                self.config.consent_body_max_bytes,
            ) {
                if depth == 0 {
                    if let Some(fallback) = self.discover_fallback(title.as_deref()).await {
                        info!(%fallback, "Consent wall hit; retrying via fallback discovery");
                        return self
                            .fetch_at_depth(fallback, known_image, None, depth + 1)
                            .await;
                    }
                }
                return ArticleContent {
                    full_text: CONSENT_BLOCKED.to_string(),
                    image: known_image,
                };
            }

            let image =
                extract::resolve_image(&page.body, &page.final_url, known_image.as_deref());
            let Some(text) =
                extract::extract_main_text(&page.body, self.config.min_fragment_chars)
            else {
                return ArticleContent {
                    full_text: EXTRACT_FAILED.to_string(),
                    image,
                };
            };

            // Fetched -> ShortContent: a stub page on an aggregator/mirror;
            // try one hop to the canonical source and keep the longer text.
            if depth == 0
                && text.chars().count() < self.config.short_content_chars
                && looks_like_full_page(&page.body)
            {
                if let Some(hop) = find_source_hop(&page.body, &page.final_url) {
                    if is_distinct_target(&hop, &resolved, &page.final_url) {
                        info!(%hop, chars = text.chars().count(), "Short content; hopping to source");
                        let hopped = self
                            .fetch_at_depth(hop, known_image.clone(), None, depth + 1)
                            .await;
                        if !is_sentinel(&hopped.full_text)
                            && hopped.full_text.chars().count() > text.chars().count()
                        {
                            return hopped;
                        }
                    }
                }
            }

            debug!(chars = text.chars().count(), "Extraction complete");
            ArticleContent {
                full_text: text,
                image,
            }
        })
    }

    /// Derive a search phrase from the article title and look for the same
    /// story on the secondary search surface, skipping results that would
    /// bounce straight back into a wrapper or consent page.
    async fn discover_fallback(&self, title: Option<&str>) -> Option<String> {
        let provider = self.fallback_search.as_ref()?;
        let phrase = cleaned_title_phrase(title?);
        if phrase.is_empty() {
            return None;
        }
        match provider.search(&phrase, 5).await {
            Ok(candidates) => candidates
                .into_iter()
                .map(|c| resolver::resolve(&c.url))
                .find(|u| !consent::is_unusable_fallback(u)),
            Err(e) => {
                warn!(error = %e, "Fallback discovery failed");
                None
            }
        }
    }
}

/// First ~10 title words, stripped of punctuation, as a search phrase.
fn cleaned_title_phrase(title: &str) -> String {
    title
        .split_whitespace()
        .take(FALLBACK_PHRASE_WORDS)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Heuristic: the short-content hop only applies to real HTML documents,
/// not text/JSON responses that merely extracted short.
fn looks_like_full_page(body: &str) -> bool {
    let head: String = body.chars().take(1024).collect::<String>().to_lowercase();
    head.contains("<!doctype html") || head.contains("<html")
}

/// Find a likely canonical/original URL in a page, in priority order:
/// `link[rel=canonical]`, `og:url`, then an anchor labelled as the source.
fn find_source_hop(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let candidate = document
        .select(&CANONICAL_LINK)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
        .or_else(|| {
            document
                .select(&OG_URL)
                .filter_map(|el| el.value().attr("content"))
                .map(str::trim)
                .find(|content| !content.is_empty())
                .map(str::to_string)
        })
        .or_else(|| {
            document
                .select(&ANCHORS)
                .find(|a| {
                    let label = a.text().collect::<Vec<_>>().join(" ").to_lowercase();
                    SOURCE_LABELS.iter().any(|needle| label.contains(needle))
                })
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string)
        })?;
    match Url::parse(page_url) {
        Ok(base) => base.join(&candidate).ok().map(|u| u.to_string()),
        Err(_) if candidate.starts_with("http") => Some(candidate),
        Err(_) => None,
    }
}

fn is_distinct_target(hop: &str, requested: &str, final_url: &str) -> bool {
    let hop = normalize_url(hop);
    hop != normalize_url(requested) && hop != normalize_url(final_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleCandidate;
    use crate::util::BoxError;
    use async_trait::async_trait;

    fn test_config() -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            retry_base_delay_ms: 1,
            http_retries: 1,
            ..PipelineConfig::default()
        })
    }

    fn fetcher(config: Arc<PipelineConfig>) -> ArticleFetcher {
        ArticleFetcher::new(HttpClient::new(&config).unwrap(), config)
    }

    fn long_paragraphs(n: usize) -> String {
        (0..n)
            .map(|i| format!("<p>Абзац номер {i} с достаточно длинным содержимым, чтобы пройти порог фрагмента.</p>"))
            .collect()
    }

    struct StubProvider {
        results: Vec<ArticleCandidate>,
    }

    #[async_trait]
    impl SearchProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }
        async fn search(
            &self,
            _query: &str,
            max_results: usize,
        ) -> Result<Vec<ArticleCandidate>, BoxError> {
            Ok(self.results.iter().take(max_results).cloned().collect())
        }
    }

    fn candidate(url: &str) -> ArticleCandidate {
        ArticleCandidate {
            title: "Заголовок".to_string(),
            url: url.to_string(),
            published_raw: None,
            source_name: "stub".to_string(),
            snippet: String::new(),
            preview_image: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_ok_article() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/story")
            .with_body(format!(
                r#"<html><head><meta property="og:image" content="/lead.jpg"></head>
                   <body><article>{}</article></body></html>"#,
                long_paragraphs(20)
            ))
            .create_async()
            .await;

        let content = fetcher(test_config())
            .fetch(&format!("{}/story", server.url()), None, None)
            .await;
        assert!(!content.is_error());
        assert!(content.full_text.contains("Абзац номер 0"));
        assert_eq!(
            content.image.as_deref(),
            Some(format!("{}/lead.jpg", server.url()).as_str())
        );
    }

    #[tokio::test]
    async fn test_http_error_yields_sentinel() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let content = fetcher(test_config())
            .fetch(&format!("{}/missing", server.url()), None, None)
            .await;
        assert_eq!(content.full_text, "Ошибка загрузки: 404");
        assert!(content.is_error());
    }

    #[tokio::test]
    async fn test_network_error_yields_sentinel() {
        // Nothing listens on port 1.
        let content = fetcher(test_config())
            .fetch("http://127.0.0.1:1/x", Some("https://img.example/i.jpg"), None)
            .await;
        assert!(content.full_text.starts_with(LOAD_ERROR_PREFIX));
        // The provider preview survives fetch failure.
        assert_eq!(content.image.as_deref(), Some("https://img.example/i.jpg"));
    }

    #[tokio::test]
    async fn test_unextractable_page_yields_sentinel() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/empty")
            .with_body("<html><body><div></div></body></html>")
            .create_async()
            .await;

        let content = fetcher(test_config())
            .fetch(&format!("{}/empty", server.url()), None, None)
            .await;
        assert_eq!(content.full_text, EXTRACT_FAILED);
    }

    #[tokio::test]
    async fn test_consent_wall_without_fallback() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/gated")
            .with_body("<html><body>Before you continue, accept all cookies.</body></html>")
            .create_async()
            .await;

        let content = fetcher(test_config())
            .fetch(&format!("{}/gated", server.url()), None, Some("Заголовок"))
            .await;
        assert_eq!(content.full_text, CONSENT_BLOCKED);
    }

    #[tokio::test]
    async fn test_consent_wall_with_fallback_discovery() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/gated")
            .with_body("<html><body>Before you continue, accept all cookies.</body></html>")
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/real")
            .with_body(format!(
                "<html><body><article>{}</article></body></html>",
                long_paragraphs(20)
            ))
            .create_async()
            .await;

        let stub = StubProvider {
            results: vec![
                candidate("https://consent.google.com/m"),
                candidate(&format!("{}/real", server.url())),
            ],
        };
        let config = test_config();
        let fetcher = ArticleFetcher::new(HttpClient::new(&config).unwrap(), config)
            .with_fallback_search(Arc::new(stub));

        let content = fetcher
            .fetch(
                &format!("{}/gated", server.url()),
                None,
                Some("Важная новость о климате"),
            )
            .await;
        assert!(!content.is_error());
        assert!(content.full_text.contains("Абзац номер 0"));
    }

    #[tokio::test]
    async fn test_short_content_canonical_hop() {
        let mut server = mockito::Server::new_async().await;
        let full = format!(
            "<html><body><article>{}</article></body></html>",
            long_paragraphs(30)
        );
        let _m = server
            .mock("GET", "/stub-page")
            .with_body(
                r#"<html><head><link rel="canonical" href="/full-article"></head>
                   <body><article><p>Короткая заметка-анонс со ссылкой на полную версию.</p></article></body></html>"#,
            )
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/full-article")
            .with_body(full)
            .create_async()
            .await;

        let content = fetcher(test_config())
            .fetch(&format!("{}/stub-page", server.url()), None, None)
            .await;
        assert!(content.full_text.contains("Абзац номер 29"));
        assert!(!content.full_text.contains("Короткая заметка"));
    }

    #[tokio::test]
    async fn test_short_hop_keeps_original_when_hop_is_worse() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/stub-page")
            .with_body(
                r#"<html><head><link rel="canonical" href="/worse"></head>
                   <body><article><p>Короткая, но настоящая заметка о событии дня.</p></article></body></html>"#,
            )
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/worse")
            .with_status(404)
            .create_async()
            .await;

        let content = fetcher(test_config())
            .fetch(&format!("{}/stub-page", server.url()), None, None)
            .await;
        assert!(content.full_text.contains("настоящая заметка"));
    }

    #[tokio::test]
    async fn test_hop_depth_bounded_at_one() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/a")
            .with_body(
                r#"<html><head><link rel="canonical" href="/b"></head>
                   <body><article><p>Первая короткая страница с анонсом материала.</p></article></body></html>"#,
            )
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/b")
            .with_body(
                r#"<html><head><link rel="canonical" href="/c"></head>
                   <body><article><p>Вторая страница, тоже короткая, но длиннее первой на несколько слов.</p></article></body></html>"#,
            )
            .create_async()
            .await;
        let c_mock = server
            .mock("GET", "/c")
            .with_body("<html><body><article><p>Третья страница, которую трогать нельзя.</p></article></body></html>")
            .expect(0)
            .create_async()
            .await;

        let content = fetcher(test_config())
            .fetch(&format!("{}/a", server.url()), None, None)
            .await;
        assert!(!content.full_text.contains("Третья страница"));
        c_mock.assert_async().await;
    }

    #[test]
    fn test_cleaned_title_phrase() {
        assert_eq!(
            cleaned_title_phrase("«Климат»: саммит завершился — итоги!"),
            "Климат саммит завершился итоги"
        );
        let long = "один два три четыре пять шесть семь восемь девять десять одиннадцать";
        assert_eq!(
            cleaned_title_phrase(long),
            "один два три четыре пять шесть семь восемь девять десять"
        );
    }

    #[test]
    fn test_find_source_hop_priority() {
        let html = r#"
            <html><head>
              <link rel="canonical" href="https://example.com/canonical">
              <meta property="og:url" content="https://example.com/og">
            </head><body><a href="https://example.com/anchor">Источник</a></body></html>"#;
        assert_eq!(
            find_source_hop(html, "https://mirror.example/page").as_deref(),
            Some("https://example.com/canonical")
        );
    }

    #[test]
    fn test_find_source_hop_og_and_anchor_fallbacks() {
        let og_only = r#"<head><meta property="og:url" content="/og-path"></head>"#;
        assert_eq!(
            find_source_hop(og_only, "https://mirror.example/page").as_deref(),
            Some("https://mirror.example/og-path")
        );
        let anchor_only =
            r#"<body><a href="https://example.com/orig">Оригинал материала</a></body>"#;
        assert_eq!(
            find_source_hop(anchor_only, "https://mirror.example/page").as_deref(),
            Some("https://example.com/orig")
        );
        assert_eq!(find_source_hop("<body></body>", "https://mirror.example/p"), None);
    }

    #[test]
    fn test_is_sentinel() {
        assert!(is_sentinel("Ошибка загрузки: 500"));
        assert!(is_sentinel(CONSENT_BLOCKED));
        assert!(is_sentinel(EXTRACT_FAILED));
        assert!(!is_sentinel("Обычный текст статьи."));
        assert!(!is_sentinel(""));
    }
}
