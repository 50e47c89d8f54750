//! Google News search-feed adapter.
//!
//! Google News exposes full-text search as an RSS 2.0 feed. Titles carry a
//! `"Title - Source"` suffix, links are aggregator-wrapped, dates are
//! RFC-2822. The feed parser is event-driven and tolerant: a malformed feed
//! yields the items parsed so far, never an error.

use crate::config::PipelineConfig;
use crate::http::HttpClient;
use crate::models::ArticleCandidate;
use crate::providers::SearchProvider;
use crate::util::BoxError;
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{info, instrument, warn};

const FEED_BASE: &str = "https://news.google.com/rss/search";

pub struct GoogleNewsProvider {
    http: HttpClient,
    base_url: String,
    lang: String,
    country: String,
}

impl GoogleNewsProvider {
    pub fn new(http: HttpClient, config: &PipelineConfig) -> Self {
        Self {
            http,
            base_url: FEED_BASE.to_string(),
            lang: config.search_lang.clone(),
            country: config.search_country.clone(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn feed_url(&self, query: &str) -> String {
        format!(
            "{}?q={}&hl={}&gl={}&ceid={}:{}",
            self.base_url,
            urlencoding::encode(query),
            self.lang,
            self.country,
            self.country,
            self.lang
        )
    }
}

#[async_trait]
impl SearchProvider for GoogleNewsProvider {
    fn name(&self) -> &'static str {
        "google-news"
    }

    #[instrument(level = "info", skip(self))]
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ArticleCandidate>, BoxError> {
        let url = self.feed_url(query);
        let page = self.http.get_page(&url).await?;
        if !page.status.is_success() {
            return Err(format!("search feed returned status {}", page.status).into());
        }
        let candidates = to_candidates(parse_feed_items(&page.body), max_results);
        info!(count = candidates.len(), "Parsed search feed");
        Ok(candidates)
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct FeedItem {
    pub title: String,
    pub link: String,
    pub pub_date: String,
    pub source: String,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    PubDate,
    Source,
    Description,
}

/// Parse RSS `<item>` elements out of a feed document.
pub(crate) fn parse_feed_items(xml: &str) -> Vec<FeedItem> {
    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"item" {
                    current = Some(FeedItem::default());
                    field = None;
                } else if current.is_some() {
                    field = match e.name().as_ref() {
                        b"title" => Some(Field::Title),
                        b"link" => Some(Field::Link),
                        b"pubDate" => Some(Field::PubDate),
                        b"source" => Some(Field::Source),
                        b"description" => Some(Field::Description),
                        b"media:content" | b"media:thumbnail" => {
                            capture_media_url(current.as_mut(), &e);
                            None
                        }
                        _ => None,
                    };
                }
            }
            Ok(Event::Empty(e)) => {
                if current.is_some()
                    && matches!(e.name().as_ref(), b"media:content" | b"media:thumbnail")
                {
                    capture_media_url(current.as_mut(), &e);
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field) {
                    let text = t
                        .decode()
                        .ok()
                        .and_then(|cow| {
                            quick_xml::escape::unescape(&cow)
                                .map(|c| c.into_owned())
                                .ok()
                        })
                        .unwrap_or_else(|| String::from_utf8_lossy(&t).into_owned());
                    append_field(item, field, &text);
                }
            }
            Ok(Event::CData(t)) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field) {
                    let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    append_field(item, field, &text);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, parsed = items.len(), "Feed parse error; keeping parsed items");
                break;
            }
            _ => {}
        }
    }
    items
}

fn capture_media_url(item: Option<&mut FeedItem>, element: &BytesStart<'_>) {
    let Some(item) = item else { return };
    if item.image.is_some() {
        return;
    }
    if let Ok(Some(attr)) = element.try_get_attribute("url") {
        if let Ok(value) = attr.unescape_value() {
            let value = value.trim().to_string();
            if !value.is_empty() {
                item.image = Some(value);
            }
        }
    }
}

fn append_field(item: &mut FeedItem, field: Field, text: &str) {
    let target = match field {
        Field::Title => &mut item.title,
        Field::Link => &mut item.link,
        Field::PubDate => &mut item.pub_date,
        Field::Source => &mut item.source,
        Field::Description => &mut item.description,
    };
    target.push_str(text);
}

/// Map feed items to candidates, enforcing the non-empty-URL invariant and
/// splitting the `"Title - Source"` suffix Google News appends.
pub(crate) fn to_candidates(items: Vec<FeedItem>, max_results: usize) -> Vec<ArticleCandidate> {
    items
        .into_iter()
        .filter(|item| !item.link.trim().is_empty())
        .take(max_results)
        .map(|item| {
            let (title, title_source) = split_title_source(item.title.trim());
            let source_name = if item.source.trim().is_empty() {
                title_source
            } else {
                item.source.trim().to_string()
            };
            ArticleCandidate {
                title,
                url: item.link.trim().to_string(),
                published_raw: (!item.pub_date.trim().is_empty())
                    .then(|| item.pub_date.trim().to_string()),
                source_name,
                snippet: item.description.trim().to_string(),
                preview_image: item.image,
            }
        })
        .collect()
}

fn split_title_source(title: &str) -> (String, String) {
    match title.rfind(" - ") {
        Some(pos) => (
            title[..pos].trim().to_string(),
            title[pos + 3..].trim().to_string(),
        ),
        None => (title.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>"климат" - Google Новости</title>
  <item>
    <title>Климатический саммит завершился - Вести</title>
    <link>https://news.google.com/rss/articles/CBMiAWE</link>
    <pubDate>Tue, 06 May 2025 14:30:00 GMT</pubDate>
    <source url="https://vesti.ru">Вести</source>
    <description>&lt;a href="x"&gt;Климатический саммит&lt;/a&gt;</description>
  </item>
  <item>
    <title><![CDATA[Вторая новость - Источник]]></title>
    <link>https://example.com/second</link>
    <pubDate>Tue, 06 May 2025 10:00:00 GMT</pubDate>
    <media:content url="https://example.com/preview.jpg"/>
  </item>
  <item>
    <title>Без ссылки</title>
    <link></link>
  </item>
</channel></rss>"#;

    #[test]
    fn test_parse_feed_items() {
        let items = parse_feed_items(FEED);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Климатический саммит завершился - Вести");
        assert_eq!(items[0].link, "https://news.google.com/rss/articles/CBMiAWE");
        assert_eq!(items[0].source, "Вести");
        assert!(items[0].description.contains("Климатический саммит"));
        assert_eq!(items[1].title, "Вторая новость - Источник");
        assert_eq!(
            items[1].image.as_deref(),
            Some("https://example.com/preview.jpg")
        );
    }

    #[test]
    fn test_to_candidates_discards_empty_links() {
        let candidates = to_candidates(parse_feed_items(FEED), 10);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| !c.url.is_empty()));
    }

    #[test]
    fn test_source_from_tag_preferred_over_title_suffix() {
        let candidates = to_candidates(parse_feed_items(FEED), 10);
        assert_eq!(candidates[0].title, "Климатический саммит завершился");
        assert_eq!(candidates[0].source_name, "Вести");
        // No <source> tag: fall back to the title suffix.
        assert_eq!(candidates[1].source_name, "Источник");
        assert_eq!(candidates[1].title, "Вторая новость");
    }

    #[test]
    fn test_malformed_feed_keeps_parsed_prefix() {
        let broken = &FEED[..FEED.find("<media:content").unwrap()];
        let items = parse_feed_items(broken);
        assert!(!items.is_empty());
        assert_eq!(items[0].source, "Вести");
    }

    #[test]
    fn test_garbage_input_yields_nothing() {
        assert!(parse_feed_items("not xml at all").is_empty());
        assert!(parse_feed_items("").is_empty());
    }

    #[tokio::test]
    async fn test_search_against_canned_feed() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Regex(r"^/rss.*".to_string()))
            .with_status(200)
            .with_header("content-type", "application/rss+xml")
            .with_body(FEED)
            .create_async()
            .await;

        let config = PipelineConfig::default();
        let provider = GoogleNewsProvider::new(HttpClient::new(&config).unwrap(), &config)
            .with_base_url(&format!("{}/rss/search", server.url()));
        let candidates = provider.search("климат", 10).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(
            candidates[0].published_raw.as_deref(),
            Some("Tue, 06 May 2025 14:30:00 GMT")
        );
    }

    #[tokio::test]
    async fn test_search_propagates_feed_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Regex(r"^/rss.*".to_string()))
            .with_status(403)
            .create_async()
            .await;

        let config = PipelineConfig::default();
        let provider = GoogleNewsProvider::new(HttpClient::new(&config).unwrap(), &config)
            .with_base_url(&format!("{}/rss/search", server.url()));
        assert!(provider.search("климат", 10).await.is_err());
    }
}
