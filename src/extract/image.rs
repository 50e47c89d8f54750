//! Representative-image resolution.
//!
//! Provider metadata is trusted over scraping; otherwise the usual social
//! meta tags are tried before falling back to the first inline image.
//! Relative candidates are resolved against the page URL.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("selector"));
static TWITTER_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="twitter:image"]"#).expect("selector"));
static INLINE_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("selector"));

/// Pick the best representative image for an article page.
///
/// Priority: `known_image` (from the search provider, returned unchanged) >
/// `og:image` > `twitter:image` > first `<img>`. Returns `None` when
/// nothing is found; never errors.
pub fn resolve_image(html: &str, base_url: &str, known_image: Option<&str>) -> Option<String> {
    if let Some(known) = known_image {
        if !known.trim().is_empty() {
            return Some(known.to_string());
        }
    }
    let document = Html::parse_document(html);
    let candidate = first_attr(&document, &OG_IMAGE, "content")
        .or_else(|| first_attr(&document, &TWITTER_IMAGE, "content"))
        .or_else(|| first_attr(&document, &INLINE_IMG, "src"))?;
    absolutize(&candidate, base_url)
}

fn first_attr(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn absolutize(candidate: &str, base_url: &str) -> Option<String> {
    match Url::parse(base_url) {
        Ok(base) => base.join(candidate).ok().map(|url| url.to_string()),
        // No usable base: keep the candidate only if already absolute.
        Err(_) if candidate.starts_with("http://") || candidate.starts_with("https://") => {
            Some(candidate.to_string())
        }
        Err(_) => None,
    }
}
