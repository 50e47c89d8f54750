//! Consent-wall detection.
//!
//! Aggregators and some publishers answer article requests with a cookie
//! consent interstitial instead of content. Two signals, one predicate:
//!
//! - the final (post-redirect) URL lands on a known consent host, decisive
//!   on its own;
//! - the body contains consent-page phrases AND is small. The size gate
//!   keeps long legitimate pages that merely mention cookies from matching.

use once_cell::sync::Lazy;

const CONSENT_HOSTS: [&str; 3] = [
    "consent.google.",
    "consent.youtube.",
    "consent.yandex.",
];

static CONSENT_PHRASES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "before you continue",
        "accept all",
        "accept the use of cookies",
        "принять все",
        "использование файлов cookie",
        "использования файлов cookie",
        "согласие на обработку",
    ]
});

/// Decide whether a fetched page is a consent wall rather than an article.
///
/// `max_body_bytes` gates the phrase heuristic only; a consent-host URL
/// matches regardless of body size.
pub fn is_consent_page(final_url: &str, body: &str, max_body_bytes: usize) -> bool {
    let url_lower = final_url.to_lowercase();
    if CONSENT_HOSTS.iter().any(|host| url_lower.contains(host)) {
        return true;
    }
    if body.len() >= max_body_bytes {
        return false;
    }
    let body_lower = body.to_lowercase();
    CONSENT_PHRASES
        .iter()
        .any(|phrase| body_lower.contains(phrase))
}

/// True when a URL should not be used as a consent-fallback target: either
/// it is itself a consent host or an aggregator-wrapped link that would
/// bounce right back.
pub fn is_unusable_fallback(url: &str) -> bool {
    let lower = url.to_lowercase();
    CONSENT_HOSTS.iter().any(|host| lower.contains(host)) || crate::resolver::is_wrapped(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 50_000;

    #[test]
    fn test_consent_host_matches_regardless_of_body() {
        let big_body = "x".repeat(100_000);
        assert!(is_consent_page(
            "https://consent.google.com/m?continue=https://news.google.com",
            &big_body,
            MAX
        ));
    }

    #[test]
    fn test_phrase_with_small_body_matches() {
        let body = "<html><body>Before you continue, accept all cookies.</body></html>";
        assert!(is_consent_page("https://example.com/article", body, MAX));
    }

    #[test]
    fn test_russian_phrase_matches() {
        let body = "<html><body>Мы запрашиваем согласие на использование файлов cookie.</body></html>";
        assert!(is_consent_page("https://example.com/article", body, MAX));
    }

    #[test]
    fn test_phrase_on_long_page_does_not_match() {
        // A real article that happens to discuss cookie consent.
        let mut body = String::from("accept all cookies ");
        body.push_str(&"длинный текст статьи ".repeat(5_000));
        assert!(!is_consent_page("https://example.com/article", &body, MAX));
    }

    #[test]
    fn test_ordinary_page_does_not_match() {
        assert!(!is_consent_page(
            "https://example.com/article",
            "<html><body>Обычная статья о погоде.</body></html>",
            MAX
        ));
    }

    #[test]
    fn test_unusable_fallback_targets() {
        assert!(is_unusable_fallback("https://consent.google.com/m"));
        assert!(is_unusable_fallback(
            "https://news.google.com/rss/articles/CBMiAWE"
        ));
        assert!(!is_unusable_fallback("https://example.com/story"));
    }
}
