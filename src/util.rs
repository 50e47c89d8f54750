//! Small helpers shared across the pipeline: URL normalization for dedup,
//! string truncation for logging, and lightweight HTML tag stripping for
//! provider snippets.

use url::Url;

/// Boxed error type used on async paths so futures stay `Send`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Normalize a URL for identity comparison.
///
/// Lowercases scheme and host, drops the fragment, and strips a single
/// trailing slash from the path. Two URLs that differ only in these
/// respects refer to the same article for dedup purposes.
///
/// Unparseable input falls back to a trimmed, lowercased copy so that
/// dedup still behaves deterministically on garbage URLs.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut s = url.to_string();
            if s.ends_with('/') && url.path() != "/" {
                s.pop();
            } else if url.path() == "/" && url.query().is_none() {
                // "https://example.com/" and "https://example.com" are the same page
                s.pop();
            }
            s
        }
        Err(_) => raw.trim().to_lowercase(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (on a char boundary) with an
/// ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Strip HTML tags and decode the handful of entities that show up in
/// provider snippets. Not a parser: provider descriptions are short and
/// this only needs to make them printable.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_case_and_slash() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM/News/Article/"),
            normalize_url("https://example.com/News/Article")
        );
    }

    #[test]
    fn test_normalize_url_fragment() {
        assert_eq!(
            normalize_url("https://example.com/a#section"),
            normalize_url("https://example.com/a")
        );
    }

    #[test]
    fn test_normalize_url_root() {
        assert_eq!(
            normalize_url("https://example.com/"),
            normalize_url("https://example.com")
        );
    }

    #[test]
    fn test_normalize_url_preserves_path_case() {
        // Paths are case-sensitive; only scheme/host fold.
        assert_ne!(
            normalize_url("https://example.com/A"),
            normalize_url("https://example.com/a")
        );
    }

    #[test]
    fn test_normalize_url_garbage() {
        assert_eq!(normalize_url("  Not A Url "), "not a url");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_char_boundary() {
        let s = "ааааа"; // 2 bytes per char
        let result = truncate_for_log(s, 3);
        assert!(result.starts_with('а'));
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("<a href=\"x\">Title</a> &mdash; <b>Source</b>"),
            "Title &mdash; Source"
        );
        assert_eq!(strip_tags("plain &amp; simple"), "plain & simple");
    }
}
