//! Tiered main-content text extraction.
//!
//! No statistical boilerplate removal, just a fixed heuristic ladder tuned
//! toward "never return nothing" over "never return noise":
//!
//! 1. Strip structural noise (script/style/noscript/svg/iframe), then page
//!    chrome (header/footer/nav/aside/form), then elements whose class names
//!    look like ads/promos/comments. Order matters: structural noise first,
//!    cosmetic noise last.
//! 2. Pick a content root: `<article>`, else `<main>`, else the first
//!    element with a content-indicating class, else `<body>`, else the
//!    document itself.
//! 3. Collect heading/paragraph/list/quote/code fragments in document
//!    order, dropping fragments shorter than the configured minimum.
//! 4. Zero fragments: dump all text under the root as one block.
//! 5. Normalize whitespace.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static STRUCTURAL_NOISE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script, style, noscript, svg, iframe").expect("selector"));
static CHROME_NOISE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("header, footer, nav, aside, form").expect("selector"));
static FRAGMENTS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6, p, li, blockquote, pre, code").expect("selector")
});
static ANY_ELEMENT: Lazy<Selector> = Lazy::new(|| Selector::parse("*").expect("selector"));
static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").expect("selector"));
static MAIN: Lazy<Selector> = Lazy::new(|| Selector::parse("main").expect("selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("selector"));

static NOISE_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|[\s_-])(ad|ads|advert|advertisement|promo|related|sidebar|comments?|share|social)([\s_-]|$)")
        .expect("noise-class pattern")
});
static CONTENT_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|[\s_-])(article|content|post|entry|story|text)([\s_-]|$)")
        .expect("content-class pattern")
});

static SPACE_BEFORE_NEWLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\S\n]+\n").expect("pattern"));
static SPACE_AFTER_NEWLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[^\S\n]+").expect("pattern"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("pattern"));
static EXCESS_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]{2,}").expect("pattern"));

const FRAGMENT_TAGS: [&str; 11] = [
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "blockquote", "pre", "code",
];

/// Extract the main article text from raw HTML.
///
/// Returns `None` only when the input yields no text at all (empty input,
/// markup with no text content); callers must treat that distinctly from an
/// empty string. Never panics on malformed input; the parser is
/// error-tolerant by construction.
pub fn extract_main_text(html: &str, min_fragment_chars: usize) -> Option<String> {
    if html.trim().is_empty() {
        return None;
    }
    let mut document = Html::parse_document(html);
    detach_matching(&mut document, &STRUCTURAL_NOISE);
    detach_matching(&mut document, &CHROME_NOISE);
    detach_noise_classes(&mut document);

    let root = content_root(&document);
    let fragments = collect_fragments(root, min_fragment_chars);
    let text = if fragments.is_empty() {
        root.text().collect::<Vec<_>>().join(" ")
    } else {
        fragments.join("\n\n")
    };

    let normalized = normalize_whitespace(&text);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn detach_matching(document: &mut Html, selector: &Selector) {
    let ids: Vec<_> = document.select(selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn detach_noise_classes(document: &mut Html) {
    let ids: Vec<_> = document
        .select(&ANY_ELEMENT)
        .filter(|el| {
            el.value()
                .attr("class")
                .is_some_and(|class| NOISE_CLASS.is_match(class))
        })
        .map(|el| el.id())
        .collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Content root priority: `<article>` > `<main>` > content-class element >
/// `<body>` > whole document.
fn content_root(document: &Html) -> ElementRef<'_> {
    if let Some(article) = document.select(&ARTICLE).next() {
        return article;
    }
    if let Some(main) = document.select(&MAIN).next() {
        return main;
    }
    if let Some(by_class) = document.select(&ANY_ELEMENT).find(|el| {
        el.value()
            .attr("class")
            .is_some_and(|class| CONTENT_CLASS.is_match(class))
    }) {
        return by_class;
    }
    if let Some(body) = document.select(&BODY).next() {
        return body;
    }
    document.root_element()
}

fn collect_fragments(root: ElementRef<'_>, min_chars: usize) -> Vec<String> {
    root.select(&FRAGMENTS)
        .filter(|el| !has_fragment_ancestor(*el, root))
        .filter_map(|el| {
            let text = el.text().collect::<Vec<_>>().join(" ");
            let trimmed = text.trim();
            if trimmed.chars().count() >= min_chars {
                Some(trimmed.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// A `<code>` inside a `<pre>`, or a `<p>` inside an `<li>`, would otherwise
/// be collected twice: once on its own and once inside its ancestor.
fn has_fragment_ancestor(el: ElementRef<'_>, root: ElementRef<'_>) -> bool {
    for ancestor in el.ancestors() {
        if ancestor.id() == root.id() {
            break;
        }
        if let Some(element) = ancestor.value().as_element() {
            if FRAGMENT_TAGS.contains(&element.name()) {
                return true;
            }
        }
    }
    false
}

fn normalize_whitespace(text: &str) -> String {
    let text = SPACE_BEFORE_NEWLINE.replace_all(text, "\n");
    let text = SPACE_AFTER_NEWLINE.replace_all(&text, "\n");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    let text = EXCESS_SPACES.replace_all(&text, " ");
    text.trim().to_string()
}
