//! HTML cleaning for scraped firm pages.
//!
//! [`clean`] turns a rendered page into the four artefacts the pipeline
//! stores: compact HTML, plain text, Markdown and the page's outbound links.

mod cleanup;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use vcdossier_shared::{DossierError, ExtractedLink, Result};

/// Anchor text is cut to this many characters.
const MAX_LINK_TEXT_CHARS: usize = 200;

const UNTITLED: &str = "Untitled";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A cleaned page.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedPage {
    /// `<title>` text, or `"Untitled"`.
    pub title: String,
    /// Body HTML without scripts, styles, SVG or comments, whitespace collapsed.
    pub cleaned_html: String,
    /// Body text with whitespace collapsed.
    pub plain_text: String,
    /// Markdown rendering of the cleaned body.
    pub markdown: String,
    /// Absolute http(s) links in first-seen order.
    pub links: Vec<ExtractedLink>,
}

// ---------------------------------------------------------------------------
// Cleaner
// ---------------------------------------------------------------------------

/// Clean `html` fetched from `url`.
#[instrument(skip(html), fields(url = %url, html_len = html.len()))]
pub fn clean(html: &str, url: &str) -> Result<CleanedPage> {
    let stripped = strip_noise(html);
    let doc = Html::parse_document(&stripped);

    let title = extract_title(&doc);
    let body_html = body_inner_html(&doc);
    let cleaned_html = compact_html(&body_html);
    let plain_text = extract_text(&doc);
    let links = extract_links(&doc, url);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "svg", "iframe", "nav"])
        .build();
    let raw_markdown = converter
        .convert(&body_html)
        .map_err(|e| DossierError::parse(format!("markdown conversion failed: {e}")))?;
    let base_url = Url::parse(url).ok();
    let markdown = cleanup::run_pipeline(&raw_markdown, base_url.as_ref());

    debug!(
        title = %title,
        cleaned_len = cleaned_html.len(),
        text_len = plain_text.len(),
        links = links.len(),
        "page cleaned"
    );

    Ok(CleanedPage {
        title,
        cleaned_html,
        plain_text,
        markdown,
        links,
    })
}

/// Remove `<svg>`, `<script>`, `<style>`, `<noscript>` elements and comments.
fn strip_noise(html: &str) -> String {
    static NOISE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        [
            r"(?is)<!--.*?-->",
            r"(?is)<script\b[^>]*>.*?</script\s*>",
            r"(?is)<style\b[^>]*>.*?</style\s*>",
            r"(?is)<noscript\b[^>]*>.*?</noscript\s*>",
            r"(?is)<svg\b[^>]*>.*?</svg\s*>",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    });

    let mut result = html.to_string();
    for re in NOISE_RES.iter() {
        result = re.replace_all(&result, "").into_owned();
    }
    result
}

fn extract_title(doc: &Html) -> String {
    static TITLE_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("title").expect("valid selector"));

    doc.select(&TITLE_SEL)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn body_inner_html(doc: &Html) -> String {
    static BODY_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("body").expect("valid selector"));

    doc.select(&BODY_SEL)
        .next()
        .map(|body| body.inner_html())
        .unwrap_or_default()
}

/// Collapse whitespace runs and drop whitespace between tags.
fn compact_html(html: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    static INTER_TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));

    let collapsed = WS_RE.replace_all(html, " ");
    INTER_TAG_RE
        .replace_all(&collapsed, "><")
        .trim()
        .to_string()
}

fn extract_text(doc: &Html) -> String {
    static BODY_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("body").expect("valid selector"));

    let raw = match doc.select(&BODY_SEL).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => String::new(),
    };
    collapse_whitespace(&raw)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collect `a[href]` targets as absolute http(s) URLs.
///
/// Absolute links are kept as written, root-relative ones are resolved
/// against the page; fragments, `mailto:`, `tel:` and path-relative links
/// are skipped.
fn extract_links(doc: &Html, page_url: &str) -> Vec<ExtractedLink> {
    static LINK_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&LINK_SEL) {
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };

        let absolute = if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            match base.as_ref().and_then(|b| b.join(href).ok()) {
                Some(resolved) => resolved.to_string(),
                None => continue,
            }
        } else {
            continue;
        };

        if !seen.insert(absolute.clone()) {
            continue;
        }

        let text: String = collapse_whitespace(&el.text().collect::<String>())
            .chars()
            .take(MAX_LINK_TEXT_CHARS)
            .collect();

        links.push(ExtractedLink {
            url: absolute,
            text,
        });
    }

    links
}
