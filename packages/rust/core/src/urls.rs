//! URL helpers: normalisation, de-duplication, LinkedIn routing and page typing.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use vcdossier_shared::{DiscoveredUrl, LinkedInLink, PageType};

/// Substrings that mark a LinkedIn profile, company or school page.
const LINKEDIN_PATTERNS: [&str; 4] = [
    "linkedin.com/in/",
    "linkedin.com/company/",
    "linkedin.com/pub/",
    "linkedin.com/school/",
];

/// Comparison key for a URL.
///
/// Lowercased, scheme and `www.` removed, query and fragment dropped,
/// trailing slashes trimmed. `normalize_url(normalize_url(u)) == normalize_url(u)`.
pub fn normalize_url(url: &str) -> String {
    let lower = url.trim().to_lowercase();
    let mut rest = lower.as_str();

    loop {
        let trimmed = rest.trim_start();
        let stripped = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .or_else(|| trimmed.strip_prefix("www."));
        match stripped {
            Some(next) => rest = next,
            None => {
                rest = trimmed;
                break;
            }
        }
    }

    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    rest[..end]
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

/// Collapse links that normalise to the same URL. The first position is
/// kept; among duplicates the one with the longer text wins.
pub fn dedupe_links(links: Vec<LinkedInLink>) -> Vec<LinkedInLink> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<LinkedInLink> = Vec::with_capacity(links.len());

    for link in links {
        let key = normalize_url(&link.url);
        match index.get(&key) {
            Some(&pos) => {
                if link.text.chars().count() > unique[pos].text.chars().count() {
                    unique[pos] = link;
                }
            }
            None => {
                index.insert(key, unique.len());
                unique.push(link);
            }
        }
    }

    unique
}

/// Split `items` into consecutive slices of at most `size` (a size of 0 is treated as 1).
pub fn batches<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

pub fn is_linkedin_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    LINKEDIN_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Partition discovered URLs into (regular, linkedin).
pub fn classify_urls(urls: &[DiscoveredUrl]) -> (Vec<DiscoveredUrl>, Vec<DiscoveredUrl>) {
    let (linkedin, regular): (Vec<_>, Vec<_>) =
        urls.iter().cloned().partition(|u| is_linkedin_url(&u.url));
    (regular, linkedin)
}

/// Guess a page's type from its URL and title.
pub fn classify_page_type(url: &str, title: &str) -> PageType {
    static TEAM_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)team|people|partners|leadership|founders").expect("valid regex")
    });
    static PORTFOLIO_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)portfolio|companies|investments").expect("valid regex")
    });

    let haystack = format!("{url} {title}");
    if TEAM_RE.is_match(&haystack) {
        PageType::Team
    } else if PORTFOLIO_RE.is_match(&haystack) {
        PageType::Portfolio
    } else {
        PageType::General
    }
}

/// Keep the highest-importance entry per normalised URL, most important first.
pub fn dedupe_discovered(urls: Vec<DiscoveredUrl>) -> Vec<DiscoveredUrl> {
    let mut best: HashMap<String, DiscoveredUrl> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for url in urls {
        if url.url.trim().is_empty() {
            continue;
        }
        let key = normalize_url(&url.url);
        match best.get_mut(&key) {
            Some(existing) => {
                if url.importance > existing.importance {
                    *existing = url;
                }
            }
            None => {
                order.push(key.clone());
                best.insert(key, url);
            }
        }
    }

    let mut unique: Vec<DiscoveredUrl> = order
        .into_iter()
        .filter_map(|key| best.remove(&key))
        .collect();
    // Stable sort keeps discovery order among equal scores.
    unique.sort_by(|a, b| b.importance.cmp(&a.importance));
    unique
}
