//! Locate a firm's official website from its registry record.

use tracing::{debug, info, instrument, warn};
use url::Url;

use vcdossier_shared::FirmRecord;

use crate::{SearchResult, WebSearch};

/// Results inspected per homepage query.
const RESULTS_PER_QUERY: u32 = 5;

/// Queries tried in order until one yields an acceptable hit.
pub fn homepage_queries(record: &FirmRecord) -> Vec<String> {
    let name = record.name.trim();
    let mut queries = vec![
        format!("\"{name}\" official site"),
        format!("\"{name}\" fund website"),
        format!("\"{name}\" portfolio"),
        format!("\"{name}\" venture capital"),
        format!("\"{name}\" AIF"),
        format!("\"{name}\" private equity"),
    ];

    if let Some(reg) = record
        .registration_no
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
    {
        queries.push(format!("{name} {reg}"));
    }
    if let Some(domain) = record.email_domain() {
        queries.push(domain.to_string());
    }

    queries
}

/// Regulator pages are never a firm's homepage.
fn is_acceptable(result: &SearchResult) -> bool {
    let Ok(url) = Url::parse(&result.link) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let link = result.link.to_lowercase();
    if link.contains("sebi.gov.in") || link.contains(".gov.in") {
        return false;
    }
    !result.title.to_lowercase().contains("sebi")
}

/// Search for the firm's homepage, falling back to `https://<email domain>`.
///
/// A failing query is logged and the next one is tried.
#[instrument(skip_all, fields(firm = %record.name))]
pub async fn find_homepage(search: &dyn WebSearch, record: &FirmRecord) -> Option<SearchResult> {
    for query in homepage_queries(record) {
        let results = match search.search(&query, RESULTS_PER_QUERY).await {
            Ok(results) => results,
            Err(e) => {
                warn!(query = %query, error = %e, "homepage search failed");
                continue;
            }
        };

        if results.is_empty() {
            debug!(query = %query, "no results");
            continue;
        }

        if let Some(found) = results.into_iter().find(is_acceptable) {
            info!(query = %query, link = %found.link, title = %found.title, "homepage found");
            return Some(found);
        }
        debug!(query = %query, "only regulator links returned");
    }

    let domain = record.email_domain()?;
    info!(domain, "homepage falls back to e-mail domain");
    Some(SearchResult {
        title: domain.to_string(),
        link: format!("https://{domain}"),
        snippet: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use vcdossier_shared::{DossierError, Result};

    use super::*;

    /// Canned results keyed by query; records every query seen.
    #[derive(Default)]
    struct CannedSearch {
        answers: HashMap<String, Vec<SearchResult>>,
        failing: Vec<String>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebSearch for CannedSearch {
        async fn search(&self, query: &str, _num: u32) -> Result<Vec<SearchResult>> {
            self.seen.lock().unwrap().push(query.to_string());
            if self.failing.iter().any(|q| q == query) {
                return Err(DossierError::api("google-search", 500, "boom"));
            }
            Ok(self.answers.get(query).cloned().unwrap_or_default())
        }
    }

    fn hit(title: &str, link: &str) -> SearchResult {
        SearchResult {
            title: title.into(),
            link: link.into(),
            snippet: String::new(),
        }
    }

    fn record() -> FirmRecord {
        let mut record = FirmRecord::named("Acme Ventures");
        record.registration_no = Some("IN/AIF2/21-22/0999".into());
        record.email = Some("ops@acme.vc".into());
        record
    }

    #[test]
    fn builds_queries_in_order() {
        let queries = homepage_queries(&record());
        assert_eq!(queries[0], "\"Acme Ventures\" official site");
        assert_eq!(queries[5], "\"Acme Ventures\" private equity");
        assert_eq!(queries[6], "Acme Ventures IN/AIF2/21-22/0999");
        assert_eq!(queries[7], "acme.vc");

        let bare = homepage_queries(&FirmRecord::named("Solo"));
        assert_eq!(bare.len(), 6);
    }

    #[test]
    fn rejects_regulator_results() {
        assert!(!is_acceptable(&hit("Acme", "https://www.sebi.gov.in/x")));
        assert!(!is_acceptable(&hit("Acme", "https://mca.gov.in/acme")));
        assert!(!is_acceptable(&hit("SEBI | Acme", "https://acme.vc")));
        assert!(!is_acceptable(&hit("Acme", "ftp://acme.vc")));
        assert!(is_acceptable(&hit("Acme Ventures", "https://acme.vc")));
    }

    #[tokio::test]
    async fn skips_failures_and_regulator_hits() {
        let mut search = CannedSearch::default();
        search.failing.push("\"Acme Ventures\" official site".into());
        search.answers.insert(
            "\"Acme Ventures\" fund website".into(),
            vec![hit("SEBI registered AIFs", "https://www.sebi.gov.in/list")],
        );
        search.answers.insert(
            "\"Acme Ventures\" portfolio".into(),
            vec![
                hit("Intermediaries", "https://www.sebi.gov.in/other"),
                hit("Acme Ventures | Home", "https://acme.vc/"),
            ],
        );

        let found = find_homepage(&search, &record()).await.unwrap();
        assert_eq!(found.link, "https://acme.vc/");
        assert_eq!(search.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn falls_back_to_email_domain() {
        let search = CannedSearch::default();
        let found = find_homepage(&search, &record()).await.unwrap();
        assert_eq!(found.link, "https://acme.vc");
        assert_eq!(found.title, "acme.vc");
    }

    #[tokio::test]
    async fn nothing_without_email() {
        let search = CannedSearch::default();
        assert!(find_homepage(&search, &FirmRecord::named("Solo")).await.is_none());
    }
}
