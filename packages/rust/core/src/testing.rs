//! In-crate fakes for the external collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use vcdossier_crawler::{PageFetcher, ScrapedPage};
use vcdossier_linkedin::{LinkedInProvider, ScrapeOutcome};
use vcdossier_llm::LanguageModel;
use vcdossier_search::{SearchResult, WebSearch};
use vcdossier_shared::{DossierError, LinkedInCompany, LinkedInProfile, Result};

pub const DEFAULT_TEXT: &str = "Grounded answer.";

// ---------------------------------------------------------------------------
// FakeModel
// ---------------------------------------------------------------------------

/// Answers prompts by substring rules; records every prompt it sees.
#[derive(Default)]
pub struct FakeModel {
    json_rules: Vec<(String, Value)>,
    text_rules: Vec<(String, String)>,
    failing: Vec<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer JSON prompts containing `needle` with `value`.
    pub fn with_json(mut self, needle: &str, value: Value) -> Self {
        self.json_rules.push((needle.to_string(), value));
        self
    }

    /// Answer text prompts containing `needle` with `text`.
    pub fn with_text(mut self, needle: &str, text: &str) -> Self {
        self.text_rules.push((needle.to_string(), text.to_string()));
        self
    }

    /// Fail text prompts containing `needle`.
    pub fn failing_text(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn record(&self, prompt: &str) {
        self.prompts.lock().unwrap().push(prompt.to_string());
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.record(prompt);
        if self.failing.iter().any(|n| prompt.contains(n.as_str())) {
            return Err(DossierError::Llm("fake failure".into()));
        }
        Ok(self
            .text_rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, text)| text.clone())
            .unwrap_or_else(|| DEFAULT_TEXT.to_string()))
    }

    async fn generate_json(&self, prompt: &str, _schema: &Value) -> Result<Value> {
        self.record(prompt);
        self.json_rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, value)| value.clone())
            .ok_or_else(|| DossierError::Llm("no canned JSON answer".into()))
    }
}

// ---------------------------------------------------------------------------
// FakeSearch
// ---------------------------------------------------------------------------

/// Returns canned results per exact query; unknown queries return nothing.
#[derive(Default)]
pub struct FakeSearch {
    results: HashMap<String, Vec<SearchResult>>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, results: Vec<SearchResult>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &str, _num: u32) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// FakeFetcher
// ---------------------------------------------------------------------------

/// Serves HTML from a map; unknown URLs fail to fetch.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, (u16, String)>,
    fetched: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_status(url, 200, html)
    }

    pub fn with_status(mut self, url: &str, status: u16, html: &str) -> Self {
        self.pages.insert(url.to_string(), (status, html.to_string()));
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> ScrapedPage {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some((status, html)) => ScrapedPage {
                url: url.to_string(),
                status_code: *status,
                html: Some(html.clone()),
                error: None,
                fetched_at: Utc::now(),
            },
            None => ScrapedPage::failed(url, "connection refused"),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeLinkedIn
// ---------------------------------------------------------------------------

/// Returns the known records for the requested URLs.
#[derive(Default)]
pub struct FakeLinkedIn {
    profiles: HashMap<String, LinkedInProfile>,
    companies: HashMap<String, LinkedInCompany>,
    profile_calls: Mutex<Vec<Vec<String>>>,
    company_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeLinkedIn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, url: &str, name: &str, headline: &str) -> Self {
        self.profiles.insert(
            url.to_string(),
            LinkedInProfile {
                url: Some(url.to_string()),
                name: Some(name.to_string()),
                headline: Some(headline.to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_company(mut self, url: &str, name: &str) -> Self {
        self.companies.insert(
            url.to_string(),
            LinkedInCompany {
                url: Some(url.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn profile_calls(&self) -> Vec<Vec<String>> {
        self.profile_calls.lock().unwrap().clone()
    }

    pub fn company_calls(&self) -> Vec<Vec<String>> {
        self.company_calls.lock().unwrap().clone()
    }
}

fn outcome<T: Clone>(known: &HashMap<String, T>, urls: &[String]) -> ScrapeOutcome<T> {
    let records: Vec<T> = urls.iter().filter_map(|u| known.get(u).cloned()).collect();
    if records.is_empty() {
        ScrapeOutcome::failed("No data returned")
    } else {
        ScrapeOutcome::ok(records)
    }
}

#[async_trait]
impl LinkedInProvider for FakeLinkedIn {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn scrape_profiles(&self, urls: &[String]) -> ScrapeOutcome<LinkedInProfile> {
        self.profile_calls.lock().unwrap().push(urls.to_vec());
        outcome(&self.profiles, urls)
    }

    async fn scrape_companies(&self, urls: &[String]) -> ScrapeOutcome<LinkedInCompany> {
        self.company_calls.lock().unwrap().push(urls.to_vec());
        outcome(&self.companies, urls)
    }
}
