//! Firm-scoped filesystem store.
//!
//! Every firm gets a directory under `<data_dir>/firms/<slug>/` holding the
//! raw and cleaned pages plus one JSON file per pipeline phase:
//!
//! ```text
//! firms/<slug>/
//!   raw_pages/page_001.html      cleaned_pages/page_001.html
//!   plain_text/page_001.txt      markdown/page_001.md
//!   extracted_links/page_001.json
//!   page_analyses/page_001.json
//!   pages.json  discovery.json  news.json  linkedin_queue.json
//!   linkedin_prioritized.json  linkedin_scraped_profiles.json
//!   linkedin_scraped_companies.json  linkedin_gp_profiles.json
//!   final_report.json
//! batches/<run_id>.json
//! ```
//!
//! Loaders return `Ok(None)` when the file does not exist, which is how
//! `resume` decides what still needs to run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use vcdossier_shared::{
    DiscoveryResult, DossierError, ExtractedLink, FirmReport, LinkedInCompany, LinkedInLink,
    LinkedInProfile, NewsInsights, PageAnalysis, PageRecord, PrioritizedLink, Result,
};

const FIRMS_DIR: &str = "firms";
const BATCHES_DIR: &str = "batches";

const PAGES_INDEX: &str = "pages.json";
const DISCOVERY_FILE: &str = "discovery.json";
const NEWS_FILE: &str = "news.json";
const LINKEDIN_QUEUE_FILE: &str = "linkedin_queue.json";
const PRIORITIZED_FILE: &str = "linkedin_prioritized.json";
const PROFILES_FILE: &str = "linkedin_scraped_profiles.json";
const COMPANIES_FILE: &str = "linkedin_scraped_companies.json";
const GP_PROFILES_FILE: &str = "linkedin_gp_profiles.json";
const REPORT_FILE: &str = "final_report.json";

const ANALYSES_DIR: &str = "page_analyses";

/// Filesystem-safe identifier for a firm name.
///
/// Lowercase, every run of characters outside `[a-z0-9]` becomes `-`,
/// leading and trailing `-` removed. Names with no ASCII letters or digits
/// get `firm-<first 8 hex chars of the name's sha-256>`.
pub fn firm_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        let hash = compute_hash(name.trim());
        return format!("firm-{}", &hash[..8]);
    }
    slug
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DossierError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DossierError::Storage(format!("serialize {}: {e}", path.display())))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| DossierError::io(path, e))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DossierError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| DossierError::Storage(format!("corrupt {}: {e}", path.display())))
}

async fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DossierError::io(parent, e))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| DossierError::io(path, e))
}

// ---------------------------------------------------------------------------
// FirmStore
// ---------------------------------------------------------------------------

/// Root of the data directory.
#[derive(Debug, Clone)]
pub struct FirmStore {
    data_dir: PathBuf,
}

impl FirmStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Handle for the firm called `name` (directory not created yet).
    pub fn firm(&self, name: &str) -> FirmDir {
        self.firm_by_slug(&firm_slug(name))
    }

    pub fn firm_by_slug(&self, slug: &str) -> FirmDir {
        FirmDir {
            slug: slug.to_string(),
            dir: self.data_dir.join(FIRMS_DIR).join(slug),
        }
    }

    /// Slugs of every firm directory, sorted.
    pub async fn list_firms(&self) -> Result<Vec<String>> {
        let root = self.data_dir.join(FIRMS_DIR);
        let mut entries = match tokio::fs::read_dir(&root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DossierError::io(&root, e)),
        };

        let mut slugs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DossierError::io(&root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                slugs.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        slugs.sort();
        Ok(slugs)
    }

    /// Write a batch summary to `batches/<run_id>.json`.
    pub async fn save_batch_summary<T: Serialize>(&self, run_id: &str, summary: &T) -> Result<PathBuf> {
        let path = self
            .data_dir
            .join(BATCHES_DIR)
            .join(format!("{run_id}.json"));
        write_json(&path, summary).await?;
        info!(path = %path.display(), "batch summary saved");
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// FirmDir
// ---------------------------------------------------------------------------

/// Everything the pipeline writes for one scraped page.
#[derive(Debug, Clone, Copy)]
pub struct PageArtifacts<'a> {
    pub page_id: &'a str,
    pub url: &'a str,
    pub title: &'a str,
    pub status_code: u16,
    pub fetched_at: DateTime<Utc>,
    pub raw_html: &'a str,
    pub cleaned_html: &'a str,
    pub plain_text: &'a str,
    pub markdown: &'a str,
    pub links: &'a [ExtractedLink],
}

/// One firm's directory.
#[derive(Debug, Clone)]
pub struct FirmDir {
    slug: String,
    dir: PathBuf,
}

impl FirmDir {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    pub async fn create(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DossierError::io(&self.dir, e))
    }

    // -----------------------------------------------------------------------
    // Pages
    // -----------------------------------------------------------------------

    /// Write a page's artefacts and record it in `pages.json`.
    pub async fn save_page(&self, page: &PageArtifacts<'_>) -> Result<PageRecord> {
        let id = page.page_id;

        write_text(&self.dir.join("raw_pages").join(format!("{id}.html")), page.raw_html).await?;
        write_text(
            &self.dir.join("cleaned_pages").join(format!("{id}.html")),
            page.cleaned_html,
        )
        .await?;
        write_text(&self.dir.join("plain_text").join(format!("{id}.txt")), page.plain_text).await?;
        write_text(&self.dir.join("markdown").join(format!("{id}.md")), page.markdown).await?;
        if !page.links.is_empty() {
            write_json(
                &self.dir.join("extracted_links").join(format!("{id}.json")),
                page.links,
            )
            .await?;
        }

        let record = PageRecord {
            page_id: id.to_string(),
            url: page.url.to_string(),
            title: page.title.to_string(),
            status_code: page.status_code,
            content_hash: compute_hash(page.raw_html),
            fetched_at: page.fetched_at,
        };

        let mut index = self.load_pages().await?.unwrap_or_default();
        index.retain(|r| r.page_id != record.page_id);
        index.push(record.clone());
        index.sort_by(|a, b| a.page_id.cmp(&b.page_id));
        write_json(&self.dir.join(PAGES_INDEX), &index).await?;

        debug!(firm = %self.slug, page_id = id, links = page.links.len(), "page saved");
        Ok(record)
    }

    pub async fn load_pages(&self) -> Result<Option<Vec<PageRecord>>> {
        read_json(&self.dir.join(PAGES_INDEX)).await
    }

    pub async fn load_extracted_links(&self, page_id: &str) -> Result<Option<Vec<ExtractedLink>>> {
        read_json(&self.dir.join("extracted_links").join(format!("{page_id}.json"))).await
    }

    // -----------------------------------------------------------------------
    // Phase artefacts
    // -----------------------------------------------------------------------

    pub async fn save_discovery(&self, discovery: &DiscoveryResult) -> Result<()> {
        write_json(&self.dir.join(DISCOVERY_FILE), discovery).await
    }

    pub async fn load_discovery(&self) -> Result<Option<DiscoveryResult>> {
        read_json(&self.dir.join(DISCOVERY_FILE)).await
    }

    pub async fn save_news(&self, news: &NewsInsights) -> Result<()> {
        write_json(&self.dir.join(NEWS_FILE), news).await
    }

    pub async fn load_news(&self) -> Result<Option<NewsInsights>> {
        read_json(&self.dir.join(NEWS_FILE)).await
    }

    pub async fn save_linkedin_queue(&self, links: &[LinkedInLink]) -> Result<()> {
        write_json(&self.dir.join(LINKEDIN_QUEUE_FILE), links).await?;
        info!(firm = %self.slug, links = links.len(), "LinkedIn queue saved");
        Ok(())
    }

    pub async fn load_linkedin_queue(&self) -> Result<Option<Vec<LinkedInLink>>> {
        read_json(&self.dir.join(LINKEDIN_QUEUE_FILE)).await
    }

    pub async fn save_page_analysis(&self, analysis: &PageAnalysis) -> Result<()> {
        let path = self
            .dir
            .join(ANALYSES_DIR)
            .join(format!("{}.json", analysis.page_id));
        write_json(&path, analysis).await
    }

    /// All page analyses, ordered by page id. `None` when none were ever saved.
    pub async fn load_page_analyses(&self) -> Result<Option<Vec<PageAnalysis>>> {
        let dir = self.dir.join(ANALYSES_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DossierError::io(&dir, e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DossierError::io(&dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut analyses = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(analysis) = read_json::<PageAnalysis>(&path).await? {
                analyses.push(analysis);
            }
        }
        Ok(Some(analyses))
    }

    pub async fn save_prioritized(&self, links: &[PrioritizedLink]) -> Result<()> {
        write_json(&self.dir.join(PRIORITIZED_FILE), links).await
    }

    pub async fn load_prioritized(&self) -> Result<Option<Vec<PrioritizedLink>>> {
        read_json(&self.dir.join(PRIORITIZED_FILE)).await
    }

    pub async fn save_profiles(&self, profiles: &[LinkedInProfile]) -> Result<()> {
        write_json(&self.dir.join(PROFILES_FILE), profiles).await
    }

    pub async fn load_profiles(&self) -> Result<Option<Vec<LinkedInProfile>>> {
        read_json(&self.dir.join(PROFILES_FILE)).await
    }

    pub async fn save_companies(&self, companies: &[LinkedInCompany]) -> Result<()> {
        write_json(&self.dir.join(COMPANIES_FILE), companies).await
    }

    pub async fn load_companies(&self) -> Result<Option<Vec<LinkedInCompany>>> {
        read_json(&self.dir.join(COMPANIES_FILE)).await
    }

    pub async fn save_gp_profiles(&self, profiles: &[LinkedInProfile]) -> Result<()> {
        write_json(&self.dir.join(GP_PROFILES_FILE), profiles).await
    }

    pub async fn load_gp_profiles(&self) -> Result<Option<Vec<LinkedInProfile>>> {
        read_json(&self.dir.join(GP_PROFILES_FILE)).await
    }

    pub async fn save_report(&self, report: &FirmReport) -> Result<PathBuf> {
        let path = self.dir.join(REPORT_FILE);
        write_json(&path, report).await?;
        info!(firm = %self.slug, path = %path.display(), "final report saved");
        Ok(path)
    }

    pub async fn load_report(&self) -> Result<Option<FirmReport>> {
        read_json(&self.dir.join(REPORT_FILE)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcdossier_shared::{FactCategory, LinkCategory, PageFact, PageType};

    fn temp_store() -> (FirmStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("vcd-store-test-{}", uuid::Uuid::now_v7()));
        (FirmStore::new(&dir), dir)
    }

    fn artifacts<'a>(page_id: &'a str, links: &'a [ExtractedLink]) -> PageArtifacts<'a> {
        PageArtifacts {
            page_id,
            url: "https://acme.vc/team",
            title: "Team",
            status_code: 200,
            fetched_at: Utc::now(),
            raw_html: "hello world",
            cleaned_html: "<p>hello world</p>",
            plain_text: "hello world",
            markdown: "hello world\n",
            links,
        }
    }

    #[test]
    fn slug_rules() {
        assert_eq!(firm_slug("Acme Ventures Fund I"), "acme-ventures-fund-i");
        assert_eq!(firm_slug("  100X.VC (Trust) "), "100x-vc-trust");
        assert_eq!(firm_slug("A&B -- Capital"), "a-b-capital");
    }

    #[test]
    fn non_ascii_names_get_distinct_hashed_slugs() {
        let a = firm_slug("日本ファンド");
        let b = firm_slug("ファンド二号");
        assert!(a.starts_with("firm-"));
        assert_eq!(a.len(), "firm-".len() + 8);
        assert_ne!(a, b);
        assert_eq!(a, firm_slug(" 日本ファンド "));
        assert!(firm_slug("!!!").starts_with("firm-"));
    }

    #[tokio::test]
    async fn hashed_slug_firms_are_listed_separately() {
        let (store, dir) = temp_store();
        let a = store.firm("日本ファンド");
        let b = store.firm("ファンド二号");
        assert_ne!(a.path(), store.data_dir().join("firms"));
        a.create().await.unwrap();
        assert!(!b.exists().await);
        b.create().await.unwrap();

        let mut firms = store.list_firms().await.unwrap();
        firms.sort();
        let mut expected = vec![a.slug().to_string(), b.slug().to_string()];
        expected.sort();
        assert_eq!(firms, expected);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            compute_hash("hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn save_page_writes_artifacts_and_index() {
        let (store, dir) = temp_store();
        let firm = store.firm("Acme Ventures");
        let links = vec![ExtractedLink {
            url: "https://www.linkedin.com/in/asha".into(),
            text: "Asha".into(),
        }];

        let record = firm.save_page(&artifacts("page_002", &links)).await.unwrap();
        firm.save_page(&artifacts("page_001", &[])).await.unwrap();

        assert_eq!(record.content_hash.len(), 64);
        let base = dir.join("firms/acme-ventures");
        assert!(base.join("raw_pages/page_002.html").exists());
        assert!(base.join("cleaned_pages/page_002.html").exists());
        assert!(base.join("plain_text/page_002.txt").exists());
        assert!(base.join("markdown/page_002.md").exists());
        assert!(base.join("extracted_links/page_002.json").exists());
        assert!(!base.join("extracted_links/page_001.json").exists());

        let index = firm.load_pages().await.unwrap().unwrap();
        let ids: Vec<&str> = index.iter().map(|r| r.page_id.as_str()).collect();
        assert_eq!(ids, vec!["page_001", "page_002"]);

        let stored_links = firm.load_extracted_links("page_002").await.unwrap().unwrap();
        assert_eq!(stored_links, links);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_files_load_as_none() {
        let (store, dir) = temp_store();
        let firm = store.firm("Nobody Capital");
        assert!(!firm.exists().await);
        assert!(firm.load_discovery().await.unwrap().is_none());
        assert!(firm.load_page_analyses().await.unwrap().is_none());
        assert!(firm.load_report().await.unwrap().is_none());
        assert!(store.list_firms().await.unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn phase_files_round_trip() {
        let (store, dir) = temp_store();
        let firm = store.firm("Acme Ventures");
        firm.create().await.unwrap();

        let analysis = PageAnalysis {
            page_id: "page_001".into(),
            url: "https://acme.vc/team".into(),
            page_type: PageType::Team,
            is_relevant: true,
            page_summary: "Team page".into(),
            facts: vec![PageFact {
                category: FactCategory::TeamMember,
                fact: "Asha Rao is Managing Partner".into(),
                confidence: 90,
            }],
            error: None,
        };
        firm.save_page_analysis(&analysis).await.unwrap();

        let prioritized = vec![PrioritizedLink {
            url: "https://www.linkedin.com/in/asha".into(),
            importance: 97,
            category: LinkCategory::LinkedinGp,
            reasoning: "Managing Partner".into(),
        }];
        firm.save_prioritized(&prioritized).await.unwrap();

        let mut report = FirmReport::empty("Acme Ventures");
        report.fund_names = vec!["Acme Fund I".into()];
        firm.save_report(&report).await.unwrap();

        assert_eq!(firm.load_page_analyses().await.unwrap().unwrap(), vec![analysis]);
        assert_eq!(firm.load_prioritized().await.unwrap().unwrap(), prioritized);
        assert_eq!(firm.load_report().await.unwrap().unwrap(), report);
        assert_eq!(store.list_firms().await.unwrap(), vec!["acme-ventures"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn batch_summary_location() {
        let (store, dir) = temp_store();
        let path = store
            .save_batch_summary("run-1", &serde_json::json!({ "succeeded": 2 }))
            .await
            .unwrap();
        assert_eq!(path, dir.join("batches/run-1.json"));
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
