//! End-to-end firm pipeline: discovery → news → scrape → analyse →
//! prioritise → LinkedIn → GP enrichment → synthesis.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use vcdossier_cleaner::clean;
use vcdossier_crawler::PageFetcher;
use vcdossier_linkedin::{LinkedInProvider, split_linkedin_urls};
use vcdossier_llm::LanguageModel;
use vcdossier_search::WebSearch;
use vcdossier_shared::{
    AppConfig, DiscoveredUrl, DossierError, FirmRecord, KnowledgeBase, LinkedInCompany,
    LinkedInLink, LinkedInProfile, PageAnalysis, PrioritizedLink, Result,
};
use vcdossier_storage::{FirmDir, FirmStore, PageArtifacts};

use crate::agents::{
    FirmContext, analyze_page, discover_gps, discover_urls, enhance_gp_backgrounds, enrich_gps,
    exclude_known_profiles, gather_news, prioritize_links, synthesize_report, validate_gp_names,
};
use crate::urls::{classify_page_type, classify_urls, is_linkedin_url};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Runtime knobs for the pipeline, derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_pages: usize,
    pub page_delay: Duration,
    pub linkedin_min_importance: u8,
    pub prioritize_batch_size: usize,
    pub batch_delay: Duration,
    pub firm_delay: Duration,
    pub gp_search_delay: Duration,
    pub enhance_gp_backgrounds: bool,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        let p = &config.pipeline;
        Self {
            max_pages: config.scrape.max_pages,
            page_delay: Duration::from_millis(config.scrape.page_delay_ms),
            linkedin_min_importance: p.linkedin_min_importance,
            prioritize_batch_size: p.prioritize_batch_size,
            batch_delay: Duration::from_millis(p.batch_delay_ms),
            firm_delay: Duration::from_millis(p.firm_delay_ms),
            gp_search_delay: Duration::from_millis(p.gp_search_delay_ms),
            enhance_gp_backgrounds: p.enhance_gp_backgrounds,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress & outcomes
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a firm is processed (`index` is 1-based).
    fn firm_started(&self, name: &str, index: usize, total: usize);
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each page fetch.
    fn page_fetched(&self, url: &str, current: usize, total: usize);
    /// Called when a firm finishes, successfully or not.
    fn firm_done(&self, outcome: &FirmOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn firm_started(&self, _name: &str, _index: usize, _total: usize) {}
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _current: usize, _total: usize) {}
    fn firm_done(&self, _outcome: &FirmOutcome) {}
}

/// Counters collected while processing one firm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmStats {
    pub discovered_urls: usize,
    pub regular_urls: usize,
    pub pages_scraped: usize,
    pub pages_relevant: usize,
    pub linkedin_candidates: usize,
    pub linkedin_prioritized: usize,
    pub profiles: usize,
    pub companies: usize,
    pub gp_profiles: usize,
}

/// Result of processing one firm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmOutcome {
    pub firm_name: String,
    pub slug: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    pub stats: FirmStats,
    pub elapsed_secs: f64,
}

/// Result of a batch run, saved under `<data_dir>/batches/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<FirmOutcome>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The firm pipeline and its collaborators.
pub struct Pipeline {
    model: Arc<dyn LanguageModel>,
    fetcher: Arc<dyn PageFetcher>,
    search: Option<Arc<dyn WebSearch>>,
    linkedin: Option<Arc<dyn LinkedInProvider>>,
    store: FirmStore,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        fetcher: Arc<dyn PageFetcher>,
        store: FirmStore,
        config: PipelineConfig,
    ) -> Self {
        Self {
            model,
            fetcher,
            search: None,
            linkedin: None,
            store,
            config,
        }
    }

    /// Enable homepage lookup and GP search.
    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Enable LinkedIn scraping and GP enrichment.
    pub fn with_linkedin(mut self, provider: Arc<dyn LinkedInProvider>) -> Self {
        self.linkedin = Some(provider);
        self
    }

    pub fn store(&self) -> &FirmStore {
        &self.store
    }

    /// Process firms one after another, sleeping `firm_delay` between them.
    /// Per-firm failures are recorded in the summary.
    pub async fn process_batch(
        &self,
        records: &[FirmRecord],
        progress: &dyn ProgressReporter,
    ) -> Result<BatchSummary> {
        let run_id = Uuid::now_v7().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, firms = records.len(), "batch started");

        let mut outcomes = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if i > 0 && !self.config.firm_delay.is_zero() {
                tokio::time::sleep(self.config.firm_delay).await;
            }
            progress.firm_started(&record.name, i + 1, records.len());
            outcomes.push(self.process_firm(record, progress).await);
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let summary = BatchSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        };
        let path = self.store.save_batch_summary(&summary.run_id, &summary).await?;
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            path = %path.display(),
            "batch complete"
        );
        Ok(summary)
    }

    /// Run every phase for one firm. Errors abort the firm and are reported
    /// in the outcome.
    #[instrument(skip_all, fields(firm = %record.name))]
    pub async fn process_firm(&self, record: &FirmRecord, progress: &dyn ProgressReporter) -> FirmOutcome {
        let start = Instant::now();
        let dir = self.store.firm(&record.name);
        let mut stats = FirmStats::default();

        let result = self.run_firm(&dir, record, progress, &mut stats).await;
        let outcome = finish_outcome(record, &dir, result, stats, start);
        progress.firm_done(&outcome);
        outcome
    }

    /// Re-run the LinkedIn, GP and synthesis phases from saved data.
    ///
    /// Fails when the firm has never been processed.
    #[instrument(skip_all, fields(firm = %record.name))]
    pub async fn resume_firm(
        &self,
        record: &FirmRecord,
        progress: &dyn ProgressReporter,
    ) -> Result<FirmOutcome> {
        let start = Instant::now();
        let dir = self.store.firm(&record.name);
        if !dir.exists().await {
            return Err(DossierError::validation(format!(
                "no data directory for \"{}\" at {}; run the pipeline first",
                record.name,
                dir.path().display()
            )));
        }

        let mut stats = FirmStats::default();
        let result = self.run_resume(&dir, record, progress, &mut stats).await;
        let outcome = finish_outcome(record, &dir, result, stats, start);
        progress.firm_done(&outcome);
        Ok(outcome)
    }

    async fn run_firm(
        &self,
        dir: &FirmDir,
        record: &FirmRecord,
        progress: &dyn ProgressReporter,
        stats: &mut FirmStats,
    ) -> Result<PathBuf> {
        dir.create().await?;
        let model = self.model.as_ref();

        // --- Phase 1: Discovery & news ---
        progress.phase("Discovering URLs and news");
        let (discovery, news) = tokio::try_join!(
            discover_urls(model, self.search.as_deref(), record),
            gather_news(model, &record.name)
        )?;
        dir.save_discovery(&discovery).await?;
        dir.save_news(&news).await?;
        stats.discovered_urls = discovery.urls.len();

        // --- Phase 2: Classification ---
        progress.phase("Classifying URLs");
        let (regular, linkedin) = classify_urls(&discovery.urls);
        let queue: Vec<LinkedInLink> = linkedin
            .iter()
            .map(|u| LinkedInLink {
                url: u.url.clone(),
                text: u.context.clone(),
                source: "discovery".into(),
            })
            .collect();
        dir.save_linkedin_queue(&queue).await?;
        stats.regular_urls = regular.len();
        info!(regular = regular.len(), linkedin = queue.len(), "URLs classified");

        // --- Phase 3: Scrape & analyse ---
        progress.phase("Scraping pages");
        let scraped = self.scrape_pages(dir, &regular, progress, stats).await;
        if let Err(e) = self.fetcher.close().await {
            warn!(error = %e, "failed to close page fetcher");
        }
        let (analyses, page_links) = scraped?;

        // --- Phase 4: LinkedIn links from pages ---
        let mut candidates = queue;
        candidates.extend(page_links);
        stats.linkedin_candidates = candidates.len();

        // --- Phase 5: Prioritise ---
        progress.phase("Prioritising LinkedIn links");
        let ctx = FirmContext::from_sources(record, &analyses, Some(&news));
        let scored = prioritize_links(
            model,
            candidates,
            &ctx,
            self.config.prioritize_batch_size,
            self.config.batch_delay,
        )
        .await?;
        let high_value = self.keep_high_value(scored);
        dir.save_prioritized(&high_value).await?;
        stats.linkedin_prioritized = high_value.len();

        let mut kb = KnowledgeBase::new(record.clone());
        kb.discovery = discovery;
        kb.news = news;
        kb.page_analyses = analyses;

        self.finish(dir, kb, &high_value, false, progress, stats).await
    }

    async fn run_resume(
        &self,
        dir: &FirmDir,
        record: &FirmRecord,
        progress: &dyn ProgressReporter,
        stats: &mut FirmStats,
    ) -> Result<PathBuf> {
        progress.phase("Loading saved data");
        let analyses: Vec<PageAnalysis> = dir
            .load_page_analyses()
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|a| a.is_relevant)
            .collect();
        let prioritized = dir.load_prioritized().await?.unwrap_or_default();
        stats.pages_relevant = analyses.len();
        stats.linkedin_prioritized = prioritized.len();
        info!(analyses = analyses.len(), prioritized = prioritized.len(), "saved data loaded");

        let mut kb = KnowledgeBase::new(record.clone());
        kb.discovery = dir.load_discovery().await?.unwrap_or_default();
        kb.news = dir.load_news().await?.unwrap_or_default();
        kb.page_analyses = analyses;
        stats.discovered_urls = kb.discovery.urls.len();

        self.finish(dir, kb, &prioritized, true, progress, stats).await
    }

    fn keep_high_value(&self, scored: Vec<PrioritizedLink>) -> Vec<PrioritizedLink> {
        let min = self.config.linkedin_min_importance;
        let total = scored.len();
        let kept: Vec<PrioritizedLink> = scored.into_iter().filter(|l| l.importance >= min).collect();
        info!(scored = total, kept = kept.len(), min_importance = min, "high-value links selected");
        kept
    }

    /// Phase 3: fetch, clean, store and analyse each regular URL. Returns the
    /// relevant analyses and LinkedIn links found on the pages.
    async fn scrape_pages(
        &self,
        dir: &FirmDir,
        targets: &[DiscoveredUrl],
        progress: &dyn ProgressReporter,
        stats: &mut FirmStats,
    ) -> Result<(Vec<PageAnalysis>, Vec<LinkedInLink>)> {
        let targets = &targets[..targets.len().min(self.config.max_pages)];
        let total = targets.len();
        let mut analyses = Vec::new();
        let mut linkedin_links = Vec::new();

        for (i, target) in targets.iter().enumerate() {
            if i > 0 && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
            let page_id = format!("page_{:03}", i + 1);
            progress.page_fetched(&target.url, i + 1, total);

            let page = self.fetcher.fetch(&target.url).await;
            let Some(html) = page.ok_html() else {
                warn!(
                    url = %target.url,
                    status = page.status_code,
                    error = page.error.as_deref().unwrap_or(""),
                    "page skipped"
                );
                continue;
            };

            let cleaned = match clean(html, &target.url) {
                Ok(cleaned) => cleaned,
                Err(e) => {
                    warn!(url = %target.url, error = %e, "cleaning failed, skipping page");
                    continue;
                }
            };

            dir.save_page(&PageArtifacts {
                page_id: &page_id,
                url: &target.url,
                title: &cleaned.title,
                status_code: page.status_code,
                fetched_at: page.fetched_at,
                raw_html: html,
                cleaned_html: &cleaned.cleaned_html,
                plain_text: &cleaned.plain_text,
                markdown: &cleaned.markdown,
                links: &cleaned.links,
            })
            .await?;
            stats.pages_scraped += 1;

            linkedin_links.extend(
                cleaned
                    .links
                    .iter()
                    .filter(|l| is_linkedin_url(&l.url))
                    .map(|l| LinkedInLink {
                        url: l.url.clone(),
                        text: l.text.clone(),
                        source: page_id.clone(),
                    }),
            );

            let page_type = classify_page_type(&target.url, &cleaned.title);
            let analysis =
                analyze_page(self.model.as_ref(), &page_id, &target.url, page_type, &cleaned.plain_text)
                    .await;
            dir.save_page_analysis(&analysis).await?;
            if analysis.is_relevant {
                analyses.push(analysis);
            }
        }

        stats.pages_relevant = analyses.len();
        info!(
            attempted = total,
            scraped = stats.pages_scraped,
            relevant = analyses.len(),
            linkedin_links = linkedin_links.len(),
            "scraping complete"
        );
        Ok((analyses, linkedin_links))
    }

    /// Phases 6-8, shared by fresh runs and resumes. With `reuse`, LinkedIn
    /// and GP files already on disk are used instead of scraping again.
    async fn finish(
        &self,
        dir: &FirmDir,
        mut kb: KnowledgeBase,
        prioritized: &[PrioritizedLink],
        reuse: bool,
        progress: &dyn ProgressReporter,
        stats: &mut FirmStats,
    ) -> Result<PathBuf> {
        // --- Phase 6: LinkedIn profiles & companies ---
        progress.phase("Scraping LinkedIn");
        let (profiles, companies) = self.scrape_linkedin(dir, prioritized, reuse).await?;
        stats.profiles = profiles.len();
        stats.companies = companies.len();
        kb.linkedin_profiles = profiles;
        kb.linkedin_companies = companies;

        // --- Phase 7: GP discovery & enrichment ---
        progress.phase("Enriching GPs");
        kb.gp_profiles = self
            .enrich_gp_profiles(dir, &kb.target, &kb.page_analyses, &kb.linkedin_profiles, reuse)
            .await?;
        stats.gp_profiles = kb.gp_profiles.len();

        // --- Phase 8: Synthesis ---
        progress.phase("Synthesising report");
        let model = self.model.as_ref();
        let mut report = synthesize_report(model, &kb).await?;
        if self.config.enhance_gp_backgrounds && !kb.gp_profiles.is_empty() {
            progress.phase("Enhancing GP backgrounds");
            report = enhance_gp_backgrounds(model, report, &kb.gp_profiles).await?;
        }
        let path = dir.save_report(&report).await?;
        info!(path = %path.display(), "final report saved");
        Ok(path)
    }

    async fn scrape_linkedin(
        &self,
        dir: &FirmDir,
        prioritized: &[PrioritizedLink],
        reuse: bool,
    ) -> Result<(Vec<LinkedInProfile>, Vec<LinkedInCompany>)> {
        let (mut profiles, mut companies) = if reuse {
            (
                dir.load_profiles().await?.unwrap_or_default(),
                dir.load_companies().await?.unwrap_or_default(),
            )
        } else {
            (Vec::new(), Vec::new())
        };
        if !profiles.is_empty() || !companies.is_empty() {
            info!(profiles = profiles.len(), companies = companies.len(), "reusing saved LinkedIn data");
        }

        let Some(provider) = self.linkedin.as_deref() else {
            info!("no LinkedIn provider configured, skipping LinkedIn scraping");
            return Ok((profiles, companies));
        };

        let urls: Vec<String> = prioritized.iter().map(|l| l.url.clone()).collect();
        let (profile_urls, company_urls) = split_linkedin_urls(&urls);
        let need_profiles = profiles.is_empty() && !profile_urls.is_empty();
        let need_companies = companies.is_empty() && !company_urls.is_empty();

        let (profile_outcome, company_outcome) = tokio::join!(
            async {
                if need_profiles {
                    Some(provider.scrape_profiles(&profile_urls).await)
                } else {
                    None
                }
            },
            async {
                if need_companies {
                    Some(provider.scrape_companies(&company_urls).await)
                } else {
                    None
                }
            }
        );

        if let Some(outcome) = profile_outcome {
            if outcome.success && !outcome.records.is_empty() {
                profiles = outcome.records;
                dir.save_profiles(&profiles).await?;
                info!(profiles = profiles.len(), provider = provider.name(), "LinkedIn profiles scraped");
            } else {
                warn!(message = ?outcome.message, provider = provider.name(), "LinkedIn profile scrape failed");
            }
        }
        if let Some(outcome) = company_outcome {
            if outcome.success && !outcome.records.is_empty() {
                companies = outcome.records;
                dir.save_companies(&companies).await?;
                info!(companies = companies.len(), provider = provider.name(), "LinkedIn companies scraped");
            } else {
                warn!(message = ?outcome.message, provider = provider.name(), "LinkedIn company scrape failed");
            }
        }

        Ok((profiles, companies))
    }

    async fn enrich_gp_profiles(
        &self,
        dir: &FirmDir,
        record: &FirmRecord,
        analyses: &[PageAnalysis],
        profiles: &[LinkedInProfile],
        reuse: bool,
    ) -> Result<Vec<LinkedInProfile>> {
        if reuse {
            let saved = dir.load_gp_profiles().await?.unwrap_or_default();
            if !saved.is_empty() {
                info!(gp_profiles = saved.len(), "reusing saved GP profiles");
                return Ok(saved);
            }
        }

        let discovered = discover_gps(record, analyses, profiles);
        let names = validate_gp_names(discovered);
        let (Some(search), Some(provider)) = (self.search.as_deref(), self.linkedin.as_deref()) else {
            info!(gps = names.len(), "GP enrichment needs search and LinkedIn, skipping");
            return Ok(Vec::new());
        };

        let targets = exclude_known_profiles(names, profiles);
        if targets.is_empty() {
            info!("all discovered GPs already have profiles");
            return Ok(Vec::new());
        }

        let gp_profiles = enrich_gps(
            self.model.as_ref(),
            search,
            provider,
            &targets,
            &record.name,
            self.config.gp_search_delay,
        )
        .await?;
        if !gp_profiles.is_empty() {
            dir.save_gp_profiles(&gp_profiles).await?;
        }
        Ok(gp_profiles)
    }
}

fn finish_outcome(
    record: &FirmRecord,
    dir: &FirmDir,
    result: Result<PathBuf>,
    stats: FirmStats,
    start: Instant,
) -> FirmOutcome {
    let elapsed_secs = start.elapsed().as_secs_f64();
    match result {
        Ok(path) => {
            info!(elapsed_secs, "firm complete");
            FirmOutcome {
                firm_name: record.name.clone(),
                slug: dir.slug().to_string(),
                success: true,
                error: None,
                report_path: Some(path),
                stats,
                elapsed_secs,
            }
        }
        Err(e) => {
            warn!(error = %e, elapsed_secs, "firm failed");
            FirmOutcome {
                firm_name: record.name.clone(),
                slug: dir.slug().to_string(),
                success: false,
                error: Some(e.to_string()),
                report_path: None,
                stats,
                elapsed_secs,
            }
        }
    }
}
