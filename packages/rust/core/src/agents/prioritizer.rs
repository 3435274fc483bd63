//! LinkedIn link prioritisation.
//!
//! Candidate links are deduplicated, split into batches and scored by the
//! model against a block of known facts about the firm.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use vcdossier_llm::{LanguageModel, generate_structured};
use vcdossier_shared::{
    FactCategory, FirmRecord, LinkCategory, LinkedInLink, NewsInsights, PageAnalysis,
    PrioritizedLink, Result, lenient_score,
};

use crate::urls::{batches, dedupe_links};

/// Entries kept per "known" list in the context block.
const KNOWN_LIST_CAP: usize = 20;

// ---------------------------------------------------------------------------
// FirmContext
// ---------------------------------------------------------------------------

/// What is already known about a firm, used to ground link scoring.
#[derive(Debug, Clone)]
pub struct FirmContext {
    pub record: FirmRecord,
    pub known_team: Vec<String>,
    pub known_portfolio: Vec<String>,
    pub known_funds: Vec<String>,
}

impl FirmContext {
    /// Build the context from the registry record, page facts and news.
    pub fn from_sources(
        record: &FirmRecord,
        analyses: &[PageAnalysis],
        news: Option<&NewsInsights>,
    ) -> Self {
        let facts_of = |category: FactCategory| -> Vec<String> {
            let mut out: Vec<String> = Vec::new();
            for fact in analyses
                .iter()
                .flat_map(|a| a.facts.iter())
                .filter(|f| f.category == category)
            {
                let text = fact.fact.trim();
                if !text.is_empty() && !out.iter().any(|o| o == text) {
                    out.push(text.to_string());
                }
            }
            out
        };

        let known_team = facts_of(FactCategory::TeamMember);
        let mut known_portfolio = facts_of(FactCategory::PortfolioCompany);
        let mut known_funds = facts_of(FactCategory::FundInfo);

        if let Some(news) = news {
            for item in &news.portfolio_mentions {
                if !known_portfolio.contains(item) {
                    known_portfolio.push(item.clone());
                }
            }
            for item in &news.fund_details {
                if !known_funds.contains(item) {
                    known_funds.push(item.clone());
                }
            }
        }

        let cap = |mut v: Vec<String>| {
            v.truncate(KNOWN_LIST_CAP);
            v
        };
        Self {
            record: record.clone(),
            known_team: cap(known_team),
            known_portfolio: cap(known_portfolio),
            known_funds: cap(known_funds),
        }
    }

    /// Render the context block embedded in the scoring prompt.
    pub fn render(&self) -> String {
        let r = &self.record;
        let mut lines = vec![format!("Firm Name: {}", r.name)];

        if let Some(reg) = r.registration_no.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(format!("SEBI Registration No.: {reg}"));
        }
        if let Some(contact) = r.contact_person.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(format!("Contact Person: {contact}"));
            lines.push(format!(
                "CRITICAL: Prioritize LinkedIn profiles matching this exact name: \"{contact}\""
            ));
        }
        if let Some(email) = r.email.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(format!("Email: {email}"));
            if let Some(domain) = r.email_domain() {
                lines.push(format!("Email Domain: {domain} (profiles mentioning this domain are likely relevant)"));
            }
        }
        if let Some(address) = r.address.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(format!("Address: {address}"));
        }
        if let Some(validity) = r.validity.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(format!("Registration Validity: {validity}"));
        }

        let mut section = |title: &str, items: &[String]| {
            if !items.is_empty() {
                lines.push(String::new());
                lines.push(format!("{title}:"));
                lines.extend(items.iter().map(|i| format!("- {i}")));
            }
        };
        section("Known Team Members", &self.known_team);
        section("Known Portfolio Companies", &self.known_portfolio);
        section("Known Funds", &self.known_funds);

        lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Prompt & schema
// ---------------------------------------------------------------------------

fn build_prompt(links: &[LinkedInLink], ctx: &FirmContext) -> String {
    let listing = links
        .iter()
        .enumerate()
        .map(|(i, link)| {
            let context = if link.text.trim().is_empty() {
                "No context"
            } else {
                link.text.trim()
            };
            format!("{}. {}\n   Context: {}", i + 1, link.url, context)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert VC research analyst. Score the LinkedIn URLs below by how useful they are for building a dossier on this Venture Capital firm.

FIRM CONTEXT:
{context}

DISCOVERED LINKEDIN URLS:
{listing}

SCORING CRITERIA (importance 0-100):
- 90-100: Profiles of the firm's General Partners, Managing Partners or founders; the firm's own company page
- 70-89: Other investment team members (principals, VPs), portfolio company founders
- 50-69: Portfolio company pages, co-investors, advisors
- 20-49: Loosely related people or companies
- 0-19: Unrelated, generic or broken links

CATEGORIES:
- linkedin_gp: profile of a GP / partner at the firm
- linkedin_founder: profile of a portfolio company founder
- portfolio_company: company page of a portfolio company
- firm_official: the firm's own company page
- fund_info, news_recent, news_old, database: other supporting sources
- other: anything else

Return every URL exactly as given, with an importance score, a category and a one-sentence reasoning."#,
        context = ctx.render(),
    )
}

fn schema() -> Value {
    let categories: Vec<&str> = LinkCategory::ALL.iter().map(LinkCategory::as_str).collect();
    json!({
        "type": "object",
        "properties": {
            "prioritized_links": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "url": { "type": "string" },
                        "importance": { "type": "integer", "description": "Importance score (0-100)" },
                        "category": { "type": "string", "enum": categories },
                        "reasoning": { "type": "string" }
                    },
                    "required": ["url", "importance", "category", "reasoning"]
                }
            }
        },
        "required": ["prioritized_links"]
    })
}

#[derive(Debug, Deserialize)]
struct ScoredLink {
    #[serde(default)]
    url: String,
    #[serde(default, deserialize_with = "lenient_score")]
    importance: u8,
    #[serde(default = "other_category")]
    category: LinkCategory,
    #[serde(default)]
    reasoning: String,
}

fn other_category() -> LinkCategory {
    LinkCategory::Other
}

#[derive(Debug, Deserialize)]
struct PrioritizeResponse {
    #[serde(default)]
    prioritized_links: Vec<ScoredLink>,
}

// ---------------------------------------------------------------------------
// prioritize_links
// ---------------------------------------------------------------------------

/// Score `links` in batches of `batch_size`, sleeping `batch_delay` between
/// batches. Results are sorted by importance, highest first.
#[instrument(skip_all, fields(firm = %ctx.record.name, candidates = links.len()))]
pub async fn prioritize_links(
    model: &dyn LanguageModel,
    links: Vec<LinkedInLink>,
    ctx: &FirmContext,
    batch_size: usize,
    batch_delay: Duration,
) -> Result<Vec<PrioritizedLink>> {
    let links = dedupe_links(links);
    if links.is_empty() {
        info!("no LinkedIn links to prioritise");
        return Ok(Vec::new());
    }

    let schema = schema();
    let mut scored: Vec<PrioritizedLink> = Vec::new();
    for (i, batch) in batches(&links, batch_size).enumerate() {
        if i > 0 && !batch_delay.is_zero() {
            tokio::time::sleep(batch_delay).await;
        }
        let prompt = build_prompt(batch, ctx);
        let response: PrioritizeResponse = generate_structured(model, &prompt, &schema).await?;
        debug!(batch = i + 1, size = batch.len(), scored = response.prioritized_links.len(), "batch scored");

        scored.extend(
            response
                .prioritized_links
                .into_iter()
                .filter(|l| !l.url.trim().is_empty())
                .map(|l| PrioritizedLink {
                    url: l.url.trim().to_string(),
                    importance: l.importance,
                    category: l.category,
                    reasoning: l.reasoning,
                }),
        );
    }

    scored.sort_by(|a, b| b.importance.cmp(&a.importance));
    info!(unique = links.len(), scored = scored.len(), "links prioritised");
    Ok(scored)
}
