//! URL discovery: grounded searches, then structured URL extraction.

use serde_json::{Value, json};
use tracing::{info, instrument};

use vcdossier_llm::{LanguageModel, generate_structured};
use vcdossier_search::{WebSearch, find_homepage};
use vcdossier_shared::text::{SEARCH_CONTEXT_CHARS, truncate_chars};
use vcdossier_shared::{DiscoveredUrl, DiscoveryResult, FirmRecord, Result};

use super::grounded_context;
use crate::urls::dedupe_discovered;

const ADDITIONAL_SEPARATOR: &str = "\n\n=== ADDITIONAL SEARCH ===\n\n";

/// Importance assigned to the homepage found by web search.
const HOMEPAGE_IMPORTANCE: u8 = 100;

fn search_queries(record: &FirmRecord) -> Vec<String> {
    let name = &record.name;
    let contact = record.contact_or_na();
    let reg = record.registration_or_na();
    vec![
        format!(
            "Official website for Indian VC firm \"{name}\" (Contact: {contact}, SEBI Registration: {reg})"
        ),
        format!("LinkedIn page for Indian VC firm \"{name}\" (Contact: {contact})"),
        format!("Pitchbook profile for Indian VC firm \"{name}\" (Contact: {contact})"),
    ]
}

fn additional_search_prompt(record: &FirmRecord) -> String {
    format!(
        r#"Find ALL relevant URLs for the Indian VC firm "{name}" (Contact: {contact}, SEBI Reg: {reg}).

Look for:
- Official website and all its pages (team, portfolio, funds, strategy, about, contact)
- LinkedIn company page
- PitchBook/Tracxn profiles
- News articles about fund announcements, deals, exits
- Database listings

Return the complete list of URLs with brief descriptions."#,
        name = record.name,
        contact = record.contact_or_na(),
        reg = record.registration_or_na(),
    )
}

fn extraction_prompt(record: &FirmRecord, context: &str) -> String {
    format!(
        r#"You are a VC data analyst extracting URLs for the Indian VC firm "{name}"
(Contact: {contact}, SEBI Reg: {reg}).

GOAL: Build a comprehensive database of this VC fund. We need URLs containing:
- Fund details (names, sizes, vintage years, closings)
- Team information (GPs, Partners, backgrounds, bios)
- Portfolio companies (current investments, exits)
- Recent deals (2020-2025) and historical deals (pre-2020)
- Investment strategy, sector focus, typical cheque size
- Contact information and office details

SEARCH CONTEXT (from initial search and additional search):
{context}

INSTRUCTIONS:
1. Discover ALL relevant URLs, both from the search context and by inferring likely pages
   of the official website (/team, /portfolio, /funds, /strategy, /about, /contact).
   Include the LinkedIn company page, PitchBook/Tracxn profiles, news articles, press
   releases, interviews and database listings.
2. Prefer clean, direct URLs. Avoid redirect URLs unless they are the only source.
3. Describe what each URL contains and why it is valuable.
4. Assign importance scores (1-100):
   - Official website and inferred pages: 90-100
   - LinkedIn company page: 80-90
   - PitchBook/Tracxn: 70-85
   - Fund announcements/deals: 85-98
   - Partner interviews: 70-80
   - General news mentions: 50-70
   - Historical deals (pre-2020): 60-75
   - Irrelevant URLs: 0-10
5. Include 10-15 high-quality URLs covering all aspects."#,
        name = record.name,
        contact = record.contact_or_na(),
        reg = record.registration_or_na(),
    )
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "urls": {
                "type": "array",
                "description": "Discovered URLs with context and importance.",
                "items": {
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "The discovered URL" },
                        "context": { "type": "string", "description": "What this URL represents" },
                        "importance": { "type": "integer", "description": "Relevance score (1-100)" }
                    },
                    "required": ["url", "context", "importance"]
                }
            }
        },
        "required": ["urls"]
    })
}

async fn homepage_seed(search: Option<&dyn WebSearch>, record: &FirmRecord) -> Option<DiscoveredUrl> {
    let found = find_homepage(search?, record).await?;
    Some(DiscoveredUrl {
        url: found.link,
        context: format!("Official homepage (web search): {}", found.title),
        importance: HOMEPAGE_IMPORTANCE,
    })
}

/// Discover URLs about `record`'s firm.
///
/// Three grounded searches run concurrently (with the homepage lookup when a
/// search backend is available), followed by one broader grounded search and
/// a structured extraction over the combined context.
#[instrument(skip_all, fields(firm = %record.name))]
pub async fn discover_urls(
    model: &dyn LanguageModel,
    search: Option<&dyn WebSearch>,
    record: &FirmRecord,
) -> Result<DiscoveryResult> {
    let queries = search_queries(record);
    let (context, homepage) = tokio::join!(
        grounded_context(model, &queries),
        homepage_seed(search, record)
    );
    let context = context?;

    let additional = model.generate_text(&additional_search_prompt(record)).await?;
    let full_context = format!("{context}{ADDITIONAL_SEPARATOR}{additional}");

    let prompt = extraction_prompt(record, truncate_chars(&full_context, SEARCH_CONTEXT_CHARS));
    let mut result: DiscoveryResult = generate_structured(model, &prompt, &schema()).await?;

    for url in &mut result.urls {
        url.url = url.url.trim().to_string();
        url.importance = url.importance.clamp(1, 100);
    }
    result.urls.extend(homepage);
    result.urls = dedupe_discovered(result.urls);

    info!(urls = result.urls.len(), context_len = full_context.len(), "discovery complete");
    Ok(result)
}
