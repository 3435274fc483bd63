//! Model-backed research steps.
//!
//! Each module owns one prompt (or one short chain of prompts) and its
//! response schema. Agents borrow their collaborators and hold no state.

pub mod discovery;
pub mod enhancement;
pub mod gp_discovery;
pub mod gp_enrichment;
pub mod news;
pub mod page_analyzer;
pub mod prioritizer;
pub mod synthesis;

pub use discovery::discover_urls;
pub use enhancement::enhance_gp_backgrounds;
pub use gp_discovery::{discover_gps, exclude_known_profiles, extract_name_from_fact, validate_gp_names};
pub use gp_enrichment::{enrich_gps, find_gp_profile_url};
pub use news::gather_news;
pub use page_analyzer::analyze_page;
pub use prioritizer::{FirmContext, prioritize_links};
pub use synthesis::synthesize_report;

use futures::future::try_join_all;
use tracing::debug;

use vcdossier_llm::LanguageModel;
use vcdossier_shared::Result;
use vcdossier_shared::text::sanitize_ascii;

/// Separator between independent grounded answers in a combined context.
pub(crate) const SEARCH_SEPARATOR: &str = "\n\n=== NEXT SEARCH RESULT ===\n\n";

/// Run grounded queries concurrently, join the answers and strip non-ASCII.
pub(crate) async fn grounded_context(model: &dyn LanguageModel, queries: &[String]) -> Result<String> {
    let answers = try_join_all(queries.iter().map(|q| model.generate_text(q))).await?;
    let context = sanitize_ascii(&answers.join(SEARCH_SEPARATOR));
    debug!(queries = queries.len(), context_len = context.len(), "grounded context ready");
    Ok(context)
}
