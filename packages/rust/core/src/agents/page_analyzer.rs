//! Per-page fact extraction.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use vcdossier_llm::{LanguageModel, generate_structured};
use vcdossier_shared::text::{PAGE_TEXT_CHARS, truncate_chars};
use vcdossier_shared::{FactCategory, PageAnalysis, PageFact, PageType};

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    #[serde(default)]
    is_relevant: bool,
    #[serde(default)]
    page_summary: String,
    #[serde(default)]
    facts: Vec<PageFact>,
}

fn type_instructions(page_type: PageType) -> &'static str {
    match page_type {
        PageType::Team => {
            "- Extract everything for each person.
- If the text contains a full bio paragraph, extract the key sentences that describe their background, not just \"Ex-Google\".
- Example fact: \"Shub was previously a Managing Director at Matrix Partners where he led investments in Ola and Quikr. He holds an MBA from Harvard.\""
        }
        PageType::Portfolio => {
            "- Extract all company details.
- If there are testimonials or case studies, extract the key metrics mentioned (e.g., \"Grew revenue 10x\")."
        }
        PageType::General => {
            "- Look for \"About Us\" sections that mention AUM, history, or specific fund closings.
- Look for \"Strategy\" sections that define cheque sizes (e.g., \"$1M - $5M\") and sectors."
        }
    }
}

fn build_prompt(text: &str, url: &str, page_type: PageType) -> String {
    format!(
        r#"You are an expert VC Data Analyst. Your job is to extract COMPREHENSIVE DETAILS from a single webpage of a Venture Capital firm.

PAGE CONTEXT:
- URL: {url}
- Type: {page_type_upper}

PAGE CONTENT:
{content}

GOAL:
Extract ALL relevant information available on the page. Do not summarize or abbreviate.

FOCUS AREAS:

1. TEAM & GPs (General Partners):
   - Full name, exact title, education, full professional history, board seats, investments led.
   - Include details from expanded or modal sections.

2. FUNDS & AUM:
   - Exact fund names (e.g., "Fund III", "Opportunity Fund I").
   - Exact sizes (e.g., "$350 Million", "INR 2000 Crore").
   - Dates (vintage years, closing dates) and LP details if mentioned.

3. PORTFOLIO:
   - Company name, sector, description, investment stage, status.
   - Deal details (investment amount, year, co-investors).

WHAT TO LOOK FOR ON THIS PAGE TYPE:
{type_specific}

GENERAL INSTRUCTIONS:
1. Prefer long, detailed facts over short summaries.
2. If a fund size is mentioned in a paragraph about strategy, extract the whole context.
3. Ignore navigation, footers and generic marketing slogans."#,
        page_type_upper = page_type.as_str().to_uppercase(),
        content = truncate_chars(text, PAGE_TEXT_CHARS),
        type_specific = type_instructions(page_type),
    )
}

fn schema() -> Value {
    let categories: Vec<&str> = FactCategory::ALL.iter().map(FactCategory::as_str).collect();
    json!({
        "type": "object",
        "properties": {
            "is_relevant": {
                "type": "boolean",
                "description": "True if this page contains ANY useful information for a VC database (Team, Portfolio, Funds, Contact)."
            },
            "page_summary": {
                "type": "string",
                "description": "A one-sentence summary of what this page is about."
            },
            "facts": {
                "type": "array",
                "description": "Specific, high-value facts found on this page.",
                "items": {
                    "type": "object",
                    "properties": {
                        "category": { "type": "string", "enum": categories },
                        "fact": { "type": "string", "description": "The extracted fact, with numbers, dates and names." },
                        "confidence": { "type": "integer", "description": "Confidence score (1-100)." }
                    },
                    "required": ["category", "fact", "confidence"]
                }
            }
        },
        "required": ["is_relevant", "page_summary", "facts"]
    })
}

/// Analyse one page's plain text. A failed call yields an irrelevant
/// analysis carrying the error instead of failing the firm.
#[instrument(skip_all, fields(page_id = %page_id, url = %url, page_type = %page_type, text_len = text.len()))]
pub async fn analyze_page(
    model: &dyn LanguageModel,
    page_id: &str,
    url: &str,
    page_type: PageType,
    text: &str,
) -> PageAnalysis {
    let prompt = build_prompt(text, url, page_type);

    let mut analysis = PageAnalysis {
        page_id: page_id.to_string(),
        url: url.to_string(),
        page_type,
        ..PageAnalysis::default()
    };

    match generate_structured::<AnalysisResponse>(model, &prompt, &schema()).await {
        Ok(response) => {
            analysis.is_relevant = response.is_relevant;
            analysis.page_summary = response.page_summary;
            analysis.facts = response
                .facts
                .into_iter()
                .filter(|f| !f.fact.trim().is_empty())
                .map(|mut f| {
                    f.confidence = f.confidence.clamp(1, 100);
                    f
                })
                .collect();
            debug!(relevant = analysis.is_relevant, facts = analysis.facts.len(), "page analysed");
        }
        Err(e) => {
            warn!(error = %e, "page analysis failed");
            analysis.error = Some(e.to_string());
        }
    }

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeModel;

    #[tokio::test]
    async fn facts_are_kept_with_page_identity() {
        let model = FakeModel::new().with_json(
            "COMPREHENSIVE DETAILS",
            json!({
                "is_relevant": true,
                "page_summary": "Team page",
                "facts": [
                    { "category": "team_member", "fact": "Asha Rao is Managing Partner", "confidence": 95 },
                    { "category": "fund_info", "fact": " ", "confidence": 50 },
                    { "category": "gossip", "fact": "Office has a dog", "confidence": 0 }
                ]
            }),
        );

        let analysis = analyze_page(&model, "page_001", "https://acme.vc/team", PageType::Team, "text").await;

        assert_eq!(analysis.page_id, "page_001");
        assert_eq!(analysis.page_type, PageType::Team);
        assert!(analysis.is_relevant);
        assert_eq!(analysis.facts.len(), 2);
        assert_eq!(analysis.facts[1].category, FactCategory::Other);
        assert_eq!(analysis.facts[1].confidence, 1);
        assert!(analysis.error.is_none());

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Type: TEAM"));
        assert!(prompt.contains("Example fact"));
    }

    #[tokio::test]
    async fn failure_is_recorded_not_raised() {
        let model = FakeModel::new();
        let analysis =
            analyze_page(&model, "page_002", "https://acme.vc", PageType::General, "text").await;
        assert!(!analysis.is_relevant);
        assert!(analysis.facts.is_empty());
        assert!(analysis.error.is_some());
    }

    #[test]
    fn page_text_is_truncated() {
        let baseline = build_prompt("", "https://acme.vc", PageType::Portfolio);
        let text = "y".repeat(PAGE_TEXT_CHARS + 1000);
        let prompt = build_prompt(&text, "https://acme.vc", PageType::Portfolio);
        let added = prompt.matches('y').count() - baseline.matches('y').count();
        assert_eq!(added, PAGE_TEXT_CHARS);
    }
}
