//! News intelligence: grounded news searches reduced to [`NewsInsights`].

use serde_json::{Value, json};
use tracing::{info, instrument};

use vcdossier_llm::{LanguageModel, generate_structured};
use vcdossier_shared::text::{NEWS_ANALYSIS_CHARS, NEWS_CONTEXT_CHARS, truncate_chars};
use vcdossier_shared::{NOT_AVAILABLE, NewsInsights, Result};

use super::grounded_context;

fn news_queries(firm_name: &str) -> Vec<String> {
    vec![
        format!("\"{firm_name}\" investment \"Series A\" OR \"Series B\""),
        format!("\"{firm_name}\" fund size announcement"),
        format!("\"{firm_name}\" new fund launch"),
        format!("\"{firm_name}\" portfolio companies list"),
    ]
}

fn analysis_prompt(firm_name: &str, context: &str) -> String {
    format!(
        r#"Analyze the following news search results for the VC firm "{firm_name}".

SEARCH CONTEXT:
{context}

INSTRUCTIONS:
Extract the following financial details. Be specific with numbers.

1. Fund Names & Sizes (e.g. "Fund I: $50M", "Opportunity Fund: $100M")
2. Recent Deal Activity (last 24 months)
3. Average Cheque Size (if mentioned)
4. Key Portfolio Companies mentioned in news"#
    )
}

fn extraction_prompt(analysis: &str) -> String {
    format!(
        r#"Based on the analysis below, extract the financial details into JSON.

ANALYSIS:
{analysis}

INSTRUCTIONS:
- If a value is not found, use "{NOT_AVAILABLE}".
- Keep summaries concise (max 100 words). Do not repeat text."#
    )
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "fund_details": { "type": "array", "items": { "type": "string" } },
            "recent_activity": { "type": "string" },
            "avg_cheque": { "type": "string" },
            "portfolio_mentions": { "type": "array", "items": { "type": "string" } }
        }
    })
}

fn or_not_available(value: String) -> String {
    if value.trim().is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value
    }
}

/// Collect fund, deal and portfolio details from news coverage.
#[instrument(skip(model))]
pub async fn gather_news(model: &dyn LanguageModel, firm_name: &str) -> Result<NewsInsights> {
    let context = grounded_context(model, &news_queries(firm_name)).await?;

    let analysis = model
        .generate_text(&analysis_prompt(firm_name, truncate_chars(&context, NEWS_CONTEXT_CHARS)))
        .await?;

    let prompt = extraction_prompt(truncate_chars(&analysis, NEWS_ANALYSIS_CHARS));
    let mut insights: NewsInsights = generate_structured(model, &prompt, &schema()).await?;

    insights.recent_activity = or_not_available(insights.recent_activity);
    insights.avg_cheque = or_not_available(insights.avg_cheque);
    insights.fund_details.retain(|f| !f.trim().is_empty());
    insights.portfolio_mentions.retain(|p| !p.trim().is_empty());

    info!(
        funds = insights.fund_details.len(),
        portfolio = insights.portfolio_mentions.len(),
        "news insights ready"
    );
    Ok(insights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeModel;

    #[tokio::test]
    async fn missing_values_become_not_available() {
        let model = FakeModel::new().with_json(
            "financial details into JSON",
            json!({ "fund_details": ["Fund I: INR 250 Cr", ""], "recent_activity": "  " }),
        );

        let insights = gather_news(&model, "Acme Ventures").await.unwrap();
        assert_eq!(insights.fund_details, vec!["Fund I: INR 250 Cr"]);
        assert_eq!(insights.recent_activity, NOT_AVAILABLE);
        assert_eq!(insights.avg_cheque, NOT_AVAILABLE);
        assert!(insights.portfolio_mentions.is_empty());

        // 4 grounded queries, 1 analysis, 1 extraction
        assert_eq!(model.prompts().len(), 6);
    }

    #[tokio::test]
    async fn analysis_is_truncated_for_extraction() {
        let long_analysis = "x".repeat(NEWS_ANALYSIS_CHARS + 500);
        let model = FakeModel::new()
            .with_text("Analyze the following news", &long_analysis)
            .with_json("financial details into JSON", json!({}));

        gather_news(&model, "Acme Ventures").await.unwrap();

        let prompts = model.prompts();
        let extraction = prompts.last().unwrap();
        let xs = extraction.chars().filter(|c| *c == 'x').count();
        // the prompt text itself contains a few 'x' characters ("max", "extract")
        assert!(xs >= NEWS_ANALYSIS_CHARS && xs < NEWS_ANALYSIS_CHARS + 20);
    }
}
