//! Targeted LinkedIn lookup for each discovered GP.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use vcdossier_linkedin::LinkedInProvider;
use vcdossier_llm::{LanguageModel, generate_structured};
use vcdossier_search::{SearchResult, WebSearch};
use vcdossier_shared::{LinkedInProfile, Result, lenient_score};

const RESULTS_PER_GP: u32 = 5;
const NOT_FOUND: &str = "NOT_FOUND";
const PROFILE_MARKER: &str = "linkedin.com/in/";

#[derive(Debug, Deserialize)]
struct ProfilePick {
    #[serde(default)]
    linkedin_url: String,
    #[serde(default, deserialize_with = "lenient_score")]
    confidence: u8,
    #[serde(default)]
    reasoning: String,
}

/// Drop parenthesised asides ("Asha Rao (MD)") and squeeze whitespace.
fn clean_gp_name(raw: &str) -> String {
    static PARENS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s*\(.*?\)\s*").expect("valid regex"));
    PARENS_RE
        .replace_all(raw, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_results(results: &[SearchResult]) -> String {
    let rule = "─".repeat(80);
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] {}\nURL: {}\nSnippet: {}\n{rule}",
                i + 1,
                r.title,
                r.link,
                r.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn pick_prompt(gp: &str, firm_name: &str, formatted: &str) -> String {
    format!(
        r#"Extract the LinkedIn profile URL for "{gp}", General Partner at "{firm_name}".

GOOGLE SEARCH RESULTS:
{formatted}

INSTRUCTIONS:
1. Look for URLs starting with "https://www.linkedin.com/in/" or "https://linkedin.com/in/"
2. Choose the URL that best matches "{gp}" (check the title and snippet)
3. Return the EXACT URL as it appears in the results
4. If no LinkedIn profile URL is found, return "{NOT_FOUND}"
5. Verify the profile is for the correct person at "{firm_name}" before returning"#
    )
}

fn pick_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "linkedin_url": { "type": "string", "description": "The complete LinkedIn profile URL or 'NOT_FOUND'" },
            "confidence": { "type": "integer", "description": "Confidence score (0-100)" },
            "reasoning": { "type": "string", "description": "Which result number contained the URL and why you chose it" }
        },
        "required": ["linkedin_url", "confidence"]
    })
}

/// Search for `gp`'s LinkedIn profile and let the model pick the match.
///
/// `Ok(None)` when the search has no hits or the model finds no personal
/// profile URL; search errors are logged and treated as no hits.
pub async fn find_gp_profile_url(
    model: &dyn LanguageModel,
    search: &dyn WebSearch,
    gp: &str,
    firm_name: &str,
) -> Result<Option<String>> {
    let query = format!("{gp} {firm_name} LinkedIn");
    let results = match search.search(&query, RESULTS_PER_GP).await {
        Ok(results) => results,
        Err(e) => {
            warn!(gp, error = %e, "GP search failed");
            return Ok(None);
        }
    };
    if results.is_empty() {
        debug!(gp, "no search results");
        return Ok(None);
    }

    let prompt = pick_prompt(gp, firm_name, &format_results(&results));
    let pick: ProfilePick = generate_structured(model, &prompt, &pick_schema()).await?;
    let url = pick.linkedin_url.trim();

    if url.is_empty() || url == NOT_FOUND || !url.contains(PROFILE_MARKER) {
        debug!(gp, answer = url, "no profile URL picked");
        return Ok(None);
    }

    info!(gp, url, confidence = pick.confidence, reasoning = %pick.reasoning, "GP profile found");
    Ok(Some(url.to_string()))
}

/// Find and scrape LinkedIn profiles for `gp_names`.
///
/// Sleeps `delay` between GPs. Returns an empty list when nothing was found
/// or the provider failed.
#[instrument(skip_all, fields(firm = %firm_name, gps = gp_names.len()))]
pub async fn enrich_gps(
    model: &dyn LanguageModel,
    search: &dyn WebSearch,
    provider: &dyn LinkedInProvider,
    gp_names: &[String],
    firm_name: &str,
    delay: Duration,
) -> Result<Vec<LinkedInProfile>> {
    let mut seen = HashSet::new();
    let targets: Vec<String> = gp_names
        .iter()
        .map(|n| clean_gp_name(n))
        .filter(|n| !n.is_empty() && seen.insert(n.to_lowercase()))
        .collect();

    let mut urls: Vec<String> = Vec::new();
    for (i, gp) in targets.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(url) = find_gp_profile_url(model, search, gp, firm_name).await? {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }

    urls.retain(|u| !u.contains("/company/") && !u.contains("/school/"));
    if urls.is_empty() {
        info!("no GP LinkedIn URLs found");
        return Ok(Vec::new());
    }

    let outcome = provider.scrape_profiles(&urls).await;
    if !outcome.success {
        warn!(message = ?outcome.message, "GP profile scrape failed");
    }
    let profiles = outcome.into_records();
    info!(found = urls.len(), scraped = profiles.len(), "GP enrichment complete");
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLinkedIn, FakeModel, FakeSearch};

    fn hit(link: &str) -> SearchResult {
        SearchResult {
            title: "Asha Rao - Managing Partner - Acme Ventures | LinkedIn".into(),
            link: link.into(),
            snippet: "Mumbai".into(),
        }
    }

    #[test]
    fn gp_names_lose_parentheses() {
        assert_eq!(clean_gp_name("Asha Rao (Managing Partner)"), "Asha Rao");
        assert_eq!(clean_gp_name("Asha (MD) Rao"), "Asha Rao");
        assert_eq!(clean_gp_name("  Vikram   Shah "), "Vikram Shah");
    }

    #[test]
    fn results_are_numbered_with_rules() {
        let text = format_results(&[hit("https://www.linkedin.com/in/asha"), hit("https://acme.vc")]);
        assert!(text.starts_with("[1] Asha Rao"));
        assert!(text.contains("\nURL: https://www.linkedin.com/in/asha\nSnippet: Mumbai\n"));
        assert!(text.contains("[2] "));
        assert_eq!(text.matches(&"─".repeat(80)).count(), 2);
    }

    #[tokio::test]
    async fn not_found_and_company_answers_are_rejected() {
        let search = FakeSearch::new()
            .with_results("Asha Rao Acme Ventures LinkedIn", vec![hit("https://www.linkedin.com/in/asha")]);

        let model = FakeModel::new().with_json("Extract the LinkedIn profile URL", json!({ "linkedin_url": "NOT_FOUND", "confidence": 0 }));
        assert_eq!(find_gp_profile_url(&model, &search, "Asha Rao", "Acme Ventures").await.unwrap(), None);

        let model = FakeModel::new().with_json(
            "Extract the LinkedIn profile URL",
            json!({ "linkedin_url": "https://www.linkedin.com/company/acme", "confidence": 80 }),
        );
        assert_eq!(find_gp_profile_url(&model, &search, "Asha Rao", "Acme Ventures").await.unwrap(), None);
    }

    #[tokio::test]
    async fn odd_confidence_values_do_not_fail_the_pick() {
        let search = FakeSearch::new()
            .with_results("Asha Rao Acme Ventures LinkedIn", vec![hit("https://www.linkedin.com/in/asha")]);
        for confidence in [json!(300), json!(-5), json!(87.5), json!("high")] {
            let model = FakeModel::new().with_json(
                "Extract the LinkedIn profile URL",
                json!({ "linkedin_url": "https://www.linkedin.com/in/asha", "confidence": confidence }),
            );
            let found = find_gp_profile_url(&model, &search, "Asha Rao", "Acme Ventures").await.unwrap();
            assert_eq!(found.as_deref(), Some("https://www.linkedin.com/in/asha"));
        }
    }

    #[tokio::test]
    async fn no_results_skips_the_model() {
        let model = FakeModel::new();
        let search = FakeSearch::new();
        let found = find_gp_profile_url(&model, &search, "Asha Rao", "Acme Ventures").await.unwrap();
        assert_eq!(found, None);
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn found_profiles_are_scraped() {
        let search = FakeSearch::new()
            .with_results("Asha Rao Acme Ventures LinkedIn", vec![hit("https://www.linkedin.com/in/asha")]);
        let model = FakeModel::new().with_json(
            "\"Asha Rao\", General Partner",
            json!({ "linkedin_url": "https://www.linkedin.com/in/asha", "confidence": 92, "reasoning": "[1]" }),
        );
        let provider = FakeLinkedIn::new().with_profile("https://www.linkedin.com/in/asha", "Asha Rao", "Managing Partner");

        let names = vec![
            "Asha Rao (MD)".to_string(),
            "asha rao".to_string(),
            "Vikram Shah".to_string(),
        ];
        let profiles = enrich_gps(&model, &search, &provider, &names, "Acme Ventures", Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name.as_deref(), Some("Asha Rao"));
        assert_eq!(
            search.queries(),
            vec!["Asha Rao Acme Ventures LinkedIn", "Vikram Shah Acme Ventures LinkedIn"]
        );
        assert_eq!(provider.profile_calls(), vec![vec!["https://www.linkedin.com/in/asha".to_string()]]);
    }
}
