//! Final report synthesis over the whole knowledge base.
//!
//! Two model calls: a free-text analysis over every source, then a
//! schema-constrained extraction of the 16 report fields from that analysis.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use tracing::{info, instrument};

use vcdossier_linkedin::{ProfileInsights, extract_insights};
use vcdossier_llm::{LanguageModel, generate_structured};
use vcdossier_shared::text::{SYNTHESIS_ANALYSIS_CHARS, truncate_chars};
use vcdossier_shared::{
    FactCategory, FirmRecord, FirmReport, KnowledgeBase, LinkedInCompany, LinkedInProfile,
    NOT_AVAILABLE, NewsInsights, PageAnalysis, Result,
};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const FACTS_PER_CATEGORY: usize = 10;
const PROFILES_SHOWN: usize = 5;

// ---------------------------------------------------------------------------
// Context builders
// ---------------------------------------------------------------------------

fn or_na(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("N/A")
}

fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn sebi_context(record: &FirmRecord) -> String {
    [
        format!("Firm Name: {}", record.name),
        format!("SEBI Registration No.: {}", or_na(record.registration_no.as_deref())),
        format!("Contact Person: {}", or_na(record.contact_person.as_deref())),
        format!("Email: {}", or_na(record.email.as_deref())),
        format!("Address: {}", or_na(record.address.as_deref())),
        format!("Validity: {}", or_na(record.validity.as_deref())),
    ]
    .join("\n")
}

fn category_heading(category: FactCategory) -> String {
    category.as_str().to_uppercase().replace('_', " ")
}

pub(crate) fn website_context(analyses: &[PageAnalysis]) -> String {
    if analyses.is_empty() {
        return "WEBSITE ANALYSIS: No pages analyzed.".to_string();
    }

    let mut parts = vec![format!(
        "WEBSITE ANALYSIS ({} relevant pages analyzed):\n",
        analyses.len()
    )];
    let mut by_category: BTreeMap<FactCategory, Vec<&str>> = BTreeMap::new();

    for analysis in analyses.iter().filter(|a| !a.facts.is_empty()) {
        parts.push(format!("\n📄 Page: {} ({})", analysis.page_type, analysis.url));
        parts.push(format!("   Summary: {}", analysis.page_summary));
        parts.push("   Facts:".to_string());
        for fact in &analysis.facts {
            parts.push(format!(
                "   - [{}] {} (confidence: {}%)",
                fact.category, fact.fact, fact.confidence
            ));
            by_category.entry(fact.category).or_default().push(&fact.fact);
        }
    }

    parts.push("\n━━━ FACTS BY CATEGORY ━━━".to_string());
    for category in FactCategory::ALL {
        let Some(facts) = by_category.get(&category) else {
            continue;
        };
        parts.push(format!("\n{} ({} facts):", category_heading(category), facts.len()));
        parts.extend(facts.iter().take(FACTS_PER_CATEGORY).map(|f| format!("  • {f}")));
        if facts.len() > FACTS_PER_CATEGORY {
            parts.push(format!("  ... and {} more", facts.len() - FACTS_PER_CATEGORY));
        }
    }

    parts.join("\n")
}

pub(crate) fn news_context(news: &NewsInsights) -> String {
    let list = |items: &[String]| {
        if items.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            items.join("; ")
        }
    };
    [
        "NEWS INTELLIGENCE:".to_string(),
        format!("Fund Details: {}", list(&news.fund_details)),
        format!("Recent Activity: {}", news.recent_activity),
        format!("Average Cheque: {}", news.avg_cheque),
        format!("Portfolio Mentions: {}", list(&news.portfolio_mentions)),
    ]
    .join("\n")
}

pub(crate) fn profiles_context(title: &str, profiles: &[LinkedInProfile]) -> String {
    if profiles.is_empty() {
        return format!("{title}: No profiles scraped.");
    }
    let lines = profiles
        .iter()
        .take(PROFILES_SHOWN)
        .map(|p| {
            format!(
                "- {}: {} ({})",
                p.name.as_deref().unwrap_or("Unknown"),
                p.headline.as_deref().unwrap_or("N/A"),
                p.url.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{title} ({} scraped):\n{lines}\n...", profiles.len())
}

fn insights_context(insights: &ProfileInsights) -> String {
    if insights.total_profiles == 0 {
        return String::new();
    }
    let join = |items: &[String]| {
        if items.is_empty() {
            "N/A".to_string()
        } else {
            items.join(", ")
        }
    };
    let skills = insights
        .top_skills
        .iter()
        .map(|s| format!("{} ({})", s.skill, s.count))
        .collect::<Vec<_>>();
    [
        format!("LINKEDIN INSIGHTS (across {} profiles):", insights.total_profiles),
        format!("Companies: {}", join(&insights.companies)),
        format!("Schools: {}", join(&insights.schools)),
        format!("Locations: {}", join(&insights.locations)),
        format!("Top Skills: {}", join(&skills)),
    ]
    .join("\n")
}

fn raw_str<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key)?.as_str().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn companies_context(companies: &[LinkedInCompany]) -> String {
    if companies.is_empty() {
        return "LINKEDIN COMPANY PAGES: No company pages scraped.".to_string();
    }

    let mut parts = vec![format!("LINKEDIN COMPANY PAGES ({} scraped):\n", companies.len())];
    for company in companies {
        let raw = &company.raw;
        let pick = |field: Option<&str>, key: &str| -> String {
            field
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .or_else(|| raw_str(raw, key))
                .unwrap_or("N/A")
                .to_string()
        };
        let pick_value = |field: Option<&Value>, key: &str| -> String {
            value_text(field)
                .or_else(|| value_text(raw.get(key)))
                .unwrap_or_else(|| "N/A".to_string())
        };

        parts.push(format!("🏢 Company: {}", company.name.as_deref().unwrap_or("Unknown")));
        parts.push(format!("   Tagline: {}", raw_str(raw, "tagline").unwrap_or("N/A")));
        parts.push(format!("   URL: {}", company.url.as_deref().unwrap_or("N/A")));
        parts.push(format!("   Description: {}", pick(company.description.as_deref(), "about")));
        parts.push(format!("   Industry: {}", pick(company.industry.as_deref(), "industry")));
        parts.push(format!(
            "   Employees (LinkedIn): {}",
            value_text(raw.get("employees_in_linkedin")).unwrap_or_else(|| "N/A".to_string())
        ));
        parts.push(format!("   Company Size Range: {}", pick_value(company.company_size.as_ref(), "company_size")));
        parts.push(format!("   Founded: {}", pick_value(company.founded.as_ref(), "founded_year")));
        parts.push(format!("   Headquarters: {}", pick(company.headquarters.as_deref(), "location")));
        parts.push(format!("   Website: {}", pick(company.website.as_deref(), "website")));
        if !company.specialties.is_empty() {
            parts.push(format!("   Specialties: {}", company.specialties.join(", ")));
        }

        if let Some(locations) = raw.get("locations").and_then(Value::as_array) {
            let locs = locations
                .iter()
                .filter_map(|l| {
                    let city = raw_str(l, "city");
                    let country = raw_str(l, "country");
                    if city.is_none() && country.is_none() {
                        return None;
                    }
                    let kind = if l.get("is_headquarter").and_then(Value::as_bool).unwrap_or(false) {
                        "HQ"
                    } else {
                        "Office"
                    };
                    Some(format!(
                        "{}, {} ({kind})",
                        city.unwrap_or(""),
                        country.unwrap_or("")
                    ))
                })
                .collect::<Vec<_>>();
            if !locs.is_empty() {
                parts.push(format!("   Office Locations: {}", locs.join("; ")));
            }
        }

        if let Some(similar) = raw.get("similar_companies").and_then(Value::as_array) {
            let names = similar
                .iter()
                .filter_map(|s| raw_str(s, "name"))
                .collect::<Vec<_>>();
            if !names.is_empty() {
                parts.push(format!("   Similar Companies (Context): {}", names.join(", ")));
            }
        }
        parts.push(String::new());
    }

    parts.join("\n")
}

// ---------------------------------------------------------------------------
// Prompts & schema
// ---------------------------------------------------------------------------

fn analysis_prompt(kb: &KnowledgeBase) -> String {
    let mut all_profiles = kb.linkedin_profiles.clone();
    all_profiles.extend(kb.gp_profiles.iter().cloned());
    let insights = extract_insights(&all_profiles);
    let gp_context = if kb.gp_profiles.is_empty() {
        String::new()
    } else {
        profiles_context("ENRICHED GP PROFILES", &kb.gp_profiles)
    };

    format!(
        r#"You are a Senior VC Research Analyst synthesizing a comprehensive intelligence report for the Indian VC firm "{name}".

{RULE}
📋 OFFICIAL SEBI REGISTRATION CONTEXT
{RULE}
{sebi}

{RULE}
🔍 EXTRACTED INTELLIGENCE DATA
{RULE}

{website}

{news}

{profiles}

{gp_context}

{insights}

{companies}

{RULE}
🎯 SYNTHESIS OBJECTIVES
{RULE}

Synthesize ALL of the data above into a single, accurate report.

DATA SOURCES:
1. SEBI Official Record: ground truth for firm name, contact person and registration
2. Website Analysis: categorized facts with confidence scores
3. News Intelligence: fund announcements, deals and cheque sizes
4. LinkedIn Profiles: team members and founders
5. Enriched GP Profiles: targeted General Partner profiles, use these for GP backgrounds
6. LinkedIn Company Pages: official description, size and industry focus

RULES:
1. Use the SEBI record as the source of truth for the firm name and contact person.
2. Merge people and companies that appear in several sources into one entry.
3. Prefer website facts over LinkedIn mentions for fund sizes, and specific dates over year-only mentions.
4. Combine portfolio companies from every source.
5. Only include data explicitly found above. Prefer facts with confidence above 80%.

REQUIRED OUTPUT (16 data points):
1. FIRM NAME (exact SEBI name)
2. FUND NAMES
3. FUND SIZES (AUM, with years)
4. GPs (names and titles)
5. GP BACKGROUNDS
6. TEAM SIZE
7. RECENT FUNDING ACTIVITY (2020-2025)
8. FUND START DATE
9. FIRM START DATE
10. PORTFOLIO COMPANIES
11. PAST PERFORMANCE
12. INDUSTRY FOCUS
13. DEAL VELOCITY
14. AVG CHEQUE SIZE
15. CHEQUE SIZE % OF ROUND
16. PRIMARY CO-INVESTORS

NOW ANALYZE: prepare a coherent summary addressing all 16 data points."#,
        name = kb.target.name,
        sebi = sebi_context(&kb.target),
        website = website_context(&kb.page_analyses),
        news = news_context(&kb.news),
        profiles = profiles_context("LINKEDIN PROFILES", &kb.linkedin_profiles),
        insights = insights_context(&insights),
        companies = companies_context(&kb.linkedin_companies),
    )
}

fn extraction_prompt(record: &FirmRecord, analysis: &str) -> String {
    format!(
        r#"You are finalizing the structured JSON output for VC firm "{name}" (SEBI: {reg}).

SYNTHESIZED ANALYSIS:
{analysis}

INSTRUCTIONS:
1. Verify each data point is supported by the analysis; cross-check names, numbers and dates.
2. firm_name must exactly match "{name}".
3. gps must contain objects with "name" and "background"; each background 3-5 sentences.
4. Fund sizes include currency and year (e.g. "$100M (2020)").
5. Portfolio companies are deduplicated.
6. Use "{NOT_AVAILABLE}" for missing data, never make up information."#,
        name = record.name,
        reg = record.registration_or_na(),
    )
}

/// JSON schema of the 16-field report.
pub(crate) fn report_schema() -> Value {
    let string_list = |description: &str| {
        json!({ "type": "array", "items": { "type": "string" }, "description": description })
    };
    let text = |description: &str| json!({ "type": "string", "description": description });

    json!({
        "type": "object",
        "properties": {
            "firm_name": text("Official SEBI registered firm name"),
            "fund_names": string_list("All fund names managed by this firm"),
            "fund_sizes": string_list("Fund sizes with years, e.g. 'Fund I: $100M (2018)'"),
            "gps": {
                "type": "array",
                "description": "General Partners with names and detailed backgrounds",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": text("Full name and title, e.g. 'Asha Rao, Managing Partner'"),
                        "background": text("3-5 sentence professional background")
                    },
                    "required": ["name", "background"]
                }
            },
            "gp_backgrounds": text("Career backgrounds of the GPs"),
            "team_size": text("Total investment team size"),
            "recent_funding_activity": text("Investments from 2020-2025 with companies, amounts and dates"),
            "fund_start_date": text("Launch date of the first fund"),
            "firm_start_date": text("Founding date of the firm"),
            "portfolio_companies": string_list("Deduplicated portfolio companies"),
            "past_performance": text("Exits, IPOs and notable returns"),
            "industry_focus": text("Primary sectors and themes"),
            "deal_velocity": text("Deals per year in recent years"),
            "avg_cheque_size": text("Typical investment range"),
            "cheque_size_pct_round": text("Typical share of a funding round"),
            "primary_coinvestors": string_list("Frequent co-investors")
        },
        "required": [
            "firm_name", "fund_names", "fund_sizes", "gps",
            "team_size", "recent_funding_activity", "fund_start_date", "firm_start_date",
            "portfolio_companies", "past_performance", "industry_focus", "deal_velocity",
            "avg_cheque_size", "cheque_size_pct_round", "primary_coinvestors"
        ]
    })
}

// ---------------------------------------------------------------------------
// synthesize_report
// ---------------------------------------------------------------------------

/// Turn the knowledge base into the final [`FirmReport`].
#[instrument(skip_all, fields(firm = %kb.target.name))]
pub async fn synthesize_report(model: &dyn LanguageModel, kb: &KnowledgeBase) -> Result<FirmReport> {
    let analysis = model.generate_text(&analysis_prompt(kb)).await?;

    let prompt = extraction_prompt(&kb.target, truncate_chars(&analysis, SYNTHESIS_ANALYSIS_CHARS));
    let mut report: FirmReport = generate_structured(model, &prompt, &report_schema()).await?;

    if report.firm_name.trim().is_empty() {
        report.firm_name = kb.target.name.clone();
    }
    if report.gp_backgrounds.trim().is_empty() {
        report.gp_backgrounds = report.gp_backgrounds_from_gps();
    }

    info!(
        gps = report.gps.len(),
        funds = report.fund_names.len(),
        portfolio = report.portfolio_companies.len(),
        "report synthesised"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeModel;
    use vcdossier_shared::{PageFact, PageType};

    fn fact(category: FactCategory, text: &str) -> PageFact {
        PageFact {
            category,
            fact: text.into(),
            confidence: 90,
        }
    }

    #[test]
    fn sebi_context_marks_missing_fields() {
        let mut record = FirmRecord::named("Acme Ventures");
        record.contact_person = Some("Asha Rao".into());
        let ctx = sebi_context(&record);
        assert!(ctx.contains("Contact Person: Asha Rao"));
        assert!(ctx.contains("Email: N/A"));
        assert!(ctx.ends_with("Validity: N/A"));
    }

    #[test]
    fn website_context_groups_and_caps_facts() {
        let mut facts: Vec<PageFact> = (0..12)
            .map(|i| fact(FactCategory::PortfolioCompany, &format!("Company {i}")))
            .collect();
        facts.push(fact(FactCategory::FundInfo, "Fund I: INR 250 Cr"));
        let analyses = vec![
            PageAnalysis {
                page_id: "page_001".into(),
                url: "https://acme.vc/portfolio".into(),
                page_type: PageType::Portfolio,
                is_relevant: true,
                page_summary: "Portfolio".into(),
                facts,
                error: None,
            },
            PageAnalysis::default(),
        ];

        let ctx = website_context(&analyses);
        assert!(ctx.starts_with("WEBSITE ANALYSIS (2 relevant pages analyzed):"));
        assert!(ctx.contains("📄 Page: portfolio (https://acme.vc/portfolio)"));
        assert!(ctx.contains("   - [fund_info] Fund I: INR 250 Cr (confidence: 90%)"));
        assert!(ctx.contains("PORTFOLIO COMPANY (12 facts):"));
        assert!(ctx.contains("  ... and 2 more"));
        assert!(!ctx.contains("  • Company 10"));

        let fund_pos = ctx.find("FUND INFO (1 facts)").unwrap();
        let portfolio_pos = ctx.find("PORTFOLIO COMPANY (12 facts)").unwrap();
        assert!(fund_pos < portfolio_pos);
    }

    #[test]
    fn profile_context_shows_first_five() {
        let profiles: Vec<LinkedInProfile> = (0..7)
            .map(|i| LinkedInProfile {
                name: Some(format!("Person {i}")),
                url: Some(format!("https://www.linkedin.com/in/p{i}")),
                ..Default::default()
            })
            .collect();
        let ctx = profiles_context("LINKEDIN PROFILES", &profiles);
        assert!(ctx.starts_with("LINKEDIN PROFILES (7 scraped):"));
        assert!(ctx.contains("- Person 4: N/A (https://www.linkedin.com/in/p4)"));
        assert!(!ctx.contains("Person 5"));
        assert_eq!(profiles_context("ENRICHED GP PROFILES", &[]), "ENRICHED GP PROFILES: No profiles scraped.");
    }

    #[test]
    fn company_context_falls_back_to_raw() {
        let company = LinkedInCompany {
            name: Some("Acme Ventures".into()),
            raw: json!({
                "tagline": "Seed to Series B",
                "about": "Early-stage fund",
                "founded_year": 2015,
                "locations": [{ "city": "Mumbai", "country": "IN", "is_headquarter": true }],
                "similar_companies": [{ "name": "Blume" }, { "name": "Kalaari" }]
            }),
            ..Default::default()
        };
        let ctx = companies_context(&[company]);
        assert!(ctx.contains("   Tagline: Seed to Series B"));
        assert!(ctx.contains("   Description: Early-stage fund"));
        assert!(ctx.contains("   Founded: 2015"));
        assert!(ctx.contains("   Office Locations: Mumbai, IN (HQ)"));
        assert!(ctx.contains("   Similar Companies (Context): Blume, Kalaari"));
    }

    #[tokio::test]
    async fn empty_firm_name_is_replaced() {
        let model = FakeModel::new().with_json(
            "finalizing the structured JSON output",
            json!({
                "firm_name": "",
                "gps": [{ "name": "Asha Rao, Managing Partner", "background": "Ex-Sequoia." }],
                "fund_names": ["Acme Fund I"]
            }),
        );
        let mut kb = KnowledgeBase::new(FirmRecord::named("Acme Ventures"));
        kb.gp_profiles.push(LinkedInProfile {
            name: Some("Asha Rao".into()),
            headline: Some("Managing Partner".into()),
            ..Default::default()
        });

        let report = synthesize_report(&model, &kb).await.unwrap();
        assert_eq!(report.firm_name, "Acme Ventures");
        assert_eq!(report.gp_backgrounds, "Asha Rao, Managing Partner: Ex-Sequoia.");
        assert_eq!(report.team_size, NOT_AVAILABLE);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("ENRICHED GP PROFILES (1 scraped)"));
        assert!(prompts[0].contains("NEWS INTELLIGENCE:"));
    }

    #[tokio::test]
    async fn analysis_failure_aborts() {
        let model = FakeModel::new().failing_text("Senior VC Research Analyst");
        let kb = KnowledgeBase::new(FirmRecord::named("Acme Ventures"));
        assert!(synthesize_report(&model, &kb).await.is_err());
    }
}
