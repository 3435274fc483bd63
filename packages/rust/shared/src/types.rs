//! Domain types shared across vcdossier crates.
//!
//! These mirror the JSON files written to a firm directory, so every type
//! round-trips through `serde_json` and tolerates missing fields.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Placeholder used for report fields the sources do not cover.
pub const NOT_AVAILABLE: &str = "Not available";

// ---------------------------------------------------------------------------
// FirmRecord
// ---------------------------------------------------------------------------

/// A SEBI registry entry, as found in the input JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmRecord {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Registration No.", default, skip_serializing_if = "Option::is_none")]
    pub registration_no: Option<String>,

    #[serde(rename = "Contact Person", default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,

    #[serde(rename = "E-mail", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(rename = "Address", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(rename = "Validity", default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<String>,

    /// Any other registry columns, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FirmRecord {
    /// Minimal record with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registration_no: None,
            contact_person: None,
            email: None,
            address: None,
            validity: None,
            extra: BTreeMap::new(),
        }
    }

    /// Contact person, or `"N/A"` for prompts.
    pub fn contact_or_na(&self) -> &str {
        non_empty(self.contact_person.as_deref()).unwrap_or("N/A")
    }

    /// Registration number, or `"N/A"` for prompts.
    pub fn registration_or_na(&self) -> &str {
        non_empty(self.registration_no.as_deref()).unwrap_or("N/A")
    }

    /// Domain part of the registered e-mail address.
    pub fn email_domain(&self) -> Option<&str> {
        let email = non_empty(self.email.as_deref())?;
        let (_, domain) = email.split_once('@')?;
        let domain = domain.trim();
        (!domain.is_empty()).then_some(domain)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Discovery & news
// ---------------------------------------------------------------------------

/// A URL surfaced by the discovery phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    pub url: String,
    #[serde(default)]
    pub context: String,
    /// Relevance score, 1-100.
    #[serde(default, deserialize_with = "lenient_score")]
    pub importance: u8,
}

/// Output of the discovery agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    #[serde(default)]
    pub urls: Vec<DiscoveredUrl>,
}

/// Financial details pulled from news coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsInsights {
    #[serde(default)]
    pub fund_details: Vec<String>,
    #[serde(default = "not_available")]
    pub recent_activity: String,
    #[serde(default = "not_available")]
    pub avg_cheque: String,
    #[serde(default)]
    pub portfolio_mentions: Vec<String>,
}

impl Default for NewsInsights {
    fn default() -> Self {
        Self {
            fund_details: Vec::new(),
            recent_activity: not_available(),
            avg_cheque: not_available(),
            portfolio_mentions: Vec::new(),
        }
    }
}

fn not_available() -> String {
    NOT_AVAILABLE.into()
}

/// Deserialize a model-assigned 0-100 score. Numbers (and numeric strings)
/// are rounded and clamped; anything else reads as 0.
pub fn lenient_score<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(match number {
        Some(n) if n.is_finite() => n.round().clamp(0.0, 100.0) as u8,
        _ => 0,
    })
}

// ---------------------------------------------------------------------------
// Scraped pages
// ---------------------------------------------------------------------------

/// An outbound link found on a scraped page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub url: String,
    #[serde(default)]
    pub text: String,
}

/// Coarse page type used to tailor the analysis prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Team,
    Portfolio,
    #[default]
    General,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Portfolio => "portfolio",
            Self::General => "general",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a fact extracted from a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    FundInfo,
    TeamMember,
    PortfolioCompany,
    ContactInfo,
    Strategy,
    NewsDeal,
    #[serde(other)]
    Other,
}

impl FactCategory {
    /// All categories in report order.
    pub const ALL: [FactCategory; 7] = [
        Self::FundInfo,
        Self::TeamMember,
        Self::PortfolioCompany,
        Self::ContactInfo,
        Self::Strategy,
        Self::NewsDeal,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FundInfo => "fund_info",
            Self::TeamMember => "team_member",
            Self::PortfolioCompany => "portfolio_company",
            Self::ContactInfo => "contact_info",
            Self::Strategy => "strategy",
            Self::NewsDeal => "news_deal",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single fact extracted from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFact {
    pub category: FactCategory,
    pub fact: String,
    /// Model confidence, 1-100.
    #[serde(default, deserialize_with = "lenient_score")]
    pub confidence: u8,
}

/// Model analysis of one scraped page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    #[serde(default)]
    pub page_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub page_type: PageType,
    #[serde(default)]
    pub is_relevant: bool,
    #[serde(default)]
    pub page_summary: String,
    #[serde(default)]
    pub facts: Vec<PageFact>,
    /// Set when the analysis call failed and the page was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// LinkedIn
// ---------------------------------------------------------------------------

/// A LinkedIn URL waiting to be prioritised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInLink {
    pub url: String,
    /// Anchor text or discovery context.
    #[serde(default)]
    pub text: String,
    /// Where the link came from (`discovery`, `page_001`, ...).
    #[serde(default)]
    pub source: String,
}

/// Category assigned to a prioritised link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCategory {
    LinkedinGp,
    LinkedinFounder,
    PortfolioCompany,
    NewsRecent,
    NewsOld,
    FundInfo,
    FirmOfficial,
    Database,
    #[serde(other)]
    Other,
}

impl LinkCategory {
    pub const ALL: [LinkCategory; 9] = [
        Self::LinkedinGp,
        Self::LinkedinFounder,
        Self::PortfolioCompany,
        Self::NewsRecent,
        Self::NewsOld,
        Self::FundInfo,
        Self::FirmOfficial,
        Self::Database,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkedinGp => "linkedin_gp",
            Self::LinkedinFounder => "linkedin_founder",
            Self::PortfolioCompany => "portfolio_company",
            Self::NewsRecent => "news_recent",
            Self::NewsOld => "news_old",
            Self::FundInfo => "fund_info",
            Self::FirmOfficial => "firm_official",
            Self::Database => "database",
            Self::Other => "other",
        }
    }
}

/// A LinkedIn link with a model-assigned score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedLink {
    pub url: String,
    #[serde(default, deserialize_with = "lenient_score")]
    pub importance: u8,
    pub category: LinkCategory,
    #[serde(default)]
    pub reasoning: String,
}

/// Contact details attached to a LinkedIn profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default)]
    pub websites: Vec<String>,
}

/// Normalised LinkedIn person profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInProfile {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub experience: Vec<Value>,
    #[serde(default)]
    pub education: Vec<Value>,
    #[serde(default)]
    pub skills: Vec<Value>,
    #[serde(default)]
    pub connections: Option<Value>,
    #[serde(default)]
    pub followers: Option<Value>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub contact_info: ContactInfo,
    /// Vendor record as received.
    #[serde(default)]
    pub raw: Value,
}

/// Normalised LinkedIn company page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInCompany {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub company_size: Option<Value>,
    #[serde(default)]
    pub headquarters: Option<String>,
    #[serde(default)]
    pub founded: Option<Value>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub followers: Option<Value>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub raw: Value,
}

// ---------------------------------------------------------------------------
// Final report
// ---------------------------------------------------------------------------

/// One General Partner entry in the final report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub background: String,
}

/// The 16-field dossier produced for each firm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmReport {
    #[serde(default)]
    pub firm_name: String,
    #[serde(default)]
    pub fund_names: Vec<String>,
    #[serde(default)]
    pub fund_sizes: Vec<String>,
    #[serde(default)]
    pub gps: Vec<GpEntry>,
    #[serde(default)]
    pub gp_backgrounds: String,
    #[serde(default = "not_available")]
    pub team_size: String,
    #[serde(default = "not_available")]
    pub recent_funding_activity: String,
    #[serde(default = "not_available")]
    pub fund_start_date: String,
    #[serde(default = "not_available")]
    pub firm_start_date: String,
    #[serde(default)]
    pub portfolio_companies: Vec<String>,
    #[serde(default = "not_available")]
    pub past_performance: String,
    #[serde(default = "not_available")]
    pub industry_focus: String,
    #[serde(default = "not_available")]
    pub deal_velocity: String,
    #[serde(default = "not_available")]
    pub avg_cheque_size: String,
    #[serde(default = "not_available")]
    pub cheque_size_pct_round: String,
    #[serde(default)]
    pub primary_coinvestors: Vec<String>,
}

impl FirmReport {
    /// An empty report for `firm_name`, every scalar set to [`NOT_AVAILABLE`].
    pub fn empty(firm_name: impl Into<String>) -> Self {
        Self {
            firm_name: firm_name.into(),
            fund_names: Vec::new(),
            fund_sizes: Vec::new(),
            gps: Vec::new(),
            gp_backgrounds: String::new(),
            team_size: not_available(),
            recent_funding_activity: not_available(),
            fund_start_date: not_available(),
            firm_start_date: not_available(),
            portfolio_companies: Vec::new(),
            past_performance: not_available(),
            industry_focus: not_available(),
            deal_velocity: not_available(),
            avg_cheque_size: not_available(),
            cheque_size_pct_round: not_available(),
            primary_coinvestors: Vec::new(),
        }
    }

    /// Render `gps` as `"Name: background"` lines joined by `" | "`.
    pub fn gp_backgrounds_from_gps(&self) -> String {
        self.gps
            .iter()
            .filter(|gp| !gp.name.trim().is_empty())
            .map(|gp| {
                if gp.background.trim().is_empty() {
                    gp.name.trim().to_string()
                } else {
                    format!("{}: {}", gp.name.trim(), gp.background.trim())
                }
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

// ---------------------------------------------------------------------------
// Knowledge base
// ---------------------------------------------------------------------------

/// Everything accumulated about one firm before synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub target: FirmRecord,
    #[serde(default)]
    pub discovery: DiscoveryResult,
    #[serde(default)]
    pub news: NewsInsights,
    #[serde(default)]
    pub page_analyses: Vec<PageAnalysis>,
    #[serde(default)]
    pub linkedin_profiles: Vec<LinkedInProfile>,
    #[serde(default)]
    pub linkedin_companies: Vec<LinkedInCompany>,
    #[serde(default)]
    pub gp_profiles: Vec<LinkedInProfile>,
}

impl KnowledgeBase {
    pub fn new(target: FirmRecord) -> Self {
        Self {
            target,
            discovery: DiscoveryResult::default(),
            news: NewsInsights::default(),
            page_analyses: Vec::new(),
            linkedin_profiles: Vec::new(),
            linkedin_companies: Vec::new(),
            gp_profiles: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Page records
// ---------------------------------------------------------------------------

/// Index entry written to `pages.json` for every stored page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_id: String,
    pub url: String,
    pub title: String,
    pub status_code: u16,
    /// SHA-256 of the raw HTML.
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firm_record_uses_registry_keys() {
        let json = r#"{
            "Name": "Acme Ventures Fund",
            "Registration No.": "IN/AIF2/20-21/0001",
            "Contact Person": "Asha Rao",
            "E-mail": "asha@acmevc.in",
            "Address": "Mumbai",
            "Validity": "Permanent",
            "Category": "II"
        }"#;
        let record: FirmRecord = serde_json::from_str(json).expect("parse");
        assert_eq!(record.name, "Acme Ventures Fund");
        assert_eq!(record.contact_or_na(), "Asha Rao");
        assert_eq!(record.email_domain(), Some("acmevc.in"));
        assert_eq!(record.extra.get("Category"), Some(&Value::from("II")));

        let back = serde_json::to_value(&record).expect("serialize");
        assert_eq!(back["Registration No."], "IN/AIF2/20-21/0001");
        assert_eq!(back["Category"], "II");
    }

    #[test]
    fn firm_record_name_only() {
        let record: FirmRecord = serde_json::from_str(r#"{"Name": "Solo"}"#).expect("parse");
        assert_eq!(record.contact_or_na(), "N/A");
        assert_eq!(record.registration_or_na(), "N/A");
        assert_eq!(record.email_domain(), None);
    }

    #[test]
    fn unknown_fact_category_maps_to_other() {
        let fact: PageFact =
            serde_json::from_str(r#"{"category": "rumour", "fact": "x", "confidence": 10}"#)
                .expect("parse");
        assert_eq!(fact.category, FactCategory::Other);
    }

    #[test]
    fn model_scores_are_rounded_and_clamped() {
        let importance = |raw: &str| {
            serde_json::from_str::<DiscoveredUrl>(&format!(
                r#"{{"url": "https://a.vc", "importance": {raw}}}"#
            ))
            .expect("parse")
            .importance
        };
        assert_eq!(importance("300"), 100);
        assert_eq!(importance("-5"), 0);
        assert_eq!(importance("87.5"), 88);
        assert_eq!(importance(r#""high""#), 0);
        assert_eq!(importance(r#""72""#), 72);
        assert_eq!(importance("null"), 0);

        let link: PrioritizedLink = serde_json::from_str(
            r#"{"url": "https://www.linkedin.com/in/a", "importance": 140.2, "category": "linkedin_gp"}"#,
        )
        .expect("parse");
        assert_eq!(link.importance, 100);

        let fact: PageFact =
            serde_json::from_str(r#"{"category": "team_member", "fact": "x", "confidence": -3}"#)
                .expect("parse");
        assert_eq!(fact.confidence, 0);
    }

    #[test]
    fn report_defaults_missing_fields() {
        let report: FirmReport =
            serde_json::from_str(r#"{"firm_name": "Acme", "gps": [{"name": "A B"}]}"#)
                .expect("parse");
        assert_eq!(report.team_size, NOT_AVAILABLE);
        assert!(report.portfolio_companies.is_empty());
        assert_eq!(report.gps[0].background, "");
    }

    #[test]
    fn gp_backgrounds_rendering() {
        let mut report = FirmReport::empty("Acme");
        report.gps = vec![
            GpEntry {
                name: "Asha Rao, Managing Partner".into(),
                background: "Ex-Sequoia.".into(),
            },
            GpEntry {
                name: "Vikram Shah".into(),
                background: String::new(),
            },
        ];
        assert_eq!(
            report.gp_backgrounds_from_gps(),
            "Asha Rao, Managing Partner: Ex-Sequoia. | Vikram Shah"
        );
    }

    #[test]
    fn linkedin_profile_uses_camel_case_keys() {
        let profile = LinkedInProfile {
            name: Some("Asha Rao".into()),
            profile_picture: Some("https://img".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(json["profilePicture"], "https://img");
        assert!(json.get("contactInfo").is_some());
    }
}
