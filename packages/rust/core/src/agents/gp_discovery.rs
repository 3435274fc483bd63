//! General Partner name discovery from data already collected.
//!
//! No model calls: names come from the registry contact person, team facts
//! and LinkedIn headlines.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use vcdossier_shared::{FactCategory, FirmRecord, LinkedInProfile, PageAnalysis};

/// Capitalised two- or three-word runs that look like a person's name.
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,2})\b").expect("valid regex")
});

/// Titles the name pattern also matches.
const TITLE_PHRASES: &[&str] = &[
    "Managing Partner",
    "General Partner",
    "Founding Partner",
    "Venture Partner",
    "Managing Director",
    "Executive Director",
    "Investment Director",
    "Chief Executive Officer",
    "Chief Investment Officer",
    "Vice President",
];

/// Headline fragments that mark a partner-level profile.
const PARTNER_MARKERS: &[&str] = &[
    "partner",
    " gp",
    "general partner",
    "managing director",
    "founder",
];

const MIN_NAME_CHARS: usize = 3;
const MAX_NAME_CHARS: usize = 100;

/// First capitalised name in `fact` that is not a job title.
pub fn extract_name_from_fact(fact: &str) -> Option<String> {
    NAME_RE
        .captures_iter(fact)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|candidate| !TITLE_PHRASES.contains(candidate))
        .map(String::from)
}

fn is_partner_headline(headline: &str) -> bool {
    let lower = headline.to_lowercase();
    PARTNER_MARKERS.iter().any(|m| lower.contains(m))
}

/// Candidate GP names in discovery order, unique case-insensitively.
pub fn discover_gps(
    record: &FirmRecord,
    analyses: &[PageAnalysis],
    profiles: &[LinkedInProfile],
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim();
        if !name.is_empty() && seen.insert(name.to_lowercase()) {
            names.push(name.to_string());
        }
    };

    if let Some(contact) = record.contact_person.as_deref() {
        push(contact);
    }

    let mut from_facts = 0usize;
    for fact in analyses
        .iter()
        .flat_map(|a| a.facts.iter())
        .filter(|f| f.category == FactCategory::TeamMember)
    {
        if let Some(name) = extract_name_from_fact(&fact.fact) {
            push(&name);
            from_facts += 1;
        }
    }

    let mut from_linkedin = 0usize;
    for profile in profiles {
        let (Some(name), Some(headline)) = (profile.name.as_deref(), profile.headline.as_deref())
        else {
            continue;
        };
        if is_partner_headline(headline) {
            push(name);
            from_linkedin += 1;
        }
    }

    info!(
        total = names.len(),
        from_facts,
        from_linkedin,
        "GP names discovered"
    );
    names
}

/// Keep names of 3-100 characters that contain at least one ASCII letter.
pub fn validate_gp_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| {
            let len = n.chars().count();
            (MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len)
                && n.chars().any(|c| c.is_ascii_alphabetic())
        })
        .collect()
}

/// Drop names that already match a scraped profile (case-insensitive).
pub fn exclude_known_profiles(names: Vec<String>, profiles: &[LinkedInProfile]) -> Vec<String> {
    let known: HashSet<String> = profiles
        .iter()
        .filter_map(|p| p.name.as_deref())
        .map(|n| n.trim().to_lowercase())
        .collect();

    let (keep, skipped): (Vec<String>, Vec<String>) = names
        .into_iter()
        .partition(|n| !known.contains(&n.to_lowercase()));
    if !skipped.is_empty() {
        debug!(skipped = ?skipped, "GPs already covered by scraped profiles");
    }
    keep
}
