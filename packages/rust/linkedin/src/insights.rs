//! Aggregate signals across a set of LinkedIn profiles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use vcdossier_shared::LinkedInProfile;

/// Skills kept in [`ProfileInsights::top_skills`].
const TOP_SKILLS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCount {
    pub skill: String,
    pub count: usize,
}

/// Employers, schools, locations and skills seen across profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInsights {
    pub total_profiles: usize,
    pub companies: Vec<String>,
    pub schools: Vec<String>,
    pub locations: Vec<String>,
    pub top_skills: Vec<SkillCount>,
    pub emails: Vec<String>,
    pub websites: Vec<String>,
}

fn field<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| entry.get(*k)?.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

pub fn extract_insights(profiles: &[LinkedInProfile]) -> ProfileInsights {
    let mut insights = ProfileInsights {
        total_profiles: profiles.len(),
        ..ProfileInsights::default()
    };
    let mut skill_counts: HashMap<String, usize> = HashMap::new();
    let mut skill_order: Vec<String> = Vec::new();

    for profile in profiles {
        if let Some(location) = profile.location.as_deref().filter(|l| !l.is_empty()) {
            push_unique(&mut insights.locations, location);
        }

        for exp in &profile.experience {
            if let Some(company) = field(exp, &["company", "companyName"]) {
                push_unique(&mut insights.companies, company);
            }
        }

        for edu in &profile.education {
            if let Some(school) = field(edu, &["school", "schoolName", "title"]) {
                push_unique(&mut insights.schools, school);
            }
        }

        for skill in &profile.skills {
            let name = match skill {
                Value::String(s) => Some(s.trim()),
                other => field(other, &["name"]),
            };
            let Some(name) = name.filter(|n| !n.is_empty()) else {
                continue;
            };
            let count = skill_counts.entry(name.to_string()).or_insert(0);
            if *count == 0 {
                skill_order.push(name.to_string());
            }
            *count += 1;
        }

        if let Some(email) = &profile.contact_info.email {
            insights.emails.push(email.clone());
        }
        insights
            .websites
            .extend(profile.contact_info.websites.iter().cloned());
    }

    // Stable sort keeps first-seen order among equal counts.
    let mut skills: Vec<SkillCount> = skill_order
        .into_iter()
        .map(|skill| {
            let count = skill_counts.get(&skill).copied().unwrap_or(0);
            SkillCount { skill, count }
        })
        .collect();
    skills.sort_by(|a, b| b.count.cmp(&a.count));
    skills.truncate(TOP_SKILLS);
    insights.top_skills = skills;

    insights
}
