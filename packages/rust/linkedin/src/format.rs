//! Vendor records → [`LinkedInProfile`] / [`LinkedInCompany`].
//!
//! Each vendor names the same attribute differently; the first non-empty
//! key in each fallback list wins. The raw record is kept alongside.

use serde_json::Value;

use vcdossier_shared::{ContactInfo, LinkedInCompany, LinkedInProfile};

/// First key holding a non-empty string (numbers are stringified).
fn first_str(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First key holding anything other than null / empty string.
fn first_value(record: &Value, keys: &[&str]) -> Option<Value> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        v => Some(v.clone()),
    })
}

/// First key holding an array.
fn first_array(record: &Value, keys: &[&str]) -> Vec<Value> {
    keys.iter()
        .find_map(|key| record.get(*key)?.as_array().cloned())
        .unwrap_or_default()
}

/// Strings from an array, or a comma-separated string.
fn string_list(record: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        match record.get(*key) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.trim().to_string()),
                        Value::Object(_) => first_str(v, &["url", "link", "name"]),
                        _ => None,
                    })
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return s
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}

// ---------------------------------------------------------------------------
// Bright Data
// ---------------------------------------------------------------------------

pub fn profile_from_bright_data(record: Value) -> LinkedInProfile {
    LinkedInProfile {
        url: first_str(&record, &["url", "input_url", "linkedInUrl"]),
        name: first_str(&record, &["name", "fullName"]),
        headline: first_str(&record, &["headline", "position"]),
        location: first_str(&record, &["location", "city"]),
        about: first_str(&record, &["about"]),
        experience: first_array(&record, &["experience"]),
        education: first_array(&record, &["education"]),
        skills: first_array(&record, &["skills"]),
        connections: first_value(&record, &["connections"]),
        followers: first_value(&record, &["followers"]),
        profile_picture: first_str(&record, &["avatar", "profilePicture", "photoUrl"]),
        contact_info: ContactInfo {
            email: first_str(&record, &["email"]),
            phone: first_str(&record, &["phone"]),
            twitter: first_str(&record, &["twitter"]),
            websites: string_list(&record, &["websites", "bio_links"]),
        },
        raw: record,
    }
}

pub fn company_from_bright_data(record: Value) -> LinkedInCompany {
    LinkedInCompany {
        url: first_str(&record, &["url", "linkedin_url"]),
        name: first_str(&record, &["name", "company_name"]),
        description: first_str(&record, &["description", "about"]),
        website: first_str(&record, &["website", "company_website"]),
        industry: first_str(&record, &["industry", "industries"]),
        company_size: first_value(&record, &["company_size", "employees_count"]),
        headquarters: first_str(&record, &["headquarters", "location"]),
        founded: first_value(&record, &["founded", "founded_year"]),
        specialties: string_list(&record, &["specialties"]),
        followers: first_value(&record, &["followers", "followers_count"]),
        logo: first_str(&record, &["logo", "profile_photo"]),
        raw: record,
    }
}

// ---------------------------------------------------------------------------
// Apify
// ---------------------------------------------------------------------------

pub fn profile_from_apify(record: Value) -> LinkedInProfile {
    LinkedInProfile {
        url: first_str(&record, &["url", "linkedInUrl", "inputUrl"]),
        name: first_str(&record, &["fullName", "name"]).or_else(|| {
            let first = first_str(&record, &["firstName"])?;
            Some(match first_str(&record, &["lastName"]) {
                Some(last) => format!("{first} {last}"),
                None => first,
            })
        }),
        headline: first_str(&record, &["headline"]),
        location: first_str(&record, &["location", "geoLocationName"]),
        about: first_str(&record, &["about", "summary"]),
        experience: first_array(&record, &["experience", "positions"]),
        education: first_array(&record, &["education", "educations"]),
        skills: first_array(&record, &["skills"]),
        connections: first_value(&record, &["connectionsCount", "connections"]),
        followers: first_value(&record, &["followersCount", "followers"]),
        profile_picture: first_str(&record, &["profilePicture", "photoUrl", "pictureUrl"]),
        contact_info: ContactInfo {
            email: first_str(&record, &["email"]),
            phone: first_str(&record, &["phone"]),
            twitter: first_str(&record, &["twitter"]),
            websites: string_list(&record, &["websites"]),
        },
        raw: record,
    }
}

pub fn company_from_apify(record: Value) -> LinkedInCompany {
    LinkedInCompany {
        url: first_str(&record, &["url", "linkedinUrl", "inputUrl"]),
        name: first_str(&record, &["name", "companyName"]),
        description: first_str(&record, &["description", "about", "tagline"]),
        website: first_str(&record, &["website", "websiteUrl"]),
        industry: first_str(&record, &["industry", "industries"]),
        company_size: first_value(&record, &["employeeCount", "companySize", "staffCount"]),
        headquarters: first_str(&record, &["headquarters", "location"]),
        founded: first_value(&record, &["founded", "foundedOn"]),
        specialties: string_list(&record, &["specialties", "specialities"]),
        followers: first_value(&record, &["followerCount", "followers"]),
        logo: first_str(&record, &["logo", "logoUrl"]),
        raw: record,
    }
}
