//! GP background enhancement from enriched LinkedIn profiles.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use vcdossier_llm::{LanguageModel, generate_structured};
use vcdossier_shared::{DossierError, FirmReport, GpEntry, LinkedInProfile, Result};

#[derive(Debug, Deserialize)]
struct Enhancement {
    #[serde(default)]
    gps: Vec<GpEntry>,
    #[serde(default)]
    gp_backgrounds: String,
    #[serde(default)]
    team_size: String,
}

fn to_prompt_json(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| DossierError::parse(format!("failed to serialize prompt data: {e}")))
}

/// Profile JSON for the prompt, without the vendor record.
fn profile_json(profiles: &[LinkedInProfile]) -> Result<String> {
    let mut values = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let mut value = serde_json::to_value(profile)
            .map_err(|e| DossierError::parse(format!("failed to serialize profile: {e}")))?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("raw");
        }
        values.push(value);
    }
    to_prompt_json(&values)
}

fn build_prompt(report_json: &str, profiles_json: &str) -> String {
    format!(
        r#"You are re-synthesizing a VC firm intelligence report with newly acquired GP LinkedIn profile data.

EXISTING REPORT (baseline):
{report_json}

NEW GP LINKEDIN PROFILES (JSON):
{profiles_json}

TASK:
Rewrite only the General Partner information:
- gps: each GP's name with the title from their LinkedIn headline (e.g. "Asha Rao, Managing Partner") and a detailed 3-5 sentence background drawn from experience, education, skills and about.
- gp_backgrounds: the same backgrounds as one text.
- team_size: update only if the profiles make it clearer; otherwise repeat the existing value.

If a GP in the report has no matching profile, keep their existing background. Do not invent facts."#
    )
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "gps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Full name and title" },
                        "background": { "type": "string", "description": "3-5 sentence background" }
                    },
                    "required": ["name", "background"]
                }
            },
            "gp_backgrounds": { "type": "string" },
            "team_size": { "type": "string" }
        },
        "required": ["gps", "gp_backgrounds", "team_size"]
    })
}

/// Rewrite GP names, backgrounds and team size from `gp_profiles`, keeping
/// every other report field. Returns `report` unchanged when there are no
/// profiles.
#[instrument(skip_all, fields(firm = %report.firm_name, profiles = gp_profiles.len()))]
pub async fn enhance_gp_backgrounds(
    model: &dyn LanguageModel,
    report: FirmReport,
    gp_profiles: &[LinkedInProfile],
) -> Result<FirmReport> {
    if gp_profiles.is_empty() {
        return Ok(report);
    }

    let report_json = to_prompt_json(&report)?;
    let prompt = build_prompt(&report_json, &profile_json(gp_profiles)?);
    let enhancement: Enhancement = generate_structured(model, &prompt, &schema()).await?;

    let mut enhanced = report;
    if !enhancement.gps.is_empty() {
        enhanced.gps = enhancement.gps;
    }
    if !enhancement.team_size.trim().is_empty() {
        enhanced.team_size = enhancement.team_size;
    }
    enhanced.gp_backgrounds = if enhancement.gp_backgrounds.trim().is_empty() {
        enhanced.gp_backgrounds_from_gps()
    } else {
        enhancement.gp_backgrounds
    };

    info!(gps = enhanced.gps.len(), "GP backgrounds enhanced");
    Ok(enhanced)
}
