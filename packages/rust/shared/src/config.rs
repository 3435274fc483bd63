//! Application configuration for vcdossier.
//!
//! User config lives at `~/.vcdossier/vcdossier.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file: each section names the env var
//! that holds its key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DossierError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "vcdossier.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".vcdossier";

/// Desktop Chrome user agent sent by both fetch engines.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ---------------------------------------------------------------------------
// Config structs (matching vcdossier.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Gemini generative API settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Google Custom Search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// LinkedIn data provider settings.
    #[serde(default)]
    pub linkedin: LinkedInConfig,

    /// Page scraping settings.
    #[serde(default)]
    pub scrape: ScrapeSettings,

    /// Pipeline thresholds and pacing.
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for firm data (`<data_dir>/firms/<slug>/`).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// JSON file holding the SEBI firm records.
    #[serde(default = "default_input_file")]
    pub input_file: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            input_file: default_input_file(),
        }
    }
}

fn default_data_dir() -> String {
    "./data".into()
}
fn default_input_file() -> String {
    "inputs.json".into()
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Model identifier.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API base URL (overridable for tests and proxies).
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Retries after the first attempt for rate-limit / overload failures.
    #[serde(default = "default_gemini_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,

    /// Where unparsable structured responses are dumped, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_dir: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            max_retries: default_gemini_retries(),
            initial_backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_secs: default_gemini_timeout(),
            debug_dir: None,
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash-preview-09-2025".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_gemini_retries() -> u32 {
    5
}
fn default_backoff_ms() -> u64 {
    2000
}
fn default_max_backoff_ms() -> u64 {
    60_000
}
fn default_gemini_timeout() -> u64 {
    180
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Env var holding the Custom Search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Env var holding the search engine id (`cx`).
    #[serde(default = "default_search_engine_env")]
    pub engine_id_env: String,

    /// Endpoint URL.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Country bias (`gl` parameter).
    #[serde(default = "default_country")]
    pub country: String,

    /// Results requested per query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            engine_id_env: default_search_engine_env(),
            base_url: default_search_base_url(),
            country: default_country(),
            results_per_query: default_results_per_query(),
        }
    }
}

fn default_search_key_env() -> String {
    "GOOGLE_SEARCH_API_KEY".into()
}
fn default_search_engine_env() -> String {
    "GOOGLE_SEARCH_ENGINE_ID".into()
}
fn default_search_base_url() -> String {
    "https://www.googleapis.com/customsearch/v1".into()
}
fn default_country() -> String {
    "in".into()
}
fn default_results_per_query() -> u32 {
    5
}

/// Which LinkedIn vendor to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkedInVendor {
    BrightData,
    Apify,
    None,
}

/// `[linkedin]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    /// Active provider.
    #[serde(default = "default_vendor")]
    pub provider: LinkedInVendor,

    /// Total attempts per scrape job (first try included).
    #[serde(default = "default_linkedin_attempts")]
    pub max_attempts: u32,

    /// First backoff delay between attempts; doubles each time.
    #[serde(default = "default_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Bright Data dataset API settings.
    #[serde(default)]
    pub bright_data: BrightDataConfig,

    /// Apify actor settings.
    #[serde(default)]
    pub apify: ApifyConfig,
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            provider: default_vendor(),
            max_attempts: default_linkedin_attempts(),
            initial_backoff_ms: default_backoff_ms(),
            bright_data: BrightDataConfig::default(),
            apify: ApifyConfig::default(),
        }
    }
}

fn default_vendor() -> LinkedInVendor {
    LinkedInVendor::BrightData
}
fn default_linkedin_attempts() -> u32 {
    3
}

/// `[linkedin.bright_data]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrightDataConfig {
    #[serde(default = "default_bright_data_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_bright_data_base_url")]
    pub base_url: String,

    /// Dataset id for LinkedIn people profiles.
    #[serde(default = "default_profile_dataset")]
    pub profile_dataset_id: String,

    /// Dataset id for LinkedIn company pages.
    #[serde(default = "default_company_dataset")]
    pub company_dataset_id: String,

    /// Delay between snapshot progress polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Give up on a snapshot after this long.
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

impl Default for BrightDataConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_bright_data_key_env(),
            base_url: default_bright_data_base_url(),
            profile_dataset_id: default_profile_dataset(),
            company_dataset_id: default_company_dataset(),
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

fn default_bright_data_key_env() -> String {
    "BRIGHT_DATA_API_KEY".into()
}
fn default_bright_data_base_url() -> String {
    "https://api.brightdata.com".into()
}
fn default_profile_dataset() -> String {
    "gd_l1viktl72bvl7bjuj0".into()
}
fn default_company_dataset() -> String {
    "gd_l1vikfnt1wgvvqz95w".into()
}
fn default_poll_interval() -> u64 {
    10
}
fn default_max_wait() -> u64 {
    600
}

/// `[linkedin.apify]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApifyConfig {
    #[serde(default = "default_apify_token_env")]
    pub token_env: String,

    #[serde(default = "default_apify_base_url")]
    pub base_url: String,

    /// Actor used for profile URLs.
    #[serde(default = "default_profile_actor")]
    pub profile_actor: String,

    /// Actor used for company URLs; company scraping is skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_actor: Option<String>,
}

impl Default for ApifyConfig {
    fn default() -> Self {
        Self {
            token_env: default_apify_token_env(),
            base_url: default_apify_base_url(),
            profile_actor: default_profile_actor(),
            company_actor: None,
        }
    }
}

fn default_apify_token_env() -> String {
    "APIFY_API_TOKEN".into()
}
fn default_apify_base_url() -> String {
    "https://api.apify.com".into()
}
fn default_profile_actor() -> String {
    "supreme_coder/linkedin-profile-scraper".into()
}

/// Page fetch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchEngine {
    /// Headless Chrome via the DevTools protocol.
    Browser,
    /// Plain HTTP GET.
    Http,
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSettings {
    #[serde(default = "default_engine")]
    pub engine: FetchEngine,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,

    /// Budget for the first navigation attempt.
    #[serde(default = "default_nav_timeout")]
    pub navigation_timeout_secs: u64,

    /// Budget for the retry after a navigation timeout.
    #[serde(default = "default_fallback_timeout")]
    pub fallback_timeout_secs: u64,

    /// Settle time after navigation before reading the DOM.
    #[serde(default = "default_render_wait")]
    pub render_wait_ms: u64,

    /// Pause after each "read more" / modal click.
    #[serde(default = "default_dialog_delay")]
    pub dialog_click_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Sleep between consecutive page fetches.
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,

    /// Cap on regular URLs scraped per firm.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            headless: true,
            chrome_path: None,
            navigation_timeout_secs: default_nav_timeout(),
            fallback_timeout_secs: default_fallback_timeout(),
            render_wait_ms: default_render_wait(),
            dialog_click_delay_ms: default_dialog_delay(),
            user_agent: default_user_agent(),
            page_delay_ms: default_page_delay(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_engine() -> FetchEngine {
    FetchEngine::Browser
}
fn default_true() -> bool {
    true
}
fn default_nav_timeout() -> u64 {
    60
}
fn default_fallback_timeout() -> u64 {
    30
}
fn default_render_wait() -> u64 {
    2000
}
fn default_dialog_delay() -> u64 {
    500
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_page_delay() -> u64 {
    1000
}
fn default_max_pages() -> usize {
    30
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// LinkedIn links scoring below this are not scraped.
    #[serde(default = "default_min_importance")]
    pub linkedin_min_importance: u8,

    /// LinkedIn links scored per model call.
    #[serde(default = "default_prioritize_batch")]
    pub prioritize_batch_size: usize,

    /// Sleep between prioritisation batches.
    #[serde(default = "default_backoff_ms")]
    pub batch_delay_ms: u64,

    /// Sleep between firms in a batch run.
    #[serde(default = "default_backoff_ms")]
    pub firm_delay_ms: u64,

    /// Sleep between per-GP profile searches.
    #[serde(default = "default_backoff_ms")]
    pub gp_search_delay_ms: u64,

    /// Re-synthesise GP backgrounds from enriched GP profiles.
    #[serde(default = "default_true")]
    pub enhance_gp_backgrounds: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            linkedin_min_importance: default_min_importance(),
            prioritize_batch_size: default_prioritize_batch(),
            batch_delay_ms: default_backoff_ms(),
            firm_delay_ms: default_backoff_ms(),
            gp_search_delay_ms: default_backoff_ms(),
            enhance_gp_backgrounds: true,
        }
    }
}

fn default_min_importance() -> u8 {
    60
}
fn default_prioritize_batch() -> usize {
    50
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Read a secret from the env var named in config. Empty values count as unset.
pub fn read_secret(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.vcdossier/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DossierError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.vcdossier/vcdossier.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DossierError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DossierError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DossierError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DossierError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DossierError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the Gemini API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.gemini.api_key_env;
    match read_secret(var_name) {
        Some(_) => Ok(()),
        None => Err(DossierError::config(format!(
            "Gemini API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://aistudio.google.com/apikey"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("GEMINI_API_KEY"));
        assert!(toml_str.contains("bright-data"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.gemini.max_retries, 5);
        assert_eq!(parsed.gemini.initial_backoff_ms, 2000);
        assert_eq!(parsed.pipeline.linkedin_min_importance, 60);
        assert_eq!(parsed.pipeline.prioritize_batch_size, 50);
        assert_eq!(parsed.linkedin.max_attempts, 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
data_dir = "/tmp/dossiers"

[linkedin]
provider = "apify"

[linkedin.apify]
company_actor = "acme/company-scraper"

[scrape]
engine = "http"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.data_dir, "/tmp/dossiers");
        assert_eq!(config.defaults.input_file, "inputs.json");
        assert_eq!(config.linkedin.provider, LinkedInVendor::Apify);
        assert_eq!(
            config.linkedin.apify.profile_actor,
            "supreme_coder/linkedin-profile-scraper"
        );
        assert_eq!(
            config.linkedin.apify.company_actor.as_deref(),
            Some("acme/company-scraper")
        );
        assert_eq!(config.scrape.engine, FetchEngine::Http);
        assert_eq!(config.scrape.navigation_timeout_secs, 60);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.gemini.api_key_env = "VCD_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
