//! Shared types, error model, and configuration for vcdossier.
//!
//! This crate is the foundation depended on by all other vcdossier crates.
//! It provides:
//! - [`DossierError`]: the unified error type
//! - Domain types ([`FirmRecord`], [`PageAnalysis`], [`FirmReport`], ...)
//! - Configuration ([`AppConfig`], config loading)
//! - Prompt text helpers and the [`RetryPolicy`] used for external calls

pub mod config;
pub mod error;
pub mod retry;
pub mod text;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ApifyConfig, BrightDataConfig, DefaultsConfig, FetchEngine, GeminiConfig,
    LinkedInConfig, LinkedInVendor, PipelineSettings, ScrapeSettings, SearchConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, read_secret, validate_api_key,
};
pub use error::{DossierError, Result};
pub use retry::RetryPolicy;
pub use types::{
    ContactInfo, DiscoveredUrl, DiscoveryResult, ExtractedLink, FactCategory, FirmRecord,
    FirmReport, GpEntry, KnowledgeBase, LinkCategory, LinkedInCompany, LinkedInLink,
    LinkedInProfile, NOT_AVAILABLE, NewsInsights, PageAnalysis, PageFact, PageRecord, PageType,
    PrioritizedLink, lenient_score,
};
