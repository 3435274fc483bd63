//! Web search for vcdossier.
//!
//! This crate provides:
//! - [`WebSearch`]: the search seam used by agents
//! - [`GoogleSearchClient`]: Google Programmable Search (Custom Search JSON API)
//! - [`find_homepage`]: official-site lookup for a registry record

mod google;
mod homepage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vcdossier_shared::Result;

pub use google::GoogleSearchClient;
pub use homepage::{find_homepage, homepage_queries};

/// One organic search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// A web search backend.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Run `query` and return at most `num` results. No hits is `Ok(vec![])`.
    async fn search(&self, query: &str, num: u32) -> Result<Vec<SearchResult>>;
}
