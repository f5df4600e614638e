use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A decoded search query together with the job-file line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJob {
    pub query: String,
    /// The untouched search URL, written verbatim to the minimal hit log.
    pub source_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub url: String,
}

/// Normalized outcome of one successful search call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub query: String,
    pub total_count: u64,
    pub items: Vec<SearchItem>,
}

impl SearchResult {
    /// The API count is authoritative: a positive count is a hit even with no items.
    pub fn is_hit(&self) -> bool {
        self.total_count > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateState {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

// Remote API types

#[derive(Debug, Deserialize)]
pub struct CodeSearchResponse {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub items: Vec<CodeSearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct CodeSearchItem {
    pub html_url: String,
}

impl CodeSearchResponse {
    pub fn into_result(self, query: &str) -> SearchResult {
        SearchResult {
            query: query.to_string(),
            total_count: self.total_count.unwrap_or(0),
            items: self
                .items
                .into_iter()
                .map(|item| SearchItem { url: item.html_url })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitResources {
    pub search: RateLimitBucket,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitBucket {
    pub remaining: u64,
    /// Unix epoch seconds.
    pub reset: i64,
}
