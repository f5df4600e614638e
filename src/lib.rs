pub mod config;
pub mod credentials;
pub mod error;
pub mod hits;
pub mod jobs;
pub mod queries;
pub mod rate;
pub mod search;
pub mod types;

use std::sync::Arc;

pub use config::{RatePolicy, RetryPolicy, ScanConfig};
pub use credentials::{Credential, CredentialPool};
pub use error::ScanError;
pub use types::*;

const USER_AGENT: &str = concat!("dork-scanner/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github.v3+json";

/// Shared handles used by the rate governor and the search executor.
#[derive(Clone, Debug)]
pub struct AppState {
    pub api_url: String,
    pub http_client: reqwest::Client,
    pub credentials: Arc<CredentialPool>,
}

impl AppState {
    pub fn new(config: &ScanConfig, credentials: CredentialPool) -> Result<Self, ScanError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScanError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            http_client,
            credentials: Arc::new(credentials),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// GET request authenticated with the currently active credential.
    pub(crate) fn authorized_get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .get(url)
            .bearer_auth(self.credentials.current().token())
            .header("Accept", ACCEPT)
    }
}
