use crate::config::RetryPolicy;
use crate::error::ScanError;
use crate::types::*;
use crate::AppState;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Runs one code search with bounded retries, rotating credentials on 401.
#[derive(Debug, Clone)]
pub struct SearchExecutor {
    state: Arc<AppState>,
    url: String,
    policy: RetryPolicy,
}

impl SearchExecutor {
    pub fn new(state: Arc<AppState>, search_path: &str, policy: RetryPolicy) -> Self {
        let url = state.endpoint(search_path);
        Self { state, url, policy }
    }

    /// Returns the normalized result, or `QueryExhausted` once `max_attempts` calls
    /// have failed. No sleep follows the final failed attempt.
    pub async fn search(&self, query: &str) -> Result<SearchResult, ScanError> {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;

        for attempt in 0..max_attempts {
            match self.attempt(query).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    let retry_follows = attempt + 1 < max_attempts;
                    let delay = self.recover(&err, attempt, query, retry_follows);
                    last_error = Some(err);
                    if retry_follows && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        error!("Max retries reached for: {}", query);
        Err(ScanError::QueryExhausted {
            query: query.to_string(),
            attempts: max_attempts,
            last_error: Box::new(
                last_error.unwrap_or_else(|| ScanError::Transient("no attempts were made".into())),
            ),
        })
    }

    async fn attempt(&self, query: &str) -> Result<SearchResult, ScanError> {
        debug!("GET {} q={}", self.url, query);
        let resp = self
            .state
            .authorized_get(&self.url)
            .query(&[("q", query)])
            .send()
            .await?;
        classify(resp, query, &self.policy).await
    }

    /// Applies the side effects of a failed attempt and returns the wait before the next.
    /// The wait is only announced when another attempt follows.
    fn recover(&self, err: &ScanError, attempt: u32, query: &str, retry_follows: bool) -> Duration {
        let delay = self.policy.delay_for(err, attempt);
        match err {
            ScanError::Auth => {
                warn!("Credential rejected while searching '{}'", query);
                self.state.credentials.rotate();
            }
            ScanError::RateLimited { .. } => {
                if retry_follows {
                    warn!("Rate limit triggered. Sleeping {}s...", delay.as_secs());
                } else {
                    warn!("Rate limit triggered on final attempt for '{}'", query);
                }
            }
            ScanError::Network(e) => {
                warn!("Network error searching '{}': {}", query, e);
                if retry_follows {
                    warn!("Waiting {}s before retry...", delay.as_secs());
                }
            }
            other => {
                warn!("Error searching '{}': {}", query, other);
            }
        }
        delay
    }
}

/// Maps a search response onto a result or one of the retryable error classes.
pub async fn classify(
    resp: reqwest::Response,
    query: &str,
    policy: &RetryPolicy,
) -> Result<SearchResult, ScanError> {
    let status = resp.status();
    match status {
        StatusCode::UNAUTHORIZED => return Err(ScanError::Auth),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = parse_retry_after(resp.headers()).unwrap_or(policy.default_retry_after);
            return Err(ScanError::RateLimited { retry_after });
        }
        s if !s.is_success() => {
            let text = resp.text().await.unwrap_or_default();
            return Err(ScanError::Transient(format!(
                "search failed with status {}: {}",
                s,
                text.chars().take(200).collect::<String>()
            )));
        }
        _ => {}
    }

    let body = resp.bytes().await?;
    let parsed: CodeSearchResponse = serde_json::from_slice(&body)
        .map_err(|e| ScanError::Transient(format!("failed to parse search response: {}", e)))?;
    Ok(parsed.into_result(query))
}

/// Retry-After in delta-seconds form.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
