use crate::config::RatePolicy;
use crate::error::ScanError;
use crate::types::*;
use crate::AppState;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Probes the remaining search quota of the active credential.
#[derive(Debug, Clone)]
pub struct RateGovernor {
    state: Arc<AppState>,
    url: String,
    policy: RatePolicy,
}

impl RateGovernor {
    pub fn new(state: Arc<AppState>, rate_limit_path: &str, policy: RatePolicy) -> Self {
        let url = state.endpoint(rate_limit_path);
        Self { state, url, policy }
    }

    /// Current quota. A rejected credential is rotated and the probe repeated, at most
    /// once per credential; any other failure yields the conservative fallback.
    pub async fn check(&self) -> RateState {
        let pool = &self.state.credentials;
        for _ in 0..pool.len() {
            match self.probe().await {
                Ok(rate) => {
                    debug!("Search quota: {} remaining, resets at {}", rate.remaining, rate.reset_at);
                    return rate;
                }
                Err(ScanError::Auth) => {
                    warn!("Credential rejected while checking rate limit");
                    pool.rotate();
                }
                Err(e) => {
                    warn!("Rate limit check failed: {}", e);
                    return self.fallback();
                }
            }
        }
        warn!("All {} credentials rejected by the rate limit probe", pool.len());
        self.fallback()
    }

    /// How long to wait before the next search, if at all.
    pub fn pause_for(&self, rate: &RateState) -> Option<Duration> {
        self.policy.pause_for(rate.remaining, rate.reset_at, Utc::now())
    }

    async fn probe(&self) -> Result<RateState, ScanError> {
        let resp = self.state.authorized_get(&self.url).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ScanError::Auth);
        }
        if !status.is_success() {
            return Err(ScanError::Transient(format!("rate limit endpoint returned {}", status)));
        }
        let body: RateLimitResponse = resp
            .json()
            .await
            .map_err(|e| ScanError::Transient(format!("unreadable rate limit response: {}", e)))?;
        let search = body.resources.search;
        let reset_at = Utc
            .timestamp_opt(search.reset, 0)
            .single()
            .ok_or_else(|| ScanError::Transient(format!("invalid reset timestamp {}", search.reset)))?;
        Ok(RateState {
            remaining: search.remaining,
            reset_at,
        })
    }

    fn fallback(&self) -> RateState {
        let horizon = chrono::Duration::from_std(self.policy.probe_fallback)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        RateState {
            remaining: 0,
            reset_at: Utc::now() + horizon,
        }
    }
}
