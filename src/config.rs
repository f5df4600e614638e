use crate::error::ScanError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_URL_PREFIX: &str = "https://github.com/search?q=";
pub const DEFAULT_TOKEN_FILE: &str = "_github_token.txt";
pub const DEFAULT_HITS_MINIMAL: &str = "_hits.txt";
pub const DEFAULT_HITS_VERBOSE: &str = "_hits_verbose.txt";
pub const DEFAULT_PROCESSED_DIR: &str = "processed";
pub const MAX_ATTEMPTS: u32 = 3;

/// Retry and backoff parameters for the search executor.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Multiplier on `base_delay` for connect/DNS/timeout failures.
    pub network_factor: u32,
    /// Used when a 403 arrives without a usable Retry-After header.
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_secs(2),
            network_factor: 30,
            default_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// How long to wait after `error` on the zero-based `attempt` before trying again.
    pub fn delay_for(&self, error: &ScanError, attempt: u32) -> Duration {
        let step = attempt + 1;
        match error {
            ScanError::Auth => Duration::ZERO,
            ScanError::RateLimited { retry_after } => *retry_after,
            ScanError::Network(_) => self.base_delay * self.network_factor * step,
            _ => self.base_delay * step,
        }
    }
}

/// Pause policy applied between queries based on the remaining search quota.
#[derive(Debug, Clone)]
pub struct RatePolicy {
    /// Pause once `remaining` drops to this value or below.
    pub low_watermark: u64,
    /// Added on top of the reset time to absorb clock skew.
    pub reset_buffer: Duration,
    /// Reset horizon assumed when the quota probe itself fails.
    pub probe_fallback: Duration,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            low_watermark: 1,
            reset_buffer: Duration::from_secs(5),
            probe_fallback: Duration::from_secs(60),
        }
    }
}

impl RatePolicy {
    pub fn pause_for(&self, remaining: u64, reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        if remaining > self.low_watermark {
            return None;
        }
        let until_reset = (reset_at - now).to_std().unwrap_or(Duration::ZERO);
        Some(until_reset + self.reset_buffer)
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub work_dir: PathBuf,
    pub token_file: String,
    pub hits_minimal: String,
    pub hits_verbose: String,
    pub processed_dir: String,
    pub url_prefix: String,
    pub api_url: String,
    pub search_path: String,
    pub rate_limit_path: String,
    pub request_timeout: Duration,
    pub query_delay: Duration,
    pub reset_logs: bool,
    pub retry: RetryPolicy,
    pub rate: RatePolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            token_file: DEFAULT_TOKEN_FILE.to_string(),
            hits_minimal: DEFAULT_HITS_MINIMAL.to_string(),
            hits_verbose: DEFAULT_HITS_VERBOSE.to_string(),
            processed_dir: DEFAULT_PROCESSED_DIR.to_string(),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            search_path: "/search/code".to_string(),
            rate_limit_path: "/rate_limit".to_string(),
            request_timeout: Duration::from_secs(10),
            query_delay: Duration::from_secs(2),
            reset_logs: false,
            retry: RetryPolicy::default(),
            rate: RatePolicy::default(),
        }
    }
}

impl ScanConfig {
    /// A config rooted at `work_dir` with every delay set to zero.
    pub fn without_delays(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            query_delay: Duration::ZERO,
            retry: RetryPolicy {
                base_delay: Duration::ZERO,
                default_retry_after: Duration::ZERO,
                ..RetryPolicy::default()
            },
            rate: RatePolicy {
                reset_buffer: Duration::ZERO,
                probe_fallback: Duration::ZERO,
                ..RatePolicy::default()
            },
            ..Self::default()
        }
    }

    pub fn token_path(&self) -> PathBuf {
        self.work_dir.join(&self.token_file)
    }

    pub fn minimal_log_path(&self) -> PathBuf {
        self.work_dir.join(&self.hits_minimal)
    }

    pub fn verbose_log_path(&self) -> PathBuf {
        self.work_dir.join(&self.hits_verbose)
    }

    pub fn processed_path(&self) -> PathBuf {
        self.work_dir.join(&self.processed_dir)
    }

    /// Control files that live next to the job files but are never jobs themselves.
    pub fn is_control_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| name == self.token_file || name == self.hits_minimal || name == self.hits_verbose)
            .unwrap_or(false)
    }
}
