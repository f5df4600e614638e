use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// 401 from the API; recovered by rotating to the next credential.
    #[error("credential rejected (HTTP 401)")]
    Auth,

    /// 403 from the API; recovered by waiting out `retry_after`.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Connect, DNS, or timeout failure.
    #[error("network error: {0}")]
    Network(String),

    /// Any other request-level failure, including unparseable bodies.
    #[error("request failed: {0}")]
    Transient(String),

    #[error("giving up on '{query}' after {attempts} attempts: {last_error}")]
    QueryExhausted {
        query: String,
        attempts: u32,
        #[source]
        last_error: Box<ScanError>,
    },

    #[error("failed to archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ScanError {
    pub fn is_network(&self) -> bool {
        matches!(self, ScanError::Network(_))
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            ScanError::Network(e.to_string())
        } else {
            ScanError::Transient(e.to_string())
        }
    }
}
