use crate::error::ScanError;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Ordered, never-empty set of credentials with a wrapping cursor.
///
/// Credentials are never dropped from the pool: running through all of them is one
/// rotation cycle. Bounding how often callers rotate is up to them.
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    active: AtomicUsize,
}

impl CredentialPool {
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self, ScanError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let credentials: Vec<Credential> = tokens
            .into_iter()
            .map(|t| {
                let t: String = t.into();
                t.trim().to_string()
            })
            .filter(|t| !t.is_empty())
            .map(Credential)
            .collect();
        if credentials.is_empty() {
            return Err(ScanError::Config("no credentials supplied".into()));
        }
        Ok(Self {
            credentials,
            active: AtomicUsize::new(0),
        })
    }

    /// Reads one token per line, ignoring blank lines.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("token file {} not readable: {}", path.display(), e)))?;
        let pool = Self::from_tokens(content.lines())
            .map_err(|_| ScanError::Config(format!("no valid tokens found in {}", path.display())))?;
        info!("Loaded {} credentials from {}", pool.len(), path.display());
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> &Credential {
        &self.credentials[self.active_index()]
    }

    pub fn rotate(&self) -> &Credential {
        let len = self.credentials.len();
        let previous = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        let next = (previous + 1) % len;
        warn!("Rotating to credential {}/{}", next + 1, len);
        &self.credentials[next]
    }
}
