use crate::types::SearchResult;
use chrono::Local;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::error;

/// The two append-only hit logs.
#[derive(Debug, Clone)]
pub struct HitLog {
    minimal: PathBuf,
    verbose: PathBuf,
}

impl HitLog {
    pub fn new(minimal: impl Into<PathBuf>, verbose: impl Into<PathBuf>) -> Self {
        Self {
            minimal: minimal.into(),
            verbose: verbose.into(),
        }
    }

    pub fn minimal_path(&self) -> &Path {
        &self.minimal
    }

    pub fn verbose_path(&self) -> &Path {
        &self.verbose
    }

    /// Ensures both logs exist, truncating them when `reset` is set.
    pub async fn prepare(&self, reset: bool) -> std::io::Result<()> {
        for path in [&self.minimal, &self.verbose] {
            OpenOptions::new()
                .create(true)
                .write(true)
                .append(!reset)
                .truncate(reset)
                .open(path)
                .await?;
        }
        Ok(())
    }

    /// Appends a hit to both logs. Returns whether `result` was a hit.
    ///
    /// Each write is attempted independently; failures go to the error log only.
    pub async fn record(&self, query: &str, result: &SearchResult, source_url: &str) -> bool {
        if !result.is_hit() {
            return false;
        }

        let block = verbose_block(query, result);
        if let Err(e) = append(&self.verbose, &block).await {
            error!("Failed to write verbose hit log {}: {}", self.verbose.display(), e);
        }
        if let Err(e) = append(&self.minimal, &format!("{}\n", source_url)).await {
            error!("Failed to write hit log {}: {}", self.minimal.display(), e);
        }
        true
    }
}

fn verbose_block(query: &str, result: &SearchResult) -> String {
    let mut block = String::new();
    let _ = write!(block, "\n=== HIT ===\nQuery: {}\nResults: {}\n", query, result.total_count);
    for item in &result.items {
        let _ = writeln!(block, "- {}", item.url);
    }
    let _ = writeln!(block, "Time: {}", Local::now().format("%Y-%m-%d %H:%M:%S%.6f"));
    block
}

async fn append(path: &Path, text: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await
}
