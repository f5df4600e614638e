use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::hits::HitLog;
use crate::queries;
use crate::rate::RateGovernor;
use crate::search::SearchExecutor;
use crate::AppState;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Cooperative stop flag, checked at query boundaries.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    inner: Arc<InterruptInner>,
}

#[derive(Debug, Default)]
struct InterruptInner {
    raised: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless interrupted first. Returns `false` if interrupted.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_triggered() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = &mut notified => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Every query was attempted.
    Completed { queries: usize, hits: usize, failed: usize },
    /// Stopped by the user after `attempted` queries; the file stays pending.
    Interrupted { attempted: usize, hits: usize },
    /// The file could not be read; it stays pending.
    Unreadable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_found: usize,
    pub archived: Vec<PathBuf>,
    pub hits: usize,
    pub failed_queries: usize,
    pub interrupted: bool,
}

/// Walks the pending job files one at a time and archives each fully processed file.
#[derive(Debug)]
pub struct JobRunner {
    config: ScanConfig,
    governor: RateGovernor,
    executor: SearchExecutor,
    hits: HitLog,
    interrupt: Interrupt,
}

impl JobRunner {
    pub fn new(config: ScanConfig, state: Arc<AppState>, interrupt: Interrupt) -> Self {
        let governor = RateGovernor::new(state.clone(), &config.rate_limit_path, config.rate.clone());
        let executor = SearchExecutor::new(state, &config.search_path, config.retry.clone());
        let hits = HitLog::new(config.minimal_log_path(), config.verbose_log_path());
        Self {
            config,
            governor,
            executor,
            hits,
            interrupt,
        }
    }

    /// Creates the archive directory and the hit logs.
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.config.processed_path()).await?;
        self.hits.prepare(self.config.reset_logs).await
    }

    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        self.prepare().await?;

        let files = queries::list_job_files(&self.config).await?;
        info!("Found {} files to process", files.len());

        let mut summary = RunSummary {
            files_found: files.len(),
            ..RunSummary::default()
        };

        for path in files {
            if self.interrupt.is_triggered() {
                summary.interrupted = true;
                warn!("Stopping processing (user interrupt)");
                break;
            }
            match self.process_file(&path).await {
                FileOutcome::Completed { hits, failed, .. } => {
                    summary.hits += hits;
                    summary.failed_queries += failed;
                    match self.archive(&path).await {
                        Ok(dest) => summary.archived.push(dest),
                        Err(e) => error!("{}", e),
                    }
                }
                FileOutcome::Interrupted { hits, .. } => {
                    summary.hits += hits;
                    summary.interrupted = true;
                    warn!("Stopping processing (user interrupt)");
                    break;
                }
                FileOutcome::Unreadable => {}
            }
        }

        info!(
            "Scan complete: {} hits, {} failed queries, {}/{} files archived",
            summary.hits,
            summary.failed_queries,
            summary.archived.len(),
            summary.files_found
        );
        Ok(summary)
    }

    pub async fn process_file(&self, path: &Path) -> FileOutcome {
        info!("Processing file: {}", path.display());
        let jobs = match queries::load_queries(path, &self.config.url_prefix).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return FileOutcome::Unreadable;
            }
        };
        info!("Found {} search queries in this file", jobs.len());

        let mut hits = 0;
        let mut failed = 0;
        for (attempted, job) in jobs.iter().enumerate() {
            if self.interrupt.is_triggered() {
                warn!("Processing of {} interrupted by user", path.display());
                return FileOutcome::Interrupted { attempted, hits };
            }

            let rate = self.governor.check().await;
            if let Some(pause) = self.governor.pause_for(&rate) {
                warn!("Approaching rate limit. Sleeping {:.1}s...", pause.as_secs_f64());
                if !self.interrupt.sleep(pause).await {
                    return FileOutcome::Interrupted { attempted, hits };
                }
            }

            info!("Executing: {}", job.query);
            match self.executor.search(&job.query).await {
                Ok(result) => {
                    if self.hits.record(&job.query, &result, &job.source_url).await {
                        info!("Found {} results!", result.total_count);
                        hits += 1;
                    } else {
                        info!("No results.");
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!("{}", e);
                }
            }

            if !self.interrupt.sleep(self.config.query_delay).await {
                warn!("Processing of {} interrupted by user", path.display());
                return FileOutcome::Interrupted { attempted: attempted + 1, hits };
            }
        }

        if self.interrupt.is_triggered() {
            warn!("Processing of {} interrupted by user", path.display());
            return FileOutcome::Interrupted { attempted: jobs.len(), hits };
        }

        FileOutcome::Completed {
            queries: jobs.len(),
            hits,
            failed,
        }
    }

    /// Moves a finished job file into the processed directory under its own name.
    /// An existing file of that name is left alone and reported as an error.
    pub async fn archive(&self, path: &Path) -> Result<PathBuf, ScanError> {
        let archive_err = |source: std::io::Error| ScanError::Archive {
            path: path.to_path_buf(),
            source,
        };
        let name = path.file_name().ok_or_else(|| {
            archive_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"))
        })?;
        let dest = self.config.processed_path().join(name);

        if tokio::fs::try_exists(&dest).await.map_err(archive_err)? {
            return Err(archive_err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", dest.display()),
            )));
        }
        tokio::fs::rename(path, &dest).await.map_err(archive_err)?;
        info!("Moved {} to {}", path.display(), self.config.processed_path().display());
        Ok(dest)
    }
}
