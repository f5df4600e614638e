use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dork_scanner::config::*;
use dork_scanner::jobs::{Interrupt, JobRunner};
use dork_scanner::{AppState, CredentialPool};

/// Runs queued GitHub code-search dorks against the search API.
#[derive(Debug, Parser)]
#[command(name = "dork-scanner", version, about)]
struct Cli {
    /// Directory holding the job files, token file and hit logs
    #[arg(long, env = "DORK_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[arg(long, env = "DORK_TOKEN_FILE", default_value = DEFAULT_TOKEN_FILE)]
    token_file: String,

    #[arg(long, env = "DORK_HITS_FILE", default_value = DEFAULT_HITS_MINIMAL)]
    hits_file: String,

    #[arg(long, env = "DORK_HITS_VERBOSE_FILE", default_value = DEFAULT_HITS_VERBOSE)]
    hits_verbose_file: String,

    #[arg(long, env = "DORK_PROCESSED_DIR", default_value = DEFAULT_PROCESSED_DIR)]
    processed_dir: String,

    /// Only job-file lines starting with this prefix are searched
    #[arg(long, env = "DORK_URL_PREFIX", default_value = DEFAULT_URL_PREFIX)]
    url_prefix: String,

    /// Seconds to wait between queries
    #[arg(long, env = "DORK_QUERY_DELAY", default_value_t = 2)]
    query_delay: u64,

    /// Base backoff in seconds for failed searches
    #[arg(long, env = "DORK_BASE_DELAY", default_value_t = 2)]
    base_delay: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "DORK_REQUEST_TIMEOUT", default_value_t = 10)]
    request_timeout: u64,

    /// Truncate both hit logs before scanning
    #[arg(long)]
    reset_logs: bool,
}

impl Cli {
    fn into_config(self) -> ScanConfig {
        let defaults = ScanConfig::default();
        ScanConfig {
            work_dir: self.work_dir,
            token_file: self.token_file,
            hits_minimal: self.hits_file,
            hits_verbose: self.hits_verbose_file,
            processed_dir: self.processed_dir,
            url_prefix: self.url_prefix,
            api_url: self.api_url,
            request_timeout: Duration::from_secs(self.request_timeout),
            query_delay: Duration::from_secs(self.query_delay),
            reset_logs: self.reset_logs,
            retry: RetryPolicy {
                base_delay: Duration::from_secs(self.base_delay),
                ..defaults.retry.clone()
            },
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_config();

    let credentials = match CredentialPool::from_file(config.token_path()) {
        Ok(pool) => pool,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    info!("Starting scan with {} tokens available", credentials.len());
    info!("API URL: {}", config.api_url);

    let state = Arc::new(AppState::new(&config, credentials)?);
    let interrupt = Interrupt::new();
    spawn_interrupt_handler(interrupt.clone());

    let runner = JobRunner::new(config, state, interrupt);
    let summary = runner.run().await?;
    if summary.interrupted {
        warn!("Run interrupted; unfinished files stay in place for the next run");
    }
    Ok(())
}

/// First Ctrl-C stops at the next query boundary, the second exits at once.
fn spawn_interrupt_handler(interrupt: Interrupt) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Could not install Ctrl-C handler");
            return;
        }
        warn!("Interrupt received, stopping after the current query (Ctrl-C again to abort)");
        interrupt.trigger();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
