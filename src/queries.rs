use crate::config::ScanConfig;
use crate::types::QueryJob;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

fn in_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"in:url:?"?([^\s"]+)"?"#).expect("static regex"))
}

/// Pending job files in the working directory, sorted by file name.
pub async fn list_job_files(config: &ScanConfig) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(&config.work_dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let is_txt = path.extension().map_or(false, |ext| ext == "txt");
        if is_txt && !config.is_control_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub async fn load_queries(path: &Path, prefix: &str) -> std::io::Result<Vec<QueryJob>> {
    let bytes = tokio::fs::read(path).await?;
    let content = String::from_utf8_lossy(&bytes);
    Ok(extract_queries(&content, prefix))
}

/// Duplicate-free queries ordered by query text.
///
/// When several source URLs decode to the same query, the smallest URL is kept.
pub fn extract_queries(content: &str, prefix: &str) -> Vec<QueryJob> {
    let urls: BTreeSet<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(prefix))
        .collect();

    let mut by_query: BTreeMap<String, String> = BTreeMap::new();
    for url in urls {
        match extract_query(url) {
            Some(query) => {
                by_query.entry(query).or_insert_with(|| url.to_string());
            }
            None => debug!("No query in {}", url),
        }
    }

    by_query
        .into_iter()
        .map(|(query, source_url)| QueryJob { query, source_url })
        .collect()
}

/// Decoded, normalized `q` parameter of a search URL; `None` when absent or empty.
pub fn extract_query(url: &str) -> Option<String> {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => {
            warn!("Skipping malformed search URL '{}': {}", url, e);
            return None;
        }
    };
    let raw = parsed.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (decode_component(key) == "q").then_some(value)
    })?;
    let query = normalize_query(&decode_component(raw));
    let query = query.trim();
    if query.is_empty() {
        None
    } else {
        Some(query.to_string())
    }
}

/// Form-urlencoded decoding: `+` becomes a space, then percent escapes are reversed.
pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Rewrites quoted `in:url` qualifiers to the bare `in:url:value` form.
pub fn normalize_query(query: &str) -> String {
    in_url_pattern().replace_all(query, "in:url:$1").into_owned()
}
