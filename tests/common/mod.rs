#![allow(dead_code)]

use dork_scanner::{AppState, CredentialPool, ScanConfig};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use wiremock::MockServer;

pub fn config_for(server: &MockServer, work_dir: &Path) -> ScanConfig {
    ScanConfig {
        api_url: server.uri(),
        ..ScanConfig::without_delays(work_dir)
    }
}

pub fn state_for(config: &ScanConfig, tokens: &[&str]) -> Arc<AppState> {
    let pool = CredentialPool::from_tokens(tokens.iter().copied()).unwrap();
    Arc::new(AppState::new(config, pool).unwrap())
}

pub fn search_body(urls: &[&str]) -> serde_json::Value {
    json!({
        "total_count": urls.len(),
        "incomplete_results": false,
        "items": urls.iter().map(|u| json!({ "name": "f", "path": "f", "html_url": u })).collect::<Vec<_>>(),
    })
}

pub fn rate_body(remaining: u64, reset: i64) -> serde_json::Value {
    json!({
        "resources": {
            "core": { "limit": 5000, "remaining": 4999, "reset": reset },
            "search": { "limit": 30, "remaining": remaining, "reset": reset }
        }
    })
}

pub fn auth_headers(requests: &[wiremock::Request]) -> Vec<String> {
    requests
        .iter()
        .map(|r| r.headers.get("authorization").unwrap().to_str().unwrap().to_string())
        .collect()
}
