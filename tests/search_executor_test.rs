mod common;

use common::*;
use dork_scanner::search::SearchExecutor;
use dork_scanner::{ScanConfig, ScanError};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor(config: &ScanConfig, tokens: &[&str]) -> (SearchExecutor, std::sync::Arc<dork_scanner::AppState>) {
    let state = state_for(config, tokens);
    let exec = SearchExecutor::new(state.clone(), &config.search_path, config.retry.clone());
    (exec, state)
}

#[tokio::test]
async fn test_search_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(query_param("q", "in:url:secret.txt"))
        .and(header("authorization", "Bearer a"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&[
            "https://github.com/acme/app/blob/main/secret.txt",
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, std::path::Path::new("."));
    let (exec, _) = executor(&config, &["a"]);
    let result = assert_ok!(exec.search("in:url:secret.txt").await);

    assert_eq!(result.total_count, 1);
    assert_eq!(result.items[0].url, "https://github.com/acme/app/blob/main/secret.txt");
    assert!(result.is_hit());
}

#[tokio::test]
async fn test_401_everywhere_rotates_and_exhausts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    let config = config_for(&server, std::path::Path::new("."));
    let (exec, state) = executor(&config, &["a", "b", "c"]);
    let err = assert_err!(exec.search("password").await);

    match err {
        ScanError::QueryExhausted { attempts, last_error, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last_error, ScanError::Auth));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(auth_headers(&requests), vec!["Bearer a", "Bearer b", "Bearer c"]);
    assert_eq!(state.credentials.active_index(), 0);
}

#[tokio::test]
async fn test_401_then_success_on_next_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, std::path::Path::new("."));
    let (exec, state) = executor(&config, &["expired", "fresh"]);
    let result = assert_ok!(exec.search("api_key").await);

    assert_eq!(result.total_count, 0);
    assert_eq!(state.credentials.current().token(), "fresh");
}

#[tokio::test]
async fn test_403_honours_retry_after_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(403).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["https://github.com/x/y"])))
        .expect(1)
        .mount(&server)
        .await;

    // A missing header would fall back to a minute-long wait.
    let mut config = config_for(&server, std::path::Path::new("."));
    config.retry.default_retry_after = Duration::from_secs(60);
    let (exec, state) = executor(&config, &["a", "b"]);

    let result = tokio::time::timeout(Duration::from_secs(10), exec.search("aws_secret"))
        .await
        .expect("Retry-After header should have been used");
    assert_eq!(assert_ok!(result).total_count, 1);
    assert_eq!(state.credentials.active_index(), 0);
}

#[tokio::test]
async fn test_server_errors_exhaust_after_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let config = config_for(&server, std::path::Path::new("."));
    let (exec, _) = executor(&config, &["a"]);
    match assert_err!(exec.search("token").await) {
        ScanError::QueryExhausted { last_error, .. } => {
            assert!(matches!(*last_error, ScanError::Transient(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_count_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"total_count": -4, "items": []}"#))
        .expect(3)
        .mount(&server)
        .await;

    let config = config_for(&server, std::path::Path::new("."));
    let (exec, _) = executor(&config, &["a"]);
    match assert_err!(exec.search("token").await) {
        ScanError::QueryExhausted { last_error, .. } => {
            assert!(matches!(*last_error, ScanError::Transient(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_failure_is_network_error() {
    // Nothing listens on port 1.
    let config = ScanConfig {
        api_url: "http://127.0.0.1:1".to_string(),
        ..ScanConfig::without_delays(".")
    };
    let (exec, _) = executor(&config, &["a"]);
    match assert_err!(exec.search("token").await) {
        ScanError::QueryExhausted { attempts, last_error, .. } => {
            assert_eq!(attempts, 3);
            assert!(last_error.is_network());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_network_backoff_longer_than_server_error_backoff() {
    let policy = ScanConfig::default().retry;
    let network = ScanError::Network("operation timed out".into());
    let server_error = ScanError::Transient("search failed with status 500".into());
    assert!(policy.delay_for(&network, 0) > policy.delay_for(&server_error, 0));
    assert!(policy.delay_for(&network, 1) > policy.delay_for(&server_error, 1));
}

#[tokio::test]
async fn test_403_without_retry_after_waits_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["https://github.com/x/y"])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, std::path::Path::new("."));
    config.retry.default_retry_after = Duration::from_millis(150);
    let (exec, _) = executor(&config, &["a"]);

    let started = std::time::Instant::now();
    let result = assert_ok!(exec.search("aws_secret").await);
    assert_eq!(result.total_count, 1);
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_403_with_missing_or_bad_retry_after_uses_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(query_param("q", "no_header"))
        .respond_with(ResponseTemplate::new(403))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(query_param("q", "bad_header"))
        .respond_with(ResponseTemplate::new(403).insert_header("Retry-After", "soon"))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = config_for(&server, std::path::Path::new("."));
    config.retry.default_retry_after = Duration::from_millis(7);
    let (exec, _) = executor(&config, &["a"]);

    for query in ["no_header", "bad_header"] {
        match assert_err!(exec.search(query).await) {
            ScanError::QueryExhausted { attempts, last_error, .. } => {
                assert_eq!(attempts, 3);
                match *last_error {
                    ScanError::RateLimited { retry_after } => {
                        assert_eq!(retry_after, config.retry.default_retry_after)
                    }
                    other => panic!("unexpected last error: {other:?}"),
                }
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
