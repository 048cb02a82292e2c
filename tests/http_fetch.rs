//! The reqwest-backed fetcher against a local HTTP server.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lexacquire::scrapers::{HttpClient, RetryPolicy};
use lexacquire::ScrapeError;

fn client(attempts: u32, timeout: Duration) -> HttpClient {
    HttpClient::new(timeout, Duration::ZERO, Some("lexacquire-test/1.0"))
        .unwrap()
        .with_retry(RetryPolicy {
            max_attempts: attempts,
            retry_delay: Duration::from_millis(10),
        })
}

#[tokio::test]
async fn success_returns_body_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/laws"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<h1>Laws</h1>", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = client(3, Duration::from_secs(5))
        .get(&format!("{}/laws", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "<h1>Laws</h1>");
    assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(5, Duration::from_secs(5))
        .get(&format!("{}/gone.pdf", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::NotFound { .. }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn server_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(3, Duration::from_secs(5))
        .get(&format!("{}/busy", server.uri()))
        .await
        .unwrap_err();
    match err {
        ScrapeError::FetchFailed {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error, "HTTP 500");
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let response = client(3, Duration::from_secs(5))
        .get(&format!("{}/flaky", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn timeouts_count_as_failed_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client(2, Duration::from_millis(200))
        .get(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();
    match err {
        ScrapeError::FetchFailed {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(last_error, "request timed out");
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
}
