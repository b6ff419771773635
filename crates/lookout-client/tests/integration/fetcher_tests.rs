use std::time::Duration;

use lookout_client::ReqwestFetcher;
use lookout_core::error::AppError;
use lookout_core::traits::Fetcher;

use crate::common::{PAGE_HTML, spawn_test_server, url};

#[tokio::test]
async fn fetches_body() {
    let addr = spawn_test_server().await;
    let fetcher = ReqwestFetcher::new().unwrap();

    let body = fetcher.fetch(&url(addr, "/page")).await.unwrap();
    assert_eq!(body, PAGE_HTML);
}

#[tokio::test]
async fn not_found_is_http_error() {
    let addr = spawn_test_server().await;
    let fetcher = ReqwestFetcher::new().unwrap();

    let err = fetcher.fetch(&url(addr, "/missing")).await.unwrap_err();
    assert!(matches!(err, AppError::HttpError(_)));
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn too_many_requests_is_not_retried() {
    let addr = spawn_test_server().await;
    let fetcher = ReqwestFetcher::new().unwrap();

    let err = fetcher.fetch(&url(addr, "/limited")).await.unwrap_err();
    assert!(matches!(err, AppError::RateLimitExceeded));
}

#[tokio::test]
async fn client_timeout_is_reported() {
    let addr = spawn_test_server().await;
    let fetcher = ReqwestFetcher::with_timeout(Duration::from_millis(300)).unwrap();

    let err = fetcher.fetch(&url(addr, "/slow")).await.unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    // Bind and drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = ReqwestFetcher::new().unwrap();
    let err = fetcher.fetch(&url(addr, "/page")).await.unwrap_err();
    assert!(err.is_fetch_failure());
}
