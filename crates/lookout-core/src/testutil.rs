//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! Shared state sits behind `Arc<Mutex<_>>` so clones handed to the
//! engine record into the same place the test asserts on.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::ExtractionResult;
use crate::traits::{Extractor, Fetcher};

/// A body that makes [`MockExtractor`] panic.
pub const PANIC_BODY: &str = "!panic";

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum MockRoute {
    Page { delay: Duration, body: String },
    Error(String),
}

/// Mock fetcher serving canned bodies per URL.
///
/// Unknown URLs fail with a network error. Every call is recorded.
#[derive(Clone, Default)]
pub struct MockFetcher {
    routes: Arc<Mutex<HashMap<String, MockRoute>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: &str) -> Self {
        self.with_slow_page(url, Duration::ZERO, body)
    }

    /// Serve `body` after sleeping `delay` on the tokio clock.
    pub fn with_slow_page(self, url: &str, delay: Duration, body: &str) -> Self {
        self.route(
            url,
            MockRoute::Page {
                delay,
                body: body.to_string(),
            },
        );
        self
    }

    /// Fail every fetch of `url` with an HTTP error carrying `message`.
    pub fn with_error(self, url: &str, message: &str) -> Self {
        self.route(url, MockRoute::Error(message.to_string()));
        self
    }

    /// Replace the body served for `url`, e.g. between scheduler ticks.
    pub fn set_page(&self, url: &str, body: &str) {
        self.route(
            url,
            MockRoute::Page {
                delay: Duration::ZERO,
                body: body.to_string(),
            },
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn route(&self, url: &str, route: MockRoute) {
        self.routes.lock().unwrap().insert(url.to_string(), route);
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let route = self.routes.lock().unwrap().get(url).cloned();

        match route {
            Some(MockRoute::Page { delay, body }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(body)
            }
            Some(MockRoute::Error(message)) => Err(AppError::HttpError(message)),
            None => Err(AppError::NetworkError(format!("no route to {url}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor over a line format instead of HTML.
///
/// Each `rule=value` line of the body is a match for `rule`, in line order.
/// Panics when the body is [`PANIC_BODY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MockExtractor;

impl Extractor for MockExtractor {
    fn extract(&self, html: &str, rules: &BTreeSet<String>) -> ExtractionResult {
        if html == PANIC_BODY {
            panic!("mock extractor asked to panic");
        }

        rules
            .iter()
            .map(|rule| {
                let values = html
                    .lines()
                    .filter_map(|line| line.split_once('='))
                    .filter(|(key, _)| *key == rule.as_str())
                    .map(|(_, value)| value.to_string())
                    .collect();
                (rule.clone(), values)
            })
            .collect()
    }
}
