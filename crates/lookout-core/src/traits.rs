use std::collections::BTreeSet;
use std::future::Future;

use crate::error::AppError;
use crate::models::ExtractionResult;

/// Fetches the raw body of a source.
///
/// HTTP error statuses are reported as `Err`, never as a successful body.
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Applies extraction rules to a fetched document.
///
/// Total over its input: every rule gets a key in the result, and a
/// document that cannot be understood yields empty vectors, not an error.
pub trait Extractor: Send + Sync + Clone + 'static {
    fn extract(&self, html: &str, rules: &BTreeSet<String>) -> ExtractionResult;
}
