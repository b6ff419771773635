use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::archive::PageArchive;
use crate::error::AppError;
use crate::models::{Outcome, Snapshot, now_timestamp};
use crate::registry::RegistryView;
use crate::traits::{Extractor, Fetcher};

/// Per-invocation settings for the [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound for fetching one source.
    pub timeout: Duration,
    /// Where fetched bodies are archived, if anywhere.
    pub archive: Option<PageArchive>,
}

impl EngineConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            archive: None,
        }
    }

    pub fn with_archive(mut self, archive: PageArchive) -> Self {
        self.archive = Some(archive);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Fetches every tracked source concurrently and extracts its rules into
/// one timestamped [`Snapshot`].
///
/// Each source runs in its own task. A source that fails, times out or
/// panics is recorded as [`Outcome::Failed`] without affecting the others.
pub struct Engine<F, X>
where
    F: Fetcher,
    X: Extractor,
{
    fetcher: F,
    extractor: X,
    config: EngineConfig,
}

impl<F, X> Engine<F, X>
where
    F: Fetcher,
    X: Extractor,
{
    pub fn new(fetcher: F, extractor: X) -> Self {
        Self::with_config(fetcher, extractor, EngineConfig::default())
    }

    pub fn with_config(fetcher: F, extractor: X, config: EngineConfig) -> Self {
        Self {
            fetcher,
            extractor,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one invocation over `view`.
    ///
    /// The timestamp is taken before any fetch starts. The returned snapshot
    /// has exactly one outcome per source in `view`. Dropping the returned
    /// future aborts every outstanding fetch.
    pub async fn run(&self, view: RegistryView) -> Snapshot {
        let mut snapshot = Snapshot::new(now_timestamp());
        if view.is_empty() {
            tracing::debug!("Nothing tracked, returning empty snapshot");
            return snapshot;
        }

        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for (source, rules) in view {
            snapshot.outcomes.insert(source.clone(), Outcome::Failed);

            let fetcher = self.fetcher.clone();
            let extractor = self.extractor.clone();
            let archive = self.config.archive.clone();
            let timeout = self.config.timeout;
            let timestamp = snapshot.timestamp.clone();

            tasks.spawn(async move {
                let outcome = fetch_and_extract(
                    &fetcher,
                    &extractor,
                    archive.as_ref(),
                    &source,
                    &rules,
                    &timestamp,
                    timeout,
                )
                .await;
                (source, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, outcome)) => {
                    snapshot.outcomes.insert(source, outcome);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Extraction task aborted");
                }
            }
        }

        tracing::info!(
            timestamp = %snapshot.timestamp,
            sources = snapshot.outcomes.len(),
            failed = snapshot.failed_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Snapshot complete"
        );

        snapshot
    }
}

async fn fetch_and_extract<F, X>(
    fetcher: &F,
    extractor: &X,
    archive: Option<&PageArchive>,
    source: &str,
    rules: &BTreeSet<String>,
    timestamp: &str,
    timeout: Duration,
) -> Outcome
where
    F: Fetcher,
    X: Extractor,
{
    tracing::debug!(url = %source, rules = rules.len(), "Fetching");

    let fetched = tokio::time::timeout(timeout, fetcher.fetch(source))
        .await
        .unwrap_or(Err(AppError::Timeout(timeout)));

    let html = match fetched {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(url = %source, error = %e, "Fetch failed");
            return Outcome::Failed;
        }
    };

    if let Some(archive) = archive {
        match archive.store(source, timestamp, &html).await {
            Ok(path) => tracing::debug!(url = %source, path = %path.display(), "Archived page"),
            Err(e) => tracing::warn!(url = %source, error = %e, "Failed to archive page"),
        }
    }

    let result = extractor.extract(&html, rules);
    tracing::debug!(
        url = %source,
        bytes = html.len(),
        values = result.values().map(Vec::len).sum::<usize>(),
        "Extracted"
    );
    Outcome::Extracted(result)
}
