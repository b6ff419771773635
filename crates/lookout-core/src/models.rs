use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Values extracted from one document, keyed by rule.
///
/// Every rule tracked for the source is present; a rule that matched
/// nothing maps to an empty vector. Values are in document order.
pub type ExtractionResult = BTreeMap<String, Vec<String>>;

/// Per-source outcomes of one engine invocation, keyed by source.
pub type Outcomes = BTreeMap<String, Outcome>;

/// Result for a single source within a snapshot.
///
/// Serialized as the extraction object, or `null` when the source failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<ExtractionResult>", into = "Option<ExtractionResult>")]
pub enum Outcome {
    Extracted(ExtractionResult),
    Failed,
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed)
    }

    pub fn extraction(&self) -> Option<&ExtractionResult> {
        match self {
            Outcome::Extracted(result) => Some(result),
            Outcome::Failed => None,
        }
    }

    /// Total number of extracted values across all rules.
    pub fn value_count(&self) -> usize {
        self.extraction()
            .map(|r| r.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl From<Option<ExtractionResult>> for Outcome {
    fn from(value: Option<ExtractionResult>) -> Self {
        match value {
            Some(result) => Outcome::Extracted(result),
            None => Outcome::Failed,
        }
    }
}

impl From<Outcome> for Option<ExtractionResult> {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Extracted(result) => Some(result),
            Outcome::Failed => None,
        }
    }
}

/// One engine invocation: a timestamp shared by every source, and the
/// outcome for each source in the registry view the run started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub outcomes: Outcomes,
}

impl Snapshot {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            outcomes: Outcomes::new(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_failed()).count()
    }
}

/// Current UTC time as RFC 3339 with microseconds, e.g.
/// `2026-01-01T00:00:00.000000Z`. Strings of this shape sort chronologically.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// All snapshots of a session, ordered by timestamp.
///
/// Persisted as `{ "<timestamp>": { "<source>": { "<rule>": [..] } | null } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotCollection {
    snapshots: BTreeMap<String, Outcomes>,
}

impl SnapshotCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot.
    ///
    /// A snapshot with an already-present timestamp replaces the earlier
    /// one, which is logged and returned.
    pub fn insert(&mut self, snapshot: Snapshot) -> Option<Outcomes> {
        let replaced = self
            .snapshots
            .insert(snapshot.timestamp.clone(), snapshot.outcomes);
        if replaced.is_some() {
            tracing::warn!(timestamp = %snapshot.timestamp, "Replaced snapshot with the same timestamp");
        }
        replaced
    }

    pub fn get(&self, timestamp: &str) -> Option<&Outcomes> {
        self.snapshots.get(timestamp)
    }

    pub fn latest(&self) -> Option<(&str, &Outcomes)> {
        self.snapshots
            .iter()
            .next_back()
            .map(|(ts, outcomes)| (ts.as_str(), outcomes))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcomes)> {
        self.snapshots
            .iter()
            .map(|(ts, outcomes)| (ts.as_str(), outcomes))
    }

    /// Outcomes recorded for one source, oldest first. Snapshots that did
    /// not track the source are skipped.
    pub fn history<'a>(&'a self, source: &'a str) -> impl Iterator<Item = (&'a str, &'a Outcome)> {
        self.iter()
            .filter_map(move |(ts, outcomes)| outcomes.get(source).map(|o| (ts, o)))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
