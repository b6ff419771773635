use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Immutable copy of the source → rule-set mapping, taken at the start of
/// an engine invocation.
pub type RegistryView = BTreeMap<String, BTreeSet<String>>;

/// Result of [`Registry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The source was unknown and has been created with this rule.
    NewSource,
    /// The rule was added to an already tracked source.
    NewRule,
    /// The rule was already tracked for this source; nothing changed.
    Duplicate,
}

/// Tracked sources and the extraction rules registered against each.
///
/// A source present in the registry always has at least one rule.
/// Identifiers and rules are stored exactly as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RegistryView", into = "RegistryView")]
pub struct Registry {
    tracked: RegistryView,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: &str, rule: &str) -> AddOutcome {
        match self.tracked.get_mut(source) {
            None => {
                self.tracked
                    .insert(source.to_string(), BTreeSet::from([rule.to_string()]));
                AddOutcome::NewSource
            }
            Some(rules) if rules.contains(rule) => AddOutcome::Duplicate,
            Some(rules) => {
                rules.insert(rule.to_string());
                AddOutcome::NewRule
            }
        }
    }

    /// Remove a source and all its rules. Returns whether it was tracked.
    pub fn remove_source(&mut self, source: &str) -> bool {
        self.tracked.remove(source).is_some()
    }

    /// Remove one rule. Removing the last rule of a source also removes
    /// the source. Returns whether the rule was tracked.
    pub fn remove_rule(&mut self, source: &str, rule: &str) -> bool {
        let Some(rules) = self.tracked.get_mut(source) else {
            return false;
        };
        if !rules.remove(rule) {
            return false;
        }
        if rules.is_empty() {
            self.tracked.remove(source);
        }
        true
    }

    pub fn rules(&self, source: &str) -> Option<&BTreeSet<String>> {
        self.tracked.get(source)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.tracked.contains_key(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.tracked.iter().map(|(s, r)| (s.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Owned copy of the current mapping. Later mutations do not affect it.
    pub fn view(&self) -> RegistryView {
        self.tracked.clone()
    }
}

impl From<RegistryView> for Registry {
    fn from(mut tracked: RegistryView) -> Self {
        tracked.retain(|_, rules| !rules.is_empty());
        Self { tracked }
    }
}

impl From<Registry> for RegistryView {
    fn from(registry: Registry) -> Self {
        registry.tracked
    }
}

/// Cloneable handle to a registry shared between the caller, which is the
/// only writer, and the scheduler loop, which only ever takes views.
///
/// The lock is held only for the duration of a single call.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn add(&self, source: &str, rule: &str) -> AddOutcome {
        self.write(|r| r.add(source, rule))
    }

    pub fn remove_source(&self, source: &str) -> bool {
        self.write(|r| r.remove_source(source))
    }

    pub fn remove_rule(&self, source: &str, rule: &str) -> bool {
        self.write(|r| r.remove_rule(source, rule))
    }

    pub fn view(&self) -> RegistryView {
        self.read(Registry::view)
    }

    pub fn is_empty(&self) -> bool {
        self.read(Registry::is_empty)
    }

    /// Clone of the whole registry, e.g. for persisting it.
    pub fn to_registry(&self) -> Registry {
        self.read(Registry::clone)
    }

    fn read<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl From<Registry> for SharedRegistry {
    fn from(registry: Registry) -> Self {
        Self::new(registry)
    }
}
