//! Write-once interception cache.
//!
//! Keyed on (owner qualified path, attribute name); each key is written at
//! most once, so repeated installation passes never re-wrap an attribute.
//! Created empty at startup and never cleared.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

/// Outcome of a wrap attempt for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The proxy was installed.
    Wrapped,
    /// Attribute replacement failed; the attribute is never retried.
    Failed,
}

type CacheKey = (String, String);

/// Process-scoped record of wrap attempts and visited classes.
#[derive(Debug, Default)]
pub struct InterceptCache {
    entries: Mutex<HashMap<CacheKey, PatchOutcome>>,
    visited_classes: Mutex<HashSet<String>>,
}

impl InterceptCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome. Returns false (and leaves the existing entry
    /// untouched) if the key was already present.
    pub fn record(&self, owner: &str, attr: &str, outcome: PatchOutcome) -> bool {
        let mut entries = self.entries.lock();
        let key = (owner.to_string(), attr.to_string());
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, outcome);
        true
    }

    /// Whether a wrap attempt was already made for this attribute.
    #[must_use]
    pub fn contains(&self, owner: &str, attr: &str) -> bool {
        self.entries
            .lock()
            .contains_key(&(owner.to_string(), attr.to_string()))
    }

    /// Recorded outcome for this attribute, if any.
    #[must_use]
    pub fn outcome(&self, owner: &str, attr: &str) -> Option<PatchOutcome> {
        self.entries
            .lock()
            .get(&(owner.to_string(), attr.to_string()))
            .copied()
    }

    /// Number of recorded wrap attempts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Mark a class as visited by the traversal engine. Returns true only on
    /// the first visit, guaranteeing termination on cyclic class graphs.
    pub fn mark_class_visited(&self, qualified_name: &str) -> bool {
        self.visited_classes
            .lock()
            .insert(qualified_name.to_string())
    }

    /// Whether the traversal engine has already visited this class.
    #[must_use]
    pub fn class_visited(&self, qualified_name: &str) -> bool {
        self.visited_classes.lock().contains(qualified_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_write_once_per_key() {
        let cache = InterceptCache::new();
        assert!(cache.record("toolkit.widgets.Widget", "set_text", PatchOutcome::Wrapped));
        assert!(!cache.record("toolkit.widgets.Widget", "set_text", PatchOutcome::Failed));
        assert_eq!(
            cache.outcome("toolkit.widgets.Widget", "set_text"),
            Some(PatchOutcome::Wrapped)
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn visited_classes_are_marked_once() {
        let cache = InterceptCache::new();
        assert!(cache.mark_class_visited("toolkit.widgets.Widget"));
        assert!(!cache.mark_class_visited("toolkit.widgets.Widget"));
        assert!(cache.class_visited("toolkit.widgets.Widget"));
        assert!(!cache.class_visited("toolkit.widgets.Label"));
    }

    #[test]
    fn distinct_attrs_on_one_owner_are_independent() {
        let cache = InterceptCache::new();
        cache.record("toolkit.widgets.Widget", "set_text", PatchOutcome::Wrapped);
        assert!(!cache.contains("toolkit.widgets.Widget", "text"));
        cache.record("toolkit.widgets.Widget", "text", PatchOutcome::Failed);
        assert_eq!(cache.len(), 2);
    }
}
