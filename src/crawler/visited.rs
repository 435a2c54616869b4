//! Visited-URL tracking
//!
//! A thread-safe map of namespaces to sets of URL strings, shared by every
//! crawl engine. Namespaces are base-domain strings, one per engine.

use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Tracks already visited links per namespace.
///
/// The inner set for a namespace is created lazily on first insertion.
#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: RwLock<HashMap<String, HashSet<String>>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key` under `namespace`. Idempotent, never fails.
    pub async fn set(&self, namespace: &str, key: &str) {
        self.insert(namespace, key).await;
    }

    /// Atomic mark-and-test: inserts `key` under `namespace` and returns
    /// true iff it was not already present.
    ///
    /// When two tasks race on the same key, exactly one sees true.
    pub async fn insert(&self, namespace: &str, key: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string())
    }

    /// Whether a prior `set` for this namespace and key completed; an
    /// unknown namespace yields false
    pub async fn contains(&self, namespace: &str, key: &str) -> bool {
        let inner = self.inner.read().await;
        inner.get(namespace).map_or(false, |set| set.contains(key))
    }
}
