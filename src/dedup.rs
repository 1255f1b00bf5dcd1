//! Registry of record identifiers already written during the run

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared set of seen identifiers; the first caller to present an id wins
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<String>>,
    duplicates: AtomicU64,
}

impl Deduplicator {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `id` was seen before, otherwise records it and returns `false`
    ///
    /// The lookup and the insertion happen under one lock, so of several callers racing on
    /// the same id exactly one gets `false`.
    pub fn check_and_mark(&self, id: &str) -> bool {
        let inserted = {
            // a poisoned set is still a valid set: insertions are single operations
            let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            seen.insert(id.to_string())
        };
        if !inserted {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(id, "dropping duplicate record");
        }
        !inserted
    }

    /// Number of `check_and_mark` calls that reported a duplicate
    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }
}
