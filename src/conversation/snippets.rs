//! Short-lived store for code extracted from replies, backing the "copy code" button.

use moka::sync::Cache;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Callback payload prefix for copy buttons.
pub const COPY_CALLBACK_PREFIX: &str = "copy_";

/// Code snippets keyed by a content-derived id.
///
/// Entries expire after a fixed time-to-live and the cache is bounded, so a
/// long-running bot does not grow without limit.
#[derive(Clone)]
pub struct SnippetCache {
    entries: Cache<u64, Arc<str>>,
}

impl SnippetCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Store a snippet and return its id. Storing the same text twice yields the same id.
    pub fn store(&self, code: &str) -> u64 {
        let id = snippet_id(code);
        self.entries.insert(id, Arc::from(code));
        tracing::debug!(snippet_id = id, bytes = code.len(), "stored code snippet");
        id
    }

    pub fn lookup(&self, id: u64) -> Option<Arc<str>> {
        self.entries.get(&id)
    }

    /// Callback payload for a copy button pointing at `id`.
    pub fn callback_data(id: u64) -> String {
        format!("{COPY_CALLBACK_PREFIX}{id}")
    }
}

impl std::fmt::Debug for SnippetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnippetCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

/// First eight bytes of the SHA-256 digest, big-endian.
pub fn snippet_id(code: &str) -> u64 {
    let digest = Sha256::digest(code.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SnippetCache {
        SnippetCache::new(100, Duration::from_secs(60))
    }

    #[test]
    fn store_then_lookup_round_trips() {
        let cache = cache();
        for code in ["print('hi')", "fn main() {}\n", "é ü 漢字"] {
            let id = cache.store(code);
            assert_eq!(cache.lookup(id).as_deref(), Some(code));
        }
    }

    #[test]
    fn unknown_id_is_not_found() {
        let cache = cache();
        cache.store("something");
        assert!(cache.lookup(snippet_id("something else")).is_none());
    }

    #[test]
    fn id_is_deterministic_and_content_sensitive() {
        assert_eq!(snippet_id("a"), snippet_id("a"));
        assert_ne!(snippet_id("a"), snippet_id("b"));
        assert_eq!(cache().store("x = 1"), snippet_id("x = 1"));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = SnippetCache::new(100, Duration::from_millis(50));
        let id = cache.store("echo temporary");
        assert!(cache.lookup(id).is_some());

        std::thread::sleep(Duration::from_millis(120));
        cache.entries.run_pending_tasks();

        assert!(cache.lookup(id).is_none());
    }

    #[test]
    fn capacity_bounds_entry_count() {
        let cache = SnippetCache::new(4, Duration::from_secs(60));
        for n in 0..50 {
            cache.store(&format!("let x = {n};"));
        }
        cache.entries.run_pending_tasks();

        assert!(
            cache.entries.entry_count() <= 4,
            "got {} entries",
            cache.entries.entry_count()
        );
    }

    #[test]
    fn callback_data_uses_copy_prefix() {
        assert_eq!(SnippetCache::callback_data(42), "copy_42");
    }
}
