//! Versioned Cache
//!
//! A memoization table keyed by an arbitrary key, where each entry carries
//! the version it was computed at.
//!
//! # How It Works
//!
//! 1. A writer computes a derived value for some version of its source and
//!    calls [`VersionedCache::set`] with that version.
//!
//! 2. The write is accepted only if the version is strictly greater than the
//!    stored one. Late or duplicate writes from an older recomputation are
//!    dropped, so writes commute.
//!
//! 3. Readers ask for a value at a version with [`VersionedCache::get`]; a
//!    stale entry reads as a miss.
//!
//! The cache is thread-safe. Values are cloned out, so callers usually store
//! an `Arc` to keep reads cheap and reference-stable.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

#[derive(Debug, Clone)]
struct Entry<V> {
    version: u64,
    value: V,
}

/// A cache whose entries are only replaced by strictly newer versions.
#[derive(Debug)]
pub struct VersionedCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> VersionedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store `value` for `key` at `version`.
    ///
    /// Returns `false` (and leaves the cache untouched) when the stored entry
    /// is at the same or a newer version.
    pub fn set(&self, key: K, value: V, version: u64) -> bool {
        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(entry) if entry.version >= version => false,
            _ => {
                entries.insert(key, Entry { version, value });
                true
            }
        }
    }

    /// Get the value stored for `key` if it was computed at exactly `version`.
    pub fn get(&self, key: &K, version: u64) -> Option<V> {
        self.entries
            .read()
            .get(key)
            .filter(|entry| entry.version == version)
            .map(|entry| entry.value.clone())
    }

    /// Get the latest value stored for `key`, whatever its version.
    pub fn latest(&self, key: &K) -> Option<(u64, V)> {
        self.entries
            .read()
            .get(key)
            .map(|entry| (entry.version, entry.value.clone()))
    }

    /// The version currently stored for `key`.
    pub fn version(&self, key: &K) -> Option<u64> {
        self.entries.read().get(key).map(|entry| entry.version)
    }

    /// Return the cached value at `version`, computing and storing it on a miss.
    ///
    /// The computation runs without the lock held.
    pub fn get_or_compute<F>(&self, key: K, version: u64, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key, version) {
            return value;
        }

        let value = compute();
        if !self.set(key, value.clone(), version) {
            tracing::trace!(version, "versioned cache write dropped as stale");
        }
        value
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl<K, V> Default for VersionedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn lower_or_equal_version_does_not_overwrite() {
        let cache = VersionedCache::new();
        assert!(cache.set("nodes", 1, 5));

        assert!(!cache.set("nodes", 2, 5));
        assert!(!cache.set("nodes", 3, 4));
        assert_eq!(cache.get(&"nodes", 5), Some(1));

        assert!(cache.set("nodes", 4, 6));
        assert_eq!(cache.get(&"nodes", 6), Some(4));
    }

    #[test]
    fn stale_version_reads_as_miss() {
        let cache = VersionedCache::new();
        cache.set("edges", vec![1, 2], 1);

        assert!(cache.get(&"edges", 2).is_none());
        assert_eq!(cache.latest(&"edges"), Some((1, vec![1, 2])));
    }

    #[test]
    fn get_or_compute_runs_once_per_version() {
        let cache = VersionedCache::new();
        let computed = Arc::new(AtomicI32::new(0));

        for _ in 0..3 {
            let computed = computed.clone();
            let value = cache.get_or_compute("k", 1, move || {
                computed.fetch_add(1, Ordering::SeqCst);
                Arc::new(42)
            });
            assert_eq!(*value, 42);
        }
        assert_eq!(computed.load(Ordering::SeqCst), 1);

        cache.get_or_compute("k", 2, || Arc::new(43));
        assert_eq!(cache.version(&"k"), Some(2));
    }

    #[test]
    fn returned_values_are_reference_stable() {
        let cache = VersionedCache::new();
        let first = cache.get_or_compute("k", 1, || Arc::new(vec![1, 2, 3]));
        let second = cache.get_or_compute("k", 1, || Arc::new(vec![1, 2, 3]));
        assert!(Arc::ptr_eq(&first, &second));
    }
}
