use std::num::NonZeroUsize;

use fstore_types::ObjectKey;
use lru::LruCache;

/// Bounded map from a foreign object key to the key of its local copy.
///
/// Least recently used entries are evicted first. Losing an entry is never
/// incorrect: the next reference to that foreign object is simply copied
/// again.
pub struct CopyDedupCache {
    entries: LruCache<ObjectKey, ObjectKey>,
}

impl CopyDedupCache {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Create a cache holding at most `capacity` mappings (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Local key recorded for `foreign`, marking it most recently used.
    pub fn get(&mut self, foreign: &ObjectKey) -> Option<ObjectKey> {
        self.entries.get(foreign).cloned()
    }

    /// Record that `foreign` was copied to `local`.
    pub fn insert(&mut self, foreign: ObjectKey, local: ObjectKey) {
        self.entries.put(foreign, local);
    }

    /// Number of cached mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached mappings.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for CopyDedupCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for CopyDedupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyDedupCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
