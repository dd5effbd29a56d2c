//! Build-if-stale cache for compiled functions.
//!
//! Each controller owns one `CompiledCache`. A write that changes what the
//! compiled function depends on calls [`invalidate`](CompiledCache::invalidate);
//! the next request rebuilds and [`store`](CompiledCache::store)s the result.
//! A failed build stores nothing, so the cache stays stale and the next
//! request retries.

use log::trace;

#[derive(Debug, Clone)]
pub(crate) struct CompiledCache<T> {
    value: Option<T>,
    builds: usize,
}

impl<T> CompiledCache<T> {
    /// Creates an empty, stale cache.
    pub(crate) fn new() -> Self {
        Self {
            value: None,
            builds: 0,
        }
    }

    /// True if a value is stored.
    pub(crate) fn is_consistent(&self) -> bool {
        self.value.is_some()
    }

    /// Cached value, if it is still consistent.
    pub(crate) fn fresh(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Stores a freshly built value and counts the build.
    pub(crate) fn store(&mut self, value: T) -> &T {
        self.builds += 1;
        self.value.insert(value)
    }

    /// Drops the stored value, if any.
    pub(crate) fn invalidate(&mut self) {
        if self.value.take().is_some() {
            trace!("compiled function invalidated");
        }
    }

    /// Number of successful builds since construction.
    pub(crate) fn builds(&self) -> usize {
        self.builds
    }
}

impl<T> Default for CompiledCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_invalidate() {
        let mut cache = CompiledCache::new();
        assert!(!cache.is_consistent());
        assert_eq!(*cache.store(7), 7);
        assert!(cache.is_consistent());
        assert_eq!(cache.fresh(), Some(&7));

        cache.invalidate();
        assert!(!cache.is_consistent());
        assert_eq!(cache.fresh(), None);
        cache.invalidate();

        cache.store(8);
        assert_eq!(cache.builds(), 2);
    }
}
