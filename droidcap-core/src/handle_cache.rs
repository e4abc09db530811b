//! Process-wide cache of resolved foreign runtime handles
//!
//! The cache is written exactly once, when the host runtime becomes available,
//! and is read-only afterwards. Every reader must go through [`HandleCache::get`]
//! or [`HandleCache::require`], which makes "initialized before use" an explicit,
//! checkable precondition rather than an implicit ordering between globals.

use std::sync::OnceLock;

use tracing::debug;

use crate::error::{CaptureError, CaptureResult};

/// Init-once, read-many storage for resolved handles
#[derive(Debug)]
pub struct HandleCache<T> {
    name: &'static str,
    slot: OnceLock<T>,
}

impl<T> HandleCache<T> {
    /// Create an empty cache; usable in `static` items
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: OnceLock::new(),
        }
    }

    /// Store the resolved handles. Fails if the cache was already initialized.
    pub fn init(&self, handles: T) -> CaptureResult<&T> {
        if self.slot.set(handles).is_err() {
            return Err(CaptureError::InvalidState {
                message: format!("{} handle cache already initialized", self.name),
            });
        }
        debug!("{} handle cache initialized", self.name);
        self.require()
    }

    /// Resolved handles, if initialized
    pub fn get(&self) -> Option<&T> {
        self.slot.get()
    }

    /// Resolved handles, or an initialization error naming the cache
    pub fn require(&self) -> CaptureResult<&T> {
        self.slot.get().ok_or_else(|| CaptureError::Initialization {
            reason: format!("{} handle cache not initialized", self.name),
        })
    }

    /// Whether [`HandleCache::init`] has succeeded
    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_cache() {
        let cache: HandleCache<u32> = HandleCache::new("test");

        assert!(!cache.is_initialized());
        assert!(cache.get().is_none());
        assert!(matches!(
            cache.require(),
            Err(CaptureError::Initialization { .. })
        ));
    }

    #[test]
    fn test_init_once() {
        let cache = HandleCache::new("test");

        assert_eq!(*cache.init(7u32).unwrap(), 7);
        assert!(cache.is_initialized());

        let second = cache.init(9);
        assert!(matches!(second, Err(CaptureError::InvalidState { .. })));
        assert_eq!(cache.get(), Some(&7));
    }

    #[test]
    fn test_static_cache() {
        static CACHE: HandleCache<&'static str> = HandleCache::new("static");

        CACHE.init("resolved").unwrap();
        assert_eq!(CACHE.require().unwrap(), &"resolved");
    }
}
