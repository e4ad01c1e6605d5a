//! In-flight mutation locks
//!
//! A set of identifiers with a mutation outstanding. Acquiring hands back a
//! guard; dropping the guard releases the identifier, so a lock is released on
//! success, on failure and when the owning future is dropped.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

#[derive(Debug)]
pub struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` while another mutation for `key` is outstanding.
    pub fn try_acquire(&self, key: &str) -> Option<InFlightGuard> {
        let mut set = self.inner.lock();
        if !set.insert(key.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(&self.inner),
            key: key.to_string(),
        })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}
