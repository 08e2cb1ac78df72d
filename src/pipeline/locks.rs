//! Per-feed exclusion for processing runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-feed locks.
///
/// At most one run per feed holds the guard at a time; a second caller gets
/// `None` instead of waiting.
#[derive(Debug, Clone, Default)]
pub struct FeedLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl FeedLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock of `feed_id` without waiting.
    pub fn try_acquire(&self, feed_id: i64) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(feed_id).or_default().clone()
        };
        lock.try_lock_owned().ok()
    }

    /// Whether a run currently holds the lock of `feed_id`.
    pub fn is_locked(&self, feed_id: i64) -> bool {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&feed_id).is_some_and(|lock| lock.try_lock().is_err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let locks = FeedLocks::new();

        let guard = locks.try_acquire(1).unwrap();
        assert!(locks.is_locked(1));
        assert!(locks.try_acquire(1).is_none());

        // Other feeds are independent
        assert!(locks.try_acquire(2).is_some());

        drop(guard);
        assert!(!locks.is_locked(1));
        assert!(locks.try_acquire(1).is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let locks = FeedLocks::new();
        let other = locks.clone();

        let _guard = locks.try_acquire(7).unwrap();
        assert!(other.try_acquire(7).is_none());
    }
}
