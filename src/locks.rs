//! Per-account mutual exclusion.
//!
//! [`LockRegistry::lock`] hands out an owned async guard scoped to one username. Locks are created
//! lazily under a short-held registry mutex that protects only the map, never account data.
//! Entries that nobody holds or waits on are evicted once the map grows past its capacity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Default number of entries kept before idle locks are swept.
pub const DEFAULT_IDLE_CAPACITY: usize = 1024;

/// Guard proving the holder has exclusive access to one account.
pub type AccountLock = OwnedMutexGuard<()>;

#[derive(Debug)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    idle_capacity: usize,
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::with_idle_capacity(DEFAULT_IDLE_CAPACITY)
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_capacity(idle_capacity: usize) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            idle_capacity: idle_capacity.max(1),
        }
    }

    /// Waits for exclusive access to `username`'s account. No fairness between waiters.
    pub async fn lock(&self, username: &str) -> AccountLock {
        let handle = {
            let mut locks = self.registry();
            let handle = Arc::clone(
                locks
                    .entry(username.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            );
            if locks.len() > self.idle_capacity {
                Self::retain_in_use(&mut locks);
            }
            handle
        };
        handle.lock_owned().await
    }

    /// Drops every lock that is neither held nor awaited. Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        let mut locks = self.registry();
        let before = locks.len();
        Self::retain_in_use(&mut locks);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Holders and waiters keep a clone of the Arc; a count of 1 means only the map refers to it.
    fn retain_in_use(locks: &mut HashMap<String, Arc<AsyncMutex<()>>>) {
        locks.retain(|_, handle| Arc::strong_count(handle) > 1);
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_username_is_serialized() {
        let registry = Arc::new(LockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock("alice").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_usernames_do_not_block_each_other() {
        let registry = LockRegistry::new();
        let _a = registry.lock("alice").await;
        let b = tokio::time::timeout(Duration::from_millis(100), registry.lock("bob")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn evict_idle_keeps_held_locks() {
        let registry = LockRegistry::new();
        let held = registry.lock("alice").await;
        drop(registry.lock("bob").await);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.evict_idle(), 1);
        assert_eq!(registry.len(), 1);
        drop(held);
        assert_eq!(registry.evict_idle(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn registry_is_bounded_by_idle_capacity() {
        let registry = LockRegistry::with_idle_capacity(4);
        for i in 0..50 {
            drop(registry.lock(&format!("user-{i}")).await);
        }
        assert!(registry.len() <= 5);
    }
}
