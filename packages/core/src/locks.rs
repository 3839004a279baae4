//! Per-key locks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

/// A table of one mutex per key.
///
/// Operations on the same key serialize; operations on different keys only
/// contend on the brief table lookup. Entries are dropped once no guard or
/// waiter holds them.
#[derive(Default)]
pub struct KeyLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free and take it.
    ///
    /// Not reentrant: code already holding a [`KeyGuard`] for a key must pass
    /// the guard down instead of locking again.
    pub fn lock(&self, key: &str) -> KeyGuard<'_> {
        let mutex = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(key.to_string()).or_default())
        };
        KeyGuard {
            key: key.to_string(),
            guard: Some(mutex.lock_arc()),
            locks: self,
        }
    }

    /// Number of keys with a live lock entry.
    pub fn active(&self) -> usize {
        self.table.lock().len()
    }

    fn release(&self, key: &str) {
        let mut table = self.table.lock();
        // Clones are only taken under the table lock, so a count of one
        // means nobody holds or waits on this entry.
        if table.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
            table.remove(key);
        }
    }
}

/// Exclusive access to one key. Released on drop.
pub struct KeyGuard<'a> {
    key: String,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
    locks: &'a KeyLocks,
}

impl KeyGuard<'_> {
    /// The key this guard holds.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.key);
    }
}

impl std::fmt::Debug for KeyGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn entries_are_pruned_after_release() {
        let locks = KeyLocks::new();
        {
            let guard = locks.lock("pkg/A");
            assert_eq!(guard.key(), "pkg/A");
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn distinct_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock("a");
        let _b = locks.lock("b");
        assert_eq!(locks.active(), 2);
    }

    #[test]
    fn same_key_serializes() {
        let locks = KeyLocks::new();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        let _guard = locks.lock("shared");
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }
}
