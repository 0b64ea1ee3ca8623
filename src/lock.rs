//! Hierarchical lock manager, built around the same idea as a
//! reader/writer latch — packing reader/writer state behind a
//! condition variable — generalized from "one reader-count plus a
//! writer flag" to the four-mode compatibility matrix a
//! global->database->collection hierarchy needs.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockMode {
    IntentShared,
    IntentExclusive,
    Shared,
    Exclusive,
}

impl LockMode {
    fn index(self) -> usize {
        match self {
            LockMode::IntentShared => 0,
            LockMode::IntentExclusive => 1,
            LockMode::Shared => 2,
            LockMode::Exclusive => 3,
        }
    }

    /// Whether a holder of `self` and a requester of `other` may both
    /// hold the lock at once.
    fn compatible_with(self, other: LockMode) -> bool {
        use LockMode::*;
        matches!(
            (self, other),
            (IntentShared, IntentShared)
                | (IntentShared, IntentExclusive)
                | (IntentExclusive, IntentShared)
                | (IntentExclusive, IntentExclusive)
                | (IntentShared, Shared)
                | (Shared, IntentShared)
                | (Shared, Shared)
        )
    }
}

#[derive(Default)]
struct Counts([u32; 4]);

impl Counts {
    fn compatible(&self, mode: LockMode) -> bool {
        for (idx, count) in self.0.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let held = match idx {
                0 => LockMode::IntentShared,
                1 => LockMode::IntentExclusive,
                2 => LockMode::Shared,
                _ => LockMode::Exclusive,
            };
            if !held.compatible_with(mode) {
                return false;
            }
        }
        true
    }
}

/// One lockable resource (global, a database, or a collection). Callers
/// never construct this directly; use [`LockManager`].
pub struct HierarchicalLock {
    counts: Mutex<Counts>,
    cvar: Condvar,
}

impl HierarchicalLock {
    fn new() -> HierarchicalLock {
        HierarchicalLock { counts: Mutex::new(Counts::default()), cvar: Condvar::new() }
    }

    fn acquire(&self, mode: LockMode) {
        let mut counts = self.counts.lock().unwrap();
        let mut waited = false;
        while !counts.compatible(mode) {
            if !waited {
                log::trace!("lock contention: blocking for {:?}", mode);
                waited = true;
            }
            counts = self.cvar.wait(counts).unwrap();
        }
        counts.0[mode.index()] += 1;
    }

    fn release(&self, mode: LockMode) {
        let mut counts = self.counts.lock().unwrap();
        counts.0[mode.index()] -= 1;
        self.cvar.notify_all();
    }
}

impl Default for HierarchicalLock {
    fn default() -> HierarchicalLock {
        HierarchicalLock::new()
    }
}

/// RAII handle: dropping it releases the lock, so a panicking caller
/// can never leak one held forever.
pub struct LockGuard<'a> {
    lock: &'a HierarchicalLock,
    mode: LockMode,
}

impl<'a> Drop for LockGuard<'a> {
    fn drop(&mut self) {
        self.lock.release(self.mode);
    }
}

/// Owns the global lock plus lazily-created per-database and
/// per-collection locks, and grants them in global -> database ->
/// collection order.
pub struct LockManager {
    global: HierarchicalLock,
    databases: Mutex<HashMap<String, &'static HierarchicalLock>>,
    collections: Mutex<HashMap<String, &'static HierarchicalLock>>,
}

impl LockManager {
    pub fn new() -> LockManager {
        LockManager { global: HierarchicalLock::new(), databases: Mutex::new(HashMap::new()), collections: Mutex::new(HashMap::new()) }
    }

    fn leaked(map: &Mutex<HashMap<String, &'static HierarchicalLock>>, name: &str) -> &'static HierarchicalLock {
        let mut map = map.lock().unwrap();
        *map.entry(name.to_string()).or_insert_with(|| Box::leak(Box::new(HierarchicalLock::new())))
    }

    /// Acquires the global -> database -> collection chain in
    /// `(intent_mode, intent_mode, mode)` shape: IS/IX at the outer two
    /// levels, the caller's real mode at the collection level.
    pub fn lock_collection(&self, database: &str, collection: &str, mode: LockMode) -> CollectionLockGuard {
        let intent = match mode {
            LockMode::Shared | LockMode::IntentShared => LockMode::IntentShared,
            LockMode::Exclusive | LockMode::IntentExclusive => LockMode::IntentExclusive,
        };
        self.global.acquire(intent);
        let db_lock = Self::leaked(&self.databases, database);
        db_lock.acquire(intent);
        let key = format!("{}.{}", database, collection);
        let coll_lock = Self::leaked(&self.collections, &key);
        coll_lock.acquire(mode);
        CollectionLockGuard {
            global: LockGuard { lock: &self.global, mode: intent },
            database: LockGuard { lock: db_lock, mode: intent },
            collection: LockGuard { lock: coll_lock, mode },
        }
    }
}

impl Default for LockManager {
    fn default() -> LockManager {
        LockManager::new()
    }
}

/// The three nested guards acquired by [`LockManager::lock_collection`].
/// Dropped in declaration order, i.e. collection first, then database,
/// then global — the reverse of acquisition order.
pub struct CollectionLockGuard<'a> {
    collection: LockGuard<'a>,
    database: LockGuard<'a>,
    global: LockGuard<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn intent_locks_on_the_same_collection_do_not_conflict() {
        let manager = Arc::new(LockManager::new());
        let g1 = manager.lock_collection("db", "coll", LockMode::IntentShared);
        let g2 = manager.lock_collection("db", "coll", LockMode::IntentShared);
        drop(g1);
        drop(g2);
    }

    #[test]
    fn exclusive_blocks_a_concurrent_shared_request() {
        let manager = Arc::new(LockManager::new());
        let guard = manager.lock_collection("db", "coll", LockMode::Exclusive);
        let manager2 = manager.clone();
        let handle = thread::spawn(move || {
            let _g = manager2.lock_collection("db", "coll", LockMode::Shared);
        });
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!handle.is_finished());
        drop(guard);
        handle.join().unwrap();
    }
}
