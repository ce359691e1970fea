//! Per-key mutual exclusion for in-process units of work.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex};

use crate::store::StoreError;

/// A set of currently held keys.
///
/// Holding a key makes the caller the only writer for that key; different
/// keys proceed in parallel. A caller that needs several keys takes them all
/// at once (all-or-nothing), so overlapping requests cannot deadlock.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    name: &'static str,
    held: Mutex<BTreeSet<K>>,
    released: Condvar,
}

/// Keys held by one unit of work, released together on drop.
#[derive(Debug)]
pub struct KeyGuard<'a, K: Ord> {
    owner: &'a KeyedLocks<K>,
    keys: Vec<K>,
}

impl<K> KeyedLocks<K>
where
    K: Copy + Ord,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            held: Mutex::new(BTreeSet::new()),
            released: Condvar::new(),
        }
    }

    /// Block until every key in `keys` is free, then take them all.
    pub fn lock_all(&self, keys: impl IntoIterator<Item = K>) -> Result<KeyGuard<'_, K>, StoreError> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut held = self
            .held
            .lock()
            .map_err(|_| StoreError::LockPoisoned(self.name))?;
        while keys.iter().any(|k| held.contains(k)) {
            held = self
                .released
                .wait(held)
                .map_err(|_| StoreError::LockPoisoned(self.name))?;
        }
        held.extend(keys.iter().copied());

        Ok(KeyGuard { owner: self, keys })
    }

    pub fn lock(&self, key: K) -> Result<KeyGuard<'_, K>, StoreError> {
        self.lock_all([key])
    }
}

impl<K: Ord> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        // Release even if another holder panicked: the set itself is always
        // consistent because it is only touched under this mutex.
        let mut held = match self.owner.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.owner.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn same_key_is_exclusive() {
        let locks = KeyedLocks::<u32>::new("test");
        let inside = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let _g = locks.lock(7).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::<u32>::new("test");
        let _a = locks.lock(1).unwrap();
        let _b = locks.lock(2).unwrap();
    }

    #[test]
    fn overlapping_sets_do_not_deadlock() {
        let locks = KeyedLocks::<u32>::new("test");
        std::thread::scope(|s| {
            for i in 0..16u32 {
                let locks = &locks;
                s.spawn(move || {
                    let keys = if i % 2 == 0 { [1, 2] } else { [2, 1] };
                    let _g = locks.lock_all(keys).unwrap();
                });
            }
        });
    }

    #[test]
    fn duplicate_keys_lock_once_and_release_on_drop() {
        let locks = KeyedLocks::<u32>::new("test");
        {
            let _g = locks.lock_all([3, 3, 3]).unwrap();
        }
        let _again = locks.lock(3).unwrap();
    }
}
