//! Per-owner exclusive locks
//!
//! Every operation that reads or writes an owner's files holds that owner's
//! lock for its whole duration. The table is independent of the registry
//! entries, so replacing an entry cannot sneak past an in-flight save or
//! reload.
//!
//! The table only keeps weak references: a mutex lives as long as someone
//! holds or waits for it, and dead slots are swept whenever a new one is
//! created.

use crate::sync::RwLockExt;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub(crate) struct OwnerLocks {
    locks: RwLock<HashMap<String, Weak<Mutex<()>>>>,
}

impl OwnerLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, owner: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read_recovered().get(owner).and_then(Weak::upgrade) {
            return lock;
        }

        let mut locks = self.locks.write_recovered();
        // Someone may have created it between the two lock acquisitions
        if let Some(lock) = locks.get(owner).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);

        let lock = Arc::new(Mutex::new(()));
        locks.insert(owner.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Wait for exclusive access to `owner`; released when the guard drops
    pub(crate) async fn acquire(&self, owner: &str) -> OwnedMutexGuard<()> {
        self.lock_for(owner).lock_owned().await
    }

    /// Whether someone currently holds `owner`'s lock
    #[cfg(test)]
    pub(crate) fn is_locked(&self, owner: &str) -> bool {
        self.lock_for(owner).try_lock().is_err()
    }

    /// Number of slots whose mutex is still alive
    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        self.locks
            .read_recovered()
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }

    #[cfg(test)]
    fn slots(&self) -> usize {
        self.locks.read_recovered().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let locks = OwnerLocks::new();

        let guard = locks.acquire("alpha").await;
        assert!(locks.is_locked("alpha"));
        assert!(!locks.is_locked("beta"));

        drop(guard);
        assert!(!locks.is_locked("alpha"));
    }

    #[tokio::test]
    async fn test_same_owner_is_exclusive() {
        let locks = Arc::new(OwnerLocks::new());
        let guard = locks.acquire("alpha").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("alpha").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_owners_do_not_block() {
        let locks = OwnerLocks::new();
        let _alpha = locks.acquire("alpha").await;
        let _beta = locks.acquire("beta").await;
    }

    #[tokio::test]
    async fn test_released_owners_do_not_accumulate() {
        let locks = OwnerLocks::new();

        for i in 0..100 {
            let _guard = locks.acquire(&format!("owner_{i}")).await;
        }
        assert_eq!(locks.live(), 0);
        // Each new slot sweeps the dead ones
        assert!(locks.slots() <= 1);

        let _held = locks.acquire("kept").await;
        assert_eq!(locks.live(), 1);
        assert_eq!(locks.slots(), 1);
    }
}
