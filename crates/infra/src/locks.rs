//! Per-item mutual exclusion.
//!
//! Every operation that reads, checks and mutates an item's quantity, or any
//! request/ledger entry of that item, runs while holding the item's lock.
//! Operations on different items proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use supplyline_catalog::SupplyItemId;

#[derive(Debug, Default)]
pub struct ItemLocks {
    locks: Mutex<HashMap<SupplyItemId, Arc<Mutex<()>>>>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, item: SupplyItemId) -> Arc<Mutex<()>> {
        // A panic while holding the registry cannot leave the map inconsistent.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(item).or_default().clone()
    }

    /// Run `f` while holding `item`'s lock.
    pub fn with_item<R>(&self, item: SupplyItemId, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(item);
        // Aggregates are only mutated on clones before commit, so a poisoned
        // item lock guards no half-written state.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Number of items that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_item_is_serialized() {
        let locks = Arc::new(ItemLocks::new());
        let item = SupplyItemId::generate();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                thread::spawn(move || {
                    locks.with_item(item, || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let locks = Arc::new(ItemLocks::new());
        let item = SupplyItemId::generate();

        let poisoner = locks.clone();
        let _ = thread::spawn(move || {
            poisoner.with_item(item, || panic!("boom"));
        })
        .join();

        assert_eq!(locks.with_item(item, || 42), 42);
    }
}
