//! Per-key async mutual exclusion.
//!
//! [`KeyedLocks`] hands out one async mutex per key, created on first use and
//! dropped again once nobody holds or awaits it, so the map only ever holds
//! keys that are currently contended.

use std::{
  collections::HashMap,
  hash::Hash,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// A set of async locks addressed by key.
pub struct KeyedLocks<K> {
  slots: Mutex<HashMap<K, Slot>>,
}

impl<K> Default for KeyedLocks<K> {
  fn default() -> Self {
    Self { slots: Mutex::new(HashMap::new()) }
  }
}

impl<K> KeyedLocks<K>
where
  K: Eq + Hash + Clone,
{
  pub fn new() -> Self { Self::default() }

  /// Wait for exclusive access to `key`. Access is released when the returned
  /// guard is dropped.
  pub async fn lock(&self, key: K) -> KeyGuard<'_, K> {
    let slot = {
      let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
      Arc::clone(slots.entry(key.clone()).or_default())
    };
    let guard = slot.lock_owned().await;
    KeyGuard { locks: self, key, guard: Some(guard) }
  }

  /// Number of keys currently tracked.
  pub fn len(&self) -> usize {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Exclusive access to one key of a [`KeyedLocks`].
pub struct KeyGuard<'a, K>
where
  K: Eq + Hash + Clone,
{
  locks: &'a KeyedLocks<K>,
  key:   K,
  guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for KeyGuard<'_, K>
where
  K: Eq + Hash + Clone,
{
  fn drop(&mut self) {
    drop(self.guard.take());
    let mut slots = self.locks.slots.lock().unwrap_or_else(PoisonError::into_inner);
    // Only the map's own reference left: no holder, no waiter.
    if slots.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
      slots.remove(&self.key);
    }
  }
}
