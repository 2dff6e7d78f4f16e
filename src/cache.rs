//! Concurrent read-through cache with exactly-once population per key.
//!
//! Each key owns a slot with its own initialisation lock. The first caller to
//! reach an empty slot computes the value while holding that lock; concurrent
//! callers for the same key wait on it and then observe the stored value.
//! Callers for other keys are never blocked by a slow computation.
//! A failed computation removes its slot so a later call can retry and
//! failing keys do not accumulate.
//! Entries are never evicted.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

struct SlotInner<V> {
    value: OnceLock<V>,
    init: Mutex<()>,
}

type Slot<V> = Arc<SlotInner<V>>;

/// Monotonically growing map with an atomic get-or-compute primitive.
pub struct OnceMap<K, V> {
    slots: RwLock<HashMap<K, Slot<V>>>,
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key` if it has been populated.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.slots.read().get(key).cloned()?;
        slot.value.get().cloned()
    }

    /// Returns the cached value, computing it with `init` exactly once across
    /// all concurrent callers for the same key.
    pub fn get_or_try_insert_with<E, F>(&self, key: &K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        loop {
            let slot = self.slot(key);
            if let Some(value) = slot.value.get() {
                return Ok(value.clone());
            }

            let _init = slot.init.lock();
            if let Some(value) = slot.value.get() {
                return Ok(value.clone());
            }
            // A failed computation discarded this slot while we waited.
            if !self.is_current(key, &slot) {
                continue;
            }

            return match init() {
                Ok(value) => {
                    let _ = slot.value.set(value.clone());
                    Ok(value)
                }
                Err(err) => {
                    self.slots.write().remove(key);
                    Err(err)
                }
            };
        }
    }

    /// Number of slots held, populated or still being computed.
    pub fn slot_count(&self) -> usize {
        self.slots.read().len()
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.value.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_current(&self, key: &K, slot: &Slot<V>) -> bool {
        self.slots
            .read()
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current, slot))
    }

    fn slot(&self, key: &K) -> Slot<V> {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write();
        Arc::clone(
            slots
                .entry(key.clone())
                .or_insert_with(|| {
                    Arc::new(SlotInner {
                        value: OnceLock::new(),
                        init: Mutex::new(()),
                    })
                }),
        )
    }
}

impl<K, V> Default for OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for OnceMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnceMap")
            .field("slots", &self.slots.read().len())
            .finish()
    }
}
