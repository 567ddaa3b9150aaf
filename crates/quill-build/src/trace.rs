use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use quill_syntax::ModuleLocation;

/// A memoized stage result and the hash of the inputs it was computed from.
#[derive(Debug)]
pub struct Trace<V> {
    pub value: Arc<V>,
    pub hash: u64,
}

impl<V> Trace<V> {
    pub fn new(value: V, hash: u64) -> Self {
        Self {
            value: Arc::new(value),
            hash,
        }
    }
}

impl<V> Clone for Trace<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            hash: self.hash,
        }
    }
}

/// Lock guarding one key's cached trace. Holders may await while keeping it.
pub(crate) type Slot<V> = Arc<tokio::sync::Mutex<Option<Trace<V>>>>;

/// Per-module slots of one stage.
pub(crate) struct Store<V> {
    slots: Mutex<HashMap<ModuleLocation, Slot<V>>>,
}

impl<V> Store<V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The slot for `location`, created empty on first use.
    pub(crate) fn slot(&self, location: &ModuleLocation) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(location.clone()).or_default())
    }

    /// Drop `slot` from the map unless it has already been replaced.
    pub(crate) fn remove(&self, location: &ModuleLocation, slot: &Slot<V>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(location).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(location);
        }
    }

    pub(crate) fn contains(&self, location: &ModuleLocation) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.contains_key(location)
    }
}

pub(crate) fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash of a primary input and an unordered set of dependency hashes.
pub(crate) fn combine(primary: u64, dependencies: impl IntoIterator<Item = u64>) -> u64 {
    let dependencies = dependencies.into_iter().fold(0u64, u64::wrapping_add);
    hash_of(&(primary, dependencies))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_order_does_not_matter() {
        assert_eq!(combine(7, [1, 2, 3]), combine(7, [3, 1, 2]));
        assert_ne!(combine(7, [1, 2, 3]), combine(8, [1, 2, 3]));
        assert_ne!(combine(7, [1, 2]), combine(7, [1, 2, 3]));
    }

    #[test]
    fn removing_a_replaced_slot_keeps_the_new_one() {
        let store: Store<u32> = Store::new();
        let location = ModuleLocation::parse("main");
        let old = store.slot(&location);
        store.remove(&location, &old);
        assert!(!store.contains(&location));

        let new = store.slot(&location);
        store.remove(&location, &old);
        assert!(store.contains(&location));
        assert!(Arc::ptr_eq(&new, &store.slot(&location)));
    }
}
