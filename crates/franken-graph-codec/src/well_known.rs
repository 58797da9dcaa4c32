//! Registry of well-known objects: environment singletons that are encoded
//! by index and never deep-copied.
//!
//! Indices come from a breadth-first walk over a fixed root set, so two
//! realms built the same way agree on them. They are still only meaningful
//! inside one process: never persist them.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

use crate::object_model::{ObjectHandle, ObjectHeap, PropertyDescriptor};

#[derive(Debug, Default)]
struct RegistryTable {
    entries: Vec<ObjectHandle>,
    index: HashMap<ObjectHandle, usize>,
}

impl RegistryTable {
    fn insert(&mut self, handle: ObjectHandle) -> usize {
        if let Some(&index) = self.index.get(&handle) {
            return index;
        }
        let index = self.entries.len();
        self.entries.push(handle);
        self.index.insert(handle, index);
        index
    }
}

/// Ordered, append-only set of well-known objects.
///
/// Reads take a shared lock; [`register`](Self::register) is the only writer.
#[derive(Debug, Default)]
pub struct WellKnownRegistry {
    inner: RwLock<RegistryTable>,
}

impl WellKnownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from `roots`, visiting for each object its
    /// prototype, then the values and accessor functions of its own
    /// properties in own-key order. Only intrinsic objects are admitted.
    pub fn discover(heap: &ObjectHeap, roots: &[ObjectHandle]) -> Self {
        let mut table = RegistryTable::default();
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<ObjectHandle> = roots.iter().copied().collect();

        while let Some(handle) = queue.pop_front() {
            if !seen.insert(handle) || !heap.is_intrinsic(handle) {
                continue;
            }
            let Ok(object) = heap.get(handle) else {
                continue;
            };
            table.insert(handle);

            if let Some(proto) = object.prototype {
                queue.push_back(proto);
            }
            for key in object.own_property_keys() {
                match object.get_own_property(&key) {
                    Some(PropertyDescriptor::Data { value, .. }) => {
                        if let Some(child) = value.as_object() {
                            queue.push_back(child);
                        }
                    }
                    Some(PropertyDescriptor::Accessor { get, set, .. }) => {
                        queue.extend(get.iter().chain(set.iter()).copied());
                    }
                    None => {}
                }
            }
        }

        Self {
            inner: RwLock::new(table),
        }
    }

    /// Registry index of `handle`, if it is well-known.
    pub fn find_index(&self, handle: ObjectHandle) -> Option<usize> {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        table.index.get(&handle).copied()
    }

    /// The object at `index`, if the index exists in this realm.
    pub fn resolve(&self, index: usize) -> Option<ObjectHandle> {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        table.entries.get(index).copied()
    }

    /// Append `handle` (idempotent) and return its index.
    pub fn register(&self, handle: ObjectHandle) -> usize {
        let mut table = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        table.insert(handle)
    }

    pub fn len(&self) -> usize {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        table.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current entries, in index order.
    pub fn snapshot(&self) -> Vec<ObjectHandle> {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        table.entries.clone()
    }
}
