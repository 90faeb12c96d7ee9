//! ChainedHashMap: the public, thread-safe map.
//!
//! Couples a `ChainTable` with its capability set behind one `TableLock`.
//! Every public operation except construction takes the lock for its whole
//! duration: lookups shared, mutations exclusive.

use crate::capability::{Capabilities, CapabilitiesBuilder, FnCapabilities, StdCapabilities};
use crate::chain_table::{ChainTable, PutOutcome};
use crate::error::Error;
use crate::guard::{ReadGuard, TableLock, ValueRef};
use core::hash::Hash;

struct Shared<K, V, C> {
    table: ChainTable<K, V>,
    caps: C,
}

/// A separately-chained hash map that owns every key and value put into it
/// and disposes of them through its `Capabilities`.
///
/// The map starts with 16 buckets and doubles whenever an insertion pushes
/// the number of entries above three quarters of the bucket count. It never
/// shrinks.
pub struct ChainedHashMap<K, V, C = StdCapabilities>
where
    C: Capabilities<K, V>,
{
    lock: TableLock<Shared<K, V, C>>,
}

impl<K, V> ChainedHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_capabilities(StdCapabilities::default())
    }
}

impl<K, V> Default for ChainedHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ChainedHashMap<K, V, FnCapabilities<K, V>> {
    /// Build a map from four closures. Fails with
    /// `Error::MissingCapability` before allocating anything if one of them
    /// was not supplied.
    pub fn try_from_builder(builder: CapabilitiesBuilder<K, V>) -> Result<Self, Error> {
        let caps = builder.build().map_err(|e| {
            tracing::debug!(error = %e, "rejected map construction");
            e
        })?;
        Ok(Self::with_capabilities(caps))
    }
}

impl<K, V, C> ChainedHashMap<K, V, C>
where
    C: Capabilities<K, V>,
{
    pub fn with_capabilities(caps: C) -> Self {
        Self {
            lock: TableLock::new(Shared {
                table: ChainTable::new(),
                caps,
            }),
        }
    }

    /// Insert `key` and `value`, taking ownership of both.
    ///
    /// If an equal key is already present its value is destroyed and
    /// replaced; the stored key is kept and the `key` passed in is destroyed.
    ///
    /// Returns `Error::AllocationFailed` when growing the bucket array fails.
    /// The entry is stored in that case and the map keeps its old capacity.
    pub fn put(&self, key: K, value: V) -> Result<(), Error> {
        let mut g = self.lock.write();
        let Shared { table, caps } = &mut *g;
        table.put(caps, key, value).map(|_: PutOutcome| ())
    }

    /// Look up `key`, returning an alias to the stored value.
    ///
    /// The map stays read-locked until the returned `ValueRef` is dropped.
    /// Other lookups, on this thread or any other, proceed meanwhile;
    /// `put` and `remove` wait for it. Calling either on the same map from
    /// the thread holding the alias would never return, and panics in debug
    /// builds.
    pub fn get(&self, key: &K) -> Option<ValueRef<'_, V>> {
        ReadGuard::try_map(self.lock.read(), |s| s.table.get(&s.caps, key))
    }

    /// Run `f` on the stored value while the map is read-locked.
    pub fn get_with<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        let g = self.lock.read();
        g.table.get(&g.caps, key).map(f)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        let g = self.lock.read();
        g.table.contains_key(&g.caps, key)
    }

    /// Remove the entry for `key`, destroying its key and value. Returns
    /// `false` and changes nothing when the key is absent.
    pub fn remove(&self, key: &K) -> bool {
        let mut g = self.lock.write();
        let Shared { table, caps } = &mut *g;
        table.remove(caps, key)
    }

    pub fn len(&self) -> usize {
        self.lock.read().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current number of buckets.
    pub fn capacity(&self) -> usize {
        self.lock.read().table.capacity()
    }

    /// Destroy every live key and value and release the map.
    ///
    /// Equivalent to dropping the map.
    pub fn destroy(self) {
        drop(self);
    }
}

impl<K, V, C> Drop for ChainedHashMap<K, V, C>
where
    C: Capabilities<K, V>,
{
    fn drop(&mut self) {
        self.lock.with_mut(|shared| {
            let Shared { table, caps } = shared;
            tracing::debug!(len = table.len(), capacity = table.capacity(), "destroying map");
            table.clear(caps);
        });
    }
}
