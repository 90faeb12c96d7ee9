//! ChainTable: the unsynchronized table core and its rehash engine.
//!
//! Entries live in a generational arena; each bucket holds the arena key of
//! its chain head and each entry links to the next one in its chain. The
//! capability set is passed in on every call so the same core can serve any
//! `Capabilities` implementation.
//!
//! Every entry caches the 64-bit hash computed at insertion. Rehashing uses
//! the cached hash, so growing never calls into user code and cannot fail
//! once the new bucket array has been reserved.
//!
//! Capability destructors are only invoked after the structure is
//! consistent again.

use crate::capability::Capabilities;
use crate::error::Error;
use slotmap::{DefaultKey, SlotMap};

/// Bucket count of a freshly constructed table.
pub const INITIAL_CAPACITY: usize = 16;

// Growth triggers when len > capacity * 3 / 4.
const LOAD_FACTOR_NUM: usize = 3;
const LOAD_FACTOR_DEN: usize = 4;

const GROWTH_FACTOR: usize = 2;

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
    next: Option<DefaultKey>,
}

/// Result of a successful `put`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum PutOutcome {
    Inserted,
    Replaced,
}

enum Probe {
    Found {
        prev: Option<DefaultKey>,
        at: DefaultKey,
    },
    Vacant {
        tail: Option<DefaultKey>,
    },
}

pub(crate) struct ChainTable<K, V> {
    buckets: Vec<Option<DefaultKey>>,
    entries: SlotMap<DefaultKey, Entry<K, V>>,
}

impl<K, V> ChainTable<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            buckets: vec![None; INITIAL_CAPACITY],
            entries: SlotMap::with_key(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    fn exceeds_load_factor(&self) -> bool {
        self.entries.len() * LOAD_FACTOR_DEN > self.buckets.len() * LOAD_FACTOR_NUM
    }

    /// Walk one chain looking for `key`. The cached hash is compared first,
    /// so `equals` only runs on entries whose full hash matches.
    fn probe<C>(&self, caps: &C, bucket: usize, hash: u64, key: &K) -> Probe
    where
        C: Capabilities<K, V>,
    {
        let mut prev = None;
        let mut cursor = self.buckets[bucket];
        while let Some(at) = cursor {
            let entry = &self.entries[at];
            if entry.hash == hash && caps.equals(&entry.key, key) {
                return Probe::Found { prev, at };
            }
            prev = Some(at);
            cursor = entry.next;
        }
        Probe::Vacant { tail: prev }
    }

    fn find<C>(&self, caps: &C, key: &K) -> Option<DefaultKey>
    where
        C: Capabilities<K, V>,
    {
        let hash = caps.hash(key);
        match self.probe(caps, self.bucket_index(hash), hash, key) {
            Probe::Found { at, .. } => Some(at),
            Probe::Vacant { .. } => None,
        }
    }

    /// Insert or replace. On replace the previous value and the duplicate
    /// `key` are both handed to the capability destructors.
    pub(crate) fn put<C>(&mut self, caps: &C, key: K, value: V) -> Result<PutOutcome, Error>
    where
        C: Capabilities<K, V>,
    {
        let replaced = {
            let hash = caps.hash(&key);
            let bucket = self.bucket_index(hash);
            match self.probe(caps, bucket, hash, &key) {
                Probe::Found { at, .. } => {
                    let old = core::mem::replace(&mut self.entries[at].value, value);
                    Some((key, old))
                }
                Probe::Vacant { tail } => {
                    let at = self.entries.insert(Entry {
                        key,
                        value,
                        hash,
                        next: None,
                    });
                    match tail {
                        Some(t) => self.entries[t].next = Some(at),
                        None => self.buckets[bucket] = Some(at),
                    }
                    None
                }
            }
        };

        if let Some((duplicate, old)) = replaced {
            tracing::trace!(len = self.len(), "replaced value of existing key");
            caps.destroy_value(old);
            caps.destroy_key(duplicate);
            return Ok(PutOutcome::Replaced);
        }

        tracing::trace!(len = self.len(), "inserted new key");
        if self.exceeds_load_factor() {
            self.grow()?;
        }
        Ok(PutOutcome::Inserted)
    }

    pub(crate) fn get<C>(&self, caps: &C, key: &K) -> Option<&V>
    where
        C: Capabilities<K, V>,
    {
        let at = self.find(caps, key)?;
        self.entries.get(at).map(|e| &e.value)
    }

    pub(crate) fn contains_key<C>(&self, caps: &C, key: &K) -> bool
    where
        C: Capabilities<K, V>,
    {
        self.find(caps, key).is_some()
    }

    /// Unlink and destroy the entry matching `key`. Returns whether one was
    /// present.
    pub(crate) fn remove<C>(&mut self, caps: &C, key: &K) -> bool
    where
        C: Capabilities<K, V>,
    {
        let removed = {
            let hash = caps.hash(key);
            let bucket = self.bucket_index(hash);
            match self.probe(caps, bucket, hash, key) {
                Probe::Found { prev, at } => {
                    // `at` came from the chain walk, so the slot is live.
                    let entry = self.entries.remove(at).expect("chain links a live entry");
                    match prev {
                        Some(p) => self.entries[p].next = entry.next,
                        None => self.buckets[bucket] = entry.next,
                    }
                    Some((entry.key, entry.value))
                }
                Probe::Vacant { .. } => None,
            }
        };

        match removed {
            Some((key, value)) => {
                tracing::trace!(len = self.len(), "removed key");
                caps.destroy_value(value);
                caps.destroy_key(key);
                true
            }
            None => false,
        }
    }

    /// Destroy every entry, bucket by bucket in index order and each chain
    /// from head to tail, key before value. Capacity is left unchanged.
    pub(crate) fn clear<C>(&mut self, caps: &C)
    where
        C: Capabilities<K, V>,
    {
        for bucket in 0..self.buckets.len() {
            loop {
                let taken = match self.buckets[bucket] {
                    Some(head) => {
                        let entry = self
                            .entries
                            .remove(head)
                            .expect("bucket links a live entry");
                        self.buckets[bucket] = entry.next;
                        Some((entry.key, entry.value))
                    }
                    None => None,
                };
                match taken {
                    Some((key, value)) => {
                        caps.destroy_key(key);
                        caps.destroy_value(value);
                    }
                    None => break,
                }
            }
        }
        debug_assert!(self.entries.is_empty());
    }

    /// Double the bucket array and relink every entry onto the front of its
    /// new chain. Old buckets are visited in index order and each old chain
    /// head to tail, so chain order is not preserved.
    ///
    /// The new array is reserved before anything is touched: on failure the
    /// table keeps its old array and capacity.
    fn grow(&mut self) -> Result<(), Error> {
        let old_capacity = self.buckets.len();
        let new_capacity = match old_capacity.checked_mul(GROWTH_FACTOR) {
            Some(n) => n,
            None => {
                tracing::warn!(old_capacity, "bucket array size overflows usize");
                return Err(Error::AllocationFailed {
                    requested: usize::MAX,
                });
            }
        };
        self.grow_to(new_capacity)
    }

    fn grow_to(&mut self, new_capacity: usize) -> Result<(), Error> {
        let old_capacity = self.buckets.len();
        let buckets = reserve_buckets(new_capacity).map_err(|e| {
            tracing::warn!(old_capacity, new_capacity, "failed to reserve bucket array");
            e
        })?;

        let old = core::mem::replace(&mut self.buckets, buckets);
        for mut cursor in old {
            while let Some(at) = cursor {
                let entry = &mut self.entries[at];
                cursor = entry.next;
                let idx = (entry.hash % new_capacity as u64) as usize;
                entry.next = self.buckets[idx];
                self.buckets[idx] = Some(at);
            }
        }

        tracing::debug!(
            old_capacity,
            new_capacity,
            len = self.entries.len(),
            "rehashed bucket array"
        );
        Ok(())
    }

    /// Collect the chain stored in `bucket`, head first.
    #[cfg(test)]
    fn chain(&self, bucket: usize) -> Vec<&K> {
        let mut out = Vec::new();
        let mut cursor = self.buckets[bucket];
        while let Some(at) = cursor {
            let entry = &self.entries[at];
            out.push(&entry.key);
            cursor = entry.next;
        }
        out
    }
}

/// Allocate `n` empty buckets without aborting on allocation failure.
fn reserve_buckets(n: usize) -> Result<Vec<Option<DefaultKey>>, Error> {
    let mut buckets: Vec<Option<DefaultKey>> = Vec::new();
    buckets
        .try_reserve_exact(n)
        .map_err(|_| Error::AllocationFailed { requested: n })?;
    buckets.resize(n, None);
    Ok(buckets)
}
