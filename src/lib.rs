//! chained-hashmap: a separately-chained, resizable hash map that owns
//! everything stored in it and is parameterized over caller-supplied
//! hashing, equality and destruction.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a building block for dictionaries, caches and symbol tables
//!   where the container, not the caller, decides when keys and values
//!   are destroyed.
//! - Layers:
//!   - ChainTable<K, V>: unsynchronized table core. Bucket array of chain
//!     heads over a generational entry arena, count bookkeeping and the
//!     rehash engine. Takes the capability set by reference on each call.
//!   - TableLock<T>: per-instance `parking_lot` reader-writer lock; writers
//!     also take one process-wide lock with the `global-lock` feature. A
//!     debug-only per-thread tracker turns same-thread self-deadlocks into
//!     panics.
//!   - ChainedHashMap<K, V, C>: public API; owns the capability set and the
//!     core behind the lock and runs every operation under it.
//!
//! Ownership
//! - `put` moves key and value into the map. On an existing key the old
//!   value is destroyed, the stored key is kept and the key just passed in
//!   is destroyed, so every key and value handed to the map is destroyed
//!   exactly once.
//! - `get` returns a `ValueRef` alias into the map. It keeps the map
//!   read-locked, so the aliased value cannot be removed or replaced while
//!   it is alive; other lookups go ahead.
//! - `remove`, `destroy` and `Drop` destroy what they release through the
//!   capability destructors. Destructors run only once the chain structure
//!   is consistent again.
//!
//! Growth
//! - 16 buckets initially. After a new key is inserted, if
//!   `len > 3/4 * capacity` the bucket array doubles. It never shrinks.
//! - Each entry caches its 64-bit hash; rehashing relinks arena slots onto
//!   the front of their new chains without calling user code. The new
//!   array is reserved fallibly first, so a failed growth leaves the old
//!   array and capacity in place.
//! - Chain order is not preserved across a rehash. There is no iteration
//!   API, so nothing observes it.
//!
//! Concurrency
//! - Synchronous and blocking only on the guard. `ChainedHashMap` is
//!   `Send + Sync` when `K`, `V` and `C` are `Send + Sync`.
//! - Lookups share the lock, recursively, so one thread may hold several
//!   aliases at once. Mutations are exclusive.
//! - Mutating a map while the same thread holds an alias into it, or
//!   calling back into a map from its own capabilities during a mutation,
//!   can never be granted. Debug builds panic; release builds block.
//! - With `global-lock`, mutations of all maps in the process are
//!   serialized. The process lock is reentrant and is never held by a
//!   `ValueRef`, so destroy callbacks may mutate other maps.
//!
//! Notes and non-goals
//! - No iteration, key enumeration, persistence or shrinking.
//! - Load factor (3/4) and growth factor (2) are fixed.

mod capability;
mod chain_table;
mod chain_table_proptest;
mod chained_hash_map;
mod error;
mod guard;
mod reentrancy;

// Public surface
pub use capability::{
    Capabilities, CapabilitiesBuilder, DestroyFn, EqualsFn, FnCapabilities, HashFn,
    StdCapabilities,
};
pub use chain_table::INITIAL_CAPACITY;
pub use chained_hash_map::ChainedHashMap;
pub use error::{Capability, Error};
pub use guard::ValueRef;
