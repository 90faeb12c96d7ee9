//! Capabilities: how a map hashes, compares and disposes of what it owns.
//!
//! A map never touches keys or values except through its capability set.
//! `StdCapabilities` covers ordinary `K: Hash + Eq` types; `FnCapabilities`
//! is assembled from four independent closures, all of them mandatory.

use crate::error::{Capability, Error};
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use hashbrown::hash_map::DefaultHashBuilder;

/// Hashing, equality and destruction for one key/value type pair.
///
/// Implementations must be consistent: `equals(a, b)` implies
/// `hash(a) == hash(b)`, and `hash` must return the same value for a key
/// every time it is asked.
///
/// Lookups compare the full 64-bit hash stored with each entry before
/// calling `equals`, so two keys are only ever considered equal when their
/// hashes are identical, not merely when they land in the same bucket.
///
/// `ChainedHashMap` is `Sync` only when its capability set is; closures
/// given to `CapabilitiesBuilder` must therefore be `Send + Sync`.
pub trait Capabilities<K, V> {
    fn hash(&self, key: &K) -> u64;

    fn equals(&self, a: &K, b: &K) -> bool;

    /// Dispose of a key the map owned. Called exactly once per key.
    fn destroy_key(&self, key: K) {
        drop(key);
    }

    /// Dispose of a value the map owned. Called exactly once per value.
    fn destroy_value(&self, value: V) {
        drop(value);
    }
}

/// Capabilities derived from `K: Hash + Eq` and a `BuildHasher`; keys and
/// values are destroyed by dropping them.
#[derive(Clone, Debug, Default)]
pub struct StdCapabilities<S = DefaultHashBuilder> {
    hasher: S,
}

impl<S> StdCapabilities<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }
}

impl<K, V, S> Capabilities<K, V> for StdCapabilities<S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

pub type HashFn<K> = Box<dyn Fn(&K) -> u64 + Send + Sync>;
pub type EqualsFn<K> = Box<dyn Fn(&K, &K) -> bool + Send + Sync>;
pub type DestroyFn<T> = Box<dyn Fn(T) + Send + Sync>;

/// Capabilities backed by four caller-supplied closures.
pub struct FnCapabilities<K, V> {
    hash: HashFn<K>,
    equals: EqualsFn<K>,
    destroy_key: DestroyFn<K>,
    destroy_value: DestroyFn<V>,
}

impl<K, V> Capabilities<K, V> for FnCapabilities<K, V> {
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        (self.hash)(key)
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        (self.equals)(a, b)
    }

    fn destroy_key(&self, key: K) {
        (self.destroy_key)(key)
    }

    fn destroy_value(&self, value: V) {
        (self.destroy_value)(value)
    }
}

impl<K, V> fmt::Debug for FnCapabilities<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCapabilities").finish_non_exhaustive()
    }
}

/// Collects the four closures of a `FnCapabilities`. `build` fails unless
/// every one of them was supplied.
pub struct CapabilitiesBuilder<K, V> {
    hash: Option<HashFn<K>>,
    equals: Option<EqualsFn<K>>,
    destroy_key: Option<DestroyFn<K>>,
    destroy_value: Option<DestroyFn<V>>,
    _pd: PhantomData<fn(K, V)>,
}

impl<K, V> CapabilitiesBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            hash: None,
            equals: None,
            destroy_key: None,
            destroy_value: None,
            _pd: PhantomData,
        }
    }

    pub fn hash<F>(mut self, f: F) -> Self
    where
        F: Fn(&K) -> u64 + Send + Sync + 'static,
    {
        self.hash = Some(Box::new(f));
        self
    }

    pub fn equals<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &K) -> bool + Send + Sync + 'static,
    {
        self.equals = Some(Box::new(f));
        self
    }

    pub fn destroy_key<F>(mut self, f: F) -> Self
    where
        F: Fn(K) + Send + Sync + 'static,
    {
        self.destroy_key = Some(Box::new(f));
        self
    }

    pub fn destroy_value<F>(mut self, f: F) -> Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        self.destroy_value = Some(Box::new(f));
        self
    }

    /// Checked in order hash, equals, destroy_key, destroy_value; the first
    /// missing one is reported.
    pub fn build(self) -> Result<FnCapabilities<K, V>, Error> {
        let hash = self.hash.ok_or(Error::MissingCapability(Capability::Hash))?;
        let equals = self
            .equals
            .ok_or(Error::MissingCapability(Capability::Equals))?;
        let destroy_key = self
            .destroy_key
            .ok_or(Error::MissingCapability(Capability::DestroyKey))?;
        let destroy_value = self
            .destroy_value
            .ok_or(Error::MissingCapability(Capability::DestroyValue))?;
        Ok(FnCapabilities {
            hash,
            equals,
            destroy_key,
            destroy_value,
        })
    }
}

impl<K, V> Default for CapabilitiesBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
